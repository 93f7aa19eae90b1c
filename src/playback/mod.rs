//! Модуль воспроизведения текста
//!
//! Машина состояний и проигрыватель фрагментов, который ведёт по ней
//! одну сессию чтения.

pub mod player;
pub mod state;

pub use player::{ChunkPlayer, PlaybackOutcome, Session};
pub use state::{PlaybackState, PlaybackStateMachine, StateChange, StateObserver, Transition};
