//! Машина состояний воспроизведения
//!
//! Единственный источник правды о том, что происходит сейчас. Переходы с
//! невыполненным условием ничего не делают; каждый выполненный переход
//! рассылается наблюдателям и подписчикам watch-канала.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Состояние воспроизведения
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Ничего не звучит
    #[default]
    Idle,
    /// Идёт чтение
    Speaking,
    /// Чтение приостановлено
    Paused,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Speaking => "speaking",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Причина перехода
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Started,
    Paused,
    Resumed,
    Stopped,
    Completed,
    Failed,
}

/// Выполненный переход
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub from: PlaybackState,
    pub to: PlaybackState,
    pub transition: Transition,
}

/// Наблюдатель за сменой состояния
pub trait StateObserver: Send + Sync {
    fn on_state_change(&self, change: StateChange);
}

pub struct PlaybackStateMachine {
    state: watch::Sender<PlaybackState>,
    observers: RwLock<HashMap<usize, Box<dyn StateObserver>>>,
    next_id: AtomicUsize,
}

impl PlaybackStateMachine {
    pub fn new() -> Self {
        let (state, _) = watch::channel(PlaybackState::Idle);
        Self {
            state,
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
        }
    }

    pub fn current(&self) -> PlaybackState {
        *self.state.borrow()
    }

    /// Подписаться на изменения состояния
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state.subscribe()
    }

    pub fn add_observer(&self, observer: Box<dyn StateObserver>) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.observers.write().insert(id, observer);
        id
    }

    pub fn remove_observer(&self, id: usize) -> Option<Box<dyn StateObserver>> {
        self.observers.write().remove(&id)
    }

    /// Idle → Speaking. Из Speaking и Paused ничего не делает.
    pub fn play(&self) -> bool {
        self.apply(Transition::Started, |state| match state {
            PlaybackState::Idle => Some(PlaybackState::Speaking),
            _ => None,
        })
    }

    /// Speaking → Paused
    pub fn pause(&self) -> bool {
        self.apply(Transition::Paused, |state| match state {
            PlaybackState::Speaking => Some(PlaybackState::Paused),
            _ => None,
        })
    }

    /// Paused → Speaking
    pub fn resume(&self) -> bool {
        self.apply(Transition::Resumed, |state| match state {
            PlaybackState::Paused => Some(PlaybackState::Speaking),
            _ => None,
        })
    }

    /// Любое состояние → Idle. Повторный вызов безопасен.
    pub fn stop(&self) -> bool {
        self.apply(Transition::Stopped, |_| Some(PlaybackState::Idle))
    }

    /// Естественное завершение: Speaking | Paused → Idle
    pub fn complete(&self) -> bool {
        self.apply(Transition::Completed, |_| Some(PlaybackState::Idle))
    }

    /// Неустранимая ошибка: → Idle
    pub fn fail(&self) -> bool {
        self.apply(Transition::Failed, |_| Some(PlaybackState::Idle))
    }

    fn apply(
        &self,
        transition: Transition,
        guard: impl FnOnce(PlaybackState) -> Option<PlaybackState>,
    ) -> bool {
        let mut change = None;
        self.state.send_if_modified(|state| match guard(*state) {
            Some(next) if next != *state => {
                change = Some(StateChange {
                    from: *state,
                    to: next,
                    transition,
                });
                *state = next;
                true
            }
            _ => false,
        });

        let Some(change) = change else {
            return false;
        };
        log::debug!("Playback state {} -> {} ({:?})", change.from, change.to, transition);
        for observer in self.observers.read().values() {
            observer.on_state_change(change);
        }
        true
    }
}

impl Default for PlaybackStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
