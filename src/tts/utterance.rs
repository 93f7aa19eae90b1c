//! Текущее утверждение провайдера
//!
//! У каждого провайдера в любой момент звучит не больше одного
//! утверждения. [`UtteranceSlot`] хранит его хэндл, флаг паузы и токен
//! отмены, и реализует общую для всех провайдеров часть контракта:
//! пауза до начала звучания, немедленная остановка и ожидание конца.

use std::sync::Arc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::audio::{AudioError, PlaybackHandle};
use crate::tts::SpeakOutcome;

/// Билет на одно утверждение, выданный [`UtteranceSlot::begin`]
#[derive(Debug, Clone)]
pub struct Utterance {
    generation: u64,
    token: CancellationToken,
}

impl Utterance {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Завершается, когда утверждение остановлено
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

#[derive(Default)]
struct SlotState {
    generation: u64,
    cancel: Option<CancellationToken>,
    handle: Option<Arc<dyn PlaybackHandle>>,
}

pub struct UtteranceSlot {
    label: &'static str,
    state: Mutex<SlotState>,
    paused: watch::Sender<bool>,
}

impl UtteranceSlot {
    pub fn new(label: &'static str) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            label,
            state: Mutex::new(SlotState::default()),
            paused,
        }
    }

    /// Начать новое утверждение, заглушив предыдущее.
    ///
    /// Токен утверждения дочерний к `cancel`: отмена сессии, даже успевшая
    /// раньше `begin`, глушит и его. Флаг паузы сохраняется: пауза, пришедшая
    /// до начала звучания, должна удержать и новое утверждение.
    pub fn begin(&self, cancel: &CancellationToken) -> Utterance {
        let mut state = self.state.lock();
        if Self::silence(&mut state) {
            log::debug!("{}: previous utterance interrupted by a new one", self.label);
        }
        state.generation += 1;
        let token = cancel.child_token();
        state.cancel = Some(token.clone());
        Utterance {
            generation: state.generation,
            token,
        }
    }

    /// Воспроизвести хэндл в рамках утверждения и дождаться конца.
    ///
    /// `on_start` вызывается один раз, когда звук действительно пошёл.
    pub async fn play(
        &self,
        utterance: &Utterance,
        handle: Box<dyn PlaybackHandle>,
        on_start: &(dyn Fn() + Send + Sync),
    ) -> Result<SpeakOutcome, AudioError> {
        let handle: Arc<dyn PlaybackHandle> = Arc::from(handle);
        if !self.attach(utterance, &handle) {
            handle.stop();
            return Ok(SpeakOutcome::Interrupted);
        }

        let mut paused = self.paused.subscribe();
        loop {
            tokio::select! {
                _ = utterance.cancelled() => return Ok(self.abandon(utterance, &handle)),
                changed = paused.wait_for(|p| !*p) => {
                    if changed.is_err() {
                        return Ok(self.abandon(utterance, &handle));
                    }
                }
            }

            match self.try_start(utterance, &handle) {
                Ok(StartAttempt::Started) => break,
                Ok(StartAttempt::Paused) => continue,
                Ok(StartAttempt::Cancelled) => return Ok(self.abandon(utterance, &handle)),
                Err(e) => {
                    self.release(utterance);
                    return Err(e);
                }
            }
        }

        on_start();

        let outcome = tokio::select! {
            result = handle.finished() => result.map(|_| {
                if utterance.is_cancelled() {
                    SpeakOutcome::Interrupted
                } else {
                    SpeakOutcome::Finished
                }
            }),
            _ = utterance.cancelled() => Ok(self.abandon(utterance, &handle)),
        };
        self.release(utterance);
        outcome
    }

    /// Снять утверждение со слота, если оно ещё текущее
    pub fn release(&self, utterance: &Utterance) {
        let mut state = self.state.lock();
        if state.generation == utterance.generation {
            state.cancel = None;
            state.handle = None;
        }
    }

    /// Заглушить хэндл отменённого утверждения.
    ///
    /// Отмена токена сессии не проходит через [`Self::stop`], поэтому хэндл
    /// останавливается здесь.
    fn abandon(&self, utterance: &Utterance, handle: &Arc<dyn PlaybackHandle>) -> SpeakOutcome {
        handle.stop();
        self.release(utterance);
        SpeakOutcome::Interrupted
    }

    pub fn pause(&self) {
        let state = self.state.lock();
        self.paused.send_replace(true);
        if let Some(handle) = &state.handle {
            handle.pause();
        }
    }

    pub fn resume(&self) {
        let state = self.state.lock();
        self.paused.send_replace(false);
        if let Some(handle) = &state.handle {
            handle.resume();
        }
    }

    /// Остановить текущее утверждение и сбросить паузу. Идемпотентно.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if Self::silence(&mut state) {
            log::debug!("{}: utterance stopped", self.label);
        }
        self.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Есть ли утверждение в процессе
    pub fn is_active(&self) -> bool {
        self.state.lock().cancel.is_some()
    }

    fn attach(&self, utterance: &Utterance, handle: &Arc<dyn PlaybackHandle>) -> bool {
        let mut state = self.state.lock();
        if state.generation != utterance.generation || utterance.is_cancelled() {
            return false;
        }
        state.handle = Some(handle.clone());
        true
    }

    fn try_start(
        &self,
        utterance: &Utterance,
        handle: &Arc<dyn PlaybackHandle>,
    ) -> Result<StartAttempt, AudioError> {
        // Под замком, чтобы пауза не проскочила между проверкой и запуском
        let _state = self.state.lock();
        if utterance.is_cancelled() {
            return Ok(StartAttempt::Cancelled);
        }
        if *self.paused.borrow() {
            return Ok(StartAttempt::Paused);
        }
        handle.start()?;
        Ok(StartAttempt::Started)
    }

    fn silence(state: &mut SlotState) -> bool {
        let had_utterance = state.cancel.is_some();
        if let Some(token) = state.cancel.take() {
            token.cancel();
        }
        if let Some(handle) = state.handle.take() {
            handle.stop();
        }
        had_utterance
    }
}

enum StartAttempt {
    Started,
    Paused,
    Cancelled,
}
