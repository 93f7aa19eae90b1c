//! Проигрыватель фрагментов
//!
//! Фрагменты проходят через провайдер строго по одному. Перед каждым
//! следующим фрагментом проверяется сессия и состояние: остановка
//! прерывает цикл, пауза удерживает его до продолжения. Ошибка провайдера
//! останавливает цикл без повторов.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::chunker::char_len;
use crate::error::{Result, TtsReaderError};
use crate::playback::state::{PlaybackState, PlaybackStateMachine};
use crate::progress::{ProgressInfo, ProgressReporter};
use crate::tts::{ProviderKind, SpeakOutcome, SpeechProvider};

/// Одно непрерывное чтение текста
pub struct Session {
    id: Uuid,
    provider: Arc<dyn SpeechProvider>,
    chunks: Vec<String>,
    total_chars: usize,
    token: CancellationToken,
    cancelled: AtomicBool,
}

impl Session {
    pub fn new(provider: Arc<dyn SpeechProvider>, chunks: Vec<String>) -> Self {
        let total_chars = chunks.iter().map(|c| char_len(c)).sum();
        Self {
            id: Uuid::new_v4(),
            provider,
            chunks,
            total_chars,
            token: CancellationToken::new(),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn provider_kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    pub fn provider(&self) -> &Arc<dyn SpeechProvider> {
        &self.provider
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn total_chars(&self) -> usize {
        self.total_chars
    }

    /// Отменить сессию. Возвращает `true` только при первом вызове.
    pub fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Прогресс с нулём прочитанного
    pub fn reset_progress(&self) -> ProgressInfo {
        ProgressInfo::new(self.id, 0, self.total_chars, 0, self.chunks.len())
    }
}

/// Чем закончилось чтение
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Все фрагменты прозвучали
    Completed,
    /// Чтение остановлено до конца
    Stopped,
}

pub struct ChunkPlayer {
    state: Arc<PlaybackStateMachine>,
    progress: Arc<dyn ProgressReporter>,
    inter_chunk_delay: Duration,
}

impl ChunkPlayer {
    pub fn new(
        state: Arc<PlaybackStateMachine>,
        progress: Arc<dyn ProgressReporter>,
        inter_chunk_delay: Duration,
    ) -> Self {
        Self {
            state,
            progress,
            inter_chunk_delay,
        }
    }

    /// Прочитать все фрагменты сессии по порядку
    pub async fn run(&self, session: &Session) -> Result<PlaybackOutcome> {
        let chunks = session.chunks();
        let kind = session.provider_kind();
        let mut state_rx = self.state.subscribe();
        let mut processed = 0;

        log::info!(
            "Session {} started: {} chunks, {} chars via {}",
            session.id(),
            chunks.len(),
            session.total_chars(),
            kind
        );

        for (index, chunk) in chunks.iter().enumerate() {
            if session.is_cancelled() {
                return Ok(PlaybackOutcome::Stopped);
            }
            if index > 0 && !self.ready_for_next(session, &mut state_rx).await {
                log::debug!("Session {} halted before chunk {}", session.id(), index + 1);
                return Ok(PlaybackOutcome::Stopped);
            }

            log::info!(
                "Speaking chunk {}/{} ({} chars)",
                index + 1,
                chunks.len(),
                char_len(chunk)
            );

            let token = session.token.clone();
            let state = self.state.clone();
            let on_start = move || {
                if !token.is_cancelled() {
                    state.play();
                }
            };

            match session.provider().speak(chunk, &session.token, &on_start).await {
                Ok(SpeakOutcome::Finished) => {
                    if session.is_cancelled() {
                        return Ok(PlaybackOutcome::Stopped);
                    }
                    processed += char_len(chunk);
                    self.progress.notify_progress(ProgressInfo::new(
                        session.id(),
                        processed,
                        session.total_chars(),
                        index + 1,
                        chunks.len(),
                    ));
                }
                Ok(SpeakOutcome::Interrupted) => {
                    // Провайдера заглушили в обход сессии, его слот не трогаем
                    if session.cancel() {
                        log::warn!("Chunk {} was interrupted outside of the session", index + 1);
                        self.state.stop();
                    }
                    return Ok(PlaybackOutcome::Stopped);
                }
                Err(error) => {
                    // Сессию могли остановить одновременно с ошибкой
                    if !session.cancel() {
                        return Ok(PlaybackOutcome::Stopped);
                    }
                    // Сбросить паузу и хвосты провайдера, иначе следующее
                    // чтение на нём повиснет на флаге паузы
                    session.provider().stop();
                    log::error!(
                        "Chunk {}/{} failed on {}: {} ({})",
                        index + 1,
                        chunks.len(),
                        kind,
                        error.kind.user_message(),
                        error.message
                    );
                    self.state.fail();
                    return Err(TtsReaderError::Provider {
                        provider: kind,
                        source: error,
                    });
                }
            }

            if index + 1 < chunks.len() && !self.inter_chunk_delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.inter_chunk_delay) => {}
                    _ = session.cancelled() => return Ok(PlaybackOutcome::Stopped),
                }
            }
        }

        if session.is_cancelled() {
            return Ok(PlaybackOutcome::Stopped);
        }
        self.state.complete();
        log::info!("Session {} completed", session.id());
        Ok(PlaybackOutcome::Completed)
    }

    /// Дождаться, пока можно переходить к следующему фрагменту.
    ///
    /// Пауза удерживает цикл; `false` означает, что чтение прекращено.
    async fn ready_for_next(
        &self,
        session: &Session,
        state_rx: &mut watch::Receiver<PlaybackState>,
    ) -> bool {
        loop {
            let current = *state_rx.borrow_and_update();
            match current {
                PlaybackState::Speaking => return true,
                PlaybackState::Idle => return false,
                PlaybackState::Paused => {
                    tokio::select! {
                        changed = state_rx.changed() => {
                            if changed.is_err() {
                                return false;
                            }
                        }
                        _ = session.cancelled() => return false,
                    }
                }
            }
        }
    }
}
