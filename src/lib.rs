//! Основной файл библиотеки tts-reader
//!
//! Библиотека читает вслух длинный текст через один из провайдеров синтеза
//! речи (локальный синтезатор или удалённые HTTP-сервисы) и даёт единый
//! интерфейс паузы, продолжения, остановки и отслеживания прогресса.

pub mod audio;
pub mod chunker;
pub mod config;
pub mod error;
pub mod notification;
pub mod playback;
pub mod progress;
pub mod tts;
pub mod utils;


use std::sync::Arc;
use std::time::Duration;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

pub use crate::config::ReaderConfig;
pub use crate::error::{Result, TtsReaderError};
pub use crate::playback::{PlaybackOutcome, PlaybackState};
pub use crate::tts::classify::{classify, ErrorKind, ProviderError};
pub use crate::tts::{ProviderKind, ProviderRegistry, SpeechProvider};

use crate::chunker::chunk_text;
use crate::playback::{ChunkPlayer, PlaybackStateMachine, Session, StateObserver};
use crate::progress::{DefaultProgressReporter, ProgressObserver, ProgressReporter};

/// Читалка: владеет провайдерами, состоянием и текущей сессией
pub struct TtsReader {
    config: ReaderConfig,
    registry: ProviderRegistry,
    active: RwLock<ProviderKind>,
    state: Arc<PlaybackStateMachine>,
    progress: Arc<dyn ProgressReporter>,
    session: Mutex<Option<Arc<Session>>>,
}

impl TtsReader {
    /// Создать читалку с готовым набором провайдеров
    pub fn new(config: ReaderConfig, registry: ProviderRegistry) -> Self {
        Self::with_progress_reporter(config, registry, Arc::new(DefaultProgressReporter::new()))
    }

    /// Создать читалку со своим репортером прогресса
    pub fn with_progress_reporter(
        config: ReaderConfig,
        registry: ProviderRegistry,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        let active = config.provider;
        Self {
            config,
            registry,
            active: RwLock::new(active),
            state: Arc::new(PlaybackStateMachine::new()),
            progress,
            session: Mutex::new(None),
        }
    }

    /// Собрать читалку и все провайдеры по конфигурации
    pub fn from_config(config: ReaderConfig) -> Result<Self> {
        config.validate()?;
        let registry = ProviderRegistry::from_config(&config)?;
        Ok(Self::new(config, registry))
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Прочитать текст через активный провайдер.
    ///
    /// Предыдущая сессия, если она есть, сначала полностью останавливается.
    /// Возвращается после завершения, остановки или первой ошибки.
    pub async fn play(&self, text: &str) -> Result<PlaybackOutcome> {
        let chunks = chunk_text(text, self.config.max_chunk_chars);
        if chunks.is_empty() {
            return Err(TtsReaderError::EmptyText);
        }

        let kind = self.active_provider();
        let provider = self
            .registry
            .get(kind)
            .ok_or(TtsReaderError::UnknownProvider(kind))?;

        let session = Arc::new(Session::new(provider, chunks));
        let previous = self.session.lock().replace(session.clone());
        if let Some(previous) = previous {
            log::info!("Replacing session {} with {}", previous.id(), session.id());
            self.teardown(&previous);
        }

        let player = ChunkPlayer::new(
            self.state.clone(),
            self.progress.clone(),
            Duration::from_millis(self.config.inter_chunk_delay_ms),
        );
        let result = player.run(&session).await;

        let mut current = self.session.lock();
        if current.as_ref().map(|s| s.id()) == Some(session.id()) {
            *current = None;
        }
        result
    }

    /// Приостановить чтение. Ничего не делает, если сейчас не Speaking.
    pub fn pause(&self) {
        // Переход и команда провайдеру под одним замком, чтобы встречные
        // pause и resume не разошлись с состоянием
        let session = self.session.lock();
        if !self.state.pause() {
            return;
        }
        if let Some(session) = session.as_ref() {
            session.provider().pause();
        }
    }

    /// Продолжить после паузы
    pub fn resume(&self) {
        let session = self.session.lock();
        if !self.state.resume() {
            return;
        }
        if let Some(session) = session.as_ref() {
            session.provider().resume();
        }
    }

    /// Остановить чтение и перейти в Idle. Повторный вызов безопасен.
    pub fn stop(&self) {
        let session = self.session.lock().take();
        match session {
            Some(session) => self.teardown(&session),
            None => {
                self.state.stop();
            }
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state.current()
    }

    /// Подписаться на смену состояния
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state.subscribe()
    }

    pub fn active_provider(&self) -> ProviderKind {
        *self.active.read()
    }

    /// Сменить активный провайдер. Идущее чтение останавливается.
    pub fn set_provider(&self, kind: ProviderKind) -> Result<()> {
        if !self.registry.contains(kind) {
            return Err(TtsReaderError::UnknownProvider(kind));
        }
        if self.active_provider() == kind {
            return Ok(());
        }
        if self.session.lock().is_some() {
            self.stop();
        }
        *self.active.write() = kind;
        log::info!("Active provider switched to {}", kind);
        Ok(())
    }

    pub fn add_progress_observer(&self, observer: Box<dyn ProgressObserver>) -> usize {
        self.progress.add_observer(observer)
    }

    pub fn add_state_observer(&self, observer: Box<dyn StateObserver>) -> usize {
        self.state.add_observer(observer)
    }

    /// Снести сессию: провайдер глушится ровно один раз
    fn teardown(&self, session: &Session) {
        if !session.cancel() {
            return;
        }
        session.provider().stop();
        self.state.stop();
        self.progress.notify_progress(session.reset_progress());
        log::info!("Session {} stopped", session.id());
    }
}

impl Drop for TtsReader {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.cancel();
            session.provider().stop();
        }
    }
}
