//! Тестовые двойники для провайдеров и аудиовывода

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;

use crate::audio::{AudioError, AudioOutput, AudioPayload, PlaybackHandle};
use crate::tts::classify::ProviderError;
use crate::tts::transport::SynthesisTransport;
use crate::tts::{ProviderKind, SpeakOutcome, SpeechProvider};

struct HandleState {
    started: watch::Sender<bool>,
    ended: watch::Sender<bool>,
    failure: Mutex<Option<String>>,
    starts: AtomicUsize,
    pauses: AtomicUsize,
    resumes: AtomicUsize,
    stopped: AtomicBool,
}

/// Хэндл, который звучит, пока тест не вызовет `finish()`
#[derive(Clone)]
pub struct FakeHandle {
    state: Arc<HandleState>,
}

impl FakeHandle {
    pub fn new() -> Self {
        let (started, _) = watch::channel(false);
        let (ended, _) = watch::channel(false);
        Self {
            state: Arc::new(HandleState {
                started,
                ended,
                failure: Mutex::new(None),
                starts: AtomicUsize::new(0),
                pauses: AtomicUsize::new(0),
                resumes: AtomicUsize::new(0),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    pub async fn wait_started(&self) {
        let mut rx = self.state.started.subscribe();
        let _ = rx.wait_for(|s| *s).await;
    }

    pub fn finish(&self) {
        self.state.ended.send_replace(true);
    }

    pub fn fail(&self, message: &str) {
        *self.state.failure.lock() = Some(message.to_string());
        self.state.ended.send_replace(true);
    }

    pub fn starts(&self) -> usize {
        self.state.starts.load(Ordering::SeqCst)
    }

    pub fn pauses(&self) -> usize {
        self.state.pauses.load(Ordering::SeqCst)
    }

    pub fn resumes(&self) -> usize {
        self.state.resumes.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.state.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaybackHandle for FakeHandle {
    fn start(&self) -> Result<(), AudioError> {
        self.state.starts.fetch_add(1, Ordering::SeqCst);
        self.state.started.send_replace(true);
        Ok(())
    }

    fn pause(&self) {
        self.state.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.state.resumes.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.state.stopped.store(true, Ordering::SeqCst);
        self.state.ended.send_replace(true);
    }

    async fn finished(&self) -> Result<(), AudioError> {
        let mut rx = self.state.ended.subscribe();
        let _ = rx.wait_for(|e| *e).await;
        match self.state.failure.lock().clone() {
            Some(message) => Err(AudioError::Other(message)),
            None => Ok(()),
        }
    }
}

/// Аудиовывод, отдающий заранее созданные хэндлы по очереди
pub struct FakeOutput {
    handles: Mutex<Vec<FakeHandle>>,
    loads: AtomicUsize,
}

impl FakeOutput {
    pub fn new(handles: Vec<FakeHandle>) -> Self {
        Self {
            handles: Mutex::new(handles),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioOutput for FakeOutput {
    async fn load(&self, _payload: AudioPayload) -> Result<Box<dyn PlaybackHandle>, AudioError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let mut handles = self.handles.lock();
        if handles.is_empty() {
            return Err(AudioError::Other("no more fake handles".to_string()));
        }
        Ok(Box::new(handles.remove(0)))
    }
}

/// Транспорт, который считает запросы и отвечает по сценарию
pub struct FakeTransport {
    kind: ProviderKind,
    requests: Mutex<Vec<String>>,
    sent: watch::Sender<usize>,
    failures: Mutex<HashMap<usize, ProviderError>>,
    gate: Option<Arc<Notify>>,
}

impl FakeTransport {
    pub fn new(kind: ProviderKind) -> Self {
        let (sent, _) = watch::channel(0);
        Self {
            kind,
            requests: Mutex::new(Vec::new()),
            sent,
            failures: Mutex::new(HashMap::new()),
            gate: None,
        }
    }

    /// Каждый ответ ждёт `notify_one()` на этом семафоре
    pub fn gated(kind: ProviderKind, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(kind)
        }
    }

    /// Запрос с номером `index` (с нуля) завершится ошибкой
    pub fn fail_at(self, index: usize, error: ProviderError) -> Self {
        self.failures.lock().insert(index, error);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Дождаться, пока транспорт получит `count` запросов
    pub async fn wait_for_requests(&self, count: usize) {
        let mut rx = self.sent.subscribe();
        let _ = rx.wait_for(|n| *n >= count).await;
    }
}

#[async_trait]
impl SynthesisTransport for FakeTransport {
    fn provider(&self) -> ProviderKind {
        self.kind
    }

    async fn synthesize(&self, text: &str) -> Result<AudioPayload, ProviderError> {
        let index = {
            let mut requests = self.requests.lock();
            requests.push(text.to_string());
            requests.len() - 1
        };
        self.sent.send_replace(index + 1);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(error) = self.failures.lock().remove(&index) {
            return Err(error);
        }
        Ok(AudioPayload::new(vec![0u8; 16], Some("audio/mpeg".to_string())))
    }
}

/// Провайдер со сценарием для проверки плеера фрагментов.
///
/// Все вызовы пишутся в общий журнал, чтобы тесты могли проверить порядок
/// `stop` и `speak` между несколькими провайдерами.
pub struct FakeProvider {
    kind: ProviderKind,
    journal: Arc<Mutex<Vec<String>>>,
    failures: Mutex<HashMap<usize, ProviderError>>,
    hold: bool,
    release: Notify,
    cancel: Mutex<CancellationToken>,
    speaks: watch::Sender<usize>,
    spoken: Mutex<Vec<String>>,
    stops: AtomicUsize,
    pauses: AtomicUsize,
    resumes: AtomicUsize,
}

impl FakeProvider {
    /// Провайдер, у которого каждый фрагмент звучит мгновенно
    pub fn instant(kind: ProviderKind) -> Self {
        Self::build(kind, false, Arc::new(Mutex::new(Vec::new())))
    }

    /// Провайдер, у которого фрагмент звучит до `release_one()` или `stop()`
    pub fn holding(kind: ProviderKind) -> Self {
        Self::build(kind, true, Arc::new(Mutex::new(Vec::new())))
    }

    pub fn with_journal(self, journal: Arc<Mutex<Vec<String>>>) -> Self {
        Self { journal, ..self }
    }

    pub fn fail_at(self, index: usize, error: ProviderError) -> Self {
        self.failures.lock().insert(index, error);
        self
    }

    fn build(kind: ProviderKind, hold: bool, journal: Arc<Mutex<Vec<String>>>) -> Self {
        let (speaks, _) = watch::channel(0);
        Self {
            kind,
            journal,
            failures: Mutex::new(HashMap::new()),
            hold,
            release: Notify::new(),
            cancel: Mutex::new(CancellationToken::new()),
            speaks,
            spoken: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
            pauses: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
        }
    }

    /// Дать текущему фрагменту дозвучать
    pub fn release_one(&self) {
        self.release.notify_one();
    }

    /// Дождаться, пока `speak` вызовут `count` раз
    pub async fn wait_for_speaks(&self, count: usize) {
        let mut rx = self.speaks.subscribe();
        let _ = rx.wait_for(|n| *n >= count).await;
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }

    pub fn speak_count(&self) -> usize {
        *self.speaks.borrow()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn pause_count(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn resume_count(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechProvider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn speak(
        &self,
        text: &str,
        cancel: &CancellationToken,
        on_start: &(dyn Fn() + Send + Sync),
    ) -> Result<SpeakOutcome, ProviderError> {
        let token = self.cancel.lock().clone();
        if cancel.is_cancelled() {
            self.journal.lock().push(format!("{}:skip:{}", self.kind, text));
            return Ok(SpeakOutcome::Interrupted);
        }
        let index = {
            let mut spoken = self.spoken.lock();
            spoken.push(text.to_string());
            spoken.len() - 1
        };
        self.journal.lock().push(format!("{}:speak:{}", self.kind, text));

        let failure = self.failures.lock().remove(&index);
        if let Some(error) = failure {
            self.speaks.send_modify(|n| *n += 1);
            return Err(error);
        }

        // Счётчик растёт после on_start, чтобы тесты видели уже начатый фрагмент
        on_start();
        self.speaks.send_modify(|n| *n += 1);
        if !self.hold {
            return Ok(SpeakOutcome::Finished);
        }
        tokio::select! {
            _ = self.release.notified() => Ok(SpeakOutcome::Finished),
            _ = token.cancelled() => Ok(SpeakOutcome::Interrupted),
            _ = cancel.cancelled() => Ok(SpeakOutcome::Interrupted),
        }
    }

    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.resumes.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.journal.lock().push(format!("{}:stop", self.kind));
        let old = std::mem::replace(&mut *self.cancel.lock(), CancellationToken::new());
        old.cancel();
    }
}
