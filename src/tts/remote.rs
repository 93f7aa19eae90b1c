//! Провайдер удалённого синтеза
//!
//! Фрагмент отправляется транспорту, полученные байты загружаются в
//! аудиовывод и проигрываются. Пауза и продолжение управляют только
//! воспроизведением: повторного запроса к серверу не бывает.

use std::sync::Arc;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::audio::AudioOutput;
use crate::tts::classify::ProviderError;
use crate::tts::transport::SynthesisTransport;
use crate::tts::utterance::UtteranceSlot;
use crate::tts::{ProviderKind, SpeakOutcome, SpeechProvider};

pub struct RemoteProvider {
    kind: ProviderKind,
    transport: Arc<dyn SynthesisTransport>,
    output: Arc<dyn AudioOutput>,
    slot: UtteranceSlot,
}

impl RemoteProvider {
    pub fn new(transport: Arc<dyn SynthesisTransport>, output: Arc<dyn AudioOutput>) -> Self {
        let kind = transport.provider();
        Self {
            kind,
            transport,
            output,
            slot: UtteranceSlot::new(kind.as_str()),
        }
    }
}

#[async_trait]
impl SpeechProvider for RemoteProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn speak(
        &self,
        text: &str,
        cancel: &CancellationToken,
        on_start: &(dyn Fn() + Send + Sync),
    ) -> Result<SpeakOutcome, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::bad_request("No text provided"));
        }

        let utterance = self.slot.begin(cancel);
        if utterance.is_cancelled() {
            self.slot.release(&utterance);
            return Ok(SpeakOutcome::Interrupted);
        }

        // Остановка во время запроса бросает ответ, не дожидаясь сервера
        let payload = tokio::select! {
            result = self.transport.synthesize(text) => match result {
                Ok(payload) => payload,
                Err(e) => {
                    self.slot.release(&utterance);
                    return Err(e);
                }
            },
            _ = utterance.cancelled() => {
                log::debug!("{}: synthesis abandoned", self.kind);
                self.slot.release(&utterance);
                return Ok(SpeakOutcome::Interrupted);
            }
        };

        let handle = match self.output.load(payload).await {
            Ok(handle) => handle,
            Err(e) => {
                self.slot.release(&utterance);
                return Err(ProviderError::playback(format!("Audio playback error: {}", e)));
            }
        };

        self.slot
            .play(&utterance, handle, on_start)
            .await
            .map_err(|e| ProviderError::playback(format!("Audio playback error: {}", e)))
    }

    fn pause(&self) {
        self.slot.pause();
    }

    fn resume(&self) {
        self.slot.resume();
    }

    fn stop(&self) {
        self.slot.stop();
    }
}
