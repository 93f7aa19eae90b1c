//! Локальный синтезатор речи
//!
//! Платформенный синтезатор (espeak-ng в Linux, `say` в macOS) запускается
//! отдельным процессом на каждый фрагмент. Сети нет, поэтому звук
//! начинается сразу; пауза и продолжение работают нативно через сигналы.

use std::path::Path;
use std::sync::Arc;
use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::audio::{AudioError, PlaybackHandle, ProcessPlaybackHandle};
use crate::config::LocalVoiceSettings;
use crate::tts::classify::ProviderError;
use crate::tts::utterance::UtteranceSlot;
use crate::tts::{ProviderKind, SpeakOutcome, SpeechProvider};

/// Базовая скорость речи в словах в минуту при rate = 1.0
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// Платформенный примитив синтеза речи
pub trait SpeechEngine: Send + Sync {
    /// Подготовить утверждение для текста, не начиная звучания
    fn utter(&self, text: &str) -> Result<Box<dyn PlaybackHandle>, AudioError>;
}

/// Синтезатор, вызываемый как внешняя команда
pub struct CommandSpeechEngine {
    settings: LocalVoiceSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineFlavor {
    Espeak,
    Say,
}

impl CommandSpeechEngine {
    pub fn new(settings: LocalVoiceSettings) -> Self {
        Self { settings }
    }

    /// Программа синтезатора: из настроек или по умолчанию для платформы
    pub fn program(&self) -> String {
        self.settings.command.clone().unwrap_or_else(|| {
            if cfg!(target_os = "macos") {
                "say".to_string()
            } else {
                "espeak-ng".to_string()
            }
        })
    }

    fn flavor(program: &str) -> EngineFlavor {
        let name = Path::new(program)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        if name == "say" {
            EngineFlavor::Say
        } else {
            EngineFlavor::Espeak
        }
    }

    fn words_per_minute(&self) -> u32 {
        (BASE_WORDS_PER_MINUTE * self.settings.rate).round().clamp(80.0, 450.0) as u32
    }

    pub(crate) fn build_command(&self, text: &str) -> Command {
        let program = self.program();
        let mut command = Command::new(&program);

        match Self::flavor(&program) {
            EngineFlavor::Espeak => {
                if let Some(voice) = &self.settings.voice {
                    command.arg("-v").arg(voice);
                }
                let pitch = (50.0 * self.settings.pitch).round().clamp(0.0, 99.0) as u32;
                let amplitude = (100.0 * self.settings.volume).round().clamp(0.0, 200.0) as u32;
                command
                    .arg("-s")
                    .arg(self.words_per_minute().to_string())
                    .arg("-p")
                    .arg(pitch.to_string())
                    .arg("-a")
                    .arg(amplitude.to_string())
                    .arg("--")
                    .arg(text);
            }
            EngineFlavor::Say => {
                // say не умеет менять высоту и громкость из командной строки
                if let Some(voice) = &self.settings.voice {
                    command.arg("-v").arg(voice);
                }
                command
                    .arg("-r")
                    .arg(self.words_per_minute().to_string())
                    .arg("--")
                    .arg(text);
            }
        }
        command
    }
}

impl SpeechEngine for CommandSpeechEngine {
    fn utter(&self, text: &str) -> Result<Box<dyn PlaybackHandle>, AudioError> {
        Ok(Box::new(ProcessPlaybackHandle::new(self.build_command(text), None)))
    }
}

/// Провайдер локального синтеза
pub struct LocalProvider {
    engine: Arc<dyn SpeechEngine>,
    slot: UtteranceSlot,
}

impl LocalProvider {
    pub fn new(engine: Arc<dyn SpeechEngine>) -> Self {
        Self {
            engine,
            slot: UtteranceSlot::new("local"),
        }
    }
}

#[async_trait]
impl SpeechProvider for LocalProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
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
        let handle = match self.engine.utter(text) {
            Ok(handle) => handle,
            Err(e) => {
                self.slot.release(&utterance);
                return Err(ProviderError::playback(format!("Speech synthesis error: {}", e)));
            }
        };

        log::debug!("Local synthesis of {} chars", text.chars().count());
        self.slot
            .play(&utterance, handle, on_start)
            .await
            .map_err(|e| ProviderError::playback(format!("Speech synthesis error: {}", e)))
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
