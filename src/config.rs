//! Модуль конфигурации библиотеки tts-reader
//!
//! Этот модуль содержит структуры настроек читалки и всех провайдеров.
//! Конфигурация хранится в JSON; отсутствующие поля получают значения
//! по умолчанию.

use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TtsReaderError};
use crate::tts::ProviderKind;

/// Переменная окружения с ключом ElevenLabs
pub const ENV_ELEVENLABS_API_KEY: &str = "ELEVENLABS_API_KEY";
/// Переменная окружения с адресом прокси-API провайдеров
pub const ENV_API_BASE: &str = "TTS_READER_API_BASE";

/// Настройки локального синтезатора
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocalVoiceSettings {
    /// Имя голоса синтезатора; `None` означает голос по умолчанию
    pub voice: Option<String>,
    /// Скорость речи (1.0 - обычная)
    pub rate: f32,
    /// Высота голоса (1.0 - обычная)
    pub pitch: f32,
    /// Громкость (0.0 - 1.0)
    pub volume: f32,
    /// Программа синтезатора вместо платформенной по умолчанию
    pub command: Option<String>,
}

impl Default for LocalVoiceSettings {
    fn default() -> Self {
        Self {
            voice: None,
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            command: None,
        }
    }
}

/// Настройки ElevenLabs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ElevenLabsSettings {
    /// API ключ
    pub api_key: String,
    /// Идентификатор голоса
    pub voice_id: String,
    /// Модель синтеза
    pub model_id: String,
    /// Стабильность голоса (0.0 - 1.0)
    pub stability: f32,
    /// Сходство с оригинальным голосом (0.0 - 1.0)
    pub similarity_boost: f32,
    /// Выраженность стиля (0.0 - 1.0)
    pub style: f32,
    /// Усиление сходства с говорящим
    pub use_speaker_boost: bool,
}

impl Default for ElevenLabsSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            voice_id: "JBFqnCBsd6RMkjVDRZzb".to_string(), // Rachel
            model_id: "eleven_monolingual_v1".to_string(),
            stability: 0.5,
            similarity_boost: 0.5,
            style: 0.0,
            use_speaker_boost: true,
        }
    }
}

/// Выбор говорящего для SpeechT5
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerChoice {
    /// Встроенный эмбеддинг сервера
    #[default]
    Default,
    /// Эмбеддинг по URL из `embedding_url`
    Custom,
}

/// Настройки SpeechT5
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SpeechT5Settings {
    pub speaker: SpeakerChoice,
    /// URL файла с эмбеддингом говорящего
    pub embedding_url: Option<String>,
}

impl SpeechT5Settings {
    /// URL эмбеддинга, который нужно отправить серверу
    pub fn speaker_embedding(&self) -> Option<&str> {
        match self.speaker {
            SpeakerChoice::Default => None,
            SpeakerChoice::Custom => self
                .embedding_url
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty()),
        }
    }
}

/// Настройки Kokoro
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KokoroSettings {
    /// Голос
    pub voice: String,
    /// Квантование модели
    pub quality: String,
}

impl Default for KokoroSettings {
    fn default() -> Self {
        Self {
            voice: "af_bella".to_string(),
            quality: "q8".to_string(),
        }
    }
}

/// Настройки внешнего аудиоплеера
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioOutputSettings {
    /// Программа-плеер
    pub player: String,
    /// Аргументы; `{file}` заменяется путём к файлу, иначе путь добавляется в конец
    pub args: Vec<String>,
}

impl Default for AudioOutputSettings {
    fn default() -> Self {
        Self {
            player: "ffplay".to_string(),
            args: vec![
                "-nodisp".to_string(),
                "-autoexit".to_string(),
                "-loglevel".to_string(),
                "error".to_string(),
                "{file}".to_string(),
            ],
        }
    }
}

/// Конфигурация читалки
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReaderConfig {
    /// Активный провайдер
    pub provider: ProviderKind,
    /// Базовый адрес HTTP-обёрток провайдеров
    pub api_base: String,
    /// Максимальная длина фрагмента в символах
    pub max_chunk_chars: usize,
    /// Пауза между фрагментами в миллисекундах
    pub inter_chunk_delay_ms: u64,
    pub local: LocalVoiceSettings,
    pub elevenlabs: ElevenLabsSettings,
    pub speecht5: SpeechT5Settings,
    pub kokoro: KokoroSettings,
    pub audio: AudioOutputSettings,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            api_base: "http://localhost:3000/api".to_string(),
            max_chunk_chars: 500,
            inter_chunk_delay_ms: 100,
            local: LocalVoiceSettings::default(),
            elevenlabs: ElevenLabsSettings::default(),
            speecht5: SpeechT5Settings::default(),
            kokoro: KokoroSettings::default(),
            audio: AudioOutputSettings::default(),
        }
    }
}

impl ReaderConfig {
    /// Загрузить конфигурацию из JSON файла
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            TtsReaderError::Configuration(format!(
                "Failed to parse config {}: {}",
                path.display(),
                e
            ))
        })?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Сохранить конфигурацию в JSON файл
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Переопределить настройки из переменных окружения
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENV_ELEVENLABS_API_KEY).filter(|v| !v.trim().is_empty()) {
            self.elevenlabs.api_key = key;
        }
        if let Some(base) = lookup(ENV_API_BASE).filter(|v| !v.trim().is_empty()) {
            self.api_base = base;
        }
    }

    /// Проверить значения на допустимость
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_chars == 0 {
            return Err(TtsReaderError::Configuration(
                "max_chunk_chars must be greater than zero".to_string(),
            ));
        }
        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(TtsReaderError::Configuration(format!(
                "api_base must be an http(s) URL, got {}",
                self.api_base
            )));
        }

        let unit_ranges = [
            ("elevenlabs.stability", self.elevenlabs.stability),
            ("elevenlabs.similarity_boost", self.elevenlabs.similarity_boost),
            ("elevenlabs.style", self.elevenlabs.style),
            ("local.volume", self.local.volume),
        ];
        for (name, value) in unit_ranges {
            if !(0.0..=1.0).contains(&value) {
                return Err(TtsReaderError::Configuration(format!(
                    "{} must be between 0.0 and 1.0, got {}",
                    name, value
                )));
            }
        }

        for (name, value) in [("local.rate", self.local.rate), ("local.pitch", self.local.pitch)] {
            if !(0.1..=10.0).contains(&value) {
                return Err(TtsReaderError::Configuration(format!(
                    "{} must be between 0.1 and 10.0, got {}",
                    name, value
                )));
            }
        }

        if self.audio.player.trim().is_empty() {
            return Err(TtsReaderError::Configuration(
                "audio.player must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
