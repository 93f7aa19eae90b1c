//! Модуль провайдеров синтеза речи
//!
//! Каждый бэкенд (локальный синтезатор или удалённый HTTP-сервис)
//! реализует общий трейт [`SpeechProvider`]. Выбор провайдера делается по
//! [`ProviderKind`], а не по строкам в местах вызова.

pub mod classify;
#[cfg(test)]
pub(crate) mod fakes;
pub mod local;
pub mod remote;
pub mod transport;
pub mod utterance;
pub mod voices;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use serde::{Deserialize, Serialize};

use crate::audio::CommandAudioOutput;
use crate::config::ReaderConfig;
use crate::error::{Result, TtsReaderError};
use crate::tts::classify::ProviderError;
use crate::tts::local::{CommandSpeechEngine, LocalProvider};
use crate::tts::remote::RemoteProvider;
use crate::tts::transport::{HttpTransport, ProviderRequest};

/// Доступные провайдеры синтеза
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Локальный синтезатор без сетевой задержки
    Local,
    /// ElevenLabs
    ElevenLabs,
    /// SpeechT5 (локальная модель за HTTP)
    SpeechT5,
    /// Kokoro (локальная модель за HTTP)
    Kokoro,
}

impl Default for ProviderKind {
    fn default() -> Self {
        Self::Local
    }
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Local,
        ProviderKind::ElevenLabs,
        ProviderKind::SpeechT5,
        ProviderKind::Kokoro,
    ];

    /// Получить строковое представление провайдера
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::ElevenLabs => "elevenlabs",
            Self::SpeechT5 => "speecht5",
            Self::Kokoro => "kokoro",
        }
    }

    /// Удалённый ли это провайдер
    pub fn is_remote(&self) -> bool {
        !matches!(self, Self::Local)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = TtsReaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "browser" => Ok(Self::Local),
            "elevenlabs" => Ok(Self::ElevenLabs),
            "speecht5" => Ok(Self::SpeechT5),
            "kokoro" => Ok(Self::Kokoro),
            other => Err(TtsReaderError::Configuration(format!(
                "Unsupported TTS provider: {}",
                other
            ))),
        }
    }
}

/// Чем закончился вызов `speak`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Фрагмент прозвучал до конца
    Finished,
    /// Воспроизведение остановлено до конца фрагмента
    Interrupted,
}

/// Общий интерфейс провайдера синтеза речи.
///
/// Новый вызов `speak` глушит предыдущий только у того же провайдера:
/// у каждого провайдера свой слот утверждения. Между разными провайдерами
/// единственный звучащий поток обеспечивает [`crate::TtsReader`], который
/// останавливает старую сессию в `play` и `set_provider`.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Произнести текст и дождаться конца.
    ///
    /// `on_start` вызывается, когда звук действительно начался. Отмена
    /// `cancel` (токена сессии) прерывает фрагмент так же, как `stop`; если
    /// токен уже отменён, звук не начинается вовсе.
    async fn speak(
        &self,
        text: &str,
        cancel: &CancellationToken,
        on_start: &(dyn Fn() + Send + Sync),
    ) -> std::result::Result<SpeakOutcome, ProviderError>;

    /// Приостановить. Ничего не делает, если ничего не звучит.
    fn pause(&self);

    /// Продолжить после паузы
    fn resume(&self);

    /// Немедленно остановить. Всегда успешно и идемпотентно.
    fn stop(&self);
}

/// Набор зарегистрированных провайдеров
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn SpeechProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Собрать все провайдеры по конфигурации
    pub fn from_config(config: &ReaderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("tts-reader/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let output = Arc::new(CommandAudioOutput::new(config.audio.clone()));

        let mut registry = Self::new();
        registry.register(Arc::new(LocalProvider::new(Arc::new(CommandSpeechEngine::new(
            config.local.clone(),
        )))));

        let requests = [
            ProviderRequest::ElevenLabs(config.elevenlabs.clone()),
            ProviderRequest::SpeechT5(config.speecht5.clone()),
            ProviderRequest::Kokoro(config.kokoro.clone()),
        ];
        for request in requests {
            let transport = HttpTransport::new(client.clone(), &config.api_base, request);
            registry.register(Arc::new(RemoteProvider::new(Arc::new(transport), output.clone())));
        }

        Ok(registry)
    }

    /// Зарегистрировать провайдера, заменив предыдущего того же вида
    pub fn register(&mut self, provider: Arc<dyn SpeechProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn SpeechProvider>> {
        self.providers.get(&kind).cloned()
    }

    pub fn contains(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    /// Зарегистрированные провайдеры в порядке [`ProviderKind::ALL`]
    pub fn kinds(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.contains(*kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("kokoro".parse::<ProviderKind>().unwrap(), ProviderKind::Kokoro);
        assert_eq!(" ElevenLabs ".parse::<ProviderKind>().unwrap(), ProviderKind::ElevenLabs);
        assert_eq!("browser".parse::<ProviderKind>().unwrap(), ProviderKind::Local);
        assert!("bark".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_provider_kind_serde() {
        let json = serde_json::to_string(&ProviderKind::SpeechT5).unwrap();
        assert_eq!(json, "\"speecht5\"");
        let kind: ProviderKind = serde_json::from_str("\"elevenlabs\"").unwrap();
        assert_eq!(kind, ProviderKind::ElevenLabs);
    }

    #[test]
    fn test_registry_from_default_config() {
        let registry = ProviderRegistry::from_config(&ReaderConfig::default()).unwrap();
        assert_eq!(registry.kinds(), ProviderKind::ALL.to_vec());
        for kind in ProviderKind::ALL {
            assert_eq!(registry.get(kind).unwrap().kind(), kind);
        }
    }
}
