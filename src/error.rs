//! Модуль обработки ошибок библиотеки tts-reader
//!
//! Этот модуль содержит типы ошибок, которые могут возникнуть при работе библиотеки.
//! Ошибки конкретных провайдеров приводятся к единой классификации
//! (см. [`crate::tts::classify`]) и попадают сюда через вариант `Provider`.

use thiserror::Error;
use crate::tts::classify::{ErrorKind, ProviderError};
use crate::tts::ProviderKind;

/// Ошибки библиотеки tts-reader
#[derive(Debug, Error)]
pub enum TtsReaderError {
    /// Классифицированная ошибка провайдера синтеза
    #[error("{provider} provider failed: {source}")]
    Provider {
        provider: ProviderKind,
        #[source]
        source: ProviderError,
    },

    /// Нечего воспроизводить
    #[error("No text to read")]
    EmptyText,

    /// Провайдер не зарегистрирован
    #[error("Provider is not registered: {0}")]
    UnknownProvider(ProviderKind),

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Ошибка HTTP запроса
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Другая ошибка
    #[error("Other error: {0}")]
    Other(String),
}

impl TtsReaderError {
    /// Категория ошибки провайдера, если ошибка пришла от провайдера
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Provider { source, .. } => Some(source.kind),
            _ => None,
        }
    }
}

impl From<&str> for TtsReaderError {
    fn from(s: &str) -> Self {
        TtsReaderError::Other(s.to_string())
    }
}

impl From<String> for TtsReaderError {
    fn from(s: String) -> Self {
        TtsReaderError::Other(s)
    }
}

/// Тип Result для библиотеки tts-reader
pub type Result<T> = std::result::Result<T, TtsReaderError>;
