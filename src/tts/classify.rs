//! Классификация ошибок провайдеров
//!
//! Удалённые провайдеры возвращают ошибки в разном виде. Здесь они сводятся
//! к закрытому набору категорий [`ErrorKind`], чтобы проигрыватель и
//! интерфейс принимали решения по одной таблице.

use std::fmt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Категория ошибки провайдера
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Неверный или отсутствующий API ключ
    InvalidCredentials,
    /// Превышена квота запросов
    RateLimited,
    /// Модель ещё скачивается или загружается
    ModelLoading,
    /// Модель недоступна в этом развёртывании
    ModelUnavailable,
    /// Некорректный запрос (не хватает обязательного поля)
    BadRequest,
    /// Сбой воспроизведения, не связанный с сетью
    PlaybackError,
    /// Всё остальное
    Unknown,
}

impl ErrorKind {
    /// Сообщение для пользователя
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Invalid API key. Please provide valid credentials.",
            Self::RateLimited => "API quota exceeded. Please try again later.",
            Self::ModelLoading => "The model is still loading. Please try again shortly.",
            Self::ModelUnavailable => "The model is not available in this deployment.",
            Self::BadRequest => "The request was rejected as malformed.",
            Self::PlaybackError => "Audio playback failed.",
            Self::Unknown => "Text-to-speech request failed.",
        }
    }

    /// Имеет ли смысл повторить запрос через некоторое время
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ModelLoading)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::RateLimited => "rate_limited",
            Self::ModelLoading => "model_loading",
            Self::ModelUnavailable => "model_unavailable",
            Self::BadRequest => "bad_request",
            Self::PlaybackError => "playback_error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ошибка провайдера, уже отнесённая к категории
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    /// Категория
    pub kind: ErrorKind,
    /// HTTP статус, если ошибка пришла от сервера
    pub status: Option<u16>,
    /// Исходное сообщение для диагностики
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Классифицировать ответ сервера
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: classify(Some(status), &message),
            status: Some(status),
            message,
        }
    }

    pub fn playback(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PlaybackError, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }
}

/// Маркеры в тексте ответа 503, означающие, что модель ещё готовится
const LOADING_MARKERS: [&str; 3] = ["downloading", "download", "loading"];

/// Отнести сырую ошибку бэкенда к категории.
///
/// Порядок проверок: 401, 429, 503 с признаком загрузки модели, прочие 503,
/// 400, всё остальное. Первое совпадение выигрывает.
pub fn classify(status: Option<u16>, message: &str) -> ErrorKind {
    match status {
        Some(401) => ErrorKind::InvalidCredentials,
        Some(429) => ErrorKind::RateLimited,
        Some(503) => {
            let lowered = message.to_lowercase();
            if LOADING_MARKERS.iter().any(|marker| lowered.contains(marker)) {
                ErrorKind::ModelLoading
            } else {
                ErrorKind::ModelUnavailable
            }
        }
        Some(400) => ErrorKind::BadRequest,
        _ => ErrorKind::Unknown,
    }
}
