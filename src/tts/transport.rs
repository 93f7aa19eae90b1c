//! HTTP-транспорт удалённых провайдеров
//!
//! Каждый удалённый провайдер спрятан за HTTP-обёрткой с одним
//! эндпоинтом `POST {api_base}/tts/{provider}`. На каждый фрагмент
//! отправляется ровно один запрос; тело успешного ответа считается
//! непрозрачными аудиоданными.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::audio::AudioPayload;
use crate::config::{ElevenLabsSettings, KokoroSettings, SpeakerChoice, SpeechT5Settings};
use crate::tts::classify::{ErrorKind, ProviderError};
use crate::tts::ProviderKind;

/// Синтез одного фрагмента у удалённого провайдера
#[async_trait]
pub trait SynthesisTransport: Send + Sync {
    fn provider(&self) -> ProviderKind;

    /// Синтезировать текст и вернуть аудиоданные как есть
    async fn synthesize(&self, text: &str) -> Result<AudioPayload, ProviderError>;
}

/// Провайдер и его настройки голоса
#[derive(Debug, Clone)]
pub enum ProviderRequest {
    ElevenLabs(ElevenLabsSettings),
    SpeechT5(SpeechT5Settings),
    Kokoro(KokoroSettings),
}

impl ProviderRequest {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::ElevenLabs(_) => ProviderKind::ElevenLabs,
            Self::SpeechT5(_) => ProviderKind::SpeechT5,
            Self::Kokoro(_) => ProviderKind::Kokoro,
        }
    }

    fn endpoint(&self) -> &'static str {
        match self {
            Self::ElevenLabs(_) => "tts/elevenlabs",
            Self::SpeechT5(_) => "tts/speecht5",
            Self::Kokoro(_) => "tts/kokoro",
        }
    }

    /// Проверка настроек до отправки запроса
    fn validate(&self) -> Result<(), ProviderError> {
        match self {
            Self::ElevenLabs(settings) if settings.api_key.trim().is_empty() => Err(
                ProviderError::new(ErrorKind::InvalidCredentials, "ElevenLabs API key is required"),
            ),
            Self::SpeechT5(settings)
                if settings.speaker == SpeakerChoice::Custom
                    && settings.speaker_embedding().is_none() =>
            {
                Err(ProviderError::bad_request(
                    "Custom speaker embedding URL is required",
                ))
            }
            _ => Ok(()),
        }
    }

    fn body(&self, text: &str) -> Value {
        match self {
            Self::ElevenLabs(settings) => json!({
                "text": text,
                "voiceId": settings.voice_id,
                "apiKey": settings.api_key,
                "settings": {
                    "modelId": settings.model_id,
                    "stability": settings.stability,
                    "similarityBoost": settings.similarity_boost,
                    "style": settings.style,
                    "useSpeakerBoost": settings.use_speaker_boost,
                },
            }),
            Self::SpeechT5(settings) => json!({
                "text": text,
                "speakerEmbedding": settings.speaker_embedding(),
            }),
            Self::Kokoro(settings) => json!({
                "text": text,
                "voice": settings.voice,
                "quality": settings.quality,
            }),
        }
    }
}

/// Тело ответа с ошибкой от HTTP-обёртки провайдера
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    details: Option<String>,
}

/// Сообщение об ошибке из тела ответа
pub(crate) fn error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: Some(error),
            details: Some(details),
        }) => format!("{}: {}", error, details),
        Ok(ErrorBody {
            error: Some(error), ..
        }) => error,
        Ok(_) => format!("Server error: {}", status),
        Err(_) => "Unknown error".to_string(),
    }
}

/// Транспорт через reqwest
pub struct HttpTransport {
    client: Client,
    url: String,
    request: ProviderRequest,
}

impl HttpTransport {
    pub fn new(client: Client, api_base: &str, request: ProviderRequest) -> Self {
        let url = format!("{}/{}", api_base.trim_end_matches('/'), request.endpoint());
        Self {
            client,
            url,
            request,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SynthesisTransport for HttpTransport {
    fn provider(&self) -> ProviderKind {
        self.request.kind()
    }

    async fn synthesize(&self, text: &str) -> Result<AudioPayload, ProviderError> {
        self.request.validate()?;

        let provider = self.provider();
        log::info!(
            "Sending {} TTS request ({} chars)",
            provider,
            text.chars().count()
        );

        let response = self
            .client
            .post(&self.url)
            .json(&self.request.body(text))
            .send()
            .await
            .map_err(|e| {
                log::error!("{} request failed: {}", provider, e);
                ProviderError::new(ErrorKind::Unknown, format!("Request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(text) => text,
                Err(e) => format!("Failed to read error response: {}", e),
            };
            let message = error_message(status.as_u16(), &body);
            let error = ProviderError::from_status(status.as_u16(), message);
            log::error!("{} returned {} ({}): {}", provider, status, error.kind, error.message);
            return Err(error);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(|e| {
            ProviderError::new(ErrorKind::Unknown, format!("Failed to read audio: {}", e))
        })?;

        if bytes.is_empty() {
            return Err(ProviderError::new(
                ErrorKind::Unknown,
                format!("Empty audio payload received from {}", provider),
            ));
        }

        log::debug!("{} returned {} bytes of audio", provider, bytes.len());
        Ok(AudioPayload::new(bytes, content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn elevenlabs(api_key: &str) -> ProviderRequest {
        ProviderRequest::ElevenLabs(ElevenLabsSettings {
            api_key: api_key.to_string(),
            ..ElevenLabsSettings::default()
        })
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(503, r#"{"error":"Model downloading or loading, please try again"}"#),
            "Model downloading or loading, please try again"
        );
        assert_eq!(
            error_message(500, r#"{"error":"TTS generation failed","details":"boom"}"#),
            "TTS generation failed: boom"
        );
        assert_eq!(error_message(500, r#"{"message":"x"}"#), "Server error: 500");
        assert_eq!(error_message(502, "<html>Bad gateway</html>"), "Unknown error");
    }

    #[test]
    fn test_elevenlabs_body_shape() {
        let body = elevenlabs("key").body("Hello.");
        assert_eq!(body["text"], "Hello.");
        assert_eq!(body["voiceId"], "JBFqnCBsd6RMkjVDRZzb");
        assert_eq!(body["apiKey"], "key");
        assert_eq!(body["settings"]["modelId"], "eleven_monolingual_v1");
        assert_eq!(body["settings"]["useSpeakerBoost"], true);
        assert_eq!(body["settings"]["stability"], 0.5);
    }

    #[tokio::test]
    async fn test_successful_synthesis_returns_opaque_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/tts/kokoro"))
            .and(body_json(json!({"text": "Hi.", "voice": "af_bella", "quality": "q8"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "audio/wav")
                    .set_body_bytes(vec![82u8, 73, 70, 70, 1, 2, 3]),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(
            Client::new(),
            &format!("{}/api/", server.uri()),
            ProviderRequest::Kokoro(KokoroSettings::default()),
        );
        let payload = transport.synthesize("Hi.").await.unwrap();
        assert_eq!(payload.bytes.as_ref(), &[82u8, 73, 70, 70, 1, 2, 3]);
        assert_eq!(payload.content_type.as_deref(), Some("audio/wav"));
    }

    #[tokio::test]
    async fn test_status_codes_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/tts/elevenlabs"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid API key"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/tts/speecht5"))
            .respond_with(ResponseTemplate::new(503).set_body_json(
                json!({"error": "Model downloading or loading, please try again"}),
            ))
            .mount(&server)
            .await;

        let base = format!("{}/api", server.uri());
        let err = HttpTransport::new(Client::new(), &base, elevenlabs("bad-key"))
            .synthesize("Hi.")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCredentials);
        assert_eq!(err.status, Some(401));

        let err = HttpTransport::new(
            Client::new(),
            &base,
            ProviderRequest::SpeechT5(SpeechT5Settings::default()),
        )
        .synthesize("Hi.")
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ModelLoading);
        assert_eq!(err.status, Some(503));
    }

    #[tokio::test]
    async fn test_validation_happens_before_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8]))
            .expect(0)
            .mount(&server)
            .await;
        let base = format!("{}/api", server.uri());

        let err = HttpTransport::new(Client::new(), &base, elevenlabs("  "))
            .synthesize("Hi.")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCredentials);
        assert_eq!(err.status, None);

        let custom = ProviderRequest::SpeechT5(SpeechT5Settings {
            speaker: SpeakerChoice::Custom,
            embedding_url: None,
        });
        let err = HttpTransport::new(Client::new(), &base, custom)
            .synthesize("Hi.")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn test_empty_payload_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tts/kokoro"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let err = HttpTransport::new(
            Client::new(),
            &server.uri(),
            ProviderRequest::Kokoro(KokoroSettings::default()),
        )
        .synthesize("Hi.")
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unknown() {
        let transport = HttpTransport::new(
            Client::new(),
            "http://127.0.0.1:9",
            ProviderRequest::Kokoro(KokoroSettings::default()),
        );
        let err = transport.synthesize("Hi.").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert_eq!(err.status, None);
    }
}
