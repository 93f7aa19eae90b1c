//! Список голосов ElevenLabs
//!
//! Без ключа или при любой ошибке сервера возвращается встроенный список.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::tts::classify::{ErrorKind, ProviderError};
use crate::tts::transport::error_message;

/// Голос ElevenLabs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Voice {
    #[serde(alias = "voiceId")]
    pub voice_id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl Voice {
    fn builtin(voice_id: &str, name: &str) -> Self {
        Self {
            voice_id: voice_id.to_string(),
            name: name.to_string(),
            category: Some("Default".to_string()),
        }
    }

    /// Подпись для списка выбора
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.category.as_deref().unwrap_or("Custom"))
    }
}

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<Voice>,
}

/// Встроенные голоса на случай, если сервер недоступен
pub fn default_voices() -> Vec<Voice> {
    vec![
        Voice::builtin("JBFqnCBsd6RMkjVDRZzb", "Rachel"),
        Voice::builtin("TxGEqnHWrfWFTfGW9XjX", "Josh"),
        Voice::builtin("AZnzlk1XvdvUeBnXmlld", "Domi"),
        Voice::builtin("EXAVITQu4vr4xnSDxMaL", "Bella"),
    ]
}

/// Запросить голоса у сервера
pub async fn fetch_voices(
    client: &Client,
    api_base: &str,
    api_key: &str,
) -> Result<Vec<Voice>, ProviderError> {
    if api_key.trim().is_empty() {
        return Err(ProviderError::new(
            ErrorKind::InvalidCredentials,
            "ElevenLabs API key is required",
        ));
    }

    let url = format!("{}/tts/elevenlabs-voices", api_base.trim_end_matches('/'));
    let response = client
        .post(&url)
        .json(&json!({ "apiKey": api_key }))
        .send()
        .await
        .map_err(|e| ProviderError::new(ErrorKind::Unknown, format!("Request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::from_status(
            status.as_u16(),
            error_message(status.as_u16(), &body),
        ));
    }

    let parsed: VoicesResponse = response.json().await.map_err(|e| {
        ProviderError::new(ErrorKind::Unknown, format!("Invalid voices response: {}", e))
    })?;
    Ok(parsed.voices)
}

/// Голоса с сервера, либо встроенный список
pub async fn list_voices(client: &Client, api_base: &str, api_key: &str) -> Vec<Voice> {
    match fetch_voices(client, api_base, api_key).await {
        Ok(voices) if !voices.is_empty() => {
            log::info!("Loaded {} ElevenLabs voices", voices.len());
            voices
        }
        Ok(_) => {
            log::warn!("ElevenLabs returned no voices, using defaults");
            default_voices()
        }
        Err(e) => {
            log::warn!("Failed to load ElevenLabs voices, using defaults: {}", e);
            default_voices()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_voices_are_parsed_with_both_id_spellings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tts/elevenlabs-voices"))
            .and(body_json(json!({"apiKey": "key"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "voices": [
                    {"voice_id": "abc", "name": "Narrator", "category": "cloned"},
                    {"voiceId": "def", "name": "Guide"}
                ]
            })))
            .mount(&server)
            .await;

        let voices = list_voices(&Client::new(), &server.uri(), "key").await;
        assert_eq!(voices.len(), 2);
        assert_eq!(voices[0].voice_id, "abc");
        assert_eq!(voices[0].label(), "Narrator (cloned)");
        assert_eq!(voices[1].voice_id, "def");
        assert_eq!(voices[1].label(), "Guide (Custom)");
    }

    #[tokio::test]
    async fn test_fallback_on_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid API key"})))
            .mount(&server)
            .await;

        let err = fetch_voices(&Client::new(), &server.uri(), "bad").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCredentials);

        let voices = list_voices(&Client::new(), &server.uri(), "bad").await;
        assert_eq!(voices, default_voices());
    }

    #[tokio::test]
    async fn test_missing_key_skips_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let voices = list_voices(&Client::new(), &server.uri(), "").await;
        assert_eq!(voices.len(), 4);
        assert_eq!(voices[0].label(), "Rachel (Default)");
    }
}
