//! Модуль для интеграции с Google Cloud Text-to-Speech
//!
//! Синтез (`text:synthesize`) и список голосов (`voices`). Авторизация -
//! ключом API, если он задан, иначе OAuth-токеном.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;

use super::{SpeechSynthesizer, SynthesisRequest};
use crate::auth::TokenSource;
use crate::config::TtsConfig;
use crate::error::{PipelineError, Result};
use crate::reference::CatalogVoice;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: String,
}

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<ApiVoice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiVoice {
    name: String,
    #[serde(default)]
    language_codes: Vec<String>,
    #[serde(default)]
    ssml_gender: String,
    #[serde(default)]
    natural_sample_rate_hertz: u32,
}

impl From<ApiVoice> for CatalogVoice {
    fn from(voice: ApiVoice) -> Self {
        Self {
            name: voice.name,
            language_codes: voice.language_codes,
            ssml_gender: voice.ssml_gender,
            natural_sample_rate_hertz: voice.natural_sample_rate_hertz,
        }
    }
}

pub struct GoogleTtsClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
    tokens: Arc<TokenSource>,
}

impl GoogleTtsClient {
    pub fn new(http: Client, config: &TtsConfig, tokens: Arc<TokenSource>) -> Self {
        Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            tokens,
        }
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        match &self.api_key {
            Some(key) => Ok(request.query(&[("key", key.as_str())])),
            None => {
                let token = self.tokens.token().await?;
                Ok(request.bearer_auth(token))
            }
        }
    }

    /// Полный каталог голосов поставщика
    pub async fn list_voices(&self) -> Result<Vec<CatalogVoice>> {
        let url = format!("{}/voices", self.endpoint);
        let response = self.authorized(self.http.get(&url)).await?.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response: {}", e));
            log::error!("Voice list request failed (status {}): {}", status, error_text);
            return Err(PipelineError::Tts(format!(
                "Voice list request failed: {} (status {})",
                error_text, status
            )));
        }

        let body: VoicesResponse = response.json().await?;
        log::info!("Fetched {} voices from {}", body.voices.len(), self.endpoint);
        Ok(body.voices.into_iter().map(CatalogVoice::from).collect())
    }
}

fn synthesize_body(request: &SynthesisRequest) -> serde_json::Value {
    serde_json::json!({
        "input": { "text": request.text },
        "voice": {
            "languageCode": request.language_code,
            "name": request.voice_id
        },
        "audioConfig": {
            "audioEncoding": "LINEAR16",
            "sampleRateHertz": request.sample_rate_hertz
        }
    })
}

#[async_trait]
impl SpeechSynthesizer for GoogleTtsClient {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Bytes> {
        let url = format!("{}/text:synthesize", self.endpoint);
        log::debug!("Sending TTS request for voice {}", request.voice_id);

        let builder = self.http.post(&url).json(&synthesize_body(request));
        let response = self.authorized(builder).await?.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response: {}", e));
            return Err(PipelineError::Tts(format!(
                "Google TTS error (status {}): {}",
                status, error_text
            )));
        }

        let body: SynthesizeResponse = response.json().await?;
        if body.audio_content.is_empty() {
            return Err(PipelineError::Tts("Received empty audioContent".to_string()));
        }

        let audio = BASE64
            .decode(body.audio_content.as_bytes())
            .map_err(|e| PipelineError::Tts(format!("Invalid base64 audioContent: {}", e)))?;
        Ok(Bytes::from(audio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesize_body() {
        let body = synthesize_body(&SynthesisRequest {
            text: "Klip".to_string(),
            voice_id: "af-ZA-Standard-A".to_string(),
            language_code: "af-ZA".to_string(),
            sample_rate_hertz: 24_000,
        });
        assert_eq!(body["input"]["text"], "Klip");
        assert_eq!(body["voice"]["name"], "af-ZA-Standard-A");
        assert_eq!(body["voice"]["languageCode"], "af-ZA");
        assert_eq!(body["audioConfig"]["audioEncoding"], "LINEAR16");
        assert_eq!(body["audioConfig"]["sampleRateHertz"], 24_000);
    }

    #[test]
    fn test_voice_list_parsing() {
        let body: VoicesResponse = serde_json::from_str(
            r#"{"voices":[{"languageCodes":["af-ZA"],"name":"af-ZA-Standard-A","ssmlGender":"FEMALE","naturalSampleRateHertz":24000}]}"#,
        )
        .unwrap();
        let catalog: Vec<CatalogVoice> = body.voices.into_iter().map(CatalogVoice::from).collect();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].language_codes, vec!["af-ZA".to_string()]);
        assert_eq!(catalog[0].ssml_gender, "FEMALE");
        assert_eq!(catalog[0].natural_sample_rate_hertz, 24_000);
    }

    #[test]
    fn test_audio_content_decoding() {
        let body: SynthesizeResponse =
            serde_json::from_str(r#"{"audioContent":"UklGRg=="}"#).unwrap();
        assert_eq!(BASE64.decode(body.audio_content).unwrap(), b"RIFF");
    }
}
