//! Модуль синтеза речи
//!
//! Граница поставщика TTS: один запрос на одну запись перевода.

pub mod google;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

pub use google::GoogleTtsClient;

/// Параметры одного запроса синтеза
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice_id: String,
    pub language_code: String,
    pub sample_rate_hertz: u32,
}

/// Поставщик синтеза речи
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Синтезировать текст; результат - LINEAR16 (WAV или голый PCM)
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Bytes>;
}
