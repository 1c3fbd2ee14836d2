//! Подготовка WAV-данных
//!
//! Google TTS при LINEAR16 обычно возвращает готовый WAV с заголовком, но
//! голые PCM16-сэмплы тоже встречаются. В обоих случаях на диск пишется
//! корректный моно WAV.

use std::io::Cursor;

use crate::error::{PipelineError, Result};

/// Вернуть корректный WAV: проверить заголовок или обернуть PCM16 моно
pub fn ensure_wav(bytes: &[u8], sample_rate: u32) -> Result<Vec<u8>> {
    if bytes.is_empty() {
        return Err(PipelineError::Tts("Empty audio content".to_string()));
    }

    if bytes.starts_with(b"RIFF") {
        let reader = hound::WavReader::new(Cursor::new(bytes))
            .map_err(|e| PipelineError::Tts(format!("Invalid WAV header: {}", e)))?;
        let spec = reader.spec();
        log::trace!(
            "WAV from TTS: {} Hz, {} ch, {} bit",
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample
        );
        return Ok(bytes.to_vec());
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(bytes.len() + 44));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| PipelineError::Tts(format!("Failed to create WAV writer: {}", e)))?;
        for chunk in bytes.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))
                .map_err(|e| PipelineError::Tts(format!("Failed to write sample: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| PipelineError::Tts(format!("Failed to finalize WAV: {}", e)))?;
    }
    Ok(cursor.into_inner())
}
