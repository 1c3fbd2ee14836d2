//! Вспомогательные модули
//!
//! Конвертация аудио через FFmpeg и подготовка WAV-данных.

pub mod ffmpeg;
pub mod wav;

pub use ffmpeg::{AudioConverter, FfmpegConverter};
pub use wav::ensure_wav;
