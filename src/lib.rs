//! Библиотека mc-lang-tts
//!
//! Пакетная озвучка строк локализации Minecraft через Google Text-to-Speech
//! с синхронизацией результатов в облачное хранилище. Повторная генерация
//! уже существующих файлов пропускается: для каждого голоса и формата
//! выполняется один листинг хранилища и сверка в памяти.

pub mod archive;
pub mod auth;
pub mod config;
pub mod error;
pub mod filter;
pub mod generate;
pub mod inventory;
pub mod logger;
pub mod matcher;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod reconcile;
pub mod reference;
pub mod sink;
pub mod staging;
pub mod storage;
pub mod tts;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::config::PipelineConfig;
pub use crate::error::{PipelineError, Result};
pub use crate::model::{
    AudioFormat, Gender, GenerationTask, LanguageRecord, TranslationEntry, VoiceOption,
    VoiceSelection, VoiceTier,
};
pub use crate::pipeline::{LanguageReport, LanguageState, Pipeline, RunOptions, RunSummary};
