//! Модель данных конвейера
//!
//! Типизированные записи, которые проходят через все этапы: записи перевода,
//! языки, голоса, задачи генерации и готовые файлы.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Одна пара ключ/текст для озвучки
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationEntry {
    /// Ключ вида `item.minecraft.stone`
    pub key: String,
    /// Локализованный текст
    pub text: String,
}

impl TranslationEntry {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
        }
    }

    /// Запись содержит текст, который можно озвучить
    pub fn is_speakable(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Язык игры и соответствующий ему ISO-код
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageRecord {
    pub in_game_code: String,
    pub iso_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    /// Порядок выбора голосов
    pub const ALL: [Gender; 2] = [Gender::Female, Gender::Male];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Female => "female",
            Self::Male => "male",
        }
    }

    /// Разбор значения `ssml_gender` из каталога голосов
    pub fn from_ssml(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "FEMALE" => Some(Self::Female),
            "MALE" => Some(Self::Male),
            _ => None,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Уровень качества голоса. Premium предпочтительнее Standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceTier {
    Premium,
    Standard,
}

impl VoiceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Premium => "premium",
            Self::Standard => "standard",
        }
    }
}

/// Голос из каталога поставщика
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoiceOption {
    pub voice_id: String,
    pub language_iso_code: String,
    pub gender: Gender,
    pub tier: VoiceTier,
}

impl VoiceOption {
    pub fn new(
        voice_id: impl Into<String>,
        language_iso_code: impl Into<String>,
        gender: Gender,
        tier: VoiceTier,
    ) -> Self {
        Self {
            voice_id: voice_id.into(),
            language_iso_code: language_iso_code.into(),
            gender,
            tier,
        }
    }

    /// Имя каталога для формата: `<voice_id>-<gender>-<FORMAT>`
    pub fn directory_name(&self, format: AudioFormat) -> String {
        format!("{}-{}-{}", self.voice_id, self.gender, format.label())
    }
}

/// Выбранные голоса для языка: не больше одного на пол, женский первым
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSelection {
    pub language: LanguageRecord,
    pub voices: Vec<VoiceOption>,
}

impl VoiceSelection {
    pub fn voice_for(&self, gender: Gender) -> Option<&VoiceOption> {
        self.voices.iter().find(|v| v.gender == gender)
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}

/// Формат выходного аудио
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Ogg,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 2] = [AudioFormat::Wav, AudioFormat::Ogg];

    /// Расширение файла
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Ogg => "ogg",
        }
    }

    /// Метка формата в путях хранилища
    pub fn label(&self) -> &'static str {
        match self {
            Self::Wav => "WAV",
            Self::Ogg => "OGG",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Ogg => "audio/ogg",
        }
    }

    /// Имя файла записи: `<key>.<ext>`
    pub fn file_name(&self, key: &str) -> String {
        format!("{}.{}", key, self.extension())
    }

    /// Ключ записи по имени файла этого формата
    pub fn key_of<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        file_name
            .strip_suffix(self.extension())
            .and_then(|rest| rest.strip_suffix('.'))
            .filter(|key| !key.is_empty())
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AudioFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wav" => Ok(Self::Wav),
            "ogg" => Ok(Self::Ogg),
            other => Err(PipelineError::Configuration(format!(
                "Unknown audio format: {}",
                other
            ))),
        }
    }
}

/// Единица работы. Идемпотентна: если результат уже есть, задачу можно пропустить.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTask {
    pub entry: TranslationEntry,
    pub voice: VoiceOption,
    pub format: AudioFormat,
}

impl GenerationTask {
    pub fn file_name(&self) -> String {
        self.format.file_name(&self.entry.key)
    }
}

/// Локальный файл, ожидающий загрузки в хранилище
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub key: String,
    pub voice_id: String,
    pub gender: Gender,
    pub format: AudioFormat,
    pub path: PathBuf,
}

impl GeneratedFile {
    pub fn directory_name(&self) -> String {
        format!("{}-{}-{}", self.voice_id, self.gender, self.format.label())
    }

    pub fn file_name(&self) -> String {
        self.format.file_name(&self.key)
    }
}
