//! Модуль обработки ошибок конвейера
//!
//! Ошибки делятся по области действия: задача (синтез, конвертация,
//! загрузка), голос (листинг хранилища), язык (нет соответствия, нет
//! голосов) и весь запуск (конфигурация, справочные файлы).

use thiserror::Error;

/// Ошибки конвейера mc-lang-tts
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Код языка отсутствует в таблице соответствий
    #[error("No language mapping found for `{0}`")]
    NoMappingFound(String),

    /// В каталоге нет голосов для ISO-кода языка
    #[error("No voices available for language `{0}`")]
    NoVoicesAvailable(String),

    /// Листинг хранилища недоступен: нельзя считать, что файлов нет или что они все есть
    #[error("Storage listing unavailable for `{prefix}`: {reason}")]
    ListingUnavailable { prefix: String, reason: String },

    /// Ошибка синтеза речи для конкретной записи
    #[error("Synthesis failed for `{key}` with voice {voice}: {reason}")]
    Synthesis {
        key: String,
        voice: String,
        reason: String,
    },

    /// Ошибка конвертации WAV -> OGG
    #[error("Conversion failed for `{path}`: {reason}")]
    Conversion { path: String, reason: String },

    /// Ошибка загрузки файла в хранилище
    #[error("Upload of `{path}` failed: {reason}")]
    Upload { path: String, reason: String },

    /// Ошибка API синтеза речи
    #[error("TTS API error: {0}")]
    Tts(String),

    /// Ошибка бэкенда хранилища
    #[error("Storage error: {0}")]
    Storage(String),

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Справочный файл отсутствует или поврежден
    #[error("Failed to load reference file {path}: {reason}")]
    ReferenceLoad { path: String, reason: String },

    /// Файл перевода не удалось разобрать
    #[error("Invalid translation file {path}: {reason}")]
    InvalidTranslation { path: String, reason: String },

    /// Ошибка HTTP запроса
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ошибка разбора TOML
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Другая ошибка
    #[error("Other error: {0}")]
    Other(String),
}

impl PipelineError {
    /// Ошибка прерывает обработку всего языка, а не одной задачи
    pub fn is_language_scoped(&self) -> bool {
        matches!(
            self,
            Self::NoMappingFound(_) | Self::NoVoicesAvailable(_) | Self::ListingUnavailable { .. }
        )
    }

    /// Ошибка прерывает весь запуск
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::ReferenceLoad { .. })
    }
}

impl From<&str> for PipelineError {
    fn from(s: &str) -> Self {
        PipelineError::Other(s.to_string())
    }
}

impl From<String> for PipelineError {
    fn from(s: String) -> Self {
        PipelineError::Other(s)
    }
}

/// Тип Result для библиотеки mc-lang-tts
pub type Result<T> = std::result::Result<T, PipelineError>;
