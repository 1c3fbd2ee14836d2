//! Модуль конфигурации конвейера
//!
//! Конфигурация читается из необязательного TOML-файла, затем поверх
//! применяются переменные окружения.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::model::AudioFormat;

/// Префиксы ключей, которые озвучиваются
pub const DEFAULT_PREFIXES: [&str; 4] = [
    "item.minecraft.",
    "entity.minecraft.",
    "block.minecraft.",
    "biome.minecraft.",
];

/// Бэкенд хранилища
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Google Cloud Storage
    Gcs,
    /// Локальная директория, повторяющая структуру бакета
    Local,
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::Gcs
    }
}

/// Настройки хранилища
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Имя бакета GCS
    pub bucket: String,
    /// Корневой префикс проекта в бакете
    pub project_prefix: String,
    /// Корень для локального бэкенда
    pub local_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            bucket: String::new(),
            project_prefix: "AudioProject".to_string(),
            local_root: PathBuf::from("Bucket"),
        }
    }
}

/// Настройки Google Text-to-Speech
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub endpoint: String,
    /// API ключ. Если не задан, используется OAuth токен.
    pub api_key: Option<String>,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://texttospeech.googleapis.com/v1".to_string(),
            api_key: None,
        }
    }
}

/// Конфигурация конвейера
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Версия Minecraft, используется как метка запуска
    pub version: String,
    /// Исходные файлы переводов `<code>.json`
    pub translations_dir: PathBuf,
    /// Отфильтрованные переводы `<code>_processed.json`
    pub processed_dir: PathBuf,
    pub reference_dir: PathBuf,
    pub reference_file: String,
    pub language_table_file: String,
    pub voice_catalog_file: String,
    /// Локальная промежуточная директория для сгенерированных файлов
    pub staging_dir: PathBuf,
    /// Файлы инвентаря по голосу и формату
    pub inventory_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub log_file: PathBuf,
    pub allowed_prefixes: Vec<String>,
    pub formats: Vec<AudioFormat>,
    pub sample_rate_hertz: u32,
    pub storage: StorageConfig,
    pub tts: TtsConfig,
    /// OAuth токен Google. Если не задан, берется из `gcloud auth print-access-token`.
    pub access_token: Option<String>,
    pub request_timeout_secs: u64,
    pub ffmpeg_path: Option<PathBuf>,
    pub conversion_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: "1.21.4".to_string(),
            translations_dir: PathBuf::from("Translations_Original"),
            processed_dir: PathBuf::from("Translations"),
            reference_dir: PathBuf::from("Reference_Files"),
            reference_file: "en_us.json".to_string(),
            language_table_file: "language_table.json".to_string(),
            voice_catalog_file: "Google-tts-supported-languages.json".to_string(),
            staging_dir: PathBuf::from("Staging"),
            inventory_dir: PathBuf::from("BucketLogs"),
            archive_dir: PathBuf::from("Archive"),
            log_file: PathBuf::from("Logs/log.txt"),
            allowed_prefixes: DEFAULT_PREFIXES.iter().map(|p| p.to_string()).collect(),
            formats: AudioFormat::ALL.to_vec(),
            sample_rate_hertz: 24_000,
            storage: StorageConfig::default(),
            tts: TtsConfig::default(),
            access_token: None,
            request_timeout_secs: 60,
            ffmpeg_path: None,
            conversion_timeout_secs: 120,
        }
    }
}

impl PipelineConfig {
    /// Загрузить конфигурацию: TOML-файл (если указан), затем переменные окружения
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };

        config.apply_overrides_from(|name| std::env::var(name).ok())?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!(
                "Failed to read config {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Применить переопределения из окружения. `lookup` возвращает значение переменной.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(version) = get("MC_TTS_VERSION") {
            self.version = version;
        }
        if let Some(bucket) = get("MC_TTS_BUCKET") {
            self.storage.bucket = bucket;
        }
        if let Some(backend) = get("MC_TTS_STORAGE") {
            match backend.to_ascii_lowercase().as_str() {
                "gcs" => self.storage.backend = StorageBackend::Gcs,
                "local" => self.storage.backend = StorageBackend::Local,
                other => {
                    return Err(PipelineError::Configuration(format!(
                        "Unknown MC_TTS_STORAGE value `{}` (expected `gcs` or `local`)",
                        other
                    )))
                }
            }
        }
        if let Some(key) = get("GOOGLE_TTS_API_KEY") {
            self.tts.api_key = Some(key);
        }
        if let Some(token) = get("GOOGLE_ACCESS_TOKEN") {
            self.access_token = Some(token);
        }
        if let Some(timeout) = get("MC_TTS_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
            self.request_timeout_secs = timeout;
        }
        if let Some(ffmpeg) = get("FFMPEG_BIN") {
            self.ffmpeg_path = Some(PathBuf::from(ffmpeg));
        }
        Ok(())
    }

    /// Проверка согласованности настроек
    pub fn validate(&self) -> Result<()> {
        if self.formats.is_empty() {
            return Err(PipelineError::Configuration(
                "At least one output format is required".to_string(),
            ));
        }
        if self.formats.contains(&AudioFormat::Ogg) && !self.formats.contains(&AudioFormat::Wav) {
            return Err(PipelineError::Configuration(
                "OGG output is converted from WAV, so `wav` must be listed too".to_string(),
            ));
        }
        if self.allowed_prefixes.is_empty() {
            return Err(PipelineError::Configuration(
                "allowed_prefixes must not be empty".to_string(),
            ));
        }
        if self.storage.backend == StorageBackend::Gcs && self.storage.bucket.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "storage.bucket is required for the gcs backend (or set MC_TTS_BUCKET)".to_string(),
            ));
        }
        if self.sample_rate_hertz == 0 {
            return Err(PipelineError::Configuration(
                "sample_rate_hertz must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Форматы в порядке обработки (WAV раньше OGG), без повторов
    pub fn ordered_formats(&self) -> Vec<AudioFormat> {
        let mut formats = self.formats.clone();
        formats.sort();
        formats.dedup();
        formats
    }

    pub fn reference_file_path(&self) -> PathBuf {
        self.reference_dir.join(&self.reference_file)
    }

    pub fn language_table_path(&self) -> PathBuf {
        self.reference_dir.join(&self.language_table_file)
    }

    pub fn voice_catalog_path(&self) -> PathBuf {
        self.reference_dir.join(&self.voice_catalog_file)
    }
}
