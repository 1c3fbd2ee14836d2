//! Модуль для работы с хранилищем объектов
//!
//! Граница хранилища: листинг по префиксу (пагинация скрыта внутри),
//! запись и чтение объекта. Пути объектов строятся по схеме
//! `<project>/<voice_id>-<gender>-<FORMAT>/<key>.<ext>`.

pub mod gcs;
pub mod local;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::auth::TokenSource;
use crate::config::{PipelineConfig, StorageBackend};
use crate::error::Result;
use crate::model::{AudioFormat, VoiceOption};

pub use gcs::GcsStore;
pub use local::LocalStore;

/// Хранилище объектов
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Имя бэкенда для логов
    fn name(&self) -> &str;

    /// Полные имена всех объектов с префиксом
    async fn list_objects(&self, prefix: &str) -> Result<BTreeSet<String>>;

    async fn put_object(&self, path: &str, bytes: Bytes) -> Result<()>;

    async fn get_object(&self, path: &str) -> Result<Bytes>;
}

/// Схема путей объектов внутри хранилища
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLayout {
    project_prefix: String,
}

impl ObjectLayout {
    pub fn new(project_prefix: impl Into<String>) -> Self {
        let project_prefix = project_prefix.into().trim_matches('/').to_string();
        Self { project_prefix }
    }

    pub fn project_prefix(&self) -> &str {
        &self.project_prefix
    }

    /// Префикс каталога голоса: `<project>/<dir>/`
    pub fn directory_prefix(&self, directory_name: &str) -> String {
        if self.project_prefix.is_empty() {
            format!("{}/", directory_name)
        } else {
            format!("{}/{}/", self.project_prefix, directory_name)
        }
    }

    pub fn voice_prefix(&self, voice: &VoiceOption, format: AudioFormat) -> String {
        self.directory_prefix(&voice.directory_name(format))
    }

    pub fn object_path(&self, voice: &VoiceOption, format: AudioFormat, key: &str) -> String {
        format!("{}{}", self.voice_prefix(voice, format), format.file_name(key))
    }
}

/// Создать хранилище по конфигурации
pub fn from_config(
    config: &PipelineConfig,
    http: reqwest::Client,
    tokens: Arc<TokenSource>,
) -> Arc<dyn ObjectStore> {
    match config.storage.backend {
        StorageBackend::Gcs => Arc::new(GcsStore::new(http, config.storage.bucket.clone(), tokens)),
        StorageBackend::Local => Arc::new(LocalStore::new(config.storage.local_root.clone())),
    }
}
