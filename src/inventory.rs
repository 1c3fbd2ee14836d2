//! Инвентарь: ключи записей, которые уже есть в хранилище для голоса и формата.
//!
//! Хранится построчно в `<dir>/<voice_id>_<FORMAT>_files.txt`, по одному
//! ключу на строку в отсортированном порядке.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::AudioFormat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    voice_id: String,
    format: AudioFormat,
    path: PathBuf,
    keys: BTreeSet<String>,
}

impl Inventory {
    pub fn path_for(dir: &Path, voice_id: &str, format: AudioFormat) -> PathBuf {
        dir.join(format!("{}_{}_files.txt", voice_id, format.label()))
    }

    /// Загрузить инвентарь; отсутствующий файл означает пустой инвентарь
    pub fn load(dir: &Path, voice_id: &str, format: AudioFormat) -> Result<Self> {
        let path = Self::path_for(dir, voice_id, format);
        let keys = if path.exists() {
            std::fs::read_to_string(&path)?
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            BTreeSet::new()
        };

        Ok(Self {
            voice_id: voice_id.to_string(),
            format,
            path,
            keys,
        })
    }

    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn keys(&self) -> &BTreeSet<String> {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Заменить содержимое свежим листингом.
    ///
    /// Возвращает число ключей, которые были в инвентаре, но пропали из хранилища.
    pub fn refresh(&mut self, listed: BTreeSet<String>) -> usize {
        let stale = self.keys.difference(&listed).count();
        self.keys = listed;
        stale
    }

    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        self.keys.insert(key.into())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut text = String::new();
        for key in &self.keys {
            text.push_str(key);
            text.push('\n');
        }
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}
