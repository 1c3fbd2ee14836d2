//! Синхронизация с хранилищем
//!
//! Загружает локальные файлы по схеме путей хранилища. После успешной
//! загрузки локальная копия удаляется, а ключ попадает в инвентарь голоса.
//! Неудачная загрузка не блокирует остальные файлы.

use std::collections::BTreeMap;
use std::path::PathBuf;

use bytes::Bytes;

use crate::error::{PipelineError, Result};
use crate::inventory::Inventory;
use crate::model::{AudioFormat, GeneratedFile};
use crate::staging::StagingArea;
use crate::storage::{ObjectLayout, ObjectStore};

/// Итог синхронизации
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub uploaded: usize,
    /// Файлы, оставшиеся локально, с причиной
    pub failed: Vec<(PathBuf, String)>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Инвентари, открытые во время синхронизации, по (голос, формат)
#[derive(Debug, Default)]
pub struct InventorySet {
    dir: PathBuf,
    open: BTreeMap<(String, AudioFormat), Inventory>,
}

impl InventorySet {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            open: BTreeMap::new(),
        }
    }

    /// Инвентарь голоса и формата, загружается при первом обращении
    pub fn get_mut(&mut self, voice_id: &str, format: AudioFormat) -> Result<&mut Inventory> {
        let slot = (voice_id.to_string(), format);
        if !self.open.contains_key(&slot) {
            let inventory = Inventory::load(&self.dir, voice_id, format)?;
            self.open.insert(slot.clone(), inventory);
        }
        self.open
            .get_mut(&slot)
            .ok_or_else(|| PipelineError::Other(format!("Inventory for {} not loaded", voice_id)))
    }

    /// Записать все открытые инвентари на диск
    pub fn save_all(&self) -> Result<()> {
        for inventory in self.open.values() {
            inventory.save()?;
        }
        Ok(())
    }
}

pub struct Sink<'a> {
    store: &'a dyn ObjectStore,
    layout: &'a ObjectLayout,
}

impl<'a> Sink<'a> {
    pub fn new(store: &'a dyn ObjectStore, layout: &'a ObjectLayout) -> Self {
        Self { store, layout }
    }

    pub fn destination(&self, file: &GeneratedFile) -> String {
        format!(
            "{}{}",
            self.layout.directory_prefix(&file.directory_name()),
            file.file_name()
        )
    }

    async fn upload(&self, file: &GeneratedFile) -> Result<()> {
        let destination = self.destination(file);
        let upload_error = |reason: String| PipelineError::Upload {
            path: destination.clone(),
            reason,
        };

        let data = tokio::fs::read(&file.path)
            .await
            .map_err(|e| upload_error(format!("cannot read local file: {}", e)))?;
        self.store
            .put_object(&destination, Bytes::from(data))
            .await
            .map_err(|e| upload_error(e.to_string()))?;
        Ok(())
    }

    /// Загрузить файлы; успешно загруженные удаляются локально и вносятся в инвентарь
    pub async fn sync(&self, files: &[GeneratedFile], inventories: &mut InventorySet) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        for file in files {
            match self.upload(file).await {
                Ok(()) => {
                    inventories
                        .get_mut(&file.voice_id, file.format)?
                        .insert(file.key.clone());
                    report.uploaded += 1;
                    log::debug!("Uploaded {}", self.destination(file));

                    // Объект уже в хранилище; оставшаяся копия только занимает место
                    if let Err(e) = tokio::fs::remove_file(&file.path).await {
                        log::warn!("Uploaded but could not delete {}: {}", file.path.display(), e);
                    }
                }
                Err(e) => {
                    log::error!("Upload failed for {}: {}", file.path.display(), e);
                    report.failed.push((file.path.clone(), e.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// Загрузить файлы, оставшиеся в промежуточной директории от прошлого запуска
    pub async fn sweep_staging(
        &self,
        staging: &StagingArea,
        inventories: &mut InventorySet,
    ) -> Result<SyncReport> {
        let leftovers = staging.leftovers()?;
        if leftovers.is_empty() {
            return Ok(SyncReport::default());
        }

        log::info!("Found {} staged files from a previous run, uploading", leftovers.len());
        let report = self.sync(&leftovers, inventories).await?;
        inventories.save_all()?;
        staging.prune_empty_dirs()?;

        log::info!(
            "Staging sweep: {} uploaded, {} still pending",
            report.uploaded,
            report.failed.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Gender;
    use crate::storage::LocalStore;
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::path::Path;
    use tempfile::tempdir;

    /// Хранилище, после загрузки которого локальный файл уже удален
    struct VanishingStore {
        inner: LocalStore,
        local: PathBuf,
    }

    #[async_trait]
    impl ObjectStore for VanishingStore {
        fn name(&self) -> &str {
            "vanishing"
        }

        async fn list_objects(&self, prefix: &str) -> Result<BTreeSet<String>> {
            self.inner.list_objects(prefix).await
        }

        async fn put_object(&self, path: &str, bytes: Bytes) -> Result<()> {
            self.inner.put_object(path, bytes).await?;
            std::fs::remove_file(&self.local)?;
            Ok(())
        }

        async fn get_object(&self, path: &str) -> Result<Bytes> {
            self.inner.get_object(path).await
        }
    }

    fn staged(root: &Path, key: &str) -> GeneratedFile {
        let dir = root.join("af-ZA-Standard-A-female-WAV");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{}.wav", key));
        std::fs::write(&path, b"RIFF").unwrap();
        GeneratedFile {
            key: key.to_string(),
            voice_id: "af-ZA-Standard-A".to_string(),
            gender: Gender::Female,
            format: AudioFormat::Wav,
            path,
        }
    }

    #[tokio::test]
    async fn test_sync_uploads_deletes_and_records() {
        let work = tempdir().unwrap();
        let store = LocalStore::new(work.path().join("bucket"));
        let layout = ObjectLayout::new("AudioProject");
        let sink = Sink::new(&store, &layout);
        let mut inventories = InventorySet::new(work.path().join("logs"));

        let file = staged(&work.path().join("staging"), "item.minecraft.stone");
        let report = sink.sync(&[file.clone()], &mut inventories).await.unwrap();
        inventories.save_all().unwrap();

        assert_eq!(report.uploaded, 1);
        assert!(report.is_clean());
        assert!(!file.path.exists());
        assert!(work
            .path()
            .join("bucket/AudioProject/af-ZA-Standard-A-female-WAV/item.minecraft.stone.wav")
            .exists());

        let inventory =
            Inventory::load(&work.path().join("logs"), "af-ZA-Standard-A", AudioFormat::Wav).unwrap();
        assert!(inventory.contains("item.minecraft.stone"));
    }

    #[tokio::test]
    async fn test_missing_local_file_is_reported_not_fatal() {
        let work = tempdir().unwrap();
        let store = LocalStore::new(work.path().join("bucket"));
        let layout = ObjectLayout::new("AudioProject");
        let sink = Sink::new(&store, &layout);
        let mut inventories = InventorySet::new(work.path().join("logs"));

        let good = staged(&work.path().join("staging"), "item.minecraft.apple");
        let mut bad = good.clone();
        bad.key = "item.minecraft.ghost".to_string();
        bad.path = work.path().join("staging/ghost.wav");

        let report = sink.sync(&[bad, good], &mut inventories).await.unwrap();
        assert_eq!(report.uploaded, 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].1.contains("item.minecraft.ghost"));
    }

    #[tokio::test]
    async fn test_sweep_staging_uploads_leftovers() {
        let work = tempdir().unwrap();
        let store = LocalStore::new(work.path().join("bucket"));
        let layout = ObjectLayout::new("AudioProject");
        let sink = Sink::new(&store, &layout);
        let staging = StagingArea::new(work.path().join("staging"));
        let mut inventories = InventorySet::new(work.path().join("logs"));

        staged(staging.root(), "item.minecraft.stone");
        let report = sink.sweep_staging(&staging, &mut inventories).await.unwrap();

        assert_eq!(report.uploaded, 1);
        assert!(staging.leftovers().unwrap().is_empty());
        assert!(!staging.root().join("af-ZA-Standard-A-female-WAV").exists());
        assert!(Inventory::path_for(&work.path().join("logs"), "af-ZA-Standard-A", AudioFormat::Wav).exists());
    }

    #[tokio::test]
    async fn test_failed_local_delete_still_records_upload() {
        let work = tempdir().unwrap();
        let file = staged(&work.path().join("staging"), "item.minecraft.stone");
        let store = VanishingStore {
            inner: LocalStore::new(work.path().join("bucket")),
            local: file.path.clone(),
        };
        let layout = ObjectLayout::new("AudioProject");
        let sink = Sink::new(&store, &layout);
        let mut inventories = InventorySet::new(work.path().join("logs"));

        let report = sink.sync(&[file], &mut inventories).await.unwrap();

        assert_eq!(report.uploaded, 1);
        assert!(report.is_clean());
        assert!(inventories
            .get_mut("af-ZA-Standard-A", AudioFormat::Wav)
            .unwrap()
            .contains("item.minecraft.stone"));
    }
}
