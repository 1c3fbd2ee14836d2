//! Генерация недостающих файлов
//!
//! WAV синтезируется через поставщика TTS, OGG конвертируется из WAV.
//! Для OGG нужен локальный WAV: только что созданный, оставшийся в
//! промежуточной директории или скачанный обратно из хранилища.
//!
//! Результат пишется во временный файл рядом с целевым и переименовывается
//! только после успеха, поэтому в промежуточной директории не остается
//! недописанных файлов.

use std::path::Path;
use std::sync::Arc;

use tempfile::NamedTempFile;

use crate::error::{PipelineError, Result};
use crate::model::{AudioFormat, GeneratedFile, GenerationTask};
use crate::staging::StagingArea;
use crate::storage::{ObjectLayout, ObjectStore};
use crate::tts::{SpeechSynthesizer, SynthesisRequest};
use crate::utils::{ensure_wav, AudioConverter};

/// Результат успешной задачи
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Файл создан в этом запуске
    Made(GeneratedFile),
    /// Файл уже лежал в промежуточной директории
    Reused(GeneratedFile),
}

impl TaskOutcome {
    pub fn file(&self) -> &GeneratedFile {
        match self {
            Self::Made(file) | Self::Reused(file) => file,
        }
    }

    pub fn into_file(self) -> GeneratedFile {
        match self {
            Self::Made(file) | Self::Reused(file) => file,
        }
    }
}

pub struct GenerationDriver {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    converter: Arc<dyn AudioConverter>,
    store: Arc<dyn ObjectStore>,
    layout: ObjectLayout,
    staging: StagingArea,
    sample_rate: u32,
}

impl GenerationDriver {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        converter: Arc<dyn AudioConverter>,
        store: Arc<dyn ObjectStore>,
        layout: ObjectLayout,
        staging: StagingArea,
        sample_rate: u32,
    ) -> Self {
        Self {
            synthesizer,
            converter,
            store,
            layout,
            staging,
            sample_rate,
        }
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Выполнить одну задачу. Ошибка касается только этой задачи.
    pub async fn generate(&self, task: &GenerationTask) -> Result<TaskOutcome> {
        let result = match task.format {
            AudioFormat::Wav => self.generate_wav(task).await,
            AudioFormat::Ogg => self.generate_ogg(task).await,
        };

        match &result {
            Ok(TaskOutcome::Made(_)) => {
                log::info!("made {} [{}]", task.file_name(), task.voice.voice_id)
            }
            Ok(TaskOutcome::Reused(_)) => log::info!(
                "reused {} [{}] from staging",
                task.file_name(),
                task.voice.voice_id
            ),
            Err(e) => log::error!("failed {} [{}]: {}", task.file_name(), task.voice.voice_id, e),
        }
        result
    }

    async fn generate_wav(&self, task: &GenerationTask) -> Result<TaskOutcome> {
        let file = self
            .staging
            .generated_file(&task.voice, AudioFormat::Wav, &task.entry.key);
        if file.path.exists() {
            return Ok(TaskOutcome::Reused(file));
        }

        let synthesis_error = |reason: String| PipelineError::Synthesis {
            key: task.entry.key.clone(),
            voice: task.voice.voice_id.clone(),
            reason,
        };

        let request = SynthesisRequest {
            text: task.entry.text.clone(),
            voice_id: task.voice.voice_id.clone(),
            language_code: task.voice.language_iso_code.clone(),
            sample_rate_hertz: self.sample_rate,
        };
        let audio = self
            .synthesizer
            .synthesize(&request)
            .await
            .map_err(|e| synthesis_error(e.to_string()))?;
        let wav = ensure_wav(&audio, self.sample_rate).map_err(|e| synthesis_error(e.to_string()))?;

        write_file(&file.path, &wav).await?;
        Ok(TaskOutcome::Made(file))
    }

    async fn generate_ogg(&self, task: &GenerationTask) -> Result<TaskOutcome> {
        let file = self
            .staging
            .generated_file(&task.voice, AudioFormat::Ogg, &task.entry.key);
        if file.path.exists() {
            return Ok(TaskOutcome::Reused(file));
        }

        let local_wav = self
            .staging
            .file_path(&task.voice, AudioFormat::Wav, &task.entry.key);
        if local_wav.exists() {
            self.convert(&local_wav, &file.path).await?;
            return Ok(TaskOutcome::Made(file));
        }

        // WAV есть только в хранилище: скачиваем во временный файл
        let remote = self
            .layout
            .object_path(&task.voice, AudioFormat::Wav, &task.entry.key);
        let bytes = self.store.get_object(&remote).await.map_err(|e| PipelineError::Conversion {
            path: remote.clone(),
            reason: format!("WAV not available locally and download failed: {}", e),
        })?;
        log::debug!("Fetched {} ({} bytes) for conversion", remote, bytes.len());

        tokio::fs::create_dir_all(self.staging.root()).await?;
        let temp = tempfile::Builder::new()
            .prefix("fetched-")
            .suffix(".wav")
            .tempfile_in(self.staging.root())?;
        tokio::fs::write(temp.path(), &bytes).await?;

        self.convert(temp.path(), &file.path).await?;
        Ok(TaskOutcome::Made(file))
    }

    /// Конвертация во временный OGG; при ошибке частичный вывод удаляется вместе с ним
    async fn convert(&self, wav: &Path, ogg: &Path) -> Result<()> {
        let partial = partial_file(ogg).await?;
        self.converter.wav_to_ogg(wav, partial.path()).await?;
        persist(partial, ogg)
    }
}

/// Временный файл в каталоге назначения; не совпадает с шаблоном `<key>.<ext>`
async fn partial_file(target: &Path) -> Result<NamedTempFile> {
    let parent = target
        .parent()
        .ok_or_else(|| PipelineError::Other(format!("No parent directory for {}", target.display())))?;
    tokio::fs::create_dir_all(parent).await?;
    Ok(tempfile::Builder::new()
        .prefix(".partial-")
        .suffix(".part")
        .tempfile_in(parent)?)
}

fn persist(partial: NamedTempFile, target: &Path) -> Result<()> {
    partial.persist(target).map_err(|e| PipelineError::Io(e.error))?;
    Ok(())
}

async fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    let partial = partial_file(path).await?;
    tokio::fs::write(partial.path(), data).await?;
    persist(partial, path)
}
