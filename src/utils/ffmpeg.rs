//! Модуль для работы с FFmpeg
//!
//! Конвертация WAV в OGG (Vorbis) внешним процессом FFmpeg.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{PipelineError, Result};

/// Конвертер аудио
#[async_trait]
pub trait AudioConverter: Send + Sync {
    /// Перекодировать WAV-файл в OGG по пути `ogg`
    async fn wav_to_ogg(&self, wav: &Path, ogg: &Path) -> Result<()>;
}

/// Найти исполняемый файл FFmpeg: явный путь из конфигурации или поиск в PATH
pub fn locate_ffmpeg(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return which::which(path).map_err(|e| {
            PipelineError::Configuration(format!(
                "Configured ffmpeg {} not found: {}",
                path.display(),
                e
            ))
        });
    }

    which::which("ffmpeg").map_err(|e| {
        PipelineError::Configuration(format!("ffmpeg not found in PATH: {}", e))
    })
}

/// Получение версии FFmpeg (первая строка `ffmpeg -version`)
pub async fn ffmpeg_version(binary: &Path) -> Result<String> {
    let output = Command::new(binary).arg("-version").output().await?;

    if !output.status.success() {
        return Err(PipelineError::Other("Failed to get FFmpeg version".to_string()));
    }

    let version_str = String::from_utf8_lossy(&output.stdout);
    let first_line = version_str.lines().next().unwrap_or("");

    Ok(first_line.to_string())
}

pub struct FfmpegConverter {
    binary: PathBuf,
    timeout: Duration,
}

impl FfmpegConverter {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn conversion_args(wav: &Path, ogg: &Path) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            wav.to_string_lossy().to_string(),
            "-c:a".to_string(),
            "libvorbis".to_string(),
            // Контейнер задается явно: имя вывода может быть временным
            "-f".to_string(),
            "ogg".to_string(),
            "-y".to_string(),
            ogg.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl AudioConverter for FfmpegConverter {
    async fn wav_to_ogg(&self, wav: &Path, ogg: &Path) -> Result<()> {
        let conversion_error = |reason: String| PipelineError::Conversion {
            path: wav.display().to_string(),
            reason,
        };

        if !wav.exists() {
            return Err(conversion_error("source WAV does not exist".to_string()));
        }
        if let Some(parent) = ogg.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut command = Command::new(&self.binary);
        command.args(Self::conversion_args(wav, ogg)).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                remove_partial(ogg).await;
                return Err(conversion_error(format!("failed to start ffmpeg: {}", e)));
            }
            Err(_) => {
                remove_partial(ogg).await;
                return Err(conversion_error(format!(
                    "ffmpeg timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        if !output.status.success() {
            remove_partial(ogg).await;
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(conversion_error(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if !ogg.exists() {
            return Err(conversion_error(format!(
                "ffmpeg reported success but {} was not created",
                ogg.display()
            )));
        }

        log::debug!("Converted {} -> {}", wav.display(), ogg.display());
        Ok(())
    }
}

/// Удалить недописанный вывод после сбоя
async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Failed to remove partial output {}: {}", path.display(), e);
        }
    }
}
