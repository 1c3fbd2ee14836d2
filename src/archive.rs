//! Архивирование результатов запуска
//!
//! После запуска обработанные переводы, справочные файлы и итоги
//! копируются в `<archive_dir>/<label>`, где метка - версия или первая
//! свободная `<version>-<n>`.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::pipeline::RunSummary;

const TRANSLATIONS_DIR: &str = "Translations";
const REFERENCE_DIR: &str = "Reference_Files";
const SUMMARIES_DIR: &str = "summaries";
const RUN_SUMMARY_FILE: &str = "run_summary.json";

/// Метка запуска: версия, если она еще не архивировалась, иначе `<version>-<n>`
pub fn next_run_label(archive_root: &Path, version: &str) -> String {
    if !archive_root.join(version).exists() {
        return version.to_string();
    }
    let mut run_number = 1usize;
    loop {
        let label = format!("{}-{}", version, run_number);
        if !archive_root.join(&label).exists() {
            return label;
        }
        run_number += 1;
    }
}

/// Рекурсивное копирование директории
pub fn copy_dir(source: &Path, destination: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|e| PipelineError::Io(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| PipelineError::Other(e.to_string()))?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Заархивировать запуск; возвращает путь созданной директории
pub fn archive_run(config: &PipelineConfig, summary: &RunSummary) -> Result<PathBuf> {
    let archive_dir = config.archive_dir.join(&summary.label);
    std::fs::create_dir_all(&archive_dir)?;
    log::info!("=== Starting Archive Process ===");
    log::info!("Archive directory: {}", archive_dir.display());

    if config.processed_dir.exists() {
        let copied = copy_dir(&config.processed_dir, &archive_dir.join(TRANSLATIONS_DIR))?;
        std::fs::remove_dir_all(&config.processed_dir)?;
        log::info!("Moved {} processed translation files to archive", copied);
    } else {
        log::warn!(
            "Processed translations directory not found: {}",
            config.processed_dir.display()
        );
    }

    if config.reference_dir.exists() {
        let copied = copy_dir(&config.reference_dir, &archive_dir.join(REFERENCE_DIR))?;
        log::info!("Copied {} reference files to archive", copied);
    } else {
        log::warn!("Reference directory not found: {}", config.reference_dir.display());
    }

    let summaries = archive_dir.join(SUMMARIES_DIR);
    std::fs::create_dir_all(&summaries)?;
    for report in &summary.languages {
        std::fs::write(
            summaries.join(format!("{}.txt", report.code)),
            report.summary_text(),
        )?;
    }

    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(archive_dir.join(RUN_SUMMARY_FILE), json)?;

    log::info!("=== Archive Process Complete ===");
    Ok(archive_dir)
}
