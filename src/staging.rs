//! Промежуточная директория для сгенерированных файлов
//!
//! Файлы лежат в `<root>/<voice_id>-<gender>-<FORMAT>/<key>.<ext>` до
//! успешной загрузки в хранилище. После сбоя загрузки они остаются здесь и
//! подбираются следующим запуском.

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use walkdir::WalkDir;

use crate::error::{PipelineError, Result};
use crate::model::{AudioFormat, Gender, GeneratedFile, VoiceOption};

lazy_static! {
    static ref VOICE_DIR: Regex = Regex::new(r"^(.+)-(female|male)-(WAV|OGG)$").unwrap();
}

#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, voice: &VoiceOption, format: AudioFormat) -> PathBuf {
        self.root.join(voice.directory_name(format))
    }

    pub fn file_path(&self, voice: &VoiceOption, format: AudioFormat, key: &str) -> PathBuf {
        self.dir(voice, format).join(format.file_name(key))
    }

    pub fn generated_file(&self, voice: &VoiceOption, format: AudioFormat, key: &str) -> GeneratedFile {
        GeneratedFile {
            key: key.to_string(),
            voice_id: voice.voice_id.clone(),
            gender: voice.gender,
            format,
            path: self.file_path(voice, format, key),
        }
    }

    /// Файлы, оставшиеся от прошлых запусков, в порядке путей
    pub fn leftovers(&self) -> Result<Vec<GeneratedFile>> {
        let mut files = Vec::new();
        if !self.root.exists() {
            return Ok(files);
        }

        for entry in WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| PipelineError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            match parse_staged(entry.path()) {
                Some(file) => files.push(file),
                None => log::debug!("Ignoring unexpected staged file {}", entry.path().display()),
            }
        }
        Ok(files)
    }

    /// Удалить пустые каталоги голосов
    pub fn prune_empty_dirs(&self) -> Result<()> {
        if !self.root.exists() {
            return Ok(());
        }
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_dir() && std::fs::read_dir(&path)?.next().is_none() {
                std::fs::remove_dir(&path)?;
            }
        }
        Ok(())
    }
}

fn parse_staged(path: &Path) -> Option<GeneratedFile> {
    let dir_name = path.parent()?.file_name()?.to_str()?;
    let caps = VOICE_DIR.captures(dir_name)?;

    let gender = match &caps[2] {
        "female" => Gender::Female,
        _ => Gender::Male,
    };
    let format = match &caps[3] {
        "WAV" => AudioFormat::Wav,
        _ => AudioFormat::Ogg,
    };

    let file_name = path.file_name()?.to_str()?;
    let key = format.key_of(file_name)?;

    Some(GeneratedFile {
        key: key.to_string(),
        voice_id: caps[1].to_string(),
        gender,
        format,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VoiceTier;
    use tempfile::tempdir;

    #[test]
    fn test_paths_follow_bucket_layout() {
        let staging = StagingArea::new("Bucket_upload");
        let voice = VoiceOption::new("af-ZA-Standard-A", "af-ZA", Gender::Female, VoiceTier::Standard);
        assert_eq!(
            staging.file_path(&voice, AudioFormat::Ogg, "item.minecraft.stone"),
            PathBuf::from("Bucket_upload/af-ZA-Standard-A-female-OGG/item.minecraft.stone.ogg")
        );
    }

    #[test]
    fn test_leftovers_are_recognized() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let voice_dir = dir.path().join("de-DE-Neural2-B-male-WAV");
        std::fs::create_dir_all(&voice_dir).unwrap();
        std::fs::write(voice_dir.join("block.minecraft.dirt.wav"), b"RIFF").unwrap();
        std::fs::write(voice_dir.join("notes.txt"), b"x").unwrap();
        std::fs::create_dir_all(dir.path().join("random")).unwrap();
        std::fs::write(dir.path().join("random").join("a.wav"), b"x").unwrap();

        let files = staging.leftovers().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].voice_id, "de-DE-Neural2-B");
        assert_eq!(files[0].gender, Gender::Male);
        assert_eq!(files[0].format, AudioFormat::Wav);
        assert_eq!(files[0].key, "block.minecraft.dirt");
    }

    #[test]
    fn test_prune_empty_dirs() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        std::fs::create_dir_all(dir.path().join("x-female-WAV")).unwrap();
        staging.prune_empty_dirs().unwrap();
        assert!(!dir.path().join("x-female-WAV").exists());
    }
}
