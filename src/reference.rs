//! Модуль загрузки справочных данных
//!
//! Справочные ключи, таблица соответствия языков и снимок каталога голосов
//! загружаются один раз за запуск. Любая ошибка здесь прерывает весь запуск.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::model::{Gender, VoiceOption, VoiceTier};

/// Маркеры премиальных голосов в имени
pub const PREMIUM_MARKERS: [&str; 6] = [
    "Chirp3-HD",
    "Chirp-HD",
    "Neural2",
    "WaveNet",
    "Journey",
    "Studio",
];

/// Голос в формате снимка каталога (как его отдает API списка голосов)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogVoice {
    pub name: String,
    #[serde(default)]
    pub language_codes: Vec<String>,
    #[serde(default)]
    pub ssml_gender: String,
    #[serde(default)]
    pub natural_sample_rate_hertz: u32,
}

/// Уровень голоса по его имени
pub fn tier_for_voice(name: &str) -> VoiceTier {
    if PREMIUM_MARKERS.iter().any(|marker| name.contains(marker)) {
        VoiceTier::Premium
    } else {
        VoiceTier::Standard
    }
}

/// Преобразовать снимок каталога в типизированные голоса.
///
/// Голос с несколькими языками дает по записи на каждый язык. Голоса без
/// женского или мужского пола пропускаются.
pub fn voice_options_from_catalog(catalog: &[CatalogVoice]) -> Vec<VoiceOption> {
    let mut options = Vec::new();
    for voice in catalog {
        let gender = match Gender::from_ssml(&voice.ssml_gender) {
            Some(gender) => gender,
            None => {
                log::debug!(
                    "Skipping voice {} with gender `{}`",
                    voice.name,
                    voice.ssml_gender
                );
                continue;
            }
        };
        let tier = tier_for_voice(&voice.name);
        for code in &voice.language_codes {
            options.push(VoiceOption::new(voice.name.clone(), code.clone(), gender, tier));
        }
    }
    options
}

fn reference_error(path: &Path, reason: impl ToString) -> PipelineError {
    PipelineError::ReferenceLoad {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

fn read_reference(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| reference_error(path, e))
}

/// Ключи эталонного файла перевода (`en_us.json`)
pub fn load_reference_keys(path: &Path) -> Result<BTreeSet<String>> {
    let text = read_reference(path)?;
    let data: BTreeMap<String, String> =
        serde_json::from_str(&text).map_err(|e| reference_error(path, e))?;
    if data.is_empty() {
        return Err(reference_error(path, "reference file has no keys"));
    }
    Ok(data.into_keys().collect())
}

/// Таблица соответствия: код языка игры -> ISO-код
pub fn load_language_table(path: &Path) -> Result<BTreeMap<String, String>> {
    let text = read_reference(path)?;
    let raw: BTreeMap<String, String> =
        serde_json::from_str(&text).map_err(|e| reference_error(path, e))?;

    let table: BTreeMap<String, String> = raw
        .into_iter()
        .map(|(code, iso)| (code.trim().to_string(), iso.trim().to_string()))
        .filter(|(code, iso)| !code.is_empty() && !iso.is_empty() && code != "–" && iso != "–")
        .collect();

    if table.is_empty() {
        return Err(reference_error(path, "language table is empty"));
    }
    Ok(table)
}

pub fn load_catalog_snapshot(path: &Path) -> Result<Vec<CatalogVoice>> {
    let text = read_reference(path)?;
    serde_json::from_str(&text).map_err(|e| reference_error(path, e))
}

pub fn save_catalog_snapshot(path: &Path, catalog: &[CatalogVoice]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(catalog)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Сырой файл перевода одного языка. Значения обязаны быть строками.
pub fn load_translation_file(path: &Path) -> Result<BTreeMap<String, String>> {
    let invalid = |reason: String| PipelineError::InvalidTranslation {
        path: path.display().to_string(),
        reason,
    };
    let text = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))
}

/// Найти файлы переводов `<code>.json`, отсортированные по коду языка
pub fn discover_languages(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut languages = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|e| reference_error(dir, e))?;

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(code) = path.file_stem().and_then(|s| s.to_str()) {
            languages.push((code.to_string(), path.clone()));
        }
    }

    languages.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(languages)
}

/// Неизменяемые справочные данные запуска
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub reference_keys: BTreeSet<String>,
    pub language_table: BTreeMap<String, String>,
    pub catalog: Vec<VoiceOption>,
}

impl ReferenceData {
    pub fn load(config: &PipelineConfig) -> Result<Self> {
        let reference_keys = load_reference_keys(&config.reference_file_path())?;
        log::info!("Reference file loaded with {} keys", reference_keys.len());

        let language_table = load_language_table(&config.language_table_path())?;
        log::info!("Loaded {} language mappings", language_table.len());

        let snapshot = load_catalog_snapshot(&config.voice_catalog_path())?;
        let catalog = voice_options_from_catalog(&snapshot);
        if catalog.is_empty() {
            return Err(reference_error(
                &config.voice_catalog_path(),
                "voice catalog has no usable voices",
            ));
        }
        log::info!(
            "Loaded {} catalog voices ({} language/voice pairs)",
            snapshot.len(),
            catalog.len()
        );

        Ok(Self {
            reference_keys,
            language_table,
            catalog,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_tier_detection() {
        assert_eq!(tier_for_voice("en-US-Neural2-C"), VoiceTier::Premium);
        assert_eq!(tier_for_voice("en-US-Chirp3-HD-Aoede"), VoiceTier::Premium);
        assert_eq!(tier_for_voice("af-ZA-Standard-A"), VoiceTier::Standard);
    }

    #[test]
    fn test_catalog_expansion() {
        let catalog = vec![
            CatalogVoice {
                name: "cmn-CN-Standard-A".into(),
                language_codes: vec!["cmn-CN".into(), "zh-CN".into()],
                ssml_gender: "FEMALE".into(),
                natural_sample_rate_hertz: 24000,
            },
            CatalogVoice {
                name: "en-US-Studio-Q".into(),
                language_codes: vec!["en-US".into()],
                ssml_gender: "NEUTRAL".into(),
                natural_sample_rate_hertz: 24000,
            },
        ];

        let options = voice_options_from_catalog(&catalog);
        assert_eq!(options.len(), 2);
        assert_eq!(options[1].language_iso_code, "zh-CN");
        assert!(options.iter().all(|v| v.gender == Gender::Female));
    }

    #[test]
    fn test_language_table_drops_placeholders() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("language_table.json");
        std::fs::write(&path, r#"{"af_za": "af-ZA", "enws": "–", "": "x"}"#).unwrap();

        let table = load_language_table(&path).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table["af_za"], "af-ZA");
    }

    #[test]
    fn test_missing_reference_is_fatal() {
        let dir = tempdir().unwrap();
        let err = load_reference_keys(&dir.path().join("en_us.json")).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_translation_file_rejects_non_string_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("af_za.json");
        std::fs::write(&path, r#"{"item.minecraft.stone": 5}"#).unwrap();

        let err = load_translation_file(&path).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTranslation { .. }));
    }

    #[test]
    fn test_discover_languages_sorted() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("de_de.json"), "{}").unwrap();
        std::fs::write(dir.path().join("af_za.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let languages = discover_languages(dir.path()).unwrap();
        let codes: Vec<&str> = languages.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(codes, vec!["af_za", "de_de"]);
    }
}
