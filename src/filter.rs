//! Фильтрация переводов
//!
//! Из сырого файла языка остаются только ключи с разрешенными префиксами,
//! присутствующие в эталонном наборе. Порядок задается эталонным набором.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::Result;
use crate::model::TranslationEntry;

/// Сколько отсутствующих ключей выводить в лог поштучно
const MISSING_KEYS_LOGGED: usize = 10;

/// Результат фильтрации одного языка
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    /// Записи в каноническом порядке эталонного набора
    pub entries: Vec<TranslationEntry>,
    /// Эталонные ключи, которых нет в файле языка
    pub missing_keys: Vec<String>,
    /// Сколько сырых ключей прошло проверку префикса
    pub prefix_matched: usize,
    /// Размер сырого файла
    pub original_count: usize,
}

pub fn has_allowed_prefix(key: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| key.starts_with(prefix.as_str()))
}

pub fn filter_translations(
    raw: &BTreeMap<String, String>,
    reference_keys: &BTreeSet<String>,
    allowed_prefixes: &[String],
) -> FilterOutcome {
    let prefixed: BTreeMap<&str, &str> = raw
        .iter()
        .filter(|(key, _)| has_allowed_prefix(key, allowed_prefixes))
        .map(|(key, text)| (key.as_str(), text.as_str()))
        .collect();

    let mut entries = Vec::new();
    let mut missing_keys = Vec::new();

    for key in reference_keys {
        match prefixed.get(key.as_str()) {
            Some(text) => entries.push(TranslationEntry::new(key.clone(), *text)),
            None => missing_keys.push(key.clone()),
        }
    }

    FilterOutcome {
        entries,
        missing_keys,
        prefix_matched: prefixed.len(),
        original_count: raw.len(),
    }
}

/// Вывести отсутствующие ключи: первые несколько поштучно, остальные числом
pub fn log_missing_keys(language: &str, missing_keys: &[String]) {
    if missing_keys.is_empty() {
        return;
    }
    log::info!("Missing keys in {}:", language);
    for key in missing_keys.iter().take(MISSING_KEYS_LOGGED) {
        log::info!("  - {}", key);
    }
    if missing_keys.len() > MISSING_KEYS_LOGGED {
        log::info!(
            "  ... and {} more missing keys",
            missing_keys.len() - MISSING_KEYS_LOGGED
        );
    }
}

/// Сохранить отфильтрованный язык как `<code>_processed.json`
pub fn write_processed(path: &Path, entries: &[TranslationEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let map: BTreeMap<&str, &str> = entries
        .iter()
        .map(|e| (e.key.as_str(), e.text.as_str()))
        .collect();
    std::fs::write(path, serde_json::to_string_pretty(&map)?)?;
    Ok(())
}
