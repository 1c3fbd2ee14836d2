//! Сверка с хранилищем
//!
//! Для каждого голоса и формата выполняется ровно один листинг; наличие
//! каждой записи проверяется по множеству в памяти. Отсутствующие задачи
//! возвращаются в порядке записей. Полный снимок листинга сохраняется для
//! обновления инвентаря без повторного запроса.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{PipelineError, Result};
use crate::model::{AudioFormat, GenerationTask, TranslationEntry, VoiceOption};
use crate::storage::{ObjectLayout, ObjectStore};

/// Результат сверки одного формата
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatReconciliation {
    /// Ключи записей, уже лежащие в хранилище
    pub present: BTreeSet<String>,
    pub missing: Vec<GenerationTask>,
}

/// Результат сверки голоса по всем форматам
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub voice: VoiceOption,
    /// Ключи текущих записей, найденные в хранилище
    pub present: BTreeMap<AudioFormat, BTreeSet<String>>,
    /// Все ключи из листинга, включая не относящиеся к текущим записям
    pub listed: BTreeMap<AudioFormat, BTreeSet<String>>,
    /// Порядок: по записям, внутри записи WAV раньше OGG
    pub missing: Vec<GenerationTask>,
}

impl Reconciliation {
    /// Все записи во всех форматах уже есть
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn present_count(&self, format: AudioFormat) -> usize {
        self.present.get(&format).map(|keys| keys.len()).unwrap_or(0)
    }

    /// Снимок хранилища для инвентаря
    pub fn listed_keys(&self, format: AudioFormat) -> BTreeSet<String> {
        self.listed.get(&format).cloned().unwrap_or_default()
    }
}

/// Ключи объектов формата в листинге; файлы другого расширения пропускаются
pub fn listing_keys(format: AudioFormat, listing: &BTreeSet<String>) -> BTreeSet<String> {
    listing
        .iter()
        .filter_map(|name| format.key_of(name))
        .map(str::to_string)
        .collect()
}

/// Сверка одного формата по снимку листинга (имена файлов без префикса)
pub fn reconcile_format(
    voice: &VoiceOption,
    format: AudioFormat,
    entries: &[TranslationEntry],
    listing: &BTreeSet<String>,
) -> FormatReconciliation {
    let mut present = BTreeSet::new();
    let mut missing = Vec::new();

    for entry in entries {
        if listing.contains(&format.file_name(&entry.key)) {
            present.insert(entry.key.clone());
        } else {
            missing.push(GenerationTask {
                entry: entry.clone(),
                voice: voice.clone(),
                format,
            });
        }
    }

    FormatReconciliation { present, missing }
}

/// Снимок листинга для голоса и формата: имена файлов относительно префикса
pub async fn fetch_listing(
    store: &dyn ObjectStore,
    layout: &ObjectLayout,
    voice: &VoiceOption,
    format: AudioFormat,
) -> Result<BTreeSet<String>> {
    let prefix = layout.voice_prefix(voice, format);
    let objects = store
        .list_objects(&prefix)
        .await
        .map_err(|e| PipelineError::ListingUnavailable {
            prefix: prefix.clone(),
            reason: e.to_string(),
        })?;

    Ok(objects
        .iter()
        .filter_map(|name| name.strip_prefix(prefix.as_str()))
        // Вложенные каталоги не относятся к этому голосу
        .filter(|name| !name.contains('/'))
        .map(|name| name.to_string())
        .collect())
}

/// Сверить голос со всеми форматами
pub async fn reconcile(
    voice: &VoiceOption,
    formats: &[AudioFormat],
    entries: &[TranslationEntry],
    store: &dyn ObjectStore,
    layout: &ObjectLayout,
) -> Result<Reconciliation> {
    let mut present = BTreeMap::new();
    let mut listed = BTreeMap::new();
    let mut missing_by_format = BTreeMap::new();

    for &format in formats {
        let listing = fetch_listing(store, layout, voice, format).await?;
        let result = reconcile_format(voice, format, entries, &listing);
        log::info!(
            "{} {}: {} present, {} missing",
            voice.voice_id,
            format,
            result.present.len(),
            result.missing.len()
        );
        present.insert(format, result.present);
        listed.insert(format, listing_keys(format, &listing));
        missing_by_format.insert(format, result.missing);
    }

    // Сливаем по записям, чтобы OGG каждой записи шел сразу за ее WAV
    let mut missing = Vec::new();
    let mut cursors: BTreeMap<AudioFormat, usize> = BTreeMap::new();
    for entry in entries {
        for (format, tasks) in &missing_by_format {
            let cursor = cursors.entry(*format).or_insert(0);
            if let Some(task) = tasks.get(*cursor) {
                if task.entry.key == entry.key {
                    missing.push(task.clone());
                    *cursor += 1;
                }
            }
        }
    }

    Ok(Reconciliation {
        voice: voice.clone(),
        present,
        listed,
        missing,
    })
}
