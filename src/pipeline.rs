//! Конвейер обработки языков
//!
//! Языки обрабатываются последовательно, в порядке кодов. Каждый язык
//! проходит этапы `Loaded -> Filtered -> Matched -> Reconciled -> Generated
//! -> Synced` и завершается состоянием `Done`, `Skipped` или `Failed`.
//! Ошибка одного языка не останавливает следующий; весь запуск прерывают
//! только ошибки конфигурации и справочных файлов.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::archive;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::filter;
use crate::generate::GenerationDriver;
use crate::logger;
use crate::matcher;
use crate::model::{AudioFormat, GeneratedFile, TranslationEntry, VoiceSelection};
use crate::progress::{ProgressInfo, ProgressObserver, ProgressReporter};
use crate::reconcile::{self, Reconciliation};
use crate::reference::{self, ReferenceData};
use crate::sink::{InventorySet, Sink, SyncReport};
use crate::staging::StagingArea;
use crate::storage::{ObjectLayout, ObjectStore};
use crate::tts::SpeechSynthesizer;
use crate::utils::AudioConverter;

/// Параметры запуска
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Обрабатывать только эти коды языков (пусто - все)
    pub only: Vec<String>,
    /// Только сверка и отчет, без генерации и загрузки
    pub dry_run: bool,
    /// Архивировать результаты после запуска
    pub archive: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            only: Vec::new(),
            dry_run: false,
            archive: true,
        }
    }
}

impl RunOptions {
    fn selects(&self, code: &str) -> bool {
        self.only.is_empty() || self.only.iter().any(|only| only.eq_ignore_ascii_case(code))
    }
}

/// Этап обработки языка
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Loaded,
    Filtered,
    Matched,
    Reconciled,
    Generated,
    Synced,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Filtered => "filtered",
            Self::Matched => "matched",
            Self::Reconciled => "reconciled",
            Self::Generated => "generated",
            Self::Synced => "synced",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Итоговое состояние языка
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum LanguageState {
    Done,
    Skipped { reason: String },
    Failed { stage: Stage, reason: String },
}

impl LanguageState {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for LanguageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => f.write_str("done"),
            Self::Skipped { reason } => write!(f, "skipped ({})", reason),
            Self::Failed { stage, reason } => write!(f, "failed at {}: {}", stage, reason),
        }
    }
}

/// Счетчики по формату
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FormatStats {
    pub made: usize,
    /// Уже было в хранилище
    pub skipped: usize,
    pub failed: usize,
}

impl FormatStats {
    fn add(&mut self, other: &FormatStats) {
        self.made += other.made;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Отчет по одному языку
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageReport {
    pub code: String,
    pub iso_code: Option<String>,
    pub state: LanguageState,
    pub voices: Vec<String>,
    pub original_count: usize,
    pub prefix_matched: usize,
    pub entries: usize,
    pub missing_keys: usize,
    /// Записи с пустым текстом, исключенные до сверки
    pub blank_entries: usize,
    /// Задачи, найденные сверкой в режиме dry-run
    pub pending_tasks: usize,
    pub formats: BTreeMap<AudioFormat, FormatStats>,
    pub upload_failures: usize,
}

impl LanguageReport {
    fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            iso_code: None,
            state: LanguageState::Done,
            voices: Vec::new(),
            original_count: 0,
            prefix_matched: 0,
            entries: 0,
            missing_keys: 0,
            blank_entries: 0,
            pending_tasks: 0,
            formats: BTreeMap::new(),
            upload_failures: 0,
        }
    }

    fn stats_mut(&mut self, format: AudioFormat) -> &mut FormatStats {
        self.formats.entry(format).or_default()
    }

    /// Текст `summary.txt` для архива
    pub fn summary_text(&self) -> String {
        let mut text = String::new();
        text.push_str(&format!("Language: {}\n", self.code));
        if let Some(iso) = &self.iso_code {
            text.push_str(&format!("ISO code: {}\n", iso));
        }
        text.push_str(&format!("State: {}\n", self.state));
        if !self.voices.is_empty() {
            text.push_str(&format!("Voices: {}\n", self.voices.join(", ")));
        }
        text.push_str(&format!(
            "Entries: {} (original {}, prefix-filtered {}, missing {}, blank {})\n",
            self.entries, self.original_count, self.prefix_matched, self.missing_keys, self.blank_entries
        ));
        for (format, stats) in &self.formats {
            text.push_str(&format!(
                "{}: made {}, skipped {}, failed {}\n",
                format, stats.made, stats.skipped, stats.failed
            ));
        }
        if self.upload_failures > 0 {
            text.push_str(&format!("Upload failures: {}\n", self.upload_failures));
        }
        text
    }
}

/// Итоги запуска
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub label: String,
    pub started_at: String,
    pub finished_at: String,
    pub dry_run: bool,
    pub languages: Vec<LanguageReport>,
    pub totals: BTreeMap<AudioFormat, FormatStats>,
}

impl RunSummary {
    pub fn report(&self, code: &str) -> Option<&LanguageReport> {
        self.languages.iter().find(|r| r.code == code)
    }

    pub fn count_done(&self) -> usize {
        self.languages.iter().filter(|r| r.state == LanguageState::Done).count()
    }

    pub fn count_skipped(&self) -> usize {
        self.languages
            .iter()
            .filter(|r| matches!(r.state, LanguageState::Skipped { .. }))
            .count()
    }

    pub fn count_failed(&self) -> usize {
        self.languages.iter().filter(|r| r.state.is_failed()).count()
    }
}

/// Состояние запуска, передаваемое через все этапы
struct RunContext {
    run_id: Uuid,
    label: String,
    started_at: chrono::DateTime<chrono::Local>,
    reference: ReferenceData,
    used_iso_codes: BTreeSet<String>,
    reports: Vec<LanguageReport>,
}

impl RunContext {
    fn finish(self, dry_run: bool) -> RunSummary {
        let mut totals: BTreeMap<AudioFormat, FormatStats> = BTreeMap::new();
        for report in &self.reports {
            for (format, stats) in &report.formats {
                totals.entry(*format).or_default().add(stats);
            }
        }
        RunSummary {
            run_id: self.run_id.to_string(),
            label: self.label,
            started_at: self.started_at.to_rfc3339(),
            finished_at: chrono::Local::now().to_rfc3339(),
            dry_run,
            languages: self.reports,
            totals,
        }
    }
}

/// Ошибка этапа: прерывает обработку языка
struct StageFailure {
    stage: Stage,
    error: PipelineError,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, StageFailure>;
}

impl<T> AtStage<T> for Result<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, StageFailure> {
        self.map_err(|error| StageFailure { stage, error })
    }
}

/// Язык в очереди обработки
struct LanguageJob<'a> {
    code: &'a str,
    path: &'a Path,
    index: usize,
    total: usize,
}

pub struct Pipeline {
    config: PipelineConfig,
    store: Arc<dyn ObjectStore>,
    layout: ObjectLayout,
    driver: GenerationDriver,
    progress: ProgressReporter,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        converter: Arc<dyn AudioConverter>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let layout = ObjectLayout::new(config.storage.project_prefix.clone());
        let driver = GenerationDriver::new(
            synthesizer,
            converter,
            store.clone(),
            layout.clone(),
            StagingArea::new(config.staging_dir.clone()),
            config.sample_rate_hertz,
        );
        Self {
            config,
            store,
            layout,
            driver,
            progress: ProgressReporter::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) {
        self.progress.add_observer(observer);
    }

    /// Выполнить запуск. Ошибка возвращается только для сбоев всего запуска.
    pub async fn run(&self, options: &RunOptions) -> Result<RunSummary> {
        let reference = ReferenceData::load(&self.config)?;
        let languages = reference::discover_languages(&self.config.translations_dir)?;

        let mut ctx = RunContext {
            run_id: Uuid::new_v4(),
            label: archive::next_run_label(&self.config.archive_dir, &self.config.version),
            started_at: chrono::Local::now(),
            reference,
            used_iso_codes: BTreeSet::new(),
            reports: Vec::new(),
        };
        logger::log_run_banner(&ctx.label, &ctx.run_id.to_string());
        log::info!(
            "Storage backend: {}, project prefix `{}`",
            self.store.name(),
            self.layout.project_prefix()
        );

        let sink = Sink::new(self.store.as_ref(), &self.layout);
        let mut inventories = InventorySet::new(self.config.inventory_dir.clone());

        if !options.dry_run {
            if let Err(e) = sink.sweep_staging(self.driver.staging(), &mut inventories).await {
                log::warn!("Staging sweep failed: {}", e);
            }
        }

        let selected: Vec<&(String, PathBuf)> = languages
            .iter()
            .filter(|(code, _)| options.selects(code))
            .collect();
        log::info!(
            "Found {} translation files, {} selected",
            languages.len(),
            selected.len()
        );

        let total = selected.len();
        for (i, (code, path)) in selected.into_iter().enumerate() {
            let job = LanguageJob {
                code,
                path,
                index: i + 1,
                total,
            };
            let report = self
                .process_language(&mut ctx, &job, &sink, &mut inventories, options)
                .await;
            ctx.reports.push(report);
        }

        log_preprocessing_summary(&ctx.reports);
        let summary = ctx.finish(options.dry_run);
        log_run_summary(&summary);

        if options.archive && !options.dry_run {
            if let Err(e) = archive::archive_run(&self.config, &summary) {
                log::error!("Archiving failed: {}", e);
            }
        }

        Ok(summary)
    }

    fn notify(&self, job: &LanguageJob<'_>, stage: &str, details: Option<String>) {
        self.progress
            .notify(ProgressInfo::new(job.code, job.index, job.total, stage, details));
    }

    async fn process_language(
        &self,
        ctx: &mut RunContext,
        job: &LanguageJob<'_>,
        sink: &Sink<'_>,
        inventories: &mut InventorySet,
        options: &RunOptions,
    ) -> LanguageReport {
        log::info!("Processing {} ({}/{})", job.code, job.index, job.total);
        let mut report = LanguageReport::new(job.code);

        let state = match self
            .advance(ctx, job, sink, inventories, options, &mut report)
            .await
        {
            Ok(state) => state,
            Err(failure) => {
                log::error!(
                    "{} failed at stage {}: {}",
                    job.code,
                    failure.stage,
                    failure.error
                );
                LanguageState::Failed {
                    stage: failure.stage,
                    reason: failure.error.to_string(),
                }
            }
        };
        report.state = state;

        self.notify(job, "finished", Some(report.state.to_string()));
        report
    }

    async fn advance(
        &self,
        ctx: &mut RunContext,
        job: &LanguageJob<'_>,
        sink: &Sink<'_>,
        inventories: &mut InventorySet,
        options: &RunOptions,
        report: &mut LanguageReport,
    ) -> std::result::Result<LanguageState, StageFailure> {
        // Loaded
        let raw = reference::load_translation_file(job.path).at(Stage::Loaded)?;
        self.notify(job, Stage::Loaded.as_str(), Some(format!("{} keys", raw.len())));

        // Filtered
        let outcome = filter::filter_translations(
            &raw,
            &ctx.reference.reference_keys,
            &self.config.allowed_prefixes,
        );
        report.original_count = outcome.original_count;
        report.prefix_matched = outcome.prefix_matched;
        report.missing_keys = outcome.missing_keys.len();
        filter::log_missing_keys(job.code, &outcome.missing_keys);

        let processed_path = self
            .config
            .processed_dir
            .join(format!("{}_processed.json", job.code));
        filter::write_processed(&processed_path, &outcome.entries).at(Stage::Filtered)?;

        let (entries, blank): (Vec<_>, Vec<_>) =
            outcome.entries.into_iter().partition(|e| e.is_speakable());
        report.entries = entries.len();
        report.blank_entries = blank.len();
        log::info!(
            "{}: original {}, prefix-filtered {}, final {}, missing {}, blank {}",
            job.code,
            report.original_count,
            report.prefix_matched,
            report.entries,
            report.missing_keys,
            report.blank_entries
        );
        self.notify(
            job,
            Stage::Filtered.as_str(),
            Some(format!("{} entries", entries.len())),
        );

        // Matched
        let selection = matcher::match_voices(
            job.code,
            &ctx.reference.language_table,
            &ctx.reference.catalog,
        )
        .at(Stage::Matched)?;
        report.iso_code = Some(selection.language.iso_code.clone());
        report.voices = selection.voices.iter().map(|v| v.voice_id.clone()).collect();

        if !ctx.used_iso_codes.insert(selection.language.iso_code.clone()) {
            log::info!(
                "{}: ISO code {} already processed in this run",
                job.code,
                selection.language.iso_code
            );
            return Ok(LanguageState::Skipped {
                reason: "language already used".to_string(),
            });
        }
        self.notify(
            job,
            Stage::Matched.as_str(),
            Some(report.voices.join(", ")),
        );

        if entries.is_empty() {
            return Ok(LanguageState::Skipped {
                reason: "no speakable entries".to_string(),
            });
        }

        // Reconciled
        let (reconciliations, listing_failure) = self
            .reconcile_voices(&selection, &entries, inventories, report)
            .await
            .at(Stage::Reconciled)?;
        let pending: usize = reconciliations.iter().map(|r| r.missing.len()).sum();
        self.notify(
            job,
            Stage::Reconciled.as_str(),
            Some(format!("{} tasks missing", pending)),
        );

        if listing_failure.is_none() && pending == 0 {
            log::info!("{}: all outputs already present", job.code);
            return Ok(LanguageState::Skipped {
                reason: "all outputs present".to_string(),
            });
        }

        if options.dry_run {
            report.pending_tasks = pending;
            log::info!("{}: dry run, {} tasks would be generated", job.code, pending);
            return Ok(match listing_failure {
                Some(error) => LanguageState::Failed {
                    stage: Stage::Reconciled,
                    reason: error.to_string(),
                },
                None => LanguageState::Done,
            });
        }

        // Generated
        let mut generated: Vec<GeneratedFile> = Vec::new();
        for reconciliation in &reconciliations {
            for task in &reconciliation.missing {
                match self.driver.generate(task).await {
                    Ok(outcome) => {
                        report.stats_mut(task.format).made += 1;
                        generated.push(outcome.into_file());
                    }
                    Err(_) => report.stats_mut(task.format).failed += 1,
                }
            }
        }
        self.notify(
            job,
            Stage::Generated.as_str(),
            Some(format!("{} files", generated.len())),
        );

        // Synced
        let sync: SyncReport = sink.sync(&generated, inventories).await.at(Stage::Synced)?;
        inventories.save_all().at(Stage::Synced)?;
        report.upload_failures = sync.failed.len();
        self.notify(
            job,
            Stage::Synced.as_str(),
            Some(format!("{} uploaded, {} pending", sync.uploaded, sync.failed.len())),
        );

        Ok(match listing_failure {
            Some(error) => LanguageState::Failed {
                stage: Stage::Reconciled,
                reason: error.to_string(),
            },
            None => LanguageState::Done,
        })
    }

    /// Сверка всех голосов языка. Сбой листинга одного голоса не мешает остальным.
    async fn reconcile_voices(
        &self,
        selection: &VoiceSelection,
        entries: &[TranslationEntry],
        inventories: &mut InventorySet,
        report: &mut LanguageReport,
    ) -> Result<(Vec<Reconciliation>, Option<PipelineError>)> {
        let formats = self.config.ordered_formats();
        let mut reconciliations = Vec::new();
        let mut listing_failure = None;

        for voice in &selection.voices {
            let reconciliation = match reconcile::reconcile(
                voice,
                &formats,
                entries,
                self.store.as_ref(),
                &self.layout,
            )
            .await
            {
                Ok(reconciliation) => reconciliation,
                Err(e) => {
                    log::error!("Skipping voice {}: {}", voice.voice_id, e);
                    listing_failure = Some(e);
                    continue;
                }
            };

            for format in &formats {
                report.stats_mut(*format).skipped += reconciliation.present_count(*format);

                let inventory = inventories.get_mut(&voice.voice_id, *format)?;
                let stale = inventory.refresh(reconciliation.listed_keys(*format));
                if stale > 0 {
                    log::warn!(
                        "{} {}: {} inventory entries no longer in storage",
                        voice.voice_id,
                        format,
                        stale
                    );
                }
            }
            reconciliations.push(reconciliation);
        }

        inventories.save_all()?;
        Ok((reconciliations, listing_failure))
    }
}

fn log_preprocessing_summary(reports: &[LanguageReport]) {
    let original: usize = reports.iter().map(|r| r.original_count).sum();
    let prefixed: usize = reports.iter().map(|r| r.prefix_matched).sum();
    let entries: usize = reports.iter().map(|r| r.entries).sum();
    let missing: usize = reports.iter().map(|r| r.missing_keys).sum();
    log::info!(
        "Preprocessing summary: {} files, {} original keys, {} prefix-filtered, {} final, {} missing",
        reports.len(),
        original,
        prefixed,
        entries,
        missing
    );
}

fn log_run_summary(summary: &RunSummary) {
    log::info!("=== Run summary ({}) ===", summary.label);
    for report in &summary.languages {
        let formats: Vec<String> = report
            .formats
            .iter()
            .map(|(format, s)| {
                format!("{} made {}/skipped {}/failed {}", format, s.made, s.skipped, s.failed)
            })
            .collect();
        log::info!("{}: {} | {}", report.code, report.state, formats.join(" | "));
    }
    log::info!(
        "Languages: {} done, {} skipped, {} failed",
        summary.count_done(),
        summary.count_skipped(),
        summary.count_failed()
    );
}
