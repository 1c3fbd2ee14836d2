//! Модуль для отслеживания прогресса обработки языков
//!
//! Реализация паттерна Observer: конвейер сообщает о переходах между
//! этапами, наблюдатели выводят их в консоль или сохраняют в памяти.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Информация о прогрессе обработки
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// Код языка игры
    pub language: String,
    /// Порядковый номер языка (с 1)
    pub index: usize,
    /// Общее число языков в запуске
    pub total: usize,
    /// Текущий этап
    pub stage: String,
    /// Дополнительная информация
    pub details: Option<String>,
}

impl ProgressInfo {
    pub fn new(
        language: impl Into<String>,
        index: usize,
        total: usize,
        stage: impl Into<String>,
        details: Option<String>,
    ) -> Self {
        Self {
            language: language.into(),
            index,
            total,
            stage: stage.into(),
            details,
        }
    }

    /// Доля обработанных языков (0.0 - 100.0)
    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            return 100.0;
        }
        (self.index.saturating_sub(1) as f32 / self.total as f32 * 100.0).clamp(0.0, 100.0)
    }
}

/// Трейт для наблюдателя, получающего уведомления о прогрессе
pub trait ProgressObserver: Send + Sync {
    fn on_progress_update(&self, progress: &ProgressInfo);
}

/// Рассылает уведомления всем зарегистрированным наблюдателям
#[derive(Default)]
pub struct ProgressReporter {
    observers: Vec<Box<dyn ProgressObserver>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) {
        self.observers.push(observer);
    }

    pub fn notify(&self, progress: ProgressInfo) {
        for observer in &self.observers {
            observer.on_progress_update(&progress);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

/// Наблюдатель, выводящий прогресс в консоль
#[derive(Default)]
pub struct ConsoleProgressObserver;

impl ConsoleProgressObserver {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressObserver for ConsoleProgressObserver {
    fn on_progress_update(&self, progress: &ProgressInfo) {
        match &progress.details {
            Some(details) => println!(
                "[{}/{}] {} {}: {}",
                progress.index, progress.total, progress.language, progress.stage, details
            ),
            None => println!(
                "[{}/{}] {} {}",
                progress.index, progress.total, progress.language, progress.stage
            ),
        }
    }
}

/// Наблюдатель, сохраняющий историю обновлений в памяти
#[derive(Clone, Default)]
pub struct MemoryProgressObserver {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl MemoryProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<ProgressInfo> {
        self.history.lock().clone()
    }

    /// Этапы, пройденные языком, в порядке уведомлений
    pub fn stages_for(&self, language: &str) -> Vec<String> {
        self.history
            .lock()
            .iter()
            .filter(|p| p.language == language)
            .map(|p| p.stage.clone())
            .collect()
    }
}

impl ProgressObserver for MemoryProgressObserver {
    fn on_progress_update(&self, progress: &ProgressInfo) {
        self.history.lock().push(progress.clone());
    }
}
