//! Модуль для реализации системы уведомлений
//!
//! Этот модуль предоставляет конкретные реализации наблюдателей для
//! прогресса чтения и для смены состояния воспроизведения.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use parking_lot::Mutex;

use crate::playback::state::{StateChange, StateObserver};
use crate::progress::{ProgressInfo, ProgressObserver};

/// Наблюдатель, сохраняющий информацию о прогрессе в памяти
#[derive(Clone, Default)]
pub struct MemoryProgressObserver {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl MemoryProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Получить историю обновлений прогресса
    pub fn history(&self) -> Vec<ProgressInfo> {
        self.history.lock().clone()
    }

    pub fn last(&self) -> Option<ProgressInfo> {
        self.history.lock().last().cloned()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

impl ProgressObserver for MemoryProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        self.history.lock().push(progress);
    }
}

/// Наблюдатель, дописывающий прогресс в файл
pub struct FileProgressObserver {
    file_path: PathBuf,
}

impl FileProgressObserver {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }
}

impl ProgressObserver for FileProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        let log_entry = format!(
            "[{}] session {}: {}/{} chars, chunk {}/{} ({:.1}%)\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            progress.session_id,
            progress.processed_chars,
            progress.total_chars,
            progress.chunks_done,
            progress.chunk_count,
            progress.percentage()
        );

        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .and_then(|mut file| file.write_all(log_entry.as_bytes()));
        if let Err(e) = result {
            log::warn!("Failed to write progress to {}: {}", self.file_path.display(), e);
        }
    }
}

/// Наблюдатель, отображающий прогресс в виде прогресс-бара в консоли
pub struct ProgressBarObserver {
    width: usize,
    last_progress: Mutex<f32>,
}

impl ProgressBarObserver {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            // Отрицательное значение гарантирует первую отрисовку
            last_progress: Mutex::new(-1.0),
        }
    }

    fn render(&self, percentage: f32) -> String {
        let filled = ((percentage / 100.0) * self.width as f32) as usize;
        let filled = filled.min(self.width);
        format!(
            "[{}{}] {:.1}%",
            "=".repeat(filled),
            " ".repeat(self.width - filled),
            percentage
        )
    }
}

impl Default for ProgressBarObserver {
    fn default() -> Self {
        Self::new(50)
    }
}

impl ProgressObserver for ProgressBarObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        let percentage = progress.percentage();
        let mut last_progress = self.last_progress.lock();

        // Сброс на ноль после остановки тоже перерисовываем
        let changed = (*last_progress - percentage).abs() >= 1.0
            || *last_progress < 0.0
            || percentage == 0.0
            || percentage >= 100.0;
        if !changed {
            return;
        }
        *last_progress = percentage;

        print!("\r{}", self.render(percentage));
        let _ = std::io::stdout().flush();
        if percentage >= 100.0 {
            println!();
        }
    }
}

/// Пишет смену состояния в лог
pub struct LoggingStateObserver;

impl StateObserver for LoggingStateObserver {
    fn on_state_change(&self, change: StateChange) {
        log::info!(
            "Playback {} -> {} ({:?})",
            change.from,
            change.to,
            change.transition
        );
    }
}

/// Копит смены состояния в памяти
#[derive(Clone, Default)]
pub struct MemoryStateObserver {
    history: Arc<Mutex<Vec<StateChange>>>,
}

impl MemoryStateObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<StateChange> {
        self.history.lock().clone()
    }
}

impl StateObserver for MemoryStateObserver {
    fn on_state_change(&self, change: StateChange) {
        self.history.lock().push(change);
    }
}
