//! Модуль для отслеживания прогресса чтения
//!
//! Этот модуль реализует паттерн Observer: после каждого прозвучавшего
//! фрагмента наблюдатели получают накопленное и общее число символов.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Информация о прогрессе чтения
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// Сессия воспроизведения
    pub session_id: Uuid,
    /// Сколько символов уже прозвучало
    pub processed_chars: usize,
    /// Всего символов во фрагментах
    pub total_chars: usize,
    /// Сколько фрагментов прозвучало
    pub chunks_done: usize,
    /// Всего фрагментов
    pub chunk_count: usize,
}

impl ProgressInfo {
    pub fn new(
        session_id: Uuid,
        processed_chars: usize,
        total_chars: usize,
        chunks_done: usize,
        chunk_count: usize,
    ) -> Self {
        Self {
            session_id,
            processed_chars: processed_chars.min(total_chars),
            total_chars,
            chunks_done: chunks_done.min(chunk_count),
            chunk_count,
        }
    }

    /// Процент выполнения (0.0 - 100.0)
    pub fn percentage(&self) -> f32 {
        if self.total_chars == 0 {
            return 0.0;
        }
        (self.processed_chars as f32 / self.total_chars as f32 * 100.0).clamp(0.0, 100.0)
    }

    /// Всё ли прочитано
    pub fn is_complete(&self) -> bool {
        self.total_chars > 0 && self.processed_chars >= self.total_chars
    }
}

/// Трейт для наблюдателя, получающего уведомления о прогрессе
pub trait ProgressObserver: Send + Sync {
    /// Метод, вызываемый при обновлении прогресса
    fn on_progress_update(&self, progress: ProgressInfo);
}

/// Трейт для объекта, отправляющего уведомления о прогрессе
pub trait ProgressReporter: Send + Sync {
    /// Добавить наблюдателя
    ///
    /// Возвращает уникальный идентификатор наблюдателя, который можно использовать
    /// для его удаления в будущем.
    fn add_observer(&self, observer: Box<dyn ProgressObserver>) -> usize;

    /// Удалить наблюдателя по идентификатору
    fn remove_observer(&self, id: usize) -> Option<Box<dyn ProgressObserver>>;

    /// Уведомить всех наблюдателей о прогрессе
    fn notify_progress(&self, progress: ProgressInfo);
}

/// Реализация ProgressReporter по умолчанию
pub struct DefaultProgressReporter {
    /// Список наблюдателей
    observers: RwLock<HashMap<usize, Box<dyn ProgressObserver>>>,
    /// Счетчик для генерации уникальных идентификаторов наблюдателей
    next_id: AtomicUsize,
}

impl DefaultProgressReporter {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }
}

impl Default for DefaultProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for DefaultProgressReporter {
    fn add_observer(&self, observer: Box<dyn ProgressObserver>) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.observers.write().insert(id, observer);
        id
    }

    fn remove_observer(&self, id: usize) -> Option<Box<dyn ProgressObserver>> {
        self.observers.write().remove(&id)
    }

    fn notify_progress(&self, progress: ProgressInfo) {
        log::debug!(
            "Progress {}/{} chars ({:.1}%)",
            progress.processed_chars,
            progress.total_chars,
            progress.percentage()
        );
        let observers = self.observers.read();
        for observer in observers.values() {
            observer.on_progress_update(progress.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use parking_lot::Mutex;

    struct TestObserver {
        updates: Arc<Mutex<Vec<ProgressInfo>>>,
    }

    impl TestObserver {
        fn new() -> (Self, Arc<Mutex<Vec<ProgressInfo>>>) {
            let updates = Arc::new(Mutex::new(Vec::new()));
            (Self { updates: updates.clone() }, updates)
        }
    }

    impl ProgressObserver for TestObserver {
        fn on_progress_update(&self, progress: ProgressInfo) {
            self.updates.lock().push(progress);
        }
    }

    #[test]
    fn test_percentage() {
        let id = Uuid::new_v4();
        assert_eq!(ProgressInfo::new(id, 250, 1000, 1, 4).percentage(), 25.0);
        assert_eq!(ProgressInfo::new(id, 0, 0, 0, 0).percentage(), 0.0);
        // Счётчик не может убежать за общий объём
        let info = ProgressInfo::new(id, 1200, 1000, 5, 4);
        assert_eq!(info.processed_chars, 1000);
        assert_eq!(info.chunks_done, 4);
        assert!(info.is_complete());
    }

    #[test]
    fn test_reporter_add_and_remove() {
        let reporter = DefaultProgressReporter::new();
        let (first, first_updates) = TestObserver::new();
        let (second, second_updates) = TestObserver::new();

        let first_id = reporter.add_observer(Box::new(first));
        reporter.add_observer(Box::new(second));
        assert_eq!(reporter.observer_count(), 2);

        let id = Uuid::new_v4();
        reporter.notify_progress(ProgressInfo::new(id, 10, 20, 1, 2));
        assert!(reporter.remove_observer(first_id).is_some());
        assert!(reporter.remove_observer(first_id).is_none());
        reporter.notify_progress(ProgressInfo::new(id, 20, 20, 2, 2));

        assert_eq!(first_updates.lock().len(), 1);
        let second_updates = second_updates.lock();
        assert_eq!(second_updates.len(), 2);
        assert_eq!(second_updates[1].percentage(), 100.0);
    }
}
