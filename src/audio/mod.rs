//! Модуль воспроизведения аудио
//!
//! Ответ удалённого провайдера рассматривается как непрозрачный набор байт:
//! модуль его не разбирает и не перекодирует, а только отдаёт внешнему
//! плееру. Здесь же описан [`PlaybackHandle`]: общий интерфейс
//! «звучащего» объекта, который используют и локальный синтезатор,
//! и удалённые провайдеры.

use std::sync::Arc;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::process::Command;

use crate::config::AudioOutputSettings;
use crate::utils::process::{ControlledProcess, ProcessExit};

/// Ошибки воспроизведения
#[derive(Debug, Error)]
pub enum AudioError {
    /// Не удалось запустить плеер или синтезатор
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Процесс завершился с ошибкой
    #[error("{program} exited with code {code:?}")]
    Exited { program: String, code: Option<i32> },

    /// Ошибка ввода-вывода
    #[error("Audio IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Другая ошибка
    #[error("Audio error: {0}")]
    Other(String),
}

/// Аудиоданные, полученные от провайдера
#[derive(Debug, Clone)]
pub struct AudioPayload {
    /// Байты ответа как есть
    pub bytes: Bytes,
    /// Значение заголовка Content-Type, если был
    pub content_type: Option<String>,
}

impl AudioPayload {
    pub fn new(bytes: impl Into<Bytes>, content_type: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Расширение временного файла по Content-Type
    pub fn file_extension(&self) -> &'static str {
        let mime = self
            .content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase());

        match mime.as_deref() {
            Some("audio/mpeg") | Some("audio/mp3") => "mp3",
            Some("audio/wav") | Some("audio/x-wav") | Some("audio/wave") => "wav",
            Some("audio/ogg") => "ogg",
            Some("audio/flac") => "flac",
            _ => "bin",
        }
    }
}

/// Звучащий объект: утверждение синтезатора или загруженный аудиофайл.
///
/// Управляющие методы синхронные и не возвращают ошибок: пауза и
/// остановка выполняются по возможности.
#[async_trait]
pub trait PlaybackHandle: Send + Sync {
    /// Начать воспроизведение
    fn start(&self) -> Result<(), AudioError>;

    /// Приостановить воспроизведение
    fn pause(&self);

    /// Продолжить с места остановки
    fn resume(&self);

    /// Немедленно заглушить вывод. Идемпотентно.
    fn stop(&self);

    /// Дождаться конца воспроизведения.
    ///
    /// Возвращает `Ok(())` и при естественном завершении, и после `stop()`.
    async fn finished(&self) -> Result<(), AudioError>;
}

/// Устройство вывода для аудиоданных удалённых провайдеров
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Подготовить данные к воспроизведению, не начиная его
    async fn load(&self, payload: AudioPayload) -> Result<Box<dyn PlaybackHandle>, AudioError>;
}

/// Воспроизведение через внешний процесс.
///
/// Процесс запускается при первом `start()`; пауза и продолжение
/// реализованы сигналами, поэтому позиция воспроизведения сохраняется.
pub struct ProcessPlaybackHandle {
    command: Mutex<Option<Command>>,
    program: String,
    process: Mutex<Option<Arc<ControlledProcess>>>,
    stopped: Mutex<bool>,
    // Файл удаляется вместе с хэндлом
    _file: Option<NamedTempFile>,
}

impl ProcessPlaybackHandle {
    pub fn new(command: Command, file: Option<NamedTempFile>) -> Self {
        let program = command.as_std().get_program().to_string_lossy().to_string();
        Self {
            command: Mutex::new(Some(command)),
            program,
            process: Mutex::new(None),
            stopped: Mutex::new(false),
            _file: file,
        }
    }

    fn current_process(&self) -> Option<Arc<ControlledProcess>> {
        self.process.lock().clone()
    }
}

#[async_trait]
impl PlaybackHandle for ProcessPlaybackHandle {
    fn start(&self) -> Result<(), AudioError> {
        if *self.stopped.lock() {
            return Ok(());
        }
        let Some(command) = self.command.lock().take() else {
            // Уже запущен
            return Ok(());
        };

        let process = ControlledProcess::spawn(command).map_err(|source| AudioError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        *self.process.lock() = Some(Arc::new(process));
        Ok(())
    }

    fn pause(&self) {
        if let Some(process) = self.current_process() {
            process.pause();
        }
    }

    fn resume(&self) {
        if let Some(process) = self.current_process() {
            process.resume();
        }
    }

    fn stop(&self) {
        *self.stopped.lock() = true;
        self.command.lock().take();
        if let Some(process) = self.current_process() {
            process.kill();
        }
    }

    async fn finished(&self) -> Result<(), AudioError> {
        let Some(process) = self.current_process() else {
            return Ok(());
        };

        match process.wait().await {
            ProcessExit::Exited { success: true, .. } | ProcessExit::Killed => Ok(()),
            ProcessExit::Exited { success: false, code } => Err(AudioError::Exited {
                program: self.program.clone(),
                code,
            }),
            ProcessExit::Failed(message) => Err(AudioError::Other(message)),
        }
    }
}

/// Вывод аудио через внешний плеер (по умолчанию ffplay)
pub struct CommandAudioOutput {
    settings: AudioOutputSettings,
}

impl CommandAudioOutput {
    pub fn new(settings: AudioOutputSettings) -> Self {
        Self { settings }
    }

    fn build_command(&self, path: &str) -> Command {
        let mut command = Command::new(&self.settings.player);
        let mut substituted = false;
        for arg in &self.settings.args {
            if arg.contains("{file}") {
                command.arg(arg.replace("{file}", path));
                substituted = true;
            } else {
                command.arg(arg);
            }
        }
        if !substituted {
            command.arg(path);
        }
        command
    }
}

impl Default for CommandAudioOutput {
    fn default() -> Self {
        Self::new(AudioOutputSettings::default())
    }
}

#[async_trait]
impl AudioOutput for CommandAudioOutput {
    async fn load(&self, payload: AudioPayload) -> Result<Box<dyn PlaybackHandle>, AudioError> {
        let file = tempfile::Builder::new()
            .prefix("tts-reader-")
            .suffix(&format!(".{}", payload.file_extension()))
            .tempfile()?;
        tokio::fs::write(file.path(), &payload.bytes).await?;

        let path = file.path().to_string_lossy().to_string();
        log::debug!("Loaded {} bytes of audio into {}", payload.len(), path);

        let command = self.build_command(&path);
        Ok(Box::new(ProcessPlaybackHandle::new(command, Some(file))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_extension_from_content_type() {
        let payload = |ct: Option<&str>| AudioPayload::new(vec![1u8, 2, 3], ct.map(str::to_string));
        assert_eq!(payload(Some("audio/mpeg")).file_extension(), "mp3");
        assert_eq!(payload(Some("audio/wav; charset=binary")).file_extension(), "wav");
        assert_eq!(payload(Some("Audio/WAV")).file_extension(), "wav");
        assert_eq!(payload(Some("application/octet-stream")).file_extension(), "bin");
        assert_eq!(payload(None).file_extension(), "bin");
    }

    #[test]
    fn test_player_arguments() {
        let output = CommandAudioOutput::default();
        let command = output.build_command("/tmp/a.mp3");
        let args: Vec<String> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(args.last().map(String::as_str), Some("/tmp/a.mp3"));
        assert!(args.contains(&"-autoexit".to_string()));

        let output = CommandAudioOutput::new(AudioOutputSettings {
            player: "aplay".to_string(),
            args: vec!["-q".to_string()],
        });
        let command = output.build_command("/tmp/b.wav");
        let args: Vec<String> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(args, vec!["-q".to_string(), "/tmp/b.wav".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_loaded_payload_is_written_and_played() {
        // `cat` вместо плеера: читает файл и завершается
        let output = CommandAudioOutput::new(AudioOutputSettings {
            player: "cat".to_string(),
            args: Vec::new(),
        });
        let handle = output
            .load(AudioPayload::new(vec![0u8; 64], Some("audio/wav".to_string())))
            .await
            .unwrap();

        handle.start().unwrap();
        handle.finished().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_before_start_never_spawns() {
        let handle = ProcessPlaybackHandle::new(Command::new("definitely-not-a-real-player"), None);
        handle.stop();
        // После stop() запуск ничего не делает, поэтому и ошибки нет
        handle.start().unwrap();
        handle.finished().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_player_is_reported() {
        let handle = ProcessPlaybackHandle::new(Command::new("definitely-not-a-real-player"), None);
        let err = handle.start().unwrap_err();
        assert!(matches!(err, AudioError::Spawn { .. }));
    }
}
