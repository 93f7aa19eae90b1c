//! Управление дочерними процессами воспроизведения и синтеза
//!
//! Локальный синтезатор и внешний аудиоплеер запускаются как дочерние
//! процессы. Процесс можно приостановить (SIGSTOP), продолжить (SIGCONT),
//! убить и дождаться его завершения из любой задачи.

use std::process::Stdio;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{oneshot, watch};

/// Итог работы процесса
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessExit {
    /// Процесс завершился сам
    Exited { success: bool, code: Option<i32> },
    /// Процесс был убит через [`ControlledProcess::kill`]
    Killed,
    /// Не удалось дождаться процесса
    Failed(String),
}

/// Запущенный дочерний процесс с возможностью паузы
pub struct ControlledProcess {
    pid: Option<u32>,
    program: String,
    kill_tx: Mutex<Option<oneshot::Sender<()>>>,
    exit_rx: watch::Receiver<Option<ProcessExit>>,
}

impl ControlledProcess {
    /// Запустить процесс. Должно вызываться внутри рантайма Tokio.
    pub fn spawn(mut command: Command) -> std::io::Result<Self> {
        let program = command.as_std().get_program().to_string_lossy().to_string();

        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn()?;
        let pid = child.id();
        log::debug!("Spawned {} (pid {:?})", program, pid);

        if let Some(stderr) = child.stderr.take() {
            let name = program.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    log::debug!("{}: {}", name, line);
                }
            });
        }

        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let (exit_tx, exit_rx) = watch::channel(None);

        tokio::spawn(async move {
            let exit = tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => ProcessExit::Exited {
                        success: status.success(),
                        code: status.code(),
                    },
                    Err(e) => ProcessExit::Failed(e.to_string()),
                },
                // Срабатывает и на явный kill, и на drop отправителя
                _ = kill_rx => {
                    if let Err(e) = child.kill().await {
                        log::warn!("Failed to kill child process: {}", e);
                    }
                    ProcessExit::Killed
                }
            };
            let _ = exit_tx.send(Some(exit));
        });

        Ok(Self {
            pid,
            program,
            kill_tx: Mutex::new(Some(kill_tx)),
            exit_rx,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Приостановить процесс
    pub fn pause(&self) -> bool {
        self.signal(Signal::Stop)
    }

    /// Продолжить приостановленный процесс
    pub fn resume(&self) -> bool {
        self.signal(Signal::Continue)
    }

    /// Убить процесс. Повторный вызов ничего не делает.
    pub fn kill(&self) {
        if let Some(tx) = self.kill_tx.lock().take() {
            let _ = tx.send(());
        }
    }

    /// Завершился ли процесс
    pub fn has_exited(&self) -> bool {
        self.exit_rx.borrow().is_some()
    }

    /// Дождаться завершения процесса
    pub async fn wait(&self) -> ProcessExit {
        let mut rx = self.exit_rx.clone();
        let exit = match rx.wait_for(Option::is_some).await {
            Ok(exit) => exit.clone(),
            Err(_) => None,
        };
        exit.unwrap_or_else(|| ProcessExit::Failed("process monitor stopped".to_string()))
    }

    #[cfg(unix)]
    fn signal(&self, signal: Signal) -> bool {
        let Some(pid) = self.pid else {
            return false;
        };
        if self.has_exited() {
            return false;
        }
        let sig = match signal {
            Signal::Stop => libc::SIGSTOP,
            Signal::Continue => libc::SIGCONT,
        };
        // SAFETY: kill(2) только отправляет сигнал процессу-потомку с известным pid
        let result = unsafe { libc::kill(pid as libc::pid_t, sig) };
        if result != 0 {
            log::warn!(
                "Failed to send {:?} to {} (pid {}): {}",
                signal,
                self.program,
                pid,
                std::io::Error::last_os_error()
            );
        }
        result == 0
    }

    #[cfg(not(unix))]
    fn signal(&self, signal: Signal) -> bool {
        log::warn!("{:?} is not supported for {} on this platform", signal, self.program);
        false
    }
}

impl Drop for ControlledProcess {
    fn drop(&mut self) {
        self.kill();
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Stop,
    Continue,
}
