//! Scripted process launcher for supervisor tests.

use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;

use super::launcher::{BoxedIo, ChildProcess, ExitInfo, LaunchedProcess, ProcessLauncher, ScanCommand};

#[derive(Debug, Clone)]
enum Chunk {
    Stdout(String),
    Stderr(String),
}

/// Ordered output chunks followed by an exit, or a hang until killed.
#[derive(Debug, Clone)]
pub struct Script {
    chunks: Vec<Chunk>,
    exit: ExitInfo,
    hang: bool,
    hold_stderr: bool,
}

impl Script {
    pub fn exit(code: i32) -> Self {
        Self {
            chunks: Vec::new(),
            exit: ExitInfo {
                code: Some(code),
                signal: None,
            },
            hang: false,
            hold_stderr: false,
        }
    }

    pub fn signaled(signal: &str) -> Self {
        Self {
            chunks: Vec::new(),
            exit: ExitInfo {
                code: None,
                signal: Some(signal.to_string()),
            },
            hang: false,
            hold_stderr: false,
        }
    }

    /// Writes its chunks, then keeps both streams open until killed.
    pub fn hanging() -> Self {
        Self {
            chunks: Vec::new(),
            exit: ExitInfo {
                code: None,
                signal: Some("SIGKILL".to_string()),
            },
            hang: true,
            hold_stderr: false,
        }
    }

    /// Stderr stays open after the exit is reported, as when a grandchild
    /// inherited the pipe.
    pub fn holding_stderr(mut self) -> Self {
        self.hold_stderr = true;
        self
    }

    pub fn stdout(mut self, text: impl Into<String>) -> Self {
        self.chunks.push(Chunk::Stdout(text.into()));
        self
    }

    pub fn stderr(mut self, text: impl Into<String>) -> Self {
        self.chunks.push(Chunk::Stderr(text.into()));
        self
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit.code
    }
}

pub struct FakeLauncher {
    script: Option<Script>,
    spawn_error: Option<(io::ErrorKind, &'static str)>,
    launches: Mutex<Vec<ScanCommand>>,
    killed: Arc<AtomicBool>,
}

impl FakeLauncher {
    pub fn new(script: Script) -> Self {
        Self {
            script: Some(script),
            spawn_error: None,
            launches: Mutex::new(Vec::new()),
            killed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn failing(kind: io::ErrorKind, message: &'static str) -> Self {
        Self {
            script: None,
            spawn_error: Some((kind, message)),
            launches: Mutex::new(Vec::new()),
            killed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn launches(&self) -> Vec<ScanCommand> {
        self.launches.lock().unwrap().clone()
    }

    pub fn was_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&self, command: &ScanCommand) -> io::Result<LaunchedProcess> {
        self.launches.lock().unwrap().push(command.clone());
        if let Some((kind, message)) = self.spawn_error {
            return Err(io::Error::new(kind, message));
        }
        let script = self.script.clone().unwrap_or_else(|| Script::exit(0));

        let (mut out_tx, out_rx) = tokio::io::duplex(64);
        let (mut err_tx, err_rx) = tokio::io::duplex(64);
        let (exit_tx, exit_rx) = oneshot::channel();
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            for chunk in &script.chunks {
                let written = match chunk {
                    Chunk::Stdout(text) => out_tx.write_all(text.as_bytes()).await,
                    Chunk::Stderr(text) => err_tx.write_all(text.as_bytes()).await,
                };
                if written.is_err() {
                    break;
                }
            }
            if script.hang {
                let _ = kill_rx.await;
            }
            drop(out_tx);
            let _ = exit_tx.send(script.exit);
            if script.hold_stderr {
                std::future::pending::<()>().await;
            }
            drop(err_tx);
        });

        Ok(LaunchedProcess {
            stdout: Box::new(out_rx),
            stderr: Box::new(err_rx),
            child: Box::new(FakeChild {
                exit: Some(exit_rx),
                kill: Some(kill_tx),
                killed: self.killed.clone(),
            }),
        })
    }
}

struct FakeChild {
    exit: Option<oneshot::Receiver<ExitInfo>>,
    kill: Option<oneshot::Sender<()>>,
    killed: Arc<AtomicBool>,
}

impl ChildProcess for FakeChild {
    fn id(&self) -> Option<u32> {
        Some(4242)
    }

    fn wait(&mut self) -> BoxedIo<'_, ExitInfo> {
        Box::pin(async move {
            let rx = self
                .exit
                .as_mut()
                .ok_or_else(|| io::Error::other("already reaped"))?;
            let info = rx.await.map_err(|_| io::Error::other("fake process vanished"))?;
            self.exit = None;
            Ok(info)
        })
    }

    fn kill(&mut self) -> BoxedIo<'_, ()> {
        Box::pin(async move {
            self.killed.store(true, Ordering::SeqCst);
            if let Some(tx) = self.kill.take() {
                let _ = tx.send(());
            }
            Ok(())
        })
    }
}
