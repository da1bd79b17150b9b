/*!
launcher.rs - process launching seam for the supervisor.

`ProcessLauncher` turns a `ScanCommand` into a running child with its two
output streams detached. The tokio implementation is used in production;
tests substitute scripted fakes.
*/

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};

use tokio::io::AsyncRead;
use tokio::process::Command;

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedIo<'a, T> = Pin<Box<dyn Future<Output = io::Result<T>> + Send + 'a>>;

/// Fully built command line for one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl ScanCommand {
    /// Shell-quoted rendering for log lines.
    pub fn display(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.to_string_lossy().into_owned());
        words.extend(self.args.iter().cloned());
        shell_words::join(words)
    }
}

/// How the child terminated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<String>,
}

impl ExitInfo {
    pub fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal().map(signal_name)
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[cfg(unix)]
fn signal_name(signo: i32) -> String {
    let name = match signo {
        1 => "SIGHUP",
        2 => "SIGINT",
        3 => "SIGQUIT",
        6 => "SIGABRT",
        9 => "SIGKILL",
        11 => "SIGSEGV",
        13 => "SIGPIPE",
        14 => "SIGALRM",
        15 => "SIGTERM",
        _ => return format!("SIG{signo}"),
    };
    name.to_string()
}

/// Handle on a launched child used for reaping and forced termination.
pub trait ChildProcess: Send {
    fn id(&self) -> Option<u32>;
    fn wait(&mut self) -> BoxedIo<'_, ExitInfo>;
    fn kill(&mut self) -> BoxedIo<'_, ()>;
}

/// A started child with its output streams taken out of it.
pub struct LaunchedProcess {
    pub stdout: BoxedReader,
    pub stderr: BoxedReader,
    pub child: Box<dyn ChildProcess>,
}

pub trait ProcessLauncher: Send + Sync {
    /// Start the process. Errors here are spawn-level failures.
    fn launch(&self, command: &ScanCommand) -> io::Result<LaunchedProcess>;
}

/* ---- tokio::process implementation ---- */

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioLauncher;

impl ProcessLauncher for TokioLauncher {
    fn launch(&self, command: &ScanCommand) -> io::Result<LaunchedProcess> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("child stderr was not captured"))?;

        Ok(LaunchedProcess {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            child: Box::new(TokioChild(child)),
        })
    }
}

struct TokioChild(tokio::process::Child);

impl ChildProcess for TokioChild {
    fn id(&self) -> Option<u32> {
        self.0.id()
    }

    fn wait(&mut self) -> BoxedIo<'_, ExitInfo> {
        Box::pin(async move { self.0.wait().await.map(ExitInfo::from_status) })
    }

    fn kill(&mut self) -> BoxedIo<'_, ()> {
        Box::pin(self.0.kill())
    }
}
