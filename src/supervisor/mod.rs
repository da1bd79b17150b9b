/*!
Process supervision for xscan scans.

Flow of one `Supervisor::run_scan` call:
  1. Check extra args against the optional flag allow-list.
  2. Build `[subcommand, "--url", url, ...extra]` and launch in the
     executable's directory.
  3. Drain stdout and stderr in two spawned tasks.
  4. Reap the child ("exited", logged only), then join both drains ("closed").
  5. Map the result to exactly one `ScanOutcome`.

A deadline or cancellation interrupts steps 3-4: a running child is killed,
the drains get a short grace period to pick up what was already written, and
are then stopped with their partial output. The outcome is a `Timeout` /
`Cancelled` failure. A child that exited while another process still holds one
of its pipes is interrupted the same way, without the kill.

The supervisor never returns an error; every failure mode is a
`ScanOutcome::Failure`.
*/

pub mod launcher;
pub mod stream;
#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::locator::ExecutableRef;
pub use launcher::{ExitInfo, LaunchedProcess, ProcessLauncher, ScanCommand, TokioLauncher};
use stream::{StreamSource, decode, drain};

pub const DEFAULT_SUBCOMMAND: &str = "spider";

/// Substituted for an empty stdout on success.
pub const EMPTY_STDOUT_PLACEHOLDER: &str = "(no standard output)";

/// How long drains may keep collecting after an interruption.
pub const DRAIN_GRACE: Duration = Duration::from_secs(2);

/* ---- Data Model ---- */

/// Arguments of one scan invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    /// Target URL (absolute)
    pub url: String,
    /// Extra `xscan spider` arguments, passed through verbatim (optional)
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl ScanRequest {
    pub fn new(url: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            url: url.into(),
            extra_args,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Ran to completion with a non-zero or missing exit code.
    NonZeroExit,
    /// Could not be started at all.
    Spawn,
    Timeout,
    Cancelled,
    /// Refused by the extra-argument allow-list before launching.
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanFailure {
    pub kind: FailureKind,
    pub exit_code: Option<i32>,
    pub signal: Option<String>,
    pub stderr: String,
    pub diagnostic: String,
}

impl ScanFailure {
    fn exited(exit: ExitInfo, stderr: String) -> Self {
        let code = exit
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "none".to_string());
        let diagnostic = match &exit.signal {
            Some(sig) => format!("xscan failed (exit code {code}, signal {sig})"),
            None => format!("xscan failed (exit code {code})"),
        };
        Self {
            kind: FailureKind::NonZeroExit,
            exit_code: exit.code,
            signal: exit.signal,
            stderr,
            diagnostic,
        }
    }

    fn spawn(err: &std::io::Error) -> Self {
        Self {
            kind: FailureKind::Spawn,
            exit_code: None,
            signal: None,
            stderr: String::new(),
            diagnostic: format!("failed to spawn xscan: {err}"),
        }
    }

    fn interrupted(kind: FailureKind, diagnostic: String, stderr: String) -> Self {
        Self {
            kind,
            exit_code: None,
            signal: None,
            stderr,
            diagnostic,
        }
    }

    /// Caller-facing text: diagnostic followed by the captured stderr.
    pub fn message(&self) -> String {
        if self.stderr.is_empty() {
            self.diagnostic.clone()
        } else {
            format!("{}\n{}", self.diagnostic, self.stderr)
        }
    }
}

impl fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Terminal result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanOutcome {
    Success {
        stdout: String,
        stderr: Option<String>,
    },
    Failure(ScanFailure),
}

impl ScanOutcome {
    fn success(stdout: String, stderr: String) -> Self {
        let stdout = if stdout.is_empty() {
            EMPTY_STDOUT_PLACEHOLDER.to_string()
        } else {
            stdout
        };
        let stderr = (!stderr.is_empty()).then_some(stderr);
        ScanOutcome::Success { stdout, stderr }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ScanOutcome::Success { .. })
    }
}

/* ---- Policy ---- */

/// Per-server scan settings.
#[derive(Debug, Clone)]
pub struct ScanPolicy {
    pub subcommand: String,
    pub timeout: Option<Duration>,
    /// Empty = every extra argument is allowed.
    pub allowed_arg_prefixes: Vec<String>,
    pub drain_grace: Duration,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            subcommand: DEFAULT_SUBCOMMAND.to_string(),
            timeout: None,
            allowed_arg_prefixes: Vec::new(),
            drain_grace: DRAIN_GRACE,
        }
    }
}

impl ScanPolicy {
    /// Flag-looking extras must match an allowed prefix; values pass through.
    pub fn check_extra_args(&self, extra_args: &[String]) -> Result<(), ScanFailure> {
        if self.allowed_arg_prefixes.is_empty() {
            return Ok(());
        }
        for arg in extra_args.iter().filter(|a| a.starts_with('-')) {
            let allowed = self
                .allowed_arg_prefixes
                .iter()
                .any(|p| arg.starts_with(p.as_str()));
            if !allowed {
                return Err(ScanFailure::interrupted(
                    FailureKind::Rejected,
                    format!(
                        "extra argument '{arg}' is not permitted (allowed prefixes: {})",
                        self.allowed_arg_prefixes.join(", ")
                    ),
                    String::new(),
                ));
            }
        }
        Ok(())
    }
}

/// `[subcommand, "--url", url, ...extra]`, extras verbatim and in order.
pub fn build_args(subcommand: &str, request: &ScanRequest) -> Vec<String> {
    let mut args = Vec::with_capacity(3 + request.extra_args.len());
    args.push(subcommand.to_string());
    args.push("--url".to_string());
    args.push(request.url.clone());
    args.extend(request.extra_args.iter().cloned());
    args
}

/* ---- Supervisor ---- */

enum Interruption {
    Timeout(Duration),
    Cancelled,
}

#[derive(Clone)]
pub struct Supervisor {
    launcher: Arc<dyn ProcessLauncher>,
    policy: ScanPolicy,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    pub fn new(launcher: Arc<dyn ProcessLauncher>, policy: ScanPolicy) -> Self {
        Self { launcher, policy }
    }

    pub fn with_tokio(policy: ScanPolicy) -> Self {
        Self::new(Arc::new(TokioLauncher), policy)
    }

    pub fn command_for(&self, exe: &ExecutableRef, request: &ScanRequest) -> ScanCommand {
        ScanCommand {
            program: exe.path.clone(),
            args: build_args(&self.policy.subcommand, request),
            cwd: exe.working_dir.clone(),
        }
    }

    /// Run one scan to its single outcome.
    ///
    /// `request.url` is expected to be validated by the caller.
    pub async fn run_scan(
        &self,
        exe: &ExecutableRef,
        request: &ScanRequest,
        cancel: &CancellationToken,
    ) -> ScanOutcome {
        if let Err(rejected) = self.policy.check_extra_args(&request.extra_args) {
            warn!(reason = %rejected.diagnostic, "scan rejected");
            return ScanOutcome::Failure(rejected);
        }

        let command = self.command_for(exe, request);
        info!(
            command = %command.display(),
            cwd = %command.cwd.display(),
            "launching xscan"
        );

        let LaunchedProcess {
            stdout,
            stderr,
            mut child,
        } = match self.launcher.launch(&command) {
            Ok(launched) => launched,
            Err(e) => {
                error!(error = %e, "failed to spawn xscan");
                return ScanOutcome::Failure(ScanFailure::spawn(&e));
            }
        };
        debug!(pid = ?child.id(), "xscan started");

        let drain_stop = CancellationToken::new();
        let _stop_drains_on_drop = drain_stop.clone().drop_guard();
        let stdout_task = tokio::spawn(drain(stdout, StreamSource::Stdout, drain_stop.clone()));
        let stderr_task = tokio::spawn(drain(stderr, StreamSource::Stderr, drain_stop.clone()));

        // Sole owner of the drain handles; resumed, never restarted.
        let closed = async move {
            let (out, err) = tokio::join!(stdout_task, stderr_task);
            (joined(out, StreamSource::Stdout), joined(err, StreamSource::Stderr))
        };
        tokio::pin!(closed);
        let deadline = expiry(self.policy.timeout);
        tokio::pin!(deadline);

        let reaped = tokio::select! {
            exit = child.wait() => Ok(exit),
            after = &mut deadline => Err(Interruption::Timeout(after)),
            _ = cancel.cancelled() => Err(Interruption::Cancelled),
        };
        let exit = match reaped {
            Ok(exit) => exit,
            Err(interruption) => {
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill xscan");
                }
                let stderr = self.salvage(closed.as_mut(), &drain_stop).await;
                return Self::interrupted(interruption, None, stderr);
            }
        };
        match &exit {
            Ok(info) => info!(code = ?info.code, signal = ?info.signal, "xscan exited"),
            Err(e) => warn!(error = %e, "failed to reap xscan"),
        }

        let streams = tokio::select! {
            streams = &mut closed => Ok(streams),
            after = &mut deadline => Err(Interruption::Timeout(after)),
            _ = cancel.cancelled() => Err(Interruption::Cancelled),
        };
        match streams {
            Ok((out, err)) => Self::resolve(exit, out, err),
            Err(interruption) => {
                warn!("xscan exited but its output is still held open by another process");
                let stderr = self.salvage(closed.as_mut(), &drain_stop).await;
                Self::interrupted(interruption, exit.ok(), stderr)
            }
        }
    }

    fn resolve(exit: std::io::Result<ExitInfo>, stdout: String, stderr: String) -> ScanOutcome {
        let exit = exit.unwrap_or_default();
        debug!(
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            "xscan output streams closed"
        );
        if exit.success() {
            ScanOutcome::success(stdout, stderr)
        } else {
            ScanOutcome::Failure(ScanFailure::exited(exit, stderr))
        }
    }

    /// `exit` is known when the child was reaped before the interruption.
    fn interrupted(interruption: Interruption, exit: Option<ExitInfo>, stderr: String) -> ScanOutcome {
        let action = if exit.is_some() {
            "its output streams were abandoned"
        } else {
            "it was terminated"
        };
        let mut failure = match interruption {
            Interruption::Timeout(after) => {
                warn!(timeout_secs = after.as_secs_f64(), "xscan timed out");
                ScanFailure::interrupted(
                    FailureKind::Timeout,
                    format!("xscan timed out after {}s and {action}", after.as_secs_f64()),
                    stderr,
                )
            }
            Interruption::Cancelled => {
                warn!("xscan scan cancelled");
                ScanFailure::interrupted(
                    FailureKind::Cancelled,
                    format!("xscan scan was cancelled and {action}"),
                    stderr,
                )
            }
        };
        if let Some(exit) = exit {
            failure.exit_code = exit.code;
            failure.signal = exit.signal;
        }
        ScanOutcome::Failure(failure)
    }

    /// Let the drains pick up what is already buffered, then stop them.
    ///
    /// Stopped drains still hand back everything they collected.
    async fn salvage<F>(&self, mut closed: Pin<&mut F>, drain_stop: &CancellationToken) -> String
    where
        F: Future<Output = (String, String)>,
    {
        match tokio::time::timeout(self.policy.drain_grace, closed.as_mut()).await {
            Ok((_, stderr)) => stderr,
            Err(_) => {
                debug!("output streams still open after grace period; stopping drains");
                drain_stop.cancel();
                let (_, stderr) = closed.await;
                stderr
            }
        }
    }
}

fn joined(result: Result<Vec<u8>, tokio::task::JoinError>, source: StreamSource) -> String {
    match result {
        Ok(bytes) => decode(bytes),
        Err(e) => {
            warn!(stream = %source, error = %e, "output drain task failed");
            String::new()
        }
    }
}

async fn expiry(timeout: Option<Duration>) -> Duration {
    match timeout {
        Some(after) => {
            tokio::time::sleep(after).await;
            after
        }
        None => std::future::pending().await,
    }
}
