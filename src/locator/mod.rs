//! Executable discovery for xscan.
//!
//! resolve / resolve_with -> ExecutableRef { path, working_dir, resolved }
//! Runs once at startup. Never fails: when the search-path lookup does not
//! produce an existing file we fall back to the bare name and let the OS
//! resolve it at spawn time.

use anyhow::{Context, Result, bail};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{info, warn};

/// Default executable name searched on PATH.
pub const DEFAULT_EXECUTABLE: &str = "xscan";

/// Resolved location of the xscan binary plus the directory scans run in.
///
/// Built once during bootstrap and handed to every invocation read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableRef {
    pub path: PathBuf,
    pub working_dir: PathBuf,
    /// False for the bare-name fallback, whatever the name looks like.
    pub resolved: bool,
}

impl ExecutableRef {
    /// Bare-name fallback: spawn-time PATH search, current directory as cwd.
    pub fn bare(name: &str) -> Self {
        Self {
            path: PathBuf::from(name),
            working_dir: current_dir(),
            resolved: false,
        }
    }

    /// Whether the path was confirmed to exist (vs. the bare-name fallback).
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }
}

impl fmt::Display for ExecutableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (cwd: {})",
            self.path.display(),
            self.working_dir.display()
        )
    }
}

/* ---- Lookup Abstraction ---- */

/// Runs the platform "find command in search path" facility.
///
/// Returns the raw stdout of the lookup command; a non-zero exit is an error.
pub trait PathLookup {
    fn lookup(&self, name: &str) -> Result<String>;
}

/// `where` on Windows hosts, `which` everywhere else.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLookup;

impl SystemLookup {
    pub fn command_name() -> &'static str {
        if cfg!(windows) { "where" } else { "which" }
    }
}

impl PathLookup for SystemLookup {
    fn lookup(&self, name: &str) -> Result<String> {
        let cmd = Self::command_name();
        let output = Command::new(cmd)
            .arg(name)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .with_context(|| format!("failed to run `{cmd} {name}`"))?;
        if !output.status.success() {
            bail!("`{cmd} {name}` exited with {}", output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/* ---- Resolution ---- */

/// Resolve `name` through the host search path.
pub fn resolve(name: &str) -> ExecutableRef {
    resolve_with(&SystemLookup, name)
}

/// Resolve `name` with an explicit lookup implementation.
pub fn resolve_with(lookup: &dyn PathLookup, name: &str) -> ExecutableRef {
    match lookup_existing(lookup, name) {
        Ok(path) => {
            let exe = from_existing_file(&path);
            info!(path = %exe.path.display(), "found {name} on the search path");
            exe
        }
        Err(e) => {
            warn!(
                error = %e,
                "could not locate {name} on the search path; add it to PATH. Falling back to bare name"
            );
            ExecutableRef::bare(name)
        }
    }
}

/// Use an operator-supplied path when it exists, otherwise search for `name`.
pub fn resolve_preferring(explicit: Option<&Path>, name: &str) -> ExecutableRef {
    if let Some(path) = explicit {
        if path.is_file() {
            let exe = from_existing_file(path);
            info!(path = %exe.path.display(), "using configured executable path");
            return exe;
        }
        warn!(
            path = %path.display(),
            "configured executable path does not exist; searching PATH instead"
        );
    }
    resolve(name)
}

fn lookup_existing(lookup: &dyn PathLookup, name: &str) -> Result<PathBuf> {
    let raw = lookup.lookup(name)?;
    let first = raw.lines().next().map(str::trim).unwrap_or_default();
    if first.is_empty() {
        bail!("lookup produced no output");
    }
    let candidate = PathBuf::from(first);
    if !candidate.exists() {
        bail!("lookup result '{}' does not exist", candidate.display());
    }
    Ok(candidate)
}

fn from_existing_file(path: &Path) -> ExecutableRef {
    let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let working_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => current_dir(),
    };
    ExecutableRef {
        path,
        working_dir,
        resolved: true,
    }
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeLookup(std::result::Result<String, &'static str>);

    impl FakeLookup {
        fn output(out: impl Into<String>) -> Self {
            Self(Ok(out.into()))
        }
    }

    impl PathLookup for FakeLookup {
        fn lookup(&self, _name: &str) -> Result<String> {
            match &self.0 {
                Ok(out) => Ok(out.clone()),
                Err(msg) => bail!("{msg}"),
            }
        }
    }

    fn existing_file() -> PathBuf {
        std::env::current_exe().unwrap()
    }

    #[test]
    fn lookup_failure_falls_back_to_bare_name() {
        let exe = resolve_with(&FakeLookup(Err("exit status: 1")), "xscan");
        assert_eq!(exe.path, PathBuf::from("xscan"));
        assert_eq!(exe.working_dir, std::env::current_dir().unwrap());
        assert!(!exe.is_resolved());
    }

    #[test]
    fn missing_candidate_falls_back_to_bare_name() {
        let exe = resolve_with(&FakeLookup::output("/definitely/not/here/xscan\n"), "xscan");
        assert_eq!(exe, ExecutableRef::bare("xscan"));
    }

    #[test]
    fn empty_output_falls_back() {
        let exe = resolve_with(&FakeLookup::output("  \n"), "xscan");
        assert_eq!(exe.path, PathBuf::from("xscan"));
    }

    #[test]
    fn existing_candidate_uses_its_directory() {
        let file = existing_file();
        let out = format!("  {}  \r\n/other/xscan\n", file.display());
        let exe = resolve_with(&FakeLookup::output(out), "xscan");
        assert_eq!(exe.path, file);
        assert_eq!(exe.working_dir, file.parent().unwrap());
        assert!(exe.is_resolved());
    }

    #[test]
    fn absolute_name_that_fails_lookup_is_unresolved() {
        let exe = resolve_with(&FakeLookup(Err("exit status: 1")), "/opt/missing/xscan");
        assert_eq!(exe.path, PathBuf::from("/opt/missing/xscan"));
        assert!(!exe.is_resolved());
    }

    #[test]
    fn explicit_path_wins_when_present() {
        let file = existing_file();
        let exe = resolve_preferring(Some(file.as_path()), "xscan");
        assert_eq!(exe.path, file);
        assert!(exe.is_resolved());
    }

    #[test]
    fn lookup_command_matches_platform() {
        let expected = if cfg!(windows) { "where" } else { "which" };
        assert_eq!(SystemLookup::command_name(), expected);
    }
}
