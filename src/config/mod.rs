/*!
Server configuration.

Sources (highest priority first):
  1. CLI flags (`--xscan`, `--xscan-path`, `--timeout`, `--allow-arg`)
  2. `XSCAN_PATH` environment variable (executable path only)
  3. `--config` file, YAML (`.yaml` / `.yml`) or JSON by extension
  4. Built-in defaults

Example YAML:

    executable: xscan
    executable_path: /opt/xscan/xscan
    subcommand: spider
    timeout_secs: 1800
    allowed_arg_prefixes: ["--depth", "--json"]
*/

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::locator::DEFAULT_EXECUTABLE;
use crate::supervisor::{DEFAULT_SUBCOMMAND, ScanPolicy};

pub const EXECUTABLE_PATH_ENV: &str = "XSCAN_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Name searched on PATH.
    pub executable: String,
    /// Explicit binary location; skips the PATH search when it exists.
    pub executable_path: Option<PathBuf>,
    pub subcommand: String,
    /// No limit when absent or zero.
    pub timeout_secs: Option<u64>,
    pub allowed_arg_prefixes: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            executable: DEFAULT_EXECUTABLE.to_string(),
            executable_path: None,
            subcommand: DEFAULT_SUBCOMMAND.to_string(),
            timeout_secs: None,
            allowed_arg_prefixes: Vec::new(),
        }
    }
}

/// CLI-level overrides; `None` / empty leaves the lower layer untouched.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub executable: Option<String>,
    pub executable_path: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub allowed_arg_prefixes: Vec<String>,
}

impl ServerConfig {
    /// Parse a config file, choosing YAML or JSON from the extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let lower = path.to_string_lossy().to_ascii_lowercase();
        let config = if lower.ends_with(".yaml") || lower.ends_with(".yml") {
            serde_yaml::from_str(&raw).context("failed to parse YAML config file")?
        } else {
            serde_json::from_str(&raw).context("failed to parse JSON config file")?
        };
        Ok(config)
    }

    /// Defaults, then the optional file, then env, then CLI overrides.
    pub fn load(file: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Ok(env_path) = std::env::var(EXECUTABLE_PATH_ENV)
            && !env_path.trim().is_empty()
        {
            config.executable_path = Some(PathBuf::from(env_path.trim()));
        }
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(exe) = overrides.executable {
            self.executable = exe;
        }
        if let Some(path) = overrides.executable_path {
            self.executable_path = Some(path);
        }
        if let Some(secs) = overrides.timeout_secs {
            self.timeout_secs = Some(secs);
        }
        if !overrides.allowed_arg_prefixes.is_empty() {
            self.allowed_arg_prefixes = overrides.allowed_arg_prefixes;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.executable.trim().is_empty() {
            bail!("executable name cannot be empty");
        }
        if self.subcommand.trim().is_empty() {
            bail!("subcommand cannot be empty");
        }
        if self.allowed_arg_prefixes.iter().any(|p| p.trim().is_empty()) {
            bail!("allowed_arg_prefixes cannot contain empty entries");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn scan_policy(&self) -> ScanPolicy {
        ScanPolicy {
            subcommand: self.subcommand.clone(),
            timeout: self.timeout(),
            allowed_arg_prefixes: self.allowed_arg_prefixes.clone(),
            ..ScanPolicy::default()
        }
    }
}
