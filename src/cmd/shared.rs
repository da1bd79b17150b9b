/*!
shared.rs - bootstrap shared by every subcommand.

Focus:
  - GlobalOptions -> ServerConfig (file + env + flags)
  - resolve the xscan executable exactly once
  - build the Supervisor from the config policy
  - new_runtime() for the sync command entry points
*/

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::config::{Overrides, ServerConfig};
use crate::locator::{self, ExecutableRef};
use crate::supervisor::Supervisor;

/* ---- Data Structures ---- */

/// Global flags collected by `main` and handed to each command.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub executable: Option<String>,
    pub executable_path: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub allowed_arg_prefixes: Vec<String>,
}

/// Everything a command needs to run scans.
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub executable: Arc<ExecutableRef>,
    pub supervisor: Arc<Supervisor>,
}

impl ScanContext {
    /// Load configuration and resolve the executable.
    pub fn bootstrap(opts: &GlobalOptions) -> Result<Self> {
        let config = load_config(opts)?;
        debug!(?config, "effective configuration");
        let executable = locator::resolve_preferring(
            config.executable_path.as_deref(),
            &config.executable,
        );
        let supervisor = Supervisor::with_tokio(config.scan_policy());
        Ok(Self {
            executable: Arc::new(executable),
            supervisor: Arc::new(supervisor),
        })
    }
}

pub fn load_config(opts: &GlobalOptions) -> Result<ServerConfig> {
    let overrides = Overrides {
        executable: opts.executable.clone(),
        executable_path: opts.executable_path.clone(),
        timeout_secs: opts.timeout_secs,
        allowed_arg_prefixes: opts.allowed_arg_prefixes.clone(),
    };
    ServerConfig::load(opts.config.as_deref(), overrides).with_context(|| match &opts.config {
        Some(path) => format!("invalid configuration ({})", path.display()),
        None => "invalid configuration".to_string(),
    })
}

pub fn new_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")
}
