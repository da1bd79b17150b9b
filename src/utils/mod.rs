//! Utilities: logging setup (level from -v/-q, RUST_LOG override).
//!
//! All diagnostics go to stderr; stdout carries the MCP stdio transport.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Logging helpers.
pub mod logging {
    use super::*;

    pub fn derive_level(verbose: u8, quiet: bool) -> LevelFilter {
        if quiet {
            return LevelFilter::ERROR;
        }
        match verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    /// Install the global subscriber. `RUST_LOG`, when set, takes precedence.
    pub fn init_logging(level: LevelFilter) {
        let filter = EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy();
        // A second init (e.g. in tests) is harmless.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_target(false)
            .try_init();
    }
}

pub use logging::{derive_level, init_logging};
