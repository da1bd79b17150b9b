use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;
mod config;
mod locator;
mod mcp;
mod supervisor;
mod utils;

use cmd::{GlobalOptions, LocateArgs, ScanArgs, ServeArgs};

/// xscan-xss - MCP server wrapping the xscan XSS scanner
///
/// Command layout:
///   xscan-xss [serve]                       MCP server on stdio (default)
///   xscan-xss scan --url <URL> [--json] [-- EXTRA_ARGS...]
///   xscan-xss locate [--json]
///
/// The MCP tool `do-xss-xscan` runs `xscan spider --url <url> [extraArgs...]`
/// in the directory xscan was found in and returns its output.
///
/// Global flags / env:
///   -v / -vv          Increase verbosity (logs go to stderr)
///   -q / --quiet      Errors only
///   --config PATH     YAML or JSON config file
///   --xscan NAME      Executable name searched on PATH (default: xscan)
///   --xscan-path PATH Explicit executable path (or XSCAN_PATH env)
///   --timeout SECS    Kill scans running longer than this
///   --allow-arg PFX   Only allow extra flags with these prefixes (repeatable)
///
/// Examples:
///   xscan-xss
///   xscan-xss --timeout 1800 --allow-arg --depth --allow-arg --json
///   xscan-xss scan --url https://target.example/ -- --depth 2
#[derive(Parser, Debug)]
#[command(
    name = "xscan-xss",
    version,
    about = "MCP server exposing xscan XSS scans as the do-xss-xscan tool",
    propagate_version = true,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Silence all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file (YAML or JSON)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Executable name searched on PATH
    #[arg(long = "xscan", global = true, value_name = "NAME")]
    executable: Option<String>,

    /// Explicit path to the xscan executable (falls back to XSCAN_PATH env)
    #[arg(long = "xscan-path", global = true, value_name = "PATH")]
    executable_path: Option<PathBuf>,

    /// Per-scan timeout in seconds (0 = unlimited)
    #[arg(long = "timeout", global = true, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Allowed flag prefix for extraArgs (repeatable; none = allow all)
    #[arg(long = "allow-arg", global = true, value_name = "PREFIX", allow_hyphen_values = true)]
    allow_args: Vec<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the MCP tool over stdio (default)
    Serve(ServeArgs),

    /// Run a single scan and print the result
    Scan(ScanArgs),

    /// Show where xscan was found
    Locate(LocateArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = utils::derive_level(cli.verbose, cli.quiet);
    utils::init_logging(level);

    let opts = GlobalOptions {
        config: cli.config,
        executable: cli.executable,
        executable_path: cli.executable_path,
        timeout_secs: cli.timeout_secs,
        allowed_arg_prefixes: cli.allow_args,
    };

    match cli.command.unwrap_or(Commands::Serve(ServeArgs::default())) {
        Commands::Serve(args) => cmd::execute_serve(args, &opts),
        Commands::Scan(args) => cmd::execute_scan(args, &opts),
        Commands::Locate(args) => cmd::execute_locate(args, &opts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["xscan-xss", "-v"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn scan_collects_extra_args_after_separator() {
        let cli = Cli::try_parse_from([
            "xscan-xss",
            "--allow-arg",
            "--depth",
            "scan",
            "--url",
            "https://t.example/",
            "--",
            "--depth",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.allow_args, vec!["--depth"]);
        let Some(Commands::Scan(args)) = cli.command else {
            panic!("expected scan");
        };
        assert_eq!(args.url, "https://t.example/");
        assert_eq!(args.extra_args, vec!["--depth", "2"]);
    }
}
