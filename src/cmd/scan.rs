/*!
`scan.rs`

Implements `xscan-xss scan`: run one scan through the same supervisor the
MCP tool uses, without an MCP client. Handy for checking an installation.

  xscan-xss scan --url https://target.example/ [--json] [-- EXTRA_ARGS...]

Ctrl-C cancels the scan and kills xscan.

JSON Output:
{
  "status": "ok" | "error",
  "url": "...",
  "command": "xscan spider --url ...",
  "elapsed_ms": 1234,
  "outcome": { "status": "success", "stdout": "...", "stderr": null }
}
*/

use anyhow::{Context, Result};
use clap::Args;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use url::Url;

use crate::cmd::format::{Role, StyleOptions, box_header, color, emoji, section};
use crate::cmd::shared::{GlobalOptions, ScanContext, new_runtime};
use crate::supervisor::{ScanOutcome, ScanRequest};

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Target URL (absolute)
    #[arg(long, value_name = "URL")]
    pub url: String,

    /// Output JSON
    #[arg(long)]
    pub json: bool,

    /// Extra `xscan spider` arguments, passed through verbatim (after `--`)
    #[arg(last = true, value_name = "EXTRA_ARGS")]
    pub extra_args: Vec<String>,
}

pub fn execute_scan(args: ScanArgs, opts: &GlobalOptions) -> Result<()> {
    let target = target_url(&args.url)?;

    let ctx = ScanContext::bootstrap(opts)?;
    let request = ScanRequest::new(target, args.extra_args.clone());
    let command = ctx.supervisor.command_for(&ctx.executable, &request).display();

    let rt = new_runtime()?;
    let started = Instant::now();
    let outcome = rt.block_on(async {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; cancelling scan");
                on_interrupt.cancel();
            }
        });
        ctx.supervisor
            .run_scan(&ctx.executable, &request, &cancel)
            .await
    });
    let elapsed_ms = started.elapsed().as_millis();

    if args.json {
        let value = outcome_json(&request, &command, elapsed_ms, &outcome);
        println!(
            "{}",
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
        );
    } else {
        print_human(&request, elapsed_ms, &outcome);
    }

    match outcome {
        ScanOutcome::Success { .. } => Ok(()),
        ScanOutcome::Failure(failure) => anyhow::bail!(failure.diagnostic),
    }
}

/// Trimmed target, checked to be an absolute URL.
fn target_url(raw: &str) -> Result<&str> {
    let target = raw.trim();
    Url::parse(target).with_context(|| format!("url must be a valid absolute URL: '{raw}'"))?;
    Ok(target)
}

fn outcome_json(
    request: &ScanRequest,
    command: &str,
    elapsed_ms: u128,
    outcome: &ScanOutcome,
) -> serde_json::Value {
    serde_json::json!({
        "status": if outcome.is_success() { "ok" } else { "error" },
        "url": request.url,
        "command": command,
        "elapsed_ms": elapsed_ms,
        "outcome": outcome,
    })
}

fn print_human(request: &ScanRequest, elapsed_ms: u128, outcome: &ScanOutcome) {
    let style = StyleOptions::detect();
    let subtitle = format!("{} {} • {elapsed_ms} ms", emoji("target", &style), request.url);
    match outcome {
        ScanOutcome::Success { stdout, stderr } => {
            let title = format!("{} Scan completed", emoji("success", &style));
            println!("{}", box_header(title, Some(subtitle), &style));
            println!("{}", section("stdout", stdout, Role::Primary, &style));
            if let Some(stderr) = stderr {
                println!("{}", section("stderr", stderr, Role::Warning, &style));
            }
        }
        ScanOutcome::Failure(failure) => {
            let title = format!("{} Scan failed", emoji("error", &style));
            println!("{}", box_header(title, Some(subtitle), &style));
            println!("{}", color(Role::Error, &failure.diagnostic, &style));
            println!("{}", section("stderr", &failure.stderr, Role::Warning, &style));
        }
    }
}
