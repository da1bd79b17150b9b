/*!
`locate.rs`

Implements `xscan-xss locate`: show where xscan was found and which
directory scans will run in.

JSON Output:
{
  "status": "ok",
  "executable": "/opt/xscan/xscan",
  "working_dir": "/opt/xscan",
  "resolved": true
}
*/

use anyhow::Result;
use clap::Args;

use crate::cmd::format::{Role, StyleOptions, box_header, color, emoji};
use crate::cmd::shared::{GlobalOptions, ScanContext};
use crate::locator::ExecutableRef;

#[derive(Args, Debug)]
pub struct LocateArgs {
    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute_locate(args: LocateArgs, opts: &GlobalOptions) -> Result<()> {
    let ctx = ScanContext::bootstrap(opts)?;
    if args.json {
        let value = locate_json(&ctx.executable);
        println!(
            "{}",
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
        );
        return Ok(());
    }

    let style = StyleOptions::detect();
    let (tag, role, note) = if ctx.executable.is_resolved() {
        ("success", Role::Success, "found on the search path")
    } else {
        (
            "warn",
            Role::Warning,
            "not found; the OS will search PATH at spawn time",
        )
    };
    println!(
        "{}",
        box_header(
            format!("{} xscan", emoji(tag, &style)),
            Some(color(role, note, &style)),
            &style
        )
    );
    println!("executable : {}", ctx.executable.path.display());
    println!(
        "{} working dir: {}",
        emoji("folder", &style),
        ctx.executable.working_dir.display()
    );
    Ok(())
}

fn locate_json(exe: &ExecutableRef) -> serde_json::Value {
    serde_json::json!({
        "status": "ok",
        "executable": exe.path.to_string_lossy(),
        "working_dir": exe.working_dir.to_string_lossy(),
        "resolved": exe.is_resolved(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn json_reports_fallback_as_unresolved() {
        let v = locate_json(&ExecutableRef::bare("xscan"));
        assert_eq!(v["executable"], "xscan");
        assert_eq!(v["resolved"], false);
    }

    #[test]
    fn json_reports_found_path_as_resolved() {
        let exe = ExecutableRef {
            path: PathBuf::from("/opt/xscan/xscan"),
            working_dir: PathBuf::from("/opt/xscan"),
            resolved: true,
        };
        let v = locate_json(&exe);
        assert_eq!(v["working_dir"], "/opt/xscan");
        assert_eq!(v["resolved"], true);
    }

    #[test]
    fn absolute_fallback_is_still_unresolved() {
        let v = locate_json(&ExecutableRef::bare("/opt/missing/xscan"));
        assert_eq!(v["executable"], "/opt/missing/xscan");
        assert_eq!(v["resolved"], false);
    }
}
