/*!
`serve.rs`

Default subcommand: run the MCP server over stdio.

The executable is resolved once here and shared read-only by every tool
call. Only a transport failure ends the process with an error; scan failures
are reported to the client as error tool results.
*/

use anyhow::Result;
use clap::Args;

use crate::cmd::shared::{GlobalOptions, ScanContext, new_runtime};
use crate::mcp::{self, XscanServer};

#[derive(Args, Debug, Default)]
pub struct ServeArgs {}

pub fn execute_serve(_args: ServeArgs, opts: &GlobalOptions) -> Result<()> {
    let ctx = ScanContext::bootstrap(opts)?;
    let server = XscanServer::new(ctx.executable, ctx.supervisor);
    let rt = new_runtime()?;
    rt.block_on(mcp::serve_stdio(server))
}
