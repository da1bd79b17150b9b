/*!
Command dispatcher module.

Layout:
  src/cmd/
    mod.rs      (this file: declarations + re-exports)
    serve.rs    (ServeArgs  + execute_serve; default command)
    scan.rs     (ScanArgs   + execute_scan)
    locate.rs   (LocateArgs + execute_locate)
    shared.rs   (GlobalOptions, ScanContext bootstrap, runtime helper)
    format.rs   (human output styling)

Conventions:
  - Each subcommand module exposes exactly one public `execute_*` function
    returning `anyhow::Result<()>`.
  - Argument structs derive `clap::Args` and stay minimal.
  - Bootstrap (config + executable resolution) lives in `shared.rs` so the
    executable is resolved once per process, whatever the command.
*/

pub mod format;
pub mod locate;
pub mod scan;
pub mod serve;
pub mod shared;

pub use locate::{LocateArgs, execute_locate};
pub use scan::{ScanArgs, execute_scan};
pub use serve::{ServeArgs, execute_serve};
pub use shared::GlobalOptions;
