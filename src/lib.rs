//! graceful: process-wide termination coordination
//!
//! Unifies three termination triggers into one exactly-once outcome:
//! - SIGINT/SIGTERM delivered to the process
//! - explicit termination requests from any task
//! - panics recovered from the supervised body
//!
//! A termination scope records the first descriptor written to it and
//! cancels itself. At shutdown the recorded descriptor (or a default one) is
//! handed to a caller-supplied handler, which typically picks the exit code.
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> { Ok(()) }
//! # #[tokio::main]
//! # async fn main() {
//! let scope = graceful::Scope::root().with_termination();
//! let code = graceful::supervise(&scope, run(), |desc| desc.exit_code()).await;
//! scope.close();
//! std::process::exit(code);
//! # }
//! ```

pub mod config;
pub mod exec;
pub mod lifecycle;
pub mod termination;

pub use lifecycle::{
    is_termination_scope, is_terminating, open_termination_scope, resolve_shutdown, supervise,
    supervise_blocking, terminate, terminate_with_code, Scope,
};
pub use termination::{Cause, TerminationDescriptor};
