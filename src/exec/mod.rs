//! Graceful child processes
//!
//! Commands whose children are stopped with SIGTERM when their scope is
//! cancelled, and whose failures feed back into the scope's termination.

mod command;

pub use command::{exit_code, Command, ExecError};
