//! Lifecycle coordination
//!
//! Scopes, the background signal listener, and shutdown resolution.

mod listener;
mod scope;
mod shutdown;

pub use listener::{ShutdownSignal, SignalListener};
pub use scope::{
    is_termination_scope, is_terminating, open_termination_scope, terminate, terminate_with_code,
    Scope,
};
pub use shutdown::{resolve_shutdown, supervise, supervise_blocking, PanicPayload};
