//! Shutdown resolution
//!
//! Resolves whatever a termination scope recorded into a single descriptor
//! and hands it to the caller exactly once. Panics raised by the supervised
//! body are translated into descriptors before resolution.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use futures_util::FutureExt;
use tracing::{debug, error, info};

use crate::termination::{TerminationDescriptor, EXIT_FAILURE};

use super::scope::Scope;

/// Payload of a panic captured with `catch_unwind`
pub type PanicPayload = Box<dyn Any + Send + 'static>;

/// Resolve the outcome of `scope` and pass it to `handler`
///
/// A captured panic is first offered to the scope as an exit-code-1
/// descriptor. The slot is then drained without blocking: a recorded
/// descriptor is handed to `handler`; a scope cancelled without a recorded
/// descriptor resolves to a SIGTERM-equivalent "process terminated"; an
/// untouched scope resolves to the default descriptor. `handler` always runs
/// exactly once and its result is returned.
///
/// # Panics
///
/// Panics if `scope` is not a termination scope.
pub fn resolve_shutdown<F, R>(scope: &Scope, panic: Option<PanicPayload>, handler: F) -> R
where
    F: FnOnce(TerminationDescriptor) -> R,
{
    let state = scope.termination_state();

    if let Some(payload) = panic {
        let descriptor = TerminationDescriptor::from_panic(payload.as_ref());
        error!(%descriptor, "recovered panic");
        state.offer(descriptor);
    }

    let descriptor = match state.take() {
        Some(descriptor) => descriptor,
        None if scope.is_cancelled() => {
            debug!("scope cancelled without a recorded descriptor");
            TerminationDescriptor::terminated()
        }
        None => TerminationDescriptor::default(),
    };

    info!(%descriptor, "shutdown resolved");
    handler(descriptor)
}

/// Run `body` under `scope` and resolve its outcome
///
/// An error returned by the body requests termination with exit code 1; a
/// panic is caught and translated. Neither propagates past this call.
pub async fn supervise<B, F, R>(scope: &Scope, body: B, handler: F) -> R
where
    B: Future<Output = anyhow::Result<()>>,
    F: FnOnce(TerminationDescriptor) -> R,
{
    let panic = match AssertUnwindSafe(body).catch_unwind().await {
        Ok(result) => {
            settle_body(scope, result);
            None
        }
        Err(payload) => Some(payload),
    };

    resolve_shutdown(scope, panic, handler)
}

/// Blocking counterpart of [`supervise`] for synchronous bodies
pub fn supervise_blocking<B, F, R>(scope: &Scope, body: B, handler: F) -> R
where
    B: FnOnce() -> anyhow::Result<()>,
    F: FnOnce(TerminationDescriptor) -> R,
{
    let panic = match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => {
            settle_body(scope, result);
            None
        }
        Err(payload) => Some(payload),
    };

    resolve_shutdown(scope, panic, handler)
}

fn settle_body(scope: &Scope, result: anyhow::Result<()>) {
    if let Err(e) = result {
        error!(error = %format!("{:#}", e), "supervised body failed");
        scope.terminate(e, EXIT_FAILURE);
    }
}
