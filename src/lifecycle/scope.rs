//! Coordination scopes
//!
//! A [`Scope`] is a cancellable lifetime handle threaded explicitly through
//! the program. Scopes opened with [`open_termination_scope`] additionally
//! carry termination state and a background signal listener.

use std::sync::Arc;

use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};
use tracing::debug;

use crate::termination::{Cause, Offer, TerminationDescriptor, TerminationState};

use super::listener::SignalListener;

const NOT_TERMINATION_SCOPE: &str = "scope is not a termination scope";

/// Cancellable lifetime handle, optionally carrying termination state
///
/// Clones and children of a termination scope share a teardown guard:
/// dropping the last of them cancels the scope and stops its listener.
#[derive(Debug, Clone)]
pub struct Scope {
    token: CancellationToken,
    termination: Option<Arc<TerminationState>>,
    teardown: Option<Arc<DropGuard>>,
}

impl Scope {
    /// Create an uncancelled root scope
    pub fn root() -> Self {
        Self::from_token(CancellationToken::new())
    }

    /// Adopt a cancellation token supplied by the host
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            termination: None,
            teardown: None,
        }
    }

    /// Derive a child scope
    ///
    /// The child is cancelled with its parent and inherits the parent's
    /// termination state, if any.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            termination: self.termination.clone(),
            teardown: self.teardown.clone(),
        }
    }

    /// Open a termination scope below this one
    pub fn with_termination(&self) -> Self {
        open_termination_scope(self)
    }

    /// Cancel this scope and its descendants. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until this scope is cancelled
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// The underlying cancellation token
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Tear down the scope, stopping its signal listener
    ///
    /// The listener exits, but the process keeps the SIGINT/SIGTERM handlers
    /// installed by the runtime: later signals are absorbed rather than
    /// falling back to the default action.
    pub fn close(&self) {
        debug!("closing scope");
        self.cancel();
    }

    /// Request termination; see [`terminate`]
    pub fn terminate(&self, cause: impl Into<Cause>, exit_code: i32) -> Offer {
        terminate(self, cause, exit_code)
    }

    pub fn is_terminating(&self) -> bool {
        is_terminating(self)
    }

    /// Misuse is a programming error, so this panics instead of returning
    pub(crate) fn termination_state(&self) -> &Arc<TerminationState> {
        match &self.termination {
            Some(state) => state,
            None => panic!("{}", NOT_TERMINATION_SCOPE),
        }
    }
}

/// Open a termination scope as a cancellable child of `parent`
///
/// Starts a signal listener bound to the new scope's lifetime: it stops
/// when the scope is cancelled, closed, or its last handle is dropped. Must
/// be called from within a Tokio runtime.
pub fn open_termination_scope(parent: &Scope) -> Scope {
    let token = parent.token.child_token();
    let state = Arc::new(TerminationState::new(token.clone()));

    SignalListener::new(Arc::clone(&state)).spawn();
    debug!("termination scope opened");

    Scope {
        teardown: Some(Arc::new(token.clone().drop_guard())),
        token,
        termination: Some(state),
    }
}

/// Request termination of `scope` with `cause` and `exit_code`
///
/// The first request wins; later ones are discarded. The scope is cancelled
/// either way. Safe for concurrent use.
///
/// # Panics
///
/// Panics if `scope` does not descend from [`open_termination_scope`].
pub fn terminate(scope: &Scope, cause: impl Into<Cause>, exit_code: i32) -> Offer {
    let descriptor = TerminationDescriptor::requested(Some(cause.into()), exit_code);
    scope.termination_state().offer(descriptor)
}

/// Request termination without attaching a cause
///
/// # Panics
///
/// Panics if `scope` is not a termination scope.
pub fn terminate_with_code(scope: &Scope, exit_code: i32) -> Offer {
    scope
        .termination_state()
        .offer(TerminationDescriptor::requested(None, exit_code))
}

/// Whether `scope` carries termination state
pub fn is_termination_scope(scope: &Scope) -> bool {
    scope.termination.is_some()
}

/// Whether a termination descriptor is currently recorded for `scope`
///
/// An observation only; it never drains the slot. Scopes without
/// termination state are never terminating.
pub fn is_terminating(scope: &Scope) -> bool {
    scope
        .termination
        .as_ref()
        .is_some_and(|state| state.is_occupied())
}
