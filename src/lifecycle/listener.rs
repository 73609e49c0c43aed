//! Signal listener bridging SIGINT/SIGTERM into a termination scope

use std::future::Future;
use std::sync::Arc;

use nix::sys::signal::Signal;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::termination::{TerminationDescriptor, TerminationState};

/// Subscribed interrupt and termination signal streams
pub struct ShutdownSignal {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    /// Subscribe to SIGINT and SIGTERM
    ///
    /// Must be called from within a Tokio runtime.
    pub fn register() -> std::io::Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
        })
    }

    /// Wait for the next shutdown signal
    pub async fn recv(&mut self) -> Option<Signal> {
        tokio::select! {
            received = self.sigterm.recv() => {
                debug!("received SIGTERM");
                received.map(|_| Signal::SIGTERM)
            }
            received = self.sigint.recv() => {
                debug!("received SIGINT");
                received.map(|_| Signal::SIGINT)
            }
        }
    }
}

/// Background task feeding received signals into one scope's state
pub struct SignalListener {
    state: Arc<TerminationState>,
    token: CancellationToken,
}

impl SignalListener {
    pub fn new(state: Arc<TerminationState>) -> Self {
        let token = state.token().clone();
        Self { state, token }
    }

    /// Subscribe to OS signals and run the listener on the current runtime
    ///
    /// Subscription happens before this returns so no signal delivered after
    /// the scope opens falls through to the default disposition. Tokio's
    /// process-wide handler stays installed after the listener exits, so
    /// SIGINT/SIGTERM are absorbed from then on, not fatal.
    pub fn spawn(self) {
        match ShutdownSignal::register() {
            Ok(mut signals) => {
                tokio::spawn(async move { self.run(signals.recv()).await });
            }
            Err(e) => {
                warn!(?e, "failed to subscribe to shutdown signals");
            }
        }
    }

    /// Wait for either the scope's cancellation or a signal
    ///
    /// Cancellation means another writer already terminated the scope, so the
    /// listener leaves without writing. Dropping the streams afterwards only
    /// stops delivery to this listener; the OS disposition is not restored.
    pub async fn run<F>(self, next_signal: F)
    where
        F: Future<Output = Option<Signal>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                debug!("scope cancelled, signal listener exiting");
            }
            received = next_signal => match received {
                Some(sig) => {
                    info!(signal = %sig, "shutdown signal received");
                    self.state.offer(TerminationDescriptor::from_signal(sig));
                }
                None => {
                    warn!("signal stream closed, signal listener exiting");
                }
            },
        }
    }
}
