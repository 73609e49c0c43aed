//! Per-scope termination state
//!
//! Holds at most one descriptor. The first writer wins; later writers are
//! dropped. Every write also cancels the scope. All operations are
//! non-blocking: ownership of the slot is claimed with a compare-and-swap
//! before the descriptor is published, and a drain racing a writer only
//! waits for the cell write itself.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::descriptor::TerminationDescriptor;

const EMPTY: u8 = 0;
const CLAIMED: u8 = 1;
const FILLED: u8 = 2;
const DRAINED: u8 = 3;

/// Outcome of offering a descriptor to the slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// The descriptor was stored
    Accepted,
    /// Another descriptor already occupies (or occupied) the slot
    Discarded,
}

/// Termination state owned by one coordination scope
#[derive(Debug)]
pub struct TerminationState {
    cancel: CancellationToken,
    phase: AtomicU8,
    slot: OnceLock<TerminationDescriptor>,
}

impl TerminationState {
    /// Bind a fresh, empty state to the scope's cancellation token
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            phase: AtomicU8::new(EMPTY),
            slot: OnceLock::new(),
        }
    }

    /// Store `descriptor` if the slot is empty, then cancel the scope
    ///
    /// Safe for any number of concurrent callers. Cancellation happens on
    /// every call; repeated cancels are no-ops. Nothing but the cell write
    /// runs between claiming and publishing the slot.
    pub fn offer(&self, descriptor: TerminationDescriptor) -> Offer {
        match self
            .phase
            .compare_exchange(EMPTY, CLAIMED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                // Only the claiming writer ever initializes the cell.
                let _ = self.slot.set(descriptor);
                self.phase.store(FILLED, Ordering::Release);
                self.cancel.cancel();

                if let Some(descriptor) = self.slot.get() {
                    info!(%descriptor, "termination requested");
                }
                Offer::Accepted
            }
            Err(_) => {
                self.cancel.cancel();
                debug!(%descriptor, "termination already requested, discarding");
                Offer::Discarded
            }
        }
    }

    /// Whether the slot currently holds a descriptor
    pub fn is_occupied(&self) -> bool {
        self.phase.load(Ordering::Acquire) == FILLED
    }

    /// Drain the slot, returning the descriptor once
    ///
    /// Returns `None` when the slot is empty or already drained. A writer
    /// caught between claiming and publishing is waited out; that window
    /// only covers the cell write.
    pub fn take(&self) -> Option<TerminationDescriptor> {
        loop {
            match self.phase.compare_exchange(
                FILLED,
                DRAINED,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return self.slot.get().cloned(),
                Err(CLAIMED) => std::hint::spin_loop(),
                Err(_) => return None,
            }
        }
    }

    /// The cancellation token this state cancels on write
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}
