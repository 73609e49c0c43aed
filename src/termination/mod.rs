//! Termination model
//!
//! Descriptors explain why a scope terminated; the state holds the first
//! descriptor written to a scope.

mod descriptor;
mod state;

pub use descriptor::{
    Cause, TerminationDescriptor, TerminationReport, EXIT_FAILURE, EXIT_TERMINATED,
};
pub use state::{Offer, TerminationState};
