//! Termination descriptors
//!
//! A descriptor records why and how a scope terminated: the cause, the
//! exit code the process should use, and the originating OS signal if any.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use nix::sys::signal::Signal;
use serde::Serialize;

/// Exit code used for panics and failed bodies
pub const EXIT_FAILURE: i32 = 1;

/// Exit code of a SIGTERM-terminated process (128 + 15)
pub const EXIT_TERMINATED: i32 = 143;

/// Offset added to a signal number to form its exit code
const SIGNAL_EXIT_BASE: i32 = 128;

/// Shareable error value explaining a termination
///
/// Wraps an `anyhow::Error` behind an `Arc` so descriptors stay cheap to
/// clone. Two causes are equal when they are the same error or render the
/// same message.
#[derive(Clone)]
pub struct Cause(Arc<anyhow::Error>);

impl Cause {
    /// Create a cause from a plain message
    pub fn msg(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self(Arc::new(anyhow::Error::msg(message)))
    }

    /// Access the underlying error
    pub fn error(&self) -> &anyhow::Error {
        &self.0
    }
}

impl From<anyhow::Error> for Cause {
    fn from(err: anyhow::Error) -> Self {
        Self(Arc::new(err))
    }
}

impl From<&'static str> for Cause {
    fn from(message: &'static str) -> Self {
        Self::msg(message)
    }
}

impl From<String> for Cause {
    fn from(message: String) -> Self {
        Self::msg(message)
    }
}

impl PartialEq for Cause {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.to_string() == other.0.to_string()
    }
}

impl Eq for Cause {}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl fmt::Debug for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cause").field(&self.0.to_string()).finish()
    }
}

/// Immutable record of why and how termination was requested
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminationDescriptor {
    cause: Option<Cause>,
    exit_code: i32,
    signal: Option<Signal>,
}

impl TerminationDescriptor {
    /// Descriptor for an explicit termination request
    pub fn requested(cause: Option<Cause>, exit_code: i32) -> Self {
        Self {
            cause,
            exit_code,
            signal: None,
        }
    }

    /// Descriptor for a received OS signal (exit code `128 + signo`)
    pub fn from_signal(signal: Signal) -> Self {
        Self {
            cause: None,
            exit_code: SIGNAL_EXIT_BASE + signal as i32,
            signal: Some(signal),
        }
    }

    /// Descriptor for a recovered panic payload
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        Self::requested(Some(Cause::msg(panic_message(payload))), EXIT_FAILURE)
    }

    /// Descriptor for a scope that was cancelled without an explicit request
    pub fn terminated() -> Self {
        Self::requested(Some(Cause::msg("process terminated")), EXIT_TERMINATED)
    }

    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn signal(&self) -> Option<Signal> {
        self.signal
    }

    /// True for the empty descriptor handed out when nothing terminated
    pub fn is_default(&self) -> bool {
        self.cause.is_none() && self.exit_code == 0 && self.signal.is_none()
    }

    /// Serializable summary for logs and machine-readable output
    pub fn report(&self) -> TerminationReport {
        TerminationReport {
            exit_code: self.exit_code,
            cause: self.cause.as_ref().map(|c| format!("{:#}", c.error())),
            signal: self.signal.map(|s| s.as_str().to_string()),
        }
    }
}

impl fmt::Display for TerminationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exit code {}", self.exit_code)?;
        if let Some(signal) = self.signal {
            write!(f, " (signal {})", signal)?;
        }
        if let Some(cause) = &self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

/// JSON-friendly view of a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminationReport {
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
}

/// Render a panic payload the way the default panic hook does
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
