//! Structured failures surfaced by the relay layer.

use std::fmt;

use crate::relay::ResourceKind;

/// Every failure a relay-layer call can report.
#[derive(Clone, Debug, PartialEq)]
pub enum RelayError {
    /// The wrapper was never bound, or its resource was already destroyed.
    UnboundHandle { kind: ResourceKind },
    /// The wrapper holds a different kind of resource than the call expects.
    TypeMismatch {
        expected: ResourceKind,
        found: ResourceKind,
    },
    /// Misuse of the relay protocol by the calling glue (double bind,
    /// handles from different sessions).
    ProtocolViolation { message: String },
    IndexOutOfRange { index: usize, len: usize },
    /// A native operation failed; the message comes from the engine's error
    /// callback when one was delivered.
    EngineFailure { message: String },
    /// Bytes, hex or text that the codec could not decode.
    MalformedInput { message: String },
}

pub type Result<T> = std::result::Result<T, RelayError>;

/// Message used when the engine signalled failure without calling back.
pub const NO_RESULT: &str = "operation returned no result";

impl RelayError {
    pub fn engine(message: impl Into<String>) -> Self {
        RelayError::EngineFailure {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        RelayError::ProtocolViolation {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        RelayError::MalformedInput {
            message: message.into(),
        }
    }

    /// Reinterpret an engine failure during decoding as malformed input.
    pub(crate) fn into_malformed(self) -> Self {
        match self {
            RelayError::EngineFailure { message } => RelayError::MalformedInput { message },
            other => other,
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::UnboundHandle { kind } => {
                write!(f, "{kind} is not bound to a native resource")
            }
            RelayError::TypeMismatch { expected, found } => {
                write!(f, "expected a {expected} resource, found {found}")
            }
            RelayError::ProtocolViolation { message } => write!(f, "relay protocol violation: {message}"),
            RelayError::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for {len} children")
            }
            RelayError::EngineFailure { message } => write!(f, "engine failure: {message}"),
            RelayError::MalformedInput { message } => write!(f, "malformed input: {message}"),
        }
    }
}

impl std::error::Error for RelayError {}
