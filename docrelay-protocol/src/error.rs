//! Protocol and validation error types.

use crate::action::{Action, OptionField};
use crate::step::Step;
use thiserror::Error;

/// Errors that break the lock-step exchange.
///
/// Every variant is fatal to the session: neither side attempts to
/// resynchronize after one of these.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed size field: {0:?}")]
    MalformedSize(String),

    #[error("size {0} does not fit in a 16-byte field")]
    SizeOverflow(u64),

    #[error("expected {expected} after {step}, got {got:?}")]
    UnexpectedAck {
        step: Step,
        expected: &'static str,
        got: String,
    },

    #[error("connection aborted during {step}: {detail}")]
    ConnectionAborted { step: Step, detail: String },

    #[error("timed out during {step}")]
    Timeout { step: Step },

    #[error("unknown action: {0:?}")]
    UnknownAction(String),

    #[error("invalid UTF-8 in token")]
    InvalidUtf8,

    #[error("declared payload of {size} bytes exceeds limit of {max}")]
    PayloadTooLarge { size: u64, max: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("local I/O error: {0}")]
    Local(std::io::Error),
}

impl ProtocolError {
    /// Returns whether this error came from the network rather than from a
    /// peer that spoke the protocol incorrectly.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ProtocolError::ConnectionAborted { .. }
                | ProtocolError::Timeout { .. }
                | ProtocolError::Io(_)
        )
    }

    /// Builds a `ConnectionAborted` for a zero-byte read at `step`.
    pub fn closed(step: Step) -> Self {
        ProtocolError::ConnectionAborted {
            step,
            detail: "peer closed the connection".to_string(),
        }
    }
}

/// Request validation failures.
///
/// The initiator checks these before anything is sent; the responder
/// re-checks them on what it actually received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(OptionField),

    #[error("rotation angle must be an integer multiple of 90, got {0:?}")]
    InvalidAngle(String),

    #[error("unknown page number position {0:?}")]
    InvalidPosition(String),

    #[error("merge requires at least two valid files (found {0})")]
    TooFewMergeInputs(usize),

    #[error("unsupported action {0:?}")]
    UnsupportedAction(String),

    #[error("invalid page specification {spec:?}: {reason}")]
    InvalidPageSpec { spec: String, reason: String },

    #[error("options for {given} cannot be used with action {action}")]
    OptionMismatch { action: Action, given: &'static str },

    #[error("input file not found or invalid: {0}")]
    MissingInput(String),
}
