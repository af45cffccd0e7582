//! Client error types.

use docrelay_protocol::{ProtocolError, Step, ValidationError};
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not connect to {addr}: {detail}")]
    ConnectFailed { addr: String, detail: String },

    #[error("connection lost: {0}")]
    ConnectionLost(ProtocolError),

    #[error("timed out during {step}")]
    Timeout { step: Step },

    #[error("protocol error: {0}")]
    Protocol(ProtocolError),

    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("server error: {message}")]
    ServerReported { name: String, message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Timeout { step } => ClientError::Timeout { step },
            ProtocolError::Local(e) => ClientError::Io(e),
            e if e.is_network() => ClientError::ConnectionLost(e),
            e => ClientError::Protocol(e),
        }
    }
}

/// What a failed request means to the person who made it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing was exchanged.
    CouldNotConnect,
    /// The exchange broke off part way.
    ConnectionLost,
    /// The server answered with an error message.
    ServerReported,
    /// The caller declined the result.
    Cancelled,
    /// The request was rejected or failed before or after the exchange,
    /// on this machine.
    LocalFailure,
}

impl ClientError {
    pub fn outcome(&self) -> Outcome {
        match self {
            ClientError::ConnectFailed { .. } => Outcome::CouldNotConnect,
            ClientError::ConnectionLost(_) | ClientError::Timeout { .. } | ClientError::Protocol(_) => {
                Outcome::ConnectionLost
            }
            ClientError::ServerReported { .. } => Outcome::ServerReported,
            ClientError::Cancelled => Outcome::Cancelled,
            ClientError::Validation(_) | ClientError::Io(_) => Outcome::LocalFailure,
        }
    }

    /// Returns whether retrying the same request might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.outcome(),
            Outcome::CouldNotConnect | Outcome::ConnectionLost
        )
    }
}
