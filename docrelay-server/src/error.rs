//! Server error types.

use crate::config::ConfigError;
use docrelay_engine::ProcessingError;
use docrelay_protocol::archive::ArchiveError;
use docrelay_protocol::{ErrorSentinel, ValidationError};
use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] docrelay_protocol::ProtocolError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Processing(#[from] ProcessingError),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("processing timed out after {0} seconds")]
    ProcessingTimeout(u64),

    #[error("server shutting down")]
    ShuttingDown,
}

impl ServerError {
    /// Sentinel to report this error under, when the connection is still
    /// usable. Wire-level failures have none: the session just ends.
    pub fn sentinel(&self) -> Option<ErrorSentinel> {
        match self {
            ServerError::Protocol(_) | ServerError::Config(_) | ServerError::ShuttingDown => None,
            ServerError::Processing(e) => Some(e.sentinel()),
            ServerError::Io(_)
            | ServerError::Validation(_)
            | ServerError::Archive(_)
            | ServerError::ProcessingTimeout(_) => Some(ErrorSentinel::Processing),
        }
    }

    /// Returns whether the client caused this error.
    pub fn is_client_error(&self) -> bool {
        match self {
            ServerError::Validation(_) | ServerError::Archive(_) => true,
            ServerError::Processing(e) => e.is_client_error(),
            ServerError::Protocol(e) => !e.is_network(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrelay_protocol::{ProtocolError, Step};
    use std::path::PathBuf;

    #[test]
    fn test_sentinel_selection() {
        let err = ServerError::from(ValidationError::TooFewMergeInputs(1));
        assert_eq!(err.sentinel(), Some(ErrorSentinel::Processing));

        let err = ServerError::from(ProcessingError::MissingOutput(PathBuf::from("out")));
        assert_eq!(err.sentinel(), Some(ErrorSentinel::FileNotFound));

        let err = ServerError::from(ProtocolError::closed(Step::Payload));
        assert_eq!(err.sentinel(), None);

        assert_eq!(
            ServerError::ProcessingTimeout(600).sentinel(),
            Some(ErrorSentinel::Processing)
        );
    }

    #[test]
    fn test_client_error_classification() {
        assert!(ServerError::from(ValidationError::UnsupportedAction("x".into())).is_client_error());
        assert!(ServerError::from(ProtocolError::MalformedSize("abc".into())).is_client_error());
        assert!(!ServerError::from(ProtocolError::Timeout { step: Step::Size }).is_client_error());
        assert!(!ServerError::ProcessingTimeout(1).is_client_error());
    }
}
