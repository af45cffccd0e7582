//! Processing error types.

use docrelay_protocol::envelope::ErrorSentinel;
use docrelay_protocol::{Action, ValidationError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while transforming a document.
///
/// None of these close the connection: the server reports every one of them
/// through the result envelope.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("action '{action}' is not supported by this server")]
    Unsupported { action: Action },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("input PDF has no pages")]
    NoPages,

    #[error("no valid page ranges in {0:?}")]
    NoValidRanges(String),

    #[error("no usable input documents")]
    NoInputs,

    #[error("document is encrypted: {0}")]
    Encrypted(String),

    #[error("command '{program}' failed: {detail}")]
    Command { program: String, detail: String },

    #[error("command '{program}' timed out")]
    CommandTimeout { program: String },

    #[error("output was not created: {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

impl ProcessingError {
    /// Sentinel name the server answers this error with.
    pub fn sentinel(&self) -> ErrorSentinel {
        match self {
            ProcessingError::MissingOutput(_) => ErrorSentinel::FileNotFound,
            _ => ErrorSentinel::Processing,
        }
    }

    /// Returns whether the request itself was at fault rather than the engine.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ProcessingError::Validation(_)
                | ProcessingError::Unsupported { .. }
                | ProcessingError::NoValidRanges(_)
                | ProcessingError::Encrypted(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_mapping() {
        assert_eq!(
            ProcessingError::MissingOutput(PathBuf::from("/tmp/out.pdf")).sentinel(),
            ErrorSentinel::FileNotFound
        );
        assert_eq!(ProcessingError::NoPages.sentinel(), ErrorSentinel::Processing);
        assert_eq!(
            ProcessingError::Unsupported {
                action: Action::PdfToWord
            }
            .sentinel(),
            ErrorSentinel::Processing
        );
    }

    #[test]
    fn test_display() {
        let err = ProcessingError::Unsupported {
            action: Action::PdfToJpg,
        };
        assert_eq!(
            err.to_string(),
            "action 'pdf_to_jpg' is not supported by this server"
        );

        let err = ProcessingError::from(ValidationError::InvalidAngle("45".into()));
        assert!(err.to_string().contains("multiple of 90"));
        assert!(err.is_client_error());

        let err = ProcessingError::MissingOutput(PathBuf::from("out.pdf"));
        assert!(err.to_string().contains("out.pdf"));
        assert!(!err.is_client_error());
    }
}
