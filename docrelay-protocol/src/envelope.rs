//! Result envelope: the server-to-client leg of a session.
//!
//! ```text
//! name ──ACK_OUT_FILENAME──> size (16 bytes) ──ACK_OUT_SIZE──> one of:
//!
//!   size > 0                       exactly `size` payload bytes
//!   size == 0, name has "error_"   one unframed error block (<= 4096 bytes)
//!   size == 0, otherwise           nothing: an empty success
//! ```

use crate::MAX_ERROR_MESSAGE_LEN;

/// Substring that marks a result name as an error sentinel.
pub const SENTINEL_MARKER: &str = "error_";

/// Longest slice of an engine error forwarded to the client.
pub const MAX_ERROR_DETAIL_CHARS: usize = 200;

/// Sentinel names the responder uses to signal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSentinel {
    /// Validation or engine failure.
    Processing,
    /// The engine returned but its output is missing.
    FileNotFound,
}

impl ErrorSentinel {
    pub fn file_name(&self) -> &'static str {
        match self {
            ErrorSentinel::Processing => "error_processing.bin",
            ErrorSentinel::FileNotFound => "error_file_not_found.bin",
        }
    }
}

/// How the initiator must treat what follows the size field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    /// `size` bytes of result follow.
    Payload,
    /// Valid result with no bytes; nothing follows.
    Empty,
    /// An error block follows.
    Failure,
}

/// Name and size announced before the result body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub name: String,
    pub size: u64,
}

impl EnvelopeHeader {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }

    /// Header announcing a failure.
    pub fn failure(sentinel: ErrorSentinel) -> Self {
        Self::new(sentinel.file_name(), 0)
    }

    pub fn kind(&self) -> EnvelopeKind {
        if self.size > 0 {
            EnvelopeKind::Payload
        } else if is_sentinel(&self.name) {
            EnvelopeKind::Failure
        } else {
            EnvelopeKind::Empty
        }
    }
}

/// Case-insensitive check for the error marker.
pub fn is_sentinel(name: &str) -> bool {
    name.to_ascii_lowercase().contains(SENTINEL_MARKER)
}

/// Message for [`ErrorSentinel::Processing`].
pub fn processing_failure_message(action: &str, detail: &str) -> String {
    let detail: String = detail.chars().take(MAX_ERROR_DETAIL_CHARS).collect();
    format!(
        "ERROR: Server failed during action '{}'. Check server logs. Details: {}",
        action, detail
    )
}

/// Message for [`ErrorSentinel::FileNotFound`].
pub fn missing_output_message(detail: &str) -> String {
    format!("ERROR: File not found on server. {}", detail)
}

/// Cuts `message` to fit the error block without splitting a character.
pub fn truncate_error_block(message: &str) -> &str {
    if message.len() <= MAX_ERROR_MESSAGE_LEN {
        return message;
    }
    let mut end = MAX_ERROR_MESSAGE_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    &message[..end]
}

/// Text the initiator surfaces for a failure envelope.
///
/// An empty block still means failure; the sentinel name stands in.
pub fn describe_failure(name: &str, block: &[u8]) -> String {
    let text = String::from_utf8_lossy(block);
    let text = text.trim();
    if text.is_empty() {
        format!("Server indicated an error ({}).", name)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(EnvelopeHeader::new("a.pdf", 10).kind(), EnvelopeKind::Payload);
        assert_eq!(EnvelopeHeader::new("a.pdf", 0).kind(), EnvelopeKind::Empty);
        assert_eq!(
            EnvelopeHeader::new("error_processing.bin", 0).kind(),
            EnvelopeKind::Failure
        );
        assert_eq!(
            EnvelopeHeader::new("ERROR_custom.bin", 0).kind(),
            EnvelopeKind::Failure
        );
    }

    #[test]
    fn test_sentinel_name_with_payload_is_success() {
        // A non-empty result is never a failure, whatever its name.
        let header = EnvelopeHeader::new("error_log_report.pdf", 512);
        assert_eq!(header.kind(), EnvelopeKind::Payload);
    }

    #[test]
    fn test_failure_headers() {
        for sentinel in [ErrorSentinel::Processing, ErrorSentinel::FileNotFound] {
            let header = EnvelopeHeader::failure(sentinel);
            assert_eq!(header.size, 0);
            assert_eq!(header.kind(), EnvelopeKind::Failure);
        }
    }

    #[test]
    fn test_processing_message_truncates_detail() {
        let detail = "x".repeat(500);
        let msg = processing_failure_message("split", &detail);
        assert!(msg.starts_with("ERROR: Server failed during action 'split'."));
        assert!(msg.ends_with(&"x".repeat(MAX_ERROR_DETAIL_CHARS)));
        assert!(!msg.contains(&"x".repeat(MAX_ERROR_DETAIL_CHARS + 1)));
    }

    #[test]
    fn test_truncate_error_block_respects_char_boundary() {
        let short = "boom";
        assert_eq!(truncate_error_block(short), short);

        // 3-byte chars never align with 4096
        let long = "€".repeat(2000);
        let cut = truncate_error_block(&long);
        assert!(cut.len() <= MAX_ERROR_MESSAGE_LEN);
        assert_eq!(cut.len() % 3, 0);
    }

    #[test]
    fn test_describe_failure() {
        assert_eq!(
            describe_failure("error_processing.bin", b"ERROR: bad password"),
            "ERROR: bad password"
        );
        assert_eq!(
            describe_failure("error_processing.bin", b""),
            "Server indicated an error (error_processing.bin)."
        );
        assert_eq!(describe_failure("error_x.bin", &[0xff, b'o', b'k']), "\u{fffd}ok");
    }
}
