//! Acknowledgment tokens.
//!
//! Every data-bearing step is answered by exactly one of these literals
//! before the sender may move on. The literals are wire-compatible with
//! legacy peers; internally they form a closed set so an unexpected reply is
//! always detectable.

use std::fmt;

/// Fixed acknowledgment literal confirming the preceding field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckToken {
    Action,
    Filename,
    Size,
    Pass,
    Ranges,
    Pages,
    Angle,
    Position,
    OutFilename,
    OutSize,
}

impl AckToken {
    /// Every token, in protocol order.
    pub const ALL: [AckToken; 10] = [
        AckToken::Action,
        AckToken::Filename,
        AckToken::Size,
        AckToken::Pass,
        AckToken::Ranges,
        AckToken::Pages,
        AckToken::Angle,
        AckToken::Position,
        AckToken::OutFilename,
        AckToken::OutSize,
    ];

    /// Returns the wire literal.
    pub fn as_str(&self) -> &'static str {
        match self {
            AckToken::Action => "ACK_ACTION",
            AckToken::Filename => "ACK_FILENAME",
            AckToken::Size => "ACK_SIZE",
            AckToken::Pass => "ACK_PASS",
            AckToken::Ranges => "ACK_RANGES",
            AckToken::Pages => "ACK_PAGES",
            AckToken::Angle => "ACK_ANGLE",
            AckToken::Position => "ACK_POSITION",
            AckToken::OutFilename => "ACK_OUT_FILENAME",
            AckToken::OutSize => "ACK_OUT_SIZE",
        }
    }

    pub fn as_bytes(&self) -> &'static [u8] {
        self.as_str().as_bytes()
    }

    /// Matches received bytes against the closed set. Anything else,
    /// including a token with trailing bytes, is `None`.
    pub fn parse(bytes: &[u8]) -> Option<AckToken> {
        Self::ALL.into_iter().find(|ack| ack.as_bytes() == bytes)
    }
}

impl fmt::Display for AckToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
