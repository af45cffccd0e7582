//! Action vocabulary and the option negotiation table.

use crate::ack::AckToken;
use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Requested transformation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Convert,
    Encrypt,
    Decrypt,
    PdfToJpg,
    PdfToWord,
    PdfToPptx,
    Compress,
    Split,
    Merge,
    Rotate,
    AddNumbers,
}

/// Shape of the result a successful action produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    /// One output file, sent as is.
    Single,
    /// Several output files, packed into one archive before sending.
    Archive,
}

/// An action-specific field exchanged after the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionField {
    Password,
    Ranges,
    Pages,
    Angle,
    Position,
}

impl OptionField {
    /// ACK the receiver answers this field with.
    pub fn ack(&self) -> AckToken {
        match self {
            OptionField::Password => AckToken::Pass,
            OptionField::Ranges => AckToken::Ranges,
            OptionField::Pages => AckToken::Pages,
            OptionField::Angle => AckToken::Angle,
            OptionField::Position => AckToken::Position,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OptionField::Password => "password",
            OptionField::Ranges => "ranges",
            OptionField::Pages => "pages",
            OptionField::Angle => "angle",
            OptionField::Position => "position",
        }
    }
}

impl fmt::Display for OptionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Action {
    pub const ALL: [Action; 11] = [
        Action::Convert,
        Action::Encrypt,
        Action::Decrypt,
        Action::PdfToJpg,
        Action::PdfToWord,
        Action::PdfToPptx,
        Action::Compress,
        Action::Split,
        Action::Merge,
        Action::Rotate,
        Action::AddNumbers,
    ];

    /// Returns the wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Convert => "convert",
            Action::Encrypt => "encrypt",
            Action::Decrypt => "decrypt",
            Action::PdfToJpg => "pdf_to_jpg",
            Action::PdfToWord => "pdf_to_word",
            Action::PdfToPptx => "pdf_to_pptx",
            Action::Compress => "compress",
            Action::Split => "split",
            Action::Merge => "merge",
            Action::Rotate => "rotate",
            Action::AddNumbers => "add_numbers",
        }
    }

    /// Option fields exchanged after the payload, in wire order.
    pub fn option_fields(&self) -> &'static [OptionField] {
        match self {
            Action::Encrypt | Action::Decrypt => &[OptionField::Password],
            Action::Split => &[OptionField::Ranges],
            Action::Rotate => &[OptionField::Pages, OptionField::Angle],
            Action::AddNumbers => &[OptionField::Position],
            Action::Convert
            | Action::PdfToJpg
            | Action::PdfToWord
            | Action::PdfToPptx
            | Action::Compress
            | Action::Merge => &[],
        }
    }

    pub fn output_shape(&self) -> OutputShape {
        match self {
            Action::PdfToJpg | Action::Split => OutputShape::Archive,
            _ => OutputShape::Single,
        }
    }

    /// Whether the uploaded payload is an archive of several inputs.
    pub fn takes_archive_input(&self) -> bool {
        matches!(self, Action::Merge)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == tag)
            .ok_or_else(|| ProtocolError::UnknownAction(tag.to_string()))
    }
}
