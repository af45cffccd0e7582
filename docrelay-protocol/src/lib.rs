//! # docrelay-protocol
//!
//! Wire protocol implementation for docrelay.
//!
//! This crate provides:
//! - Fixed-width size fields and raw token framing
//! - ACK tokens and the per-action option negotiation table
//! - The ordered step plan shared by initiator and responder
//! - Timeout-bounded wire channel and chunked bulk transfer
//! - Result envelope classification, including the error sentinel convention
//! - Deterministic packing and extraction of multi-file archives

pub mod ack;
pub mod action;
pub mod archive;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod options;
pub mod step;
pub mod transfer;
pub mod wire;

pub use ack::AckToken;
pub use action::{Action, OptionField, OutputShape};
pub use envelope::{EnvelopeHeader, EnvelopeKind, ErrorSentinel};
pub use error::{ProtocolError, ValidationError};
pub use frame::{decode_size, decode_token, encode_size, encode_token};
pub use options::{OptionSet, Position};
pub use step::{SessionPlan, Step};
pub use wire::{Timeouts, Wire};

/// Default TCP port for the docrelay server.
pub const DEFAULT_PORT: u16 = 65432;

/// Width of every size field on the wire.
pub const SIZE_FIELD_LEN: usize = 16;

/// Default chunk size for bulk transfers (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Upper bound for a single token read (action, filename, option fields, ACKs).
pub const MAX_TOKEN_LEN: usize = 1024;

/// Upper bound for the error-message block that follows an error sentinel.
pub const MAX_ERROR_MESSAGE_LEN: usize = 4096;
