//! # docrelay-engine
//!
//! Document processing behind the docrelay server.
//!
//! This crate provides:
//! - The `ProcessingEngine` capability the server invokes once per session
//! - Page specification parsing for split and rotate
//! - A lopdf-backed engine for the PDF-native actions
//! - An engine that runs configured external commands
//! - A routing engine that picks the first engine supporting an action

pub mod builtin;
pub mod engine;
pub mod error;
pub mod external;
pub mod pages;
pub mod router;

pub use builtin::LopdfEngine;
pub use engine::{ProcessOutput, ProcessRequest, ProcessingEngine};
pub use error::ProcessingError;
pub use external::CommandEngine;
pub use pages::PageRange;
pub use router::RoutingEngine;
