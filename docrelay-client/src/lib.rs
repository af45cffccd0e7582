//! # docrelay-client
//!
//! Client library for docrelay.
//!
//! This crate provides:
//! - Local validation and staging of requests, including merge archives
//! - The initiator session: ACK-gated upload and result envelope handling
//! - Result sinks that decide where a delivered file is written
//! - A distinct outcome for every way a request can fail

pub mod client;
pub mod connection;
pub mod error;
pub mod session;
pub mod sink;

pub use client::{Client, Request};
pub use connection::ConnectionConfig;
pub use error::{ClientError, Outcome};
pub use session::{Delivery, Initiator, Upload};
pub use sink::{Decline, ResultSink, SaveAs, SaveInDir};
