//! # docrelay-server
//!
//! TCP server for docrelay.
//!
//! This crate provides:
//! - Layered configuration (defaults, YAML file, environment)
//! - The responder session: ACK-gated upload, option exchange, result envelope
//! - Isolated per-session workspaces with guaranteed cleanup
//! - A concurrent accept loop with a connection cap and graceful shutdown

pub mod config;
pub mod error;
pub mod server;
pub mod session;
pub mod workspace;

pub use config::{Config, ConfigError, EngineConfig, LimitsConfig, NetworkConfig, WorkspaceConfig};
pub use error::ServerError;
pub use server::{Server, ServerConfig, ServerStats};
pub use session::{Session, SessionOutcome};
pub use workspace::SessionWorkspace;
