//! Connection management.

use crate::error::ClientError;
use docrelay_protocol::{Timeouts, Wire, DEFAULT_CHUNK_SIZE, DEFAULT_PORT};
use std::time::Duration;
use tokio::net::TcpStream;

/// Minimum chunk size (1 KiB).
pub const MIN_CHUNK_SIZE: usize = 1024;

/// Maximum chunk size (16 MiB).
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address as `host:port`.
    pub addr: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Per-step deadlines once connected.
    pub timeouts: Timeouts,
    /// Bytes moved per read or write during bulk transfer.
    pub chunk_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(format!("127.0.0.1:{}", DEFAULT_PORT))
    }
}

impl ConnectionConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: Duration::from_secs(30),
            timeouts: Timeouts::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Bounds bulk transfers and the wait for the server to finish processing.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.operation = timeout;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);
        self
    }
}

/// Opens a connection and wraps it for the exchange.
pub async fn connect(config: &ConnectionConfig) -> Result<Wire<TcpStream>, ClientError> {
    tracing::debug!("Connecting to {}...", config.addr);

    let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&config.addr))
        .await
        .map_err(|_| {
            tracing::debug!("Connection timeout");
            ClientError::ConnectFailed {
                addr: config.addr.clone(),
                detail: format!("timed out after {:?}", config.connect_timeout),
            }
        })?
        .map_err(|e| {
            tracing::debug!("Connection failed: {}", e);
            ClientError::ConnectFailed {
                addr: config.addr.clone(),
                detail: e.to_string(),
            }
        })?;
    let _ = stream.set_nodelay(true);

    tracing::debug!("Connected to {}", config.addr);
    Ok(Wire::new(stream, config.timeouts).with_chunk_size(config.chunk_size))
}
