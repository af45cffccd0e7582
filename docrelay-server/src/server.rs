//! TCP server implementation.

use crate::config::Config;
use crate::error::ServerError;
use crate::session::{Session, SessionOutcome};
use docrelay_engine::ProcessingEngine;
use docrelay_protocol::{Timeouts, DEFAULT_CHUNK_SIZE, DEFAULT_PORT};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Per-step deadlines applied to every session.
    pub timeouts: Timeouts,
    /// Bytes moved per read or write during bulk transfer.
    pub chunk_size: usize,
    /// Directory under which session workspaces are created.
    pub temp_root: PathBuf,
    /// Longest sanitized base name kept from a client filename.
    pub max_base_name_len: usize,
    /// Largest declared payload accepted.
    pub max_payload_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            max_connections: 256,
            timeouts: Timeouts::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            temp_root: std::env::temp_dir(),
            max_base_name_len: 50,
            max_payload_bytes: 2 * 1024 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_temp_root(mut self, temp_root: impl Into<PathBuf>) -> Self {
        self.temp_root = temp_root.into();
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }
}

impl From<&Config> for ServerConfig {
    fn from(config: &Config) -> Self {
        Self {
            bind_addr: config.network.bind_addr,
            max_connections: config.network.max_connections,
            timeouts: config.network.timeouts(),
            chunk_size: config.network.chunk_size,
            temp_root: config.workspace.temp_root.clone(),
            max_base_name_len: config.workspace.max_base_name_len,
            max_payload_bytes: config.limits.max_payload_bytes,
        }
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub connections_rejected: AtomicU64,
    pub sessions_succeeded: AtomicU64,
    pub sessions_failed: AtomicU64,
}

impl ServerStats {
    fn record(&self, result: &Result<SessionOutcome, ServerError>) {
        let counter = match result {
            Ok(outcome) if outcome.is_success() => &self.sessions_succeeded,
            _ => &self.sessions_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Accepts connections and runs one session per connection.
pub struct Server {
    config: Arc<ServerConfig>,
    engine: Arc<dyn ProcessingEngine>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    /// Creates a new server.
    pub fn new(config: ServerConfig, engine: Arc<dyn ProcessingEngine>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config: Arc::new(config),
            engine,
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Runs the server until [`Server::shutdown`] is called.
    pub async fn run(&self) -> Result<(), ServerError> {
        self.run_with_ready(None).await
    }

    /// Like [`Server::run`], reporting the bound address once listening.
    pub async fn run_with_ready(
        &self,
        ready: Option<oneshot::Sender<SocketAddr>>,
    ) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(
            "Server listening on {} (engine: {})",
            local_addr,
            self.engine.name()
        );
        if let Some(ready) = ready {
            let _ = ready.send(local_addr);
        }

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((tcp_stream, addr)) => {
                            if self.stats.connections_active.load(Ordering::Relaxed)
                                >= self.config.max_connections as u64
                            {
                                tracing::warn!("Connection limit reached, rejecting {}", addr);
                                self.stats.connections_rejected.fetch_add(1, Ordering::Relaxed);
                                continue;
                            }

                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);
                            tracing::info!("[{}] connected", addr);

                            let _ = tcp_stream.set_nodelay(true);
                            let config = self.config.clone();
                            let engine = self.engine.clone();
                            let stats = self.stats.clone();
                            let mut conn_shutdown = self.shutdown.subscribe();

                            tokio::spawn(async move {
                                let session = Session::new(tcp_stream, addr, config, engine);
                                let id = session.id();

                                let result = tokio::select! {
                                    result = session.run() => result,
                                    _ = conn_shutdown.recv() => Err(ServerError::ShuttingDown),
                                };

                                stats.record(&result);
                                match &result {
                                    Ok(SessionOutcome::Delivered { name, size }) => {
                                        tracing::info!(session = %id, "[{}] delivered {} ({} bytes)", addr, name, size);
                                    }
                                    Ok(SessionOutcome::Reported { sentinel, .. }) => {
                                        tracing::info!(session = %id, "[{}] reported {}", addr, sentinel.file_name());
                                    }
                                    Err(e) => {
                                        tracing::error!(session = %id, "[{}] session aborted: {}", addr, e);
                                    }
                                }

                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                tracing::info!("[{}] disconnected", addr);
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Stops accepting and aborts sessions in flight.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrelay_engine::{ProcessOutput, ProcessRequest, ProcessingError};
    use docrelay_protocol::{encode_size, Action};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    struct Echo;

    impl ProcessingEngine for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn supports(&self, _action: Action) -> bool {
            true
        }

        fn process(&self, request: &ProcessRequest) -> Result<ProcessOutput, ProcessingError> {
            std::fs::copy(&request.inputs[0], &request.output)?;
            Ok(ProcessOutput::File(request.output.clone()))
        }
    }

    async fn start(temp_root: &std::path::Path) -> (Arc<Server>, SocketAddr) {
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap())
            .with_temp_root(temp_root)
            .with_timeouts(Timeouts {
                handshake: Duration::from_secs(5),
                chunk: Duration::from_secs(5),
                operation: Duration::from_secs(5),
            });
        let server = Arc::new(Server::new(config, Arc::new(Echo)));
        let (tx, rx) = oneshot::channel();
        let runner = server.clone();
        tokio::spawn(async move { runner.run_with_ready(Some(tx)).await });
        (server, rx.await.unwrap())
    }

    async fn expect(stream: &mut TcpStream, token: &str) {
        let mut buf = vec![0u8; token.len()];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, token.as_bytes());
    }

    async fn compress(addr: SocketAddr, filename: &str, payload: &[u8]) -> (String, Vec<u8>) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"compress").await.unwrap();
        expect(&mut stream, "ACK_ACTION").await;
        stream.write_all(filename.as_bytes()).await.unwrap();
        expect(&mut stream, "ACK_FILENAME").await;
        stream
            .write_all(&encode_size(payload.len() as u64).unwrap())
            .await
            .unwrap();
        expect(&mut stream, "ACK_SIZE").await;
        stream.write_all(payload).await.unwrap();

        let mut name = vec![0u8; 1024];
        let n = stream.read(&mut name).await.unwrap();
        name.truncate(n);
        stream.write_all(b"ACK_OUT_FILENAME").await.unwrap();
        let mut field = [0u8; 16];
        stream.read_exact(&mut field).await.unwrap();
        stream.write_all(b"ACK_OUT_SIZE").await.unwrap();
        let mut body = Vec::new();
        stream.read_to_end(&mut body).await.unwrap();
        (String::from_utf8(name).unwrap(), body)
    }

    #[tokio::test]
    async fn test_server_not_running_before_start() {
        let server = Server::new(ServerConfig::default(), Arc::new(Echo));
        assert!(!server.is_running());
        assert_eq!(server.config().bind_addr.port(), 65432);
    }

    #[tokio::test]
    async fn test_concurrent_sessions_same_filename() {
        let temp = tempfile::tempdir().unwrap();
        let (server, addr) = start(temp.path()).await;

        let payload_a = vec![b'a'; 200_000];
        let payload_b = vec![b'b'; 150_000];
        let (a, b) = tokio::join!(
            compress(addr, "same.pdf", &payload_a),
            compress(addr, "same.pdf", &payload_b)
        );

        assert_eq!(a.0, "same_compress.pdf");
        assert_eq!(a.1, payload_a);
        assert_eq!(b.1, payload_b);

        // Counters settle once both tasks finish.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let stats = server.stats();
        assert_eq!(stats.connections_total.load(Ordering::Relaxed), 2);
        assert_eq!(stats.sessions_succeeded.load(Ordering::Relaxed), 2);
        assert_eq!(stats.connections_active.load(Ordering::Relaxed), 0);
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);

        server.shutdown();
    }

    #[tokio::test]
    async fn test_failed_session_does_not_stop_server() {
        let temp = tempfile::tempdir().unwrap();
        let (server, addr) = start(temp.path()).await;

        let mut bad = TcpStream::connect(addr).await.unwrap();
        bad.write_all(b"compress").await.unwrap();
        expect(&mut bad, "ACK_ACTION").await;
        bad.write_all(b"x.pdf").await.unwrap();
        expect(&mut bad, "ACK_FILENAME").await;
        bad.write_all(b"not a number!!!!").await.unwrap();
        let mut rest = Vec::new();
        bad.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        let (name, body) = compress(addr, "ok.pdf", b"fine").await;
        assert_eq!(name, "ok_compress.pdf");
        assert_eq!(body, b"fine");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(server.stats().sessions_failed.load(Ordering::Relaxed), 1);
        assert!(server.is_running());
        server.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_stops_accept_loop() {
        let temp = tempfile::tempdir().unwrap();
        let (server, _addr) = start(temp.path()).await;
        assert!(server.is_running());

        server.shutdown();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!server.is_running());
    }
}
