//! Server configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via DOCRELAY_CONFIG or --config)
//! 3. Environment variables

use docrelay_protocol::{Action, Timeouts, DEFAULT_CHUNK_SIZE, DEFAULT_PORT};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listener, deadlines and connection cap.
    pub network: NetworkConfig,
    /// Per-session scratch directories.
    pub workspace: WorkspaceConfig,
    /// Request size limits.
    pub limits: LimitsConfig,
    /// External processing commands.
    pub engine: EngineConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Like [`Config::load`], with an explicit file taking precedence over
    /// `DOCRELAY_CONFIG`.
    pub fn load_with(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match std::env::var("DOCRELAY_CONFIG") {
                Ok(path) => Self::from_file(path)?,
                Err(_) => Self::default(),
            },
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.network.apply_env_overrides();
        self.workspace.apply_env_overrides();
        self.limits.apply_env_overrides();
    }

    /// Rejects values that would make every session fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let network = &self.network;
        if network.handshake_timeout_secs == 0
            || network.chunk_timeout_secs == 0
            || network.operation_timeout_secs == 0
        {
            return Err(ConfigError::ValidationError(
                "timeouts must be at least one second".to_string(),
            ));
        }
        if network.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "max_connections must be positive".to_string(),
            ));
        }
        if network.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.workspace.max_base_name_len == 0 {
            return Err(ConfigError::ValidationError(
                "max_base_name_len must be positive".to_string(),
            ));
        }
        if let Some((action, _)) = self.engine.commands.iter().find(|(_, argv)| argv.is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "command for '{}' is empty",
                action
            )));
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
    /// Deadline for each token, ACK and size field, in seconds.
    pub handshake_timeout_secs: u64,
    /// Deadline for each read or write during a bulk transfer, in seconds.
    pub chunk_timeout_secs: u64,
    /// Deadline for a whole bulk transfer or engine call, in seconds.
    pub operation_timeout_secs: u64,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Bytes moved per read or write during bulk transfer.
    pub chunk_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            handshake_timeout_secs: 60,
            chunk_timeout_secs: 120,
            operation_timeout_secs: 600,
            max_connections: 256,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("DOCRELAY_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }

        if let Ok(timeout) = std::env::var("DOCRELAY_HANDSHAKE_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.handshake_timeout_secs = secs;
            }
        }

        if let Ok(timeout) = std::env::var("DOCRELAY_CHUNK_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.chunk_timeout_secs = secs;
            }
        }

        if let Ok(timeout) = std::env::var("DOCRELAY_OPERATION_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.operation_timeout_secs = secs;
            }
        }

        if let Ok(max) = std::env::var("DOCRELAY_MAX_CONNECTIONS") {
            if let Ok(n) = max.parse() {
                self.max_connections = n;
            }
        }
    }

    /// Returns the per-step deadlines as a [`Timeouts`].
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            handshake: Duration::from_secs(self.handshake_timeout_secs),
            chunk: Duration::from_secs(self.chunk_timeout_secs),
            operation: self.operation_timeout(),
        }
    }

    /// Returns operation timeout as Duration.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

/// Workspace configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory under which session directories are created.
    pub temp_root: PathBuf,
    /// Longest sanitized base name kept from a client filename.
    pub max_base_name_len: usize,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            temp_root: std::env::temp_dir(),
            max_base_name_len: 50,
        }
    }
}

impl WorkspaceConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("DOCRELAY_TEMP_ROOT") {
            self.temp_root = PathBuf::from(dir);
        }
    }
}

/// Limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest declared payload accepted, in bytes.
    pub max_payload_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 2 * 1024 * 1024 * 1024,
        }
    }
}

impl LimitsConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(max) = std::env::var("DOCRELAY_MAX_PAYLOAD") {
            if let Ok(n) = max.parse() {
                self.max_payload_bytes = n;
            }
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Argv template per action, run by the external-command engine.
    /// Actions without an entry fall back to the built-in engine.
    pub commands: BTreeMap<Action, Vec<String>>,
    /// Kills a command after this many seconds. Defaults to the operation
    /// timeout.
    pub command_timeout_secs: Option<u64>,
}

impl EngineConfig {
    /// Commands keyed the way the external-command engine takes them.
    pub fn command_map(&self) -> HashMap<Action, Vec<String>> {
        self.commands
            .iter()
            .map(|(action, argv)| (*action, argv.clone()))
            .collect()
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serializes a SocketAddr as a plain string in YAML.
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
