//! Configuration system for the relay transport client
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. Environment variables (RELAY_* prefix)
//! 2. Configuration file (TOML)
//! 3. Default values

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Client identity settings
    pub client: ClientSettings,

    /// Gateway transport settings
    pub transport: TransportSettings,

    /// Outbound queue settings
    pub queue: QueueSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Client identity settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Unique client identifier (auto-generated if not set)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Human-readable client name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Client platform: mobile, desktop, web, service
    pub platform: String,

    /// Client software version
    pub version: String,
}

/// Gateway transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Gateway WebSocket URL
    pub url: String,

    /// Base reconnection backoff delay in milliseconds
    pub reconnect_interval_ms: u64,

    /// Maximum reconnection attempts before giving up
    pub max_reconnect_attempts: u32,

    /// Heartbeat broadcast interval in milliseconds
    pub heartbeat_interval_ms: u64,

    /// Connection establishment timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// WebSocket sub-protocols to negotiate
    #[serde(default)]
    pub protocols: Vec<String>,
}

/// Overflow policy for a full outbound queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Refuse the incoming message, keep the queue as-is
    RejectNewest,
    /// Evict the oldest queued message to make room
    DropOldest,
}

/// What happens to queued messages when the reconnect attempt cap is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Keep the queue for a later manual connect()
    Retain,
    /// Drop everything that was queued
    Discard,
}

/// Outbound queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Maximum queued messages while disconnected (0 = unbounded)
    pub capacity: usize,

    /// What to do when the queue is full
    pub overflow_policy: OverflowPolicy,

    /// What to do with queued messages when reconnection gives up
    pub exhaustion_policy: ExhaustionPolicy,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            client: ClientSettings::default(),
            transport: TransportSettings::default(),
            queue: QueueSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            id: None,
            name: None,
            platform: "service".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            reconnect_interval_ms: 5000,
            max_reconnect_attempts: 10,
            heartbeat_interval_ms: 30000,
            connect_timeout_ms: 10000,
            protocols: vec![],
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            capacity: 1024,
            overflow_policy: OverflowPolicy::RejectNewest,
            exhaustion_policy: ExhaustionPolicy::Retain,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_files: 5,
            json_format: false,
        }
    }
}

impl RelayConfig {
    /// Create a configuration for the given gateway URL with all defaults
    pub fn for_url(url: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.transport.url = url.into();
        config
    }

    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        let config_file = Self::find_config_file(config_path)?;
        if let Some(path) = config_file {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path)
                .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
            config = toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Write this configuration to a TOML file.
    ///
    /// Refuses to overwrite an existing file unless `force` is set.
    pub fn write_to_file(&self, path: impl AsRef<std::path::Path>, force: bool) -> Result<()> {
        let path = path.as_ref();
        if path.exists() && !force {
            return Err(Error::Config(format!(
                "Configuration file already exists: {}",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!(path = %path.display(), "Configuration file written");
        Ok(())
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // If explicit path provided, use it (error if not found)
        if let Some(path) = explicit_path {
            let expanded = shellexpand::tilde(path);
            let path = PathBuf::from(expanded.as_ref());
            if path.exists() {
                return Ok(Some(path));
            } else {
                return Err(Error::Config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
        }

        // Search in standard locations
        let search_paths = [
            // Current directory
            PathBuf::from("relay-client.toml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("relay").join("client.toml"))
                .unwrap_or_default(),
            // Home directory
            dirs::home_dir()
                .map(|p| p.join(".relay").join("client.toml"))
                .unwrap_or_default(),
        ];

        for path in &search_paths {
            if path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    pub(crate) fn apply_env_overrides(&mut self) {
        // Client settings
        if let Ok(val) = std::env::var("RELAY_CLIENT_ID") {
            self.client.id = Some(val);
        }
        if let Ok(val) = std::env::var("RELAY_CLIENT_NAME") {
            self.client.name = Some(val);
        }
        if let Ok(val) = std::env::var("RELAY_CLIENT_PLATFORM") {
            self.client.platform = val;
        }

        // Transport settings
        if let Ok(val) = std::env::var("RELAY_GATEWAY_URL") {
            self.transport.url = val;
        }
        if let Ok(val) = std::env::var("RELAY_RECONNECT_INTERVAL_MS") {
            if let Ok(n) = val.parse() {
                self.transport.reconnect_interval_ms = n;
            }
        }
        if let Ok(val) = std::env::var("RELAY_MAX_RECONNECT_ATTEMPTS") {
            if let Ok(n) = val.parse() {
                self.transport.max_reconnect_attempts = n;
            }
        }
        if let Ok(val) = std::env::var("RELAY_HEARTBEAT_INTERVAL_MS") {
            if let Ok(n) = val.parse() {
                self.transport.heartbeat_interval_ms = n;
            }
        }
        if let Ok(val) = std::env::var("RELAY_CONNECT_TIMEOUT_MS") {
            if let Ok(n) = val.parse() {
                self.transport.connect_timeout_ms = n;
            }
        }

        // Queue settings
        if let Ok(val) = std::env::var("RELAY_QUEUE_CAPACITY") {
            if let Ok(n) = val.parse() {
                self.queue.capacity = n;
            }
        }
        if let Ok(val) = std::env::var("RELAY_QUEUE_OVERFLOW_POLICY") {
            match val.to_lowercase().as_str() {
                "reject_newest" => self.queue.overflow_policy = OverflowPolicy::RejectNewest,
                "drop_oldest" => self.queue.overflow_policy = OverflowPolicy::DropOldest,
                _ => {}
            }
        }
        if let Ok(val) = std::env::var("RELAY_QUEUE_EXHAUSTION_POLICY") {
            match val.to_lowercase().as_str() {
                "retain" => self.queue.exhaustion_policy = ExhaustionPolicy::Retain,
                "discard" => self.queue.exhaustion_policy = ExhaustionPolicy::Discard,
                _ => {}
            }
        }

        // Logging settings
        if let Ok(val) = std::env::var("RELAY_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("RELAY_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("RELAY_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Validate gateway URL
        if self.transport.url.is_empty() {
            return Err(Error::Config("Gateway URL cannot be empty".to_string()));
        }
        let parsed = url::Url::parse(&self.transport.url)
            .map_err(|e| Error::Config(format!("Invalid gateway URL: {}", e)))?;
        if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
            return Err(Error::Config(
                "Gateway URL must start with ws:// or wss://".to_string(),
            ));
        }

        // Validate intervals
        if self.transport.heartbeat_interval_ms == 0 {
            return Err(Error::Config(
                "heartbeat_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.transport.reconnect_interval_ms == 0 {
            return Err(Error::Config(
                "reconnect_interval_ms must be greater than 0".to_string(),
            ));
        }

        // Validate platform
        let valid_platforms = ["mobile", "desktop", "web", "service"];
        if !valid_platforms.contains(&self.client.platform.to_lowercase().as_str()) {
            return Err(Error::Config(format!(
                "Invalid platform '{}'. Must be one of: {}",
                self.client.platform,
                valid_platforms.join(", ")
            )));
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}
