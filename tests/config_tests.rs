//! Configuration system tests
//!
//! Tests configuration loading, validation, and environment overrides

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use relay_client::{ExhaustionPolicy, OverflowPolicy, RelayConfig};

// Loading reads the process environment, which is global; every test that
// touches `load` or the RELAY_* variables serializes on this lock.
static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Test fixture for configuration testing
struct ConfigFixture {
    _temp_dir: TempDir,
    config_path: PathBuf,
}

impl ConfigFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        Self {
            _temp_dir: temp_dir,
            config_path,
        }
    }

    fn write_config(&self, content: &str) {
        fs::write(&self.config_path, content).unwrap();
    }

    fn path(&self) -> &str {
        self.config_path.to_str().unwrap()
    }
}

// ─────────────────────────────────────────────────────────────────
// Valid Configuration Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_minimal_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[transport]
url = "wss://gateway.example.com"
"#,
    );

    let config = RelayConfig::load(Some(fixture.path())).unwrap();
    assert_eq!(config.transport.url, "wss://gateway.example.com");

    // Everything else falls back to defaults
    assert_eq!(config.transport.reconnect_interval_ms, 5000);
    assert_eq!(config.transport.max_reconnect_attempts, 10);
    assert_eq!(config.transport.heartbeat_interval_ms, 30000);
    assert_eq!(config.transport.connect_timeout_ms, 10000);
    assert_eq!(config.queue.capacity, 1024);
}

#[test]
fn test_full_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[client]
id = "client-001"
name = "Test Client"
platform = "desktop"

[transport]
url = "wss://gateway.example.com"
reconnect_interval_ms = 10000
max_reconnect_attempts = 5
connect_timeout_ms = 60000
heartbeat_interval_ms = 15000
protocols = ["relay.v1", "relay.v2"]

[queue]
capacity = 256
overflow_policy = "drop_oldest"
exhaustion_policy = "discard"

[logging]
level = "debug"
file = "/tmp/relay-client.log"
max_files = 3
json_format = false
"#,
    );

    let config = RelayConfig::load(Some(fixture.path())).unwrap();
    assert_eq!(config.client.id.as_deref(), Some("client-001"));
    assert_eq!(config.client.platform, "desktop");
    assert_eq!(config.transport.reconnect_interval_ms, 10000);
    assert_eq!(config.transport.max_reconnect_attempts, 5);
    assert_eq!(config.transport.protocols, vec!["relay.v1", "relay.v2"]);
    assert_eq!(config.queue.capacity, 256);
    assert_eq!(config.queue.overflow_policy, OverflowPolicy::DropOldest);
    assert_eq!(config.queue.exhaustion_policy, ExhaustionPolicy::Discard);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_explicit_missing_path_is_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    assert!(RelayConfig::load(Some("/nonexistent/relay.toml")).is_err());
}

// ─────────────────────────────────────────────────────────────────
// Invalid Configuration Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_invalid_gateway_url() {
    let _guard = ENV_LOCK.lock().unwrap();
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[transport]
url = "http://not-websocket.com"
"#,
    );

    assert!(RelayConfig::load(Some(fixture.path())).is_err());
}

#[test]
fn test_zero_heartbeat_interval() {
    let _guard = ENV_LOCK.lock().unwrap();
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[transport]
url = "wss://gateway.example.com"
heartbeat_interval_ms = 0
"#,
    );

    assert!(RelayConfig::load(Some(fixture.path())).is_err());
}

#[test]
fn test_invalid_platform() {
    let _guard = ENV_LOCK.lock().unwrap();
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[client]
platform = "mainframe"

[transport]
url = "wss://gateway.example.com"
"#,
    );

    assert!(RelayConfig::load(Some(fixture.path())).is_err());
}

#[test]
fn test_invalid_log_level() {
    let _guard = ENV_LOCK.lock().unwrap();
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[transport]
url = "wss://gateway.example.com"

[logging]
level = "invalid_level"
"#,
    );

    assert!(RelayConfig::load(Some(fixture.path())).is_err());
}

#[test]
fn test_malformed_toml() {
    let _guard = ENV_LOCK.lock().unwrap();
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[transport
url = "wss://gateway.example.com"
"#,
    );

    assert!(RelayConfig::load(Some(fixture.path())).is_err());
}

// ─────────────────────────────────────────────────────────────────
// Config Write Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_write_creates_loadable_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("new_config.toml");

    let config = RelayConfig::for_url("wss://gateway.example.com");
    config.write_to_file(&path, false).unwrap();
    assert!(path.exists());

    let loaded = RelayConfig::load(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(loaded.transport.url, "wss://gateway.example.com");
}

#[test]
fn test_write_refuses_overwrite() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[client]\nplatform = \"web\"\n");

    let config = RelayConfig::for_url("wss://gateway.example.com");
    assert!(config.write_to_file(&fixture.config_path, false).is_err());

    // Force replaces the old contents
    config.write_to_file(&fixture.config_path, true).unwrap();
    let content = fs::read_to_string(fixture.path()).unwrap();
    assert!(content.contains("wss://gateway.example.com"));
}

// ─────────────────────────────────────────────────────────────────
// Environment Variable Override Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_env_override_gateway_url() {
    let _guard = ENV_LOCK.lock().unwrap();
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[transport]
url = "wss://file.example.com"
"#,
    );

    std::env::set_var("RELAY_GATEWAY_URL", "wss://env.example.com");
    let config = RelayConfig::load(Some(fixture.path()));
    std::env::remove_var("RELAY_GATEWAY_URL");

    assert_eq!(config.unwrap().transport.url, "wss://env.example.com");
}

#[test]
fn test_env_override_intervals() {
    let _guard = ENV_LOCK.lock().unwrap();
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[transport]
url = "wss://gateway.example.com"
"#,
    );

    std::env::set_var("RELAY_RECONNECT_INTERVAL_MS", "250");
    std::env::set_var("RELAY_MAX_RECONNECT_ATTEMPTS", "2");
    let config = RelayConfig::load(Some(fixture.path()));
    std::env::remove_var("RELAY_RECONNECT_INTERVAL_MS");
    std::env::remove_var("RELAY_MAX_RECONNECT_ATTEMPTS");

    let config = config.unwrap();
    assert_eq!(config.transport.reconnect_interval_ms, 250);
    assert_eq!(config.transport.max_reconnect_attempts, 2);
}

// ─────────────────────────────────────────────────────────────────
// Path Expansion Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_tilde_expansion_in_log_path() {
    let _guard = ENV_LOCK.lock().unwrap();
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[transport]
url = "wss://gateway.example.com"

[logging]
file = "~/relay/client.log"
"#,
    );

    let config = RelayConfig::load(Some(fixture.path())).unwrap();
    let file = config.logging.file.unwrap();
    assert!(!file.starts_with('~'));
    assert!(file.ends_with("relay/client.log"));
}
