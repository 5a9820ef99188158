//! Heartbeat construction
//!
//! Builds the periodic liveness broadcast sent while Connected. The actor
//! owns the interval timer itself; this module only assembles the payload.
//! The heartbeat is one-directional (client -> gateway): an unresponsive
//! peer that keeps the socket open is only discovered through the
//! transport's own close/error events.

use chrono::Utc;

use crate::config::ClientSettings;
use crate::protocol::{ClientInfo, HealthStatus, HeartbeatPayload, SystemInfo};

/// Assembles heartbeat payloads for the connection manager
pub(crate) struct HeartbeatReporter {
    client_info: ClientInfo,
    health: HealthStatus,
    started_at: i64,
}

impl HeartbeatReporter {
    pub fn new(client_id: impl Into<String>, settings: &ClientSettings) -> Self {
        Self {
            client_info: ClientInfo {
                client_id: client_id.into(),
                name: settings.name.clone(),
                platform: settings.platform.clone(),
                version: settings.version.clone(),
            },
            health: HealthStatus::Healthy,
            started_at: Utc::now().timestamp_millis(),
        }
    }

    /// Override the self-reported health status
    pub fn set_health(&mut self, health: HealthStatus) {
        self.health = health;
    }

    pub fn health(&self) -> HealthStatus {
        self.health
    }

    /// Build a heartbeat payload; `last_activity` is the epoch-millisecond
    /// stamp of the most recent send or receive, falling back to the
    /// reporter's creation time.
    pub fn payload(&self, last_activity: Option<i64>) -> HeartbeatPayload {
        HeartbeatPayload {
            client_info: self.client_info.clone(),
            system_info: system_info(),
            health_status: self.health,
            last_activity: last_activity.or(Some(self.started_at)),
        }
    }
}

/// Snapshot the host system descriptors
fn system_info() -> SystemInfo {
    SystemInfo {
        hostname: hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string()),
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        cpu_count: num_cpus::get() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ClientSettings {
        ClientSettings {
            id: None,
            name: Some("Test Client".to_string()),
            platform: "desktop".to_string(),
            version: "0.1.0".to_string(),
        }
    }

    #[test]
    fn test_payload_carries_client_descriptor() {
        let reporter = HeartbeatReporter::new("client-1", &settings());
        let payload = reporter.payload(Some(1_700_000_000_000));

        assert_eq!(payload.client_info.client_id, "client-1");
        assert_eq!(payload.client_info.platform, "desktop");
        assert_eq!(payload.health_status, HealthStatus::Healthy);
        assert_eq!(payload.last_activity, Some(1_700_000_000_000));
    }

    #[test]
    fn test_last_activity_defaults_to_start_time() {
        let reporter = HeartbeatReporter::new("client-1", &settings());
        let payload = reporter.payload(None);
        assert!(payload.last_activity.is_some());
    }

    #[test]
    fn test_health_override() {
        let mut reporter = HeartbeatReporter::new("client-1", &settings());
        reporter.set_health(HealthStatus::Degraded);

        assert_eq!(reporter.health(), HealthStatus::Degraded);
        assert_eq!(reporter.payload(None).health_status, HealthStatus::Degraded);
    }

    #[test]
    fn test_system_info_populated() {
        let info = system_info();
        assert!(!info.os.is_empty());
        assert!(!info.arch.is_empty());
        assert!(info.cpu_count >= 1);
    }
}
