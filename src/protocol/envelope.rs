//! Message envelope definitions
//!
//! Every frame, in either direction, is a JSON object carrying at minimum
//! `id`, `type`, `timestamp` (epoch milliseconds) and `source`; `target` and
//! `metadata` are optional. `type` alone selects the variant schema — no
//! other field influences how a frame is parsed.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────
// Message Envelope
// ─────────────────────────────────────────────────────────────────

/// Wrapper for all protocol messages with routing metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique message ID (unique within the sending client's lifetime)
    pub id: String,

    /// The actual message payload, discriminated by `type`
    #[serde(flatten)]
    pub payload: MessagePayload,

    /// Creation instant, epoch milliseconds
    pub timestamp: i64,

    /// Originating identity
    pub source: String,

    /// Optional destination identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Open key/value bag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, Value>>,
}

impl Envelope {
    /// Create a new envelope with a fresh id and the current timestamp
    pub fn new(source: impl Into<String>, payload: MessagePayload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            payload,
            timestamp: Utc::now().timestamp_millis(),
            source: source.into(),
            target: None,
            metadata: None,
        }
    }

    /// Set the destination identity
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(serde_json::Map::new)
            .insert(key.into(), value);
        self
    }

    /// The kind of this envelope's payload
    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Deserialize from JSON bytes
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

// ─────────────────────────────────────────────────────────────────
// Message Kinds (Discriminated Union)
// ─────────────────────────────────────────────────────────────────

/// All message payloads, discriminated by the wire `type` field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePayload {
    /// Remote command invocation
    Command(CommandPayload),

    /// Answer to a previously issued command
    Response(ResponsePayload),

    /// Component status report
    Status(StatusPayload),

    /// User-facing notification
    Notification(NotificationPayload),

    /// State synchronization
    Sync(SyncPayload),

    /// Periodic liveness broadcast
    Heartbeat(HeartbeatPayload),

    /// Error report
    Error(ErrorPayload),
}

impl MessagePayload {
    /// The kind discriminator for this payload
    pub fn kind(&self) -> MessageKind {
        match self {
            MessagePayload::Command(_) => MessageKind::Command,
            MessagePayload::Response(_) => MessageKind::Response,
            MessagePayload::Status(_) => MessageKind::Status,
            MessagePayload::Notification(_) => MessageKind::Notification,
            MessagePayload::Sync(_) => MessageKind::Sync,
            MessagePayload::Heartbeat(_) => MessageKind::Heartbeat,
            MessagePayload::Error(_) => MessageKind::Error,
        }
    }
}

/// The closed set of recognized message kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Command,
    Response,
    Status,
    Notification,
    Sync,
    Heartbeat,
    Error,
}

impl MessageKind {
    /// Number of kinds; dispatch tables are sized by this
    pub const COUNT: usize = 7;

    /// All kinds, in dispatch-table order
    pub const ALL: [MessageKind; Self::COUNT] = [
        MessageKind::Command,
        MessageKind::Response,
        MessageKind::Status,
        MessageKind::Notification,
        MessageKind::Sync,
        MessageKind::Heartbeat,
        MessageKind::Error,
    ];

    /// Stable index into a per-kind dispatch table
    pub(crate) fn index(self) -> usize {
        match self {
            MessageKind::Command => 0,
            MessageKind::Response => 1,
            MessageKind::Status => 2,
            MessageKind::Notification => 3,
            MessageKind::Sync => 4,
            MessageKind::Heartbeat => 5,
            MessageKind::Error => 6,
        }
    }

    /// The wire name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Command => "command",
            MessageKind::Response => "response",
            MessageKind::Status => "status",
            MessageKind::Notification => "notification",
            MessageKind::Sync => "sync",
            MessageKind::Heartbeat => "heartbeat",
            MessageKind::Error => "error",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────
// Command / Response
// ─────────────────────────────────────────────────────────────────

/// Remote command invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandPayload {
    /// Command name
    pub command: String,

    /// Command parameters
    #[serde(default)]
    pub parameters: Value,

    /// Invocation context (conversation id, screen, etc.)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    /// Whether the peer may answer out of band
    #[serde(default)]
    pub async_execution: bool,

    /// Maximum execution time in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Where the result should be delivered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_target: Option<String>,

    /// Expected result content type hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_kind: Option<String>,
}

/// Execution metrics attached to a response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMetrics {
    /// Time spent executing (ms)
    pub execution_time_ms: u64,

    /// Peak memory usage (MB)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_memory_mb: Option<u64>,
}

/// Answer to a previously issued command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsePayload {
    /// Id of the command this answers
    pub response_to: String,

    /// Whether the command succeeded
    pub success: bool,

    /// Result value (if successful)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error message (if failed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Timing and resource metrics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ResponseMetrics>,
}

// ─────────────────────────────────────────────────────────────────
// Status / Notification / Sync
// ─────────────────────────────────────────────────────────────────

/// Component status report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPayload {
    /// Reporting component
    pub component: String,

    /// Status string
    pub status: String,

    /// Completion progress (0.0 - 1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,

    /// Arbitrary component metrics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Value>,
}

/// Action attached to a notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationAction {
    /// Action identifier sent back on selection
    pub id: String,

    /// Button label
    pub label: String,
}

/// User-facing notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Notification title
    pub title: String,

    /// Notification body
    pub body: String,

    /// Category for host-side routing/grouping
    pub category: String,

    /// Interactive actions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<NotificationAction>,

    /// Icon identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Sound identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,

    /// Badge count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<u32>,
}

/// State synchronization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPayload {
    /// What is being synchronized (e.g. "settings", "conversation")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// The synchronized state
    #[serde(default)]
    pub state: Value,
}

// ─────────────────────────────────────────────────────────────────
// Heartbeat
// ─────────────────────────────────────────────────────────────────

/// Self-reported client health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl Default for HealthStatus {
    fn default() -> Self {
        HealthStatus::Healthy
    }
}

/// Client descriptor included in heartbeats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client identifier
    pub client_id: String,

    /// Human-readable client name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Platform: mobile, desktop, web, service
    pub platform: String,

    /// Client software version
    pub version: String,
}

/// Host system descriptor included in heartbeats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Hostname
    pub hostname: String,

    /// Operating system
    pub os: String,

    /// CPU architecture
    pub arch: String,

    /// Logical CPU count
    pub cpu_count: u32,
}

/// Periodic liveness broadcast
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    /// Client descriptor
    pub client_info: ClientInfo,

    /// Host system descriptor
    pub system_info: SystemInfo,

    /// Self-reported health
    pub health_status: HealthStatus,

    /// Epoch milliseconds of the last send or receive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<i64>,
}

// ─────────────────────────────────────────────────────────────────
// Error
// ─────────────────────────────────────────────────────────────────

/// Error report from either side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error code
    pub code: String,

    /// Human-readable message
    pub message: String,

    /// Id of the message this error relates to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,

    /// Whether the sender considers the session unrecoverable
    #[serde(default)]
    pub fatal: bool,
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
