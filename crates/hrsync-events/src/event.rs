//! System events.

use chrono::{DateTime, Utc};
use hrsync_core::EventId;
use serde::{Deserialize, Serialize};

/// Well-known event codes.
pub mod codes {
    /// Processing of all pending tasks started.
    pub const TASK_ALL_START: &str = "BETASK-001";
    /// Processing of one task type started.
    pub const TASK_TYPE_START: &str = "BETASK-002";
    /// Manual tasks are waiting for an operator.
    pub const TASK_MANUAL_PENDING: &str = "BETASK-003";
    /// Processing of one task type finished.
    pub const TASK_TYPE_DONE: &str = "BETASK-004";
    /// Processing of all pending tasks finished.
    pub const TASK_ALL_DONE: &str = "BETASK-005";
    /// A task was created.
    pub const TASK_CREATED: &str = "BETASK-CREATED";
    /// A single task failed.
    pub const TASK_FAILED: &str = "BETASK-500";
    /// Task infrastructure failure.
    pub const TASK_ERROR: &str = "BETASK-900";
    /// Sync progress.
    pub const SYNC_INFO: &str = "SAPSYNC-001";
    /// Sync failure.
    pub const SYNC_ERROR: &str = "SAPSYNC-900";
    /// The event log itself failed to persist an event.
    pub const EVENT_LOG_ERROR: &str = "SYSEVENT-900";
}

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventSeverity {
    #[serde(rename = "INFO")]
    Info,
    #[serde(rename = "ERROR-BLOCKING")]
    ErrorBlocking,
    #[serde(rename = "ERROR-NONBLOCKING")]
    ErrorNonBlocking,
}

impl EventSeverity {
    #[must_use]
    pub fn is_error(&self) -> bool {
        !matches!(self, EventSeverity::Info)
    }
}

impl std::fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventSeverity::Info => write!(f, "INFO"),
            EventSeverity::ErrorBlocking => write!(f, "ERROR-BLOCKING"),
            EventSeverity::ErrorNonBlocking => write!(f, "ERROR-NONBLOCKING"),
        }
    }
}

impl std::str::FromStr for EventSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(EventSeverity::Info),
            "ERROR-BLOCKING" => Ok(EventSeverity::ErrorBlocking),
            "ERROR-NONBLOCKING" => Ok(EventSeverity::ErrorNonBlocking),
            _ => Err(format!("Unknown event severity: {s}")),
        }
    }
}

/// One audit/observability record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SysEvent {
    pub id: EventId,
    pub code: String,
    pub message: String,
    pub severity: EventSeverity,
    /// Emitting subsystem (e.g. `BE`).
    pub source: String,
    pub occurred_at: DateTime<Utc>,
}

impl SysEvent {
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        severity: EventSeverity,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: EventId::new(),
            code: code.into(),
            message: message.into(),
            severity,
            source: source.into(),
            occurred_at: Utc::now(),
        }
    }
}
