//! Event sinks.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::EventError;
use crate::event::SysEvent;

/// Destination for system events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn write(&self, event: &SysEvent) -> Result<(), EventError>;

    /// Sink name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Sink that keeps events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SysEvent>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<SysEvent> {
        self.events.lock().await.clone()
    }

    /// Events carrying the given code.
    pub async fn with_code(&self, code: &str) -> Vec<SysEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| e.code == code)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn write(&self, event: &SysEvent) -> Result<(), EventError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Sink that discards events; the tracing output of [`crate::EventLog`] remains.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn write(&self, _event: &SysEvent) -> Result<(), EventError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}
