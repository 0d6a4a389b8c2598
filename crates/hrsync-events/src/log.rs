//! Best-effort event log.
//!
//! Every event is mirrored to `tracing` and then written to the configured
//! sink. Sink failures are reported as a `SYSEVENT-900` error one level
//! deeper; once `max_depth` is reached the failure is only traced. Callers
//! never observe an error.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::event::{codes, EventSeverity, SysEvent};
use crate::sink::{EventSink, NullSink};

fn default_source() -> String {
    "BE".to_string()
}

fn default_max_depth() -> u8 {
    1
}

/// Event log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogConfig {
    /// Source tag stamped on every event.
    #[serde(default = "default_source")]
    pub source: String,

    /// How many nested failure reports a single record call may produce.
    #[serde(default = "default_max_depth")]
    pub max_depth: u8,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            max_depth: default_max_depth(),
        }
    }
}

/// Fire-and-forget audit sink shared by all components.
#[derive(Clone)]
pub struct EventLog {
    sink: Arc<dyn EventSink>,
    config: EventLogConfig,
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("sink", &self.sink.name())
            .field("config", &self.config)
            .finish()
    }
}

impl EventLog {
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            config: EventLogConfig::default(),
        }
    }

    /// Event log that only emits tracing output.
    #[must_use]
    pub fn tracing_only() -> Self {
        Self::new(Arc::new(NullSink))
    }

    #[must_use]
    pub fn with_config(mut self, config: EventLogConfig) -> Self {
        self.config = config;
        self
    }

    /// Record an informational event.
    pub async fn record_event(&self, code: &str, message: impl Into<String>) {
        let event = SysEvent::new(code, message, EventSeverity::Info, &self.config.source);
        self.record(event, 0).await;
    }

    /// Record an error event.
    pub async fn record_error(&self, code: &str, message: impl Into<String>, blocking: bool) {
        let severity = if blocking {
            EventSeverity::ErrorBlocking
        } else {
            EventSeverity::ErrorNonBlocking
        };
        let event = SysEvent::new(code, message, severity, &self.config.source);
        self.record(event, 0).await;
    }

    /// Record an event at the given failure-report depth.
    ///
    /// `depth` is 0 for caller-originated events. Each failed sink write at a
    /// depth below `max_depth` produces one follow-up report at `depth + 1`.
    pub async fn record(&self, event: SysEvent, depth: u8) {
        let mut pending = Some((event, depth));

        while let Some((event, depth)) = pending.take() {
            trace_event(&event);

            if let Err(e) = self.sink.write(&event).await {
                if depth < self.config.max_depth {
                    let report = SysEvent::new(
                        codes::EVENT_LOG_ERROR,
                        format!("Failed to record event {}: {e}", event.code),
                        EventSeverity::ErrorNonBlocking,
                        &self.config.source,
                    );
                    pending = Some((report, depth + 1));
                } else {
                    error!(
                        code = %event.code,
                        depth = depth,
                        error = %e,
                        "Event sink failed at maximum depth, dropping event"
                    );
                }
            }
        }
    }
}

fn trace_event(event: &SysEvent) {
    match event.severity {
        EventSeverity::Info => info!(
            code = %event.code,
            source = %event.source,
            "{}",
            event.message
        ),
        EventSeverity::ErrorNonBlocking => warn!(
            code = %event.code,
            source = %event.source,
            "{}",
            event.message
        ),
        EventSeverity::ErrorBlocking => error!(
            code = %event.code,
            source = %event.source,
            "{}",
            event.message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EventError;
    use crate::sink::MemorySink;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingSink {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EventSink for FailingSink {
        async fn write(&self, _event: &SysEvent) -> Result<(), EventError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(EventError::sink("failing", "disk full"))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    /// Fails only for caller events, accepts the failure report.
    struct FlakySink {
        inner: MemorySink,
    }

    #[async_trait]
    impl EventSink for FlakySink {
        async fn write(&self, event: &SysEvent) -> Result<(), EventError> {
            if event.code == codes::EVENT_LOG_ERROR {
                self.inner.write(event).await
            } else {
                Err(EventError::sink("flaky", "timeout"))
            }
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_record_event_reaches_sink() {
        let sink = Arc::new(MemorySink::new());
        let log = EventLog::new(sink.clone());

        log.record_event(codes::SYNC_INFO, "started").await;
        log.record_error(codes::SYNC_ERROR, "broken", true).await;

        let events = sink.events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].severity, EventSeverity::Info);
        assert_eq!(events[0].source, "BE");
        assert_eq!(events[1].severity, EventSeverity::ErrorBlocking);
    }

    #[tokio::test]
    async fn test_failure_report_is_bounded_by_depth() {
        let sink = Arc::new(FailingSink {
            calls: AtomicUsize::new(0),
        });
        let log = EventLog::new(sink.clone());

        log.record_event(codes::SYNC_INFO, "hello").await;

        // original write + one failure report at depth 1
        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_depth_never_reports() {
        let sink = Arc::new(FailingSink {
            calls: AtomicUsize::new(0),
        });
        let log = EventLog::new(sink.clone()).with_config(EventLogConfig {
            max_depth: 0,
            ..EventLogConfig::default()
        });

        log.record_error(codes::TASK_ERROR, "boom", false).await;

        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_report_describes_original_code() {
        let sink = Arc::new(FlakySink {
            inner: MemorySink::new(),
        });
        let log = EventLog::new(sink.clone());

        log.record_event(codes::TASK_CREATED, "task").await;

        let reports = sink.inner.with_code(codes::EVENT_LOG_ERROR).await;
        assert_eq!(reports.len(), 1);
        assert!(reports[0].message.contains(codes::TASK_CREATED));
    }
}
