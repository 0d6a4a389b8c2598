//! Error types for the hrsync-events crate.

use thiserror::Error;

/// Errors raised by event sinks.
///
/// These never reach callers of [`crate::EventLog`]; they only drive the
/// bounded failure reporting inside it.
#[derive(Debug, Error)]
pub enum EventError {
    /// The sink could not persist the event.
    #[error("Event sink '{sink}' failed: {cause}")]
    SinkFailed { sink: String, cause: String },

    /// The event could not be serialized.
    #[error("Failed to serialize event {code}: {cause}")]
    SerializationFailed { code: String, cause: String },
}

impl EventError {
    pub fn sink(sink: impl Into<String>, cause: impl ToString) -> Self {
        Self::SinkFailed {
            sink: sink.into(),
            cause: cause.to_string(),
        }
    }
}
