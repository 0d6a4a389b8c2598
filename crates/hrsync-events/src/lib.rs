//! # hrsync-events
//!
//! Fire-and-forget audit log used by every hrsync component.
//!
//! Two operations matter to callers: [`EventLog::record_event`] and
//! [`EventLog::record_error`]. Both are infallible from the caller's point of
//! view; sink failures are reported through a bounded-depth path instead of
//! recursing.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hrsync_events::{codes, EventLog, MemorySink};
//!
//! let sink = Arc::new(MemorySink::new());
//! let log = EventLog::new(sink.clone());
//! log.record_event(codes::SYNC_INFO, "Sync started").await;
//! log.record_error(codes::SYNC_ERROR, "Could not fetch employees", true).await;
//! ```

pub mod error;
pub mod event;
pub mod log;
pub mod sink;

pub use error::EventError;
pub use event::{codes, EventSeverity, SysEvent};
pub use log::{EventLog, EventLogConfig};
pub use sink::{EventSink, MemorySink, NullSink};
