//! # hrsync-reconcile
//!
//! Turns HR imports into queued tasks and runs them.
//!
//! - [`ReconciliationEngine`] diffs an import against local state: role
//!   discovery, then identities, then relationship edges. It only enqueues.
//! - [`handlers`] apply queued tasks to the identity store and the directory
//!   service.
//! - [`SyncRunner`] ties import, reconciliation and processing together under
//!   a [`RunLock`].
//!
//! ```rust,ignore
//! let engine = Arc::new(ReconciliationEngine::new(store.clone(), store.clone(), queue.clone(), events.clone()));
//! let handlers = standard_handlers(store.clone(), store, queue.clone(), Arc::new(LoggingDirectoryService));
//! let processor = Arc::new(TaskProcessor::new(queue, handlers));
//! let runner = SyncRunner::new(source, engine, processor, Arc::new(InMemoryRunLock::new()), events);
//! let report = runner.execute_sync(ImportMode::Replay).await?;
//! ```

pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod lock;
pub mod payload;
pub mod relationship;
pub mod roles;
pub mod snapshot;
pub mod sync;

pub use config::ReconcileConfig;
pub use engine::{PhaseReport, ReconcileInput, ReconciliationEngine, ReconciliationReport};
pub use error::{ReconcileError, ReconcileResult, SyncError, SyncResult};
pub use handlers::{standard_handlers, DirectoryService, LoggingDirectoryService};
pub use identity::ABSENT_REASON;
pub use lock::{InMemoryRunLock, RunLock, SYNC_LOCK};
pub use relationship::REMOVED_REASON;
pub use roles::{ResolvedRole, RoleResolver, RoleSource};
pub use snapshot::{snapshot_text, SnapshotComparer, SnapshotComparison};
pub use sync::{DiffSyncReport, SyncConfig, SyncReport, SyncRunner, CHECKPOINT_FORMAT};
