//! # hrsync-db
//!
//! PostgreSQL persistence for hrsync.
//!
//! - [`PgStore`]: identity store and reference directory; change sets are
//!   applied in one transaction
//! - [`PgTaskStore`]: task types and tasks with index-enforced open-task
//!   dedup and compare-and-set status updates
//! - [`PgEventSink`]: durable system events
//! - [`PgRunLock`]: cross-process run lock
//!
//! ```rust,ignore
//! let pool = DbPool::connect(&database_url).await?;
//! run_migrations(&pool).await?;
//!
//! let store = Arc::new(PgStore::new(pool.clone()));
//! let tasks: Arc<dyn TaskStore> = Arc::new(PgTaskStore::new(pool.clone()));
//! let events = EventLog::new(Arc::new(PgEventSink::new(pool.clone())));
//! ```

pub mod error;
pub mod event_sink;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod run_lock;
pub mod store;
pub mod task_store;

pub use error::{DbError, DbResult};
pub use event_sink::PgEventSink;
pub use migrations::run_migrations;
pub use pool::{DbPool, DEFAULT_MAX_CONNECTIONS};
pub use run_lock::{PgRunLock, DEFAULT_STALE_AFTER};
pub use store::PgStore;
pub use task_store::PgTaskStore;
