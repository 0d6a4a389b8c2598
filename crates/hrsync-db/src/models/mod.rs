//! Row types and their queries.
//!
//! Each row mirrors one table. Enumerations are stored as their text form
//! and parsed back on the way out, so a row that no longer parses surfaces
//! as [`crate::DbError::ValidationFailed`] instead of being skipped.

pub mod assignment;
pub mod person;
pub mod reference;
pub mod run_lock;
pub mod sys_event;
pub mod task;

pub use assignment::RoleAssignmentRow;
pub use person::{PersonDetailsRow, PersonRow};
pub use reference::{OrgRow, PeriodRow, RoleRow};
pub use run_lock::RunLockRow;
pub use sys_event::SysEventRow;
pub use task::{TaskRow, TaskTypeRow};
