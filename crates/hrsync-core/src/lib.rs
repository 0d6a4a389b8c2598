//! # hrsync-core
//!
//! Shared building blocks for the HR import reconciliation engine.
//!
//! - **Identifiers**: UUID newtypes for every locally owned record
//! - **Keys**: composite natural keys for imported records and assignment edges
//! - **Model**: persons, detail snapshots, organizations, roles, periods, edges
//! - **Stores**: the read contracts the engine diffs against and the atomic
//!   [`ChangeSet`] handlers write through

pub mod ids;
pub mod keys;
pub mod memory;
pub mod model;
pub mod store;

pub use ids::{
    AssignmentId, DetailsId, EventId, OrgId, ParseIdError, PeriodId, PersonId, RoleId, TaskId,
    TaskTypeId,
};
pub use keys::{EdgeKey, ImportKey};
pub use memory::MemoryStore;
pub use model::{Org, Period, Person, PersonDetails, PersonType, Role, RoleAssignment};
pub use store::{
    ChangeSet, IdentityStore, Mutation, ReferenceDirectory, StoreError, StoreResult,
};
