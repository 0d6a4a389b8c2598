//! Store contracts.
//!
//! The reconciliation engine reads local state through [`IdentityStore`] and
//! [`ReferenceDirectory`]; it never writes. Writes happen only in task
//! handlers, which describe them as a [`ChangeSet`] that the store applies
//! atomically: either every mutation lands or none does.

use async_trait::async_trait;
use thiserror::Error;

use crate::ids::{AssignmentId, OrgId, PersonId, RoleId};
use crate::model::{Org, Period, Person, PersonDetails, PersonType, Role, RoleAssignment};

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Write would violate a uniqueness or state constraint.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backend failure (database, I/O).
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A single write against the identity store.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    InsertPerson(Person),
    UpdatePerson(Person),
    /// Insert or replace the snapshot for `(person, institution)`.
    UpsertDetails(PersonDetails),
    InsertAssignment(RoleAssignment),
    DeactivateAssignment(AssignmentId),
    /// Deactivate every active edge of a person.
    DeactivateAssignmentsOf(PersonId),
    InsertRole(Role),
}

/// Ordered set of mutations applied in one atomic step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    mutations: Vec<Mutation>,
}

impl ChangeSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) -> &mut Self {
        self.mutations.push(mutation);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mutation> {
        self.mutations.iter()
    }
}

impl IntoIterator for ChangeSet {
    type Item = Mutation;
    type IntoIter = std::vec::IntoIter<Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.into_iter()
    }
}

/// Identity and relationship state owned by this system.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_person_by_external_id(&self, external_id: &str) -> StoreResult<Option<Person>>;

    async fn get_person(&self, id: PersonId) -> StoreResult<Option<Person>>;

    /// Active persons of the given type that allow automatic sync.
    async fn list_active_synced(&self, person_type: PersonType) -> StoreResult<Vec<Person>>;

    async fn find_details(
        &self,
        person: PersonId,
        institution: &str,
    ) -> StoreResult<Option<PersonDetails>>;

    /// Active role assignment edges of a person.
    async fn list_active_assignments(&self, person: PersonId) -> StoreResult<Vec<RoleAssignment>>;

    async fn get_assignment(&self, id: AssignmentId) -> StoreResult<Option<RoleAssignment>>;

    /// Apply all mutations atomically.
    async fn apply(&self, changes: ChangeSet) -> StoreResult<()>;
}

/// Read-only reference data: organizations, roles, mappings and periods.
#[async_trait]
pub trait ReferenceDirectory: Send + Sync {
    /// Institution numbers whose personnel data is imported.
    async fn import_institutions(&self) -> StoreResult<Vec<String>>;

    /// Active organizations carrying the institution number.
    async fn orgs_by_institution(&self, inst_nr: &str) -> StoreResult<Vec<Org>>;

    /// Parent of an organization in the org hierarchy.
    async fn parent_org(&self, org: OrgId) -> StoreResult<Option<Org>>;

    /// Role whose short code equals the external role code.
    async fn role_by_code(&self, code: &str) -> StoreResult<Option<Role>>;

    /// Backend role mapped from a canonical role.
    async fn backend_role_for(&self, role: RoleId) -> StoreResult<Option<Role>>;

    /// Backend role mapped directly to an organization.
    async fn org_role(&self, org: OrgId) -> StoreResult<Option<Role>>;

    /// The currently active period, if any.
    async fn current_period(&self) -> StoreResult<Option<Period>>;
}
