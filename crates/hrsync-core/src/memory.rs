//! In-memory store.
//!
//! Implements both [`IdentityStore`] and [`ReferenceDirectory`] over a single
//! lock so that a change set is applied as one step. Used by tests and by
//! replay runs that should not touch a database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::ids::{AssignmentId, OrgId, PersonId, RoleId};
use crate::model::{Org, Period, Person, PersonDetails, PersonType, Role, RoleAssignment};
use crate::store::{
    ChangeSet, IdentityStore, Mutation, ReferenceDirectory, StoreError, StoreResult,
};

#[derive(Debug, Clone, Default)]
struct State {
    persons: HashMap<PersonId, Person>,
    details: HashMap<(PersonId, String), PersonDetails>,
    assignments: HashMap<AssignmentId, RoleAssignment>,
    orgs: HashMap<OrgId, Org>,
    org_parents: HashMap<OrgId, OrgId>,
    roles: HashMap<RoleId, Role>,
    backend_roles: HashMap<RoleId, RoleId>,
    org_roles: HashMap<OrgId, RoleId>,
    periods: Vec<Period>,
}

impl State {
    fn apply(&mut self, mutation: Mutation) -> StoreResult<()> {
        match mutation {
            Mutation::InsertPerson(person) => {
                if self
                    .persons
                    .values()
                    .any(|p| p.external_id == person.external_id)
                {
                    return Err(StoreError::Conflict(format!(
                        "person with external id {} already exists",
                        person.external_id
                    )));
                }
                self.persons.insert(person.id, person);
            }
            Mutation::UpdatePerson(mut person) => {
                if !self.persons.contains_key(&person.id) {
                    return Err(StoreError::not_found("person", person.id));
                }
                person.updated_at = Utc::now();
                self.persons.insert(person.id, person);
            }
            Mutation::UpsertDetails(details) => {
                if !self.persons.contains_key(&details.person_id) {
                    return Err(StoreError::not_found("person", details.person_id));
                }
                let key = (details.person_id, details.institution.clone());
                self.details.insert(key, details);
            }
            Mutation::InsertAssignment(edge) => {
                let key = edge.key();
                if self
                    .assignments
                    .values()
                    .any(|e| e.is_active && e.key() == key)
                {
                    return Err(StoreError::Conflict(format!(
                        "active assignment {key} already exists"
                    )));
                }
                self.assignments.insert(edge.id, edge);
            }
            Mutation::DeactivateAssignment(id) => {
                let edge = self
                    .assignments
                    .get_mut(&id)
                    .ok_or_else(|| StoreError::not_found("assignment", id))?;
                edge.is_active = false;
                edge.updated_at = Utc::now();
            }
            Mutation::DeactivateAssignmentsOf(person) => {
                let now = Utc::now();
                for edge in self
                    .assignments
                    .values_mut()
                    .filter(|e| e.person_id == person && e.is_active)
                {
                    edge.is_active = false;
                    edge.updated_at = now;
                }
            }
            Mutation::InsertRole(role) => {
                if self.roles.values().any(|r| r.shortname == role.shortname) {
                    return Err(StoreError::Conflict(format!(
                        "role with code {} already exists",
                        role.shortname
                    )));
                }
                self.roles.insert(role.id, role);
            }
        }
        Ok(())
    }
}

/// In-memory identity store and reference directory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_person(&self, person: Person) {
        self.state.write().await.persons.insert(person.id, person);
    }

    pub async fn insert_details(&self, details: PersonDetails) {
        let key = (details.person_id, details.institution.clone());
        self.state.write().await.details.insert(key, details);
    }

    pub async fn insert_assignment(&self, edge: RoleAssignment) {
        self.state.write().await.assignments.insert(edge.id, edge);
    }

    pub async fn insert_org(&self, org: Org) {
        self.state.write().await.orgs.insert(org.id, org);
    }

    /// Link `child` under `parent` in the org hierarchy.
    pub async fn set_parent_org(&self, child: OrgId, parent: OrgId) {
        self.state.write().await.org_parents.insert(child, parent);
    }

    pub async fn insert_role(&self, role: Role) {
        self.state.write().await.roles.insert(role.id, role);
    }

    /// Map a canonical role onto a backend role.
    pub async fn map_backend_role(&self, role: RoleId, backend: RoleId) {
        self.state.write().await.backend_roles.insert(role, backend);
    }

    /// Map a backend role directly onto an organization.
    pub async fn map_org_role(&self, org: OrgId, role: RoleId) {
        self.state.write().await.org_roles.insert(org, role);
    }

    pub async fn insert_period(&self, period: Period) {
        self.state.write().await.periods.push(period);
    }

    /// All persons, for assertions.
    pub async fn persons(&self) -> Vec<Person> {
        self.state.read().await.persons.values().cloned().collect()
    }

    /// All edges including inactive ones, for assertions.
    pub async fn assignments(&self) -> Vec<RoleAssignment> {
        self.state.read().await.assignments.values().cloned().collect()
    }

    /// All roles, for assertions.
    pub async fn roles(&self) -> Vec<Role> {
        self.state.read().await.roles.values().cloned().collect()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_person_by_external_id(&self, external_id: &str) -> StoreResult<Option<Person>> {
        let state = self.state.read().await;
        Ok(state
            .persons
            .values()
            .find(|p| p.external_id == external_id)
            .cloned())
    }

    async fn get_person(&self, id: PersonId) -> StoreResult<Option<Person>> {
        Ok(self.state.read().await.persons.get(&id).cloned())
    }

    async fn list_active_synced(&self, person_type: PersonType) -> StoreResult<Vec<Person>> {
        let state = self.state.read().await;
        let mut persons: Vec<Person> = state
            .persons
            .values()
            .filter(|p| p.is_active && p.automatic_sync && p.person_type == person_type)
            .cloned()
            .collect();
        persons.sort_by(|a, b| a.external_id.cmp(&b.external_id));
        Ok(persons)
    }

    async fn find_details(
        &self,
        person: PersonId,
        institution: &str,
    ) -> StoreResult<Option<PersonDetails>> {
        let state = self.state.read().await;
        Ok(state
            .details
            .get(&(person, institution.to_string()))
            .cloned())
    }

    async fn list_active_assignments(&self, person: PersonId) -> StoreResult<Vec<RoleAssignment>> {
        let state = self.state.read().await;
        let mut edges: Vec<RoleAssignment> = state
            .assignments
            .values()
            .filter(|e| e.person_id == person && e.is_active)
            .cloned()
            .collect();
        edges.sort_by_key(|e| e.created_at);
        Ok(edges)
    }

    async fn get_assignment(&self, id: AssignmentId) -> StoreResult<Option<RoleAssignment>> {
        Ok(self.state.read().await.assignments.get(&id).cloned())
    }

    async fn apply(&self, changes: ChangeSet) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let mut staged = state.clone();
        for mutation in changes {
            staged.apply(mutation)?;
        }
        *state = staged;
        Ok(())
    }
}

#[async_trait]
impl ReferenceDirectory for MemoryStore {
    async fn import_institutions(&self) -> StoreResult<Vec<String>> {
        let state = self.state.read().await;
        let mut institutions: Vec<String> = state
            .orgs
            .values()
            .filter(|o| o.is_active && o.import_source)
            .map(|o| o.inst_nr.clone())
            .collect();
        institutions.sort();
        institutions.dedup();
        Ok(institutions)
    }

    async fn orgs_by_institution(&self, inst_nr: &str) -> StoreResult<Vec<Org>> {
        let state = self.state.read().await;
        let mut orgs: Vec<Org> = state
            .orgs
            .values()
            .filter(|o| o.is_active && o.inst_nr == inst_nr)
            .cloned()
            .collect();
        orgs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(orgs)
    }

    async fn parent_org(&self, org: OrgId) -> StoreResult<Option<Org>> {
        let state = self.state.read().await;
        Ok(state
            .org_parents
            .get(&org)
            .and_then(|parent| state.orgs.get(parent))
            .cloned())
    }

    async fn role_by_code(&self, code: &str) -> StoreResult<Option<Role>> {
        let state = self.state.read().await;
        Ok(state.roles.values().find(|r| r.shortname == code).cloned())
    }

    async fn backend_role_for(&self, role: RoleId) -> StoreResult<Option<Role>> {
        let state = self.state.read().await;
        Ok(state
            .backend_roles
            .get(&role)
            .and_then(|backend| state.roles.get(backend))
            .cloned())
    }

    async fn org_role(&self, org: OrgId) -> StoreResult<Option<Role>> {
        let state = self.state.read().await;
        Ok(state
            .org_roles
            .get(&org)
            .and_then(|role| state.roles.get(role))
            .cloned())
    }

    async fn current_period(&self) -> StoreResult<Option<Period>> {
        let state = self.state.read().await;
        Ok(state.periods.iter().find(|p| p.is_active).cloned())
    }
}
