//! PostgreSQL identity store and reference directory.

use async_trait::async_trait;
use sqlx::{PgConnection, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use hrsync_core::{
    AssignmentId, ChangeSet, IdentityStore, Mutation, Org, OrgId, Period, Person, PersonDetails,
    PersonId, PersonType, ReferenceDirectory, Role, RoleAssignment, RoleId, StoreResult,
};

use crate::error::{DbError, DbResult};
use crate::models::{OrgRow, PeriodRow, PersonDetailsRow, PersonRow, RoleAssignmentRow, RoleRow};
use crate::pool::DbPool;

/// Identity store and reference directory over one pool.
///
/// [`IdentityStore::apply`] runs the whole change set in a single
/// transaction.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn apply_in(tx: &mut Transaction<'static, Postgres>, changes: ChangeSet) -> DbResult<()> {
        for mutation in changes {
            apply_mutation(&mut **tx, mutation).await?;
        }
        Ok(())
    }
}

async fn apply_mutation(conn: &mut PgConnection, mutation: Mutation) -> DbResult<()> {
    match mutation {
        Mutation::InsertPerson(person) => {
            PersonRow::insert(&mut *conn, &person).await?;
        }
        Mutation::UpdatePerson(person) => {
            if !PersonRow::update(&mut *conn, &person).await? {
                return Err(DbError::NotFound(format!("person {}", person.id)));
            }
        }
        Mutation::UpsertDetails(details) => {
            PersonDetailsRow::upsert(&mut *conn, &details).await?;
        }
        Mutation::InsertAssignment(edge) => {
            RoleAssignmentRow::insert(&mut *conn, &edge).await?;
        }
        Mutation::DeactivateAssignment(id) => {
            if !RoleAssignmentRow::deactivate(&mut *conn, id.into()).await? {
                return Err(DbError::NotFound(format!("assignment {id}")));
            }
        }
        Mutation::DeactivateAssignmentsOf(person) => {
            let count = RoleAssignmentRow::deactivate_for_person(&mut *conn, person.into()).await?;
            debug!(person_id = %person, count, "Deactivated assignments");
        }
        Mutation::InsertRole(role) => {
            RoleRow::insert(&mut *conn, &role).await?;
        }
    }
    Ok(())
}

fn persons(rows: Vec<PersonRow>) -> DbResult<Vec<Person>> {
    rows.into_iter().map(PersonRow::into_person).collect()
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_person_by_external_id(&self, external_id: &str) -> StoreResult<Option<Person>> {
        let row = PersonRow::find_by_external_id(self.pool.inner(), external_id)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(PersonRow::into_person).transpose()?)
    }

    async fn get_person(&self, id: PersonId) -> StoreResult<Option<Person>> {
        let row = PersonRow::get_by_id(self.pool.inner(), id.into())
            .await
            .map_err(DbError::from)?;
        Ok(row.map(PersonRow::into_person).transpose()?)
    }

    async fn list_active_synced(&self, person_type: PersonType) -> StoreResult<Vec<Person>> {
        let rows = PersonRow::list_active_synced(self.pool.inner(), person_type)
            .await
            .map_err(DbError::from)?;
        Ok(persons(rows)?)
    }

    async fn find_details(
        &self,
        person: PersonId,
        institution: &str,
    ) -> StoreResult<Option<PersonDetails>> {
        let row = PersonDetailsRow::find(self.pool.inner(), person.into(), institution)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Into::into))
    }

    async fn list_active_assignments(&self, person: PersonId) -> StoreResult<Vec<RoleAssignment>> {
        let rows = RoleAssignmentRow::list_active_for_person(self.pool.inner(), person.into())
            .await
            .map_err(DbError::from)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_assignment(&self, id: AssignmentId) -> StoreResult<Option<RoleAssignment>> {
        let row = RoleAssignmentRow::get_by_id(self.pool.inner(), id.into())
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Into::into))
    }

    async fn apply(&self, changes: ChangeSet) -> StoreResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let size = changes.len();
        let mut tx = self.pool.begin().await?;
        // Dropping the transaction on error rolls it back.
        Self::apply_in(&mut tx, changes).await?;
        tx.commit().await.map_err(DbError::from)?;
        debug!(mutations = size, "Change set committed");
        Ok(())
    }
}

#[async_trait]
impl ReferenceDirectory for PgStore {
    async fn import_institutions(&self) -> StoreResult<Vec<String>> {
        Ok(OrgRow::import_institutions(self.pool.inner())
            .await
            .map_err(DbError::from)?)
    }

    async fn orgs_by_institution(&self, inst_nr: &str) -> StoreResult<Vec<Org>> {
        let rows = OrgRow::list_by_institution(self.pool.inner(), inst_nr)
            .await
            .map_err(DbError::from)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn parent_org(&self, org: OrgId) -> StoreResult<Option<Org>> {
        let row = OrgRow::parent_of(self.pool.inner(), org.into())
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Into::into))
    }

    async fn role_by_code(&self, code: &str) -> StoreResult<Option<Role>> {
        let row = RoleRow::find_by_shortname(self.pool.inner(), code)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Into::into))
    }

    async fn backend_role_for(&self, role: RoleId) -> StoreResult<Option<Role>> {
        let row = RoleRow::backend_for(self.pool.inner(), Uuid::from(role))
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Into::into))
    }

    async fn org_role(&self, org: OrgId) -> StoreResult<Option<Role>> {
        let row = RoleRow::for_org(self.pool.inner(), org.into())
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Into::into))
    }

    async fn current_period(&self) -> StoreResult<Option<Period>> {
        let row = PeriodRow::current(self.pool.inner())
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Into::into))
    }
}
