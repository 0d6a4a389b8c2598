//! Person and per-institution detail snapshot rows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use hrsync_core::{Person, PersonDetails, PersonType};

use crate::error::{DbError, DbResult};

/// A row of `persons`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PersonRow {
    pub id: Uuid,
    pub external_id: String,
    /// `EMPLOYEE` or `STUDENT`.
    pub person_type: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub sort_name: Option<String>,
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub pension_date: Option<NaiveDate>,
    pub is_deceased: bool,
    pub is_active: bool,
    pub automatic_sync: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersonRow {
    pub fn into_person(self) -> DbResult<Person> {
        let person_type: PersonType = self
            .person_type
            .parse()
            .map_err(DbError::ValidationFailed)?;
        Ok(Person {
            id: self.id.into(),
            external_id: self.external_id,
            person_type,
            first_name: self.first_name,
            last_name: self.last_name,
            sort_name: self.sort_name,
            email: self.email,
            birth_date: self.birth_date,
            pension_date: self.pension_date,
            is_deceased: self.is_deceased,
            is_active: self.is_active,
            automatic_sync: self.automatic_sync,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    pub async fn find_by_external_id<'e, E>(
        executor: E,
        external_id: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, external_id, person_type, first_name, last_name, sort_name, email,
                   birth_date, pension_date, is_deceased, is_active, automatic_sync,
                   created_at, updated_at
            FROM persons
            WHERE external_id = $1
            ",
        )
        .bind(external_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn get_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, external_id, person_type, first_name, last_name, sort_name, email,
                   birth_date, pension_date, is_deceased, is_active, automatic_sync,
                   created_at, updated_at
            FROM persons
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Active persons of a type that allow automatic sync, by external id.
    pub async fn list_active_synced<'e, E>(
        executor: E,
        person_type: PersonType,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, external_id, person_type, first_name, last_name, sort_name, email,
                   birth_date, pension_date, is_deceased, is_active, automatic_sync,
                   created_at, updated_at
            FROM persons
            WHERE person_type = $1 AND is_active AND automatic_sync
            ORDER BY external_id
            ",
        )
        .bind(person_type.to_string())
        .fetch_all(executor)
        .await
    }

    pub async fn insert<'e, E>(executor: E, person: &Person) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r"
            INSERT INTO persons
                (id, external_id, person_type, first_name, last_name, sort_name, email,
                 birth_date, pension_date, is_deceased, is_active, automatic_sync,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ",
        )
        .bind(Uuid::from(person.id))
        .bind(&person.external_id)
        .bind(person.person_type.to_string())
        .bind(&person.first_name)
        .bind(&person.last_name)
        .bind(&person.sort_name)
        .bind(&person.email)
        .bind(person.birth_date)
        .bind(person.pension_date)
        .bind(person.is_deceased)
        .bind(person.is_active)
        .bind(person.automatic_sync)
        .bind(person.created_at)
        .bind(person.updated_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Overwrite every mutable column. Returns `false` if the row is missing.
    pub async fn update<'e, E>(executor: E, person: &Person) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE persons
            SET first_name = $2, last_name = $3, sort_name = $4, email = $5,
                birth_date = $6, pension_date = $7, is_deceased = $8, is_active = $9,
                automatic_sync = $10, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(Uuid::from(person.id))
        .bind(&person.first_name)
        .bind(&person.last_name)
        .bind(&person.sort_name)
        .bind(&person.email)
        .bind(person.birth_date)
        .bind(person.pension_date)
        .bind(person.is_deceased)
        .bind(person.is_active)
        .bind(person.automatic_sync)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// A row of `person_details`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PersonDetailsRow {
    pub id: Uuid,
    pub person_id: Uuid,
    pub institution: String,
    pub snapshot: String,
    pub updated_at: DateTime<Utc>,
}

impl From<PersonDetailsRow> for PersonDetails {
    fn from(row: PersonDetailsRow) -> Self {
        Self {
            id: row.id.into(),
            person_id: row.person_id.into(),
            institution: row.institution,
            snapshot: row.snapshot,
            updated_at: row.updated_at,
        }
    }
}

impl PersonDetailsRow {
    pub async fn find<'e, E>(
        executor: E,
        person_id: Uuid,
        institution: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, person_id, institution, snapshot, updated_at
            FROM person_details
            WHERE person_id = $1 AND institution = $2
            ",
        )
        .bind(person_id)
        .bind(institution)
        .fetch_optional(executor)
        .await
    }

    /// Insert or replace the snapshot for `(person, institution)`.
    pub async fn upsert<'e, E>(executor: E, details: &PersonDetails) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r"
            INSERT INTO person_details (id, person_id, institution, snapshot, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (person_id, institution)
            DO UPDATE SET snapshot = EXCLUDED.snapshot, updated_at = NOW()
            ",
        )
        .bind(Uuid::from(details.id))
        .bind(Uuid::from(details.person_id))
        .bind(&details.institution)
        .bind(&details.snapshot)
        .execute(executor)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(person_type: &str) -> PersonRow {
        let now = Utc::now();
        PersonRow {
            id: Uuid::new_v4(),
            external_id: "E1".to_string(),
            person_type: person_type.to_string(),
            first_name: Some("An".to_string()),
            last_name: None,
            sort_name: None,
            email: None,
            birth_date: None,
            pension_date: None,
            is_deceased: false,
            is_active: true,
            automatic_sync: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_into_person() {
        let person = row("EMPLOYEE").into_person().unwrap();
        assert_eq!(person.person_type, PersonType::Employee);
        assert_eq!(person.display_name(), "An");
    }

    #[test]
    fn test_unknown_person_type_is_rejected() {
        let err = row("CONTRACTOR").into_person().unwrap_err();
        assert!(err.is_validation_failed());
    }
}
