//! Domain records owned by the identity and reference stores.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AssignmentId, DetailsId, OrgId, PeriodId, PersonId, RoleId};
use crate::keys::EdgeKey;

/// Kind of person tracked by the identity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersonType {
    Employee,
    Student,
}

impl std::fmt::Display for PersonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersonType::Employee => write!(f, "EMPLOYEE"),
            PersonType::Student => write!(f, "STUDENT"),
        }
    }
}

impl std::str::FromStr for PersonType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "EMPLOYEE" => Ok(PersonType::Employee),
            "STUDENT" => Ok(PersonType::Student),
            _ => Err(format!("Unknown person type: {s}")),
        }
    }
}

/// Local identity record of an externally sourced person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    /// Source system person id (UUID string).
    pub external_id: String,
    pub person_type: PersonType,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub sort_name: Option<String>,
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub pension_date: Option<NaiveDate>,
    pub is_deceased: bool,
    pub is_active: bool,
    /// Whether reconciliation may change this person automatically.
    pub automatic_sync: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Person {
    /// Create an active, auto-synced person.
    #[must_use]
    pub fn new(external_id: impl Into<String>, person_type: PersonType) -> Self {
        let now = Utc::now();
        Self {
            id: PersonId::new(),
            external_id: external_id.into(),
            person_type,
            first_name: None,
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

    /// Human readable name, falling back to the external id.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(name), None) | (None, Some(name)) => name.clone(),
            (None, None) => self
                .sort_name
                .clone()
                .unwrap_or_else(|| self.external_id.clone()),
        }
    }
}

/// Normalized JSON snapshot of one person at one institution.
///
/// The snapshot is kept as the raw text it was stored with; parsing happens
/// only during change detection so that a corrupt row is observable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonDetails {
    pub id: DetailsId,
    pub person_id: PersonId,
    pub institution: String,
    pub snapshot: String,
    pub updated_at: DateTime<Utc>,
}

impl PersonDetails {
    #[must_use]
    pub fn new(person_id: PersonId, institution: impl Into<String>, snapshot: String) -> Self {
        Self {
            id: DetailsId::new(),
            person_id,
            institution: institution.into(),
            snapshot,
            updated_at: Utc::now(),
        }
    }
}

/// Organization from the reference directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Org {
    pub id: OrgId,
    pub name: String,
    /// Institution number used by the HR source.
    pub inst_nr: String,
    /// Organization type name (e.g. `SCHOOL`).
    pub org_type: Option<String>,
    pub is_administrative: bool,
    pub is_active: bool,
    /// Whether personnel data for this org's institution is imported.
    pub import_source: bool,
}

/// Role from the reference directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    /// Short code; for external roles this equals the HR role code.
    pub shortname: String,
    pub is_active: bool,
    pub automatic_sync: bool,
}

impl Role {
    #[must_use]
    pub fn new(name: impl Into<String>, shortname: impl Into<String>) -> Self {
        Self {
            id: RoleId::new(),
            name: name.into(),
            shortname: shortname.into(),
            is_active: true,
            automatic_sync: true,
        }
    }
}

/// Period from the reference directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    pub id: PeriodId,
    pub name: String,
    pub is_active: bool,
}

/// Typed person/organization/role/period edge (`PPSBR`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub id: AssignmentId,
    pub person_id: PersonId,
    pub org_id: Option<OrgId>,
    pub role_id: RoleId,
    pub period_id: Option<PeriodId>,
    pub institution: Option<String>,
    pub is_active: bool,
    pub automatic_sync: bool,
    /// Raw import payload the edge was materialized from.
    pub source: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoleAssignment {
    /// Identity key of this edge.
    #[must_use]
    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            person: self.person_id,
            org: self.org_id,
            role: self.role_id,
            period: self.period_id,
        }
    }

    /// Create an active, auto-synced edge for the given key.
    #[must_use]
    pub fn from_key(key: EdgeKey, institution: Option<String>, source: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: AssignmentId::new(),
            person_id: key.person,
            org_id: key.org,
            role_id: key.role,
            period_id: key.period,
            institution,
            is_active: true,
            automatic_sync: true,
            source,
            created_at: now,
            updated_at: now,
        }
    }
}
