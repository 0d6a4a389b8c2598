//! Task payloads exchanged between the engine and the handlers.
//!
//! Identity tasks (`DB EMPLOYEE *`) carry the imported record itself as
//! `data`, so the handler can store exactly what the engine compared. The
//! other task kinds use the structs below.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use hrsync_core::{AssignmentId, OrgId, PeriodId, PersonId, RoleId};
use hrsync_tasks::{TaskAction, TaskObject, TaskTarget, TaskTriple};

pub const EMPLOYEE_ADD: TaskTriple =
    TaskTriple::new(TaskTarget::Db, TaskObject::Employee, TaskAction::Add);
pub const EMPLOYEE_UPD: TaskTriple =
    TaskTriple::new(TaskTarget::Db, TaskObject::Employee, TaskAction::Upd);
pub const EMPLOYEE_DEACT: TaskTriple =
    TaskTriple::new(TaskTarget::Db, TaskObject::Employee, TaskAction::Deact);
pub const RELATION_ADD: TaskTriple =
    TaskTriple::new(TaskTarget::Db, TaskObject::PropRelation, TaskAction::Add);
pub const RELATION_DEACT: TaskTriple =
    TaskTriple::new(TaskTarget::Db, TaskObject::PropRelation, TaskAction::Deact);
pub const ROLE_ADD: TaskTriple = TaskTriple::new(TaskTarget::Db, TaskObject::Role, TaskAction::Add);
pub const USER_ADD: TaskTriple = TaskTriple::new(TaskTarget::Ldap, TaskObject::User, TaskAction::Add);
pub const USER_UPD: TaskTriple = TaskTriple::new(TaskTarget::Ldap, TaskObject::User, TaskAction::Upd);
pub const USER_DEACT: TaskTriple =
    TaskTriple::new(TaskTarget::Ldap, TaskObject::User, TaskAction::Deact);
pub const GROUPMEMBER_ADD: TaskTriple =
    TaskTriple::new(TaskTarget::Ldap, TaskObject::GroupMember, TaskAction::Add);
pub const GROUPMEMBER_REMOVE: TaskTriple =
    TaskTriple::new(TaskTarget::Ldap, TaskObject::GroupMember, TaskAction::Remove);

/// Field of identity payloads holding the institution.
pub const INST_NR: &str = "instNr";
/// Field of identity payloads holding the person's assignments there.
pub const ASSIGNMENTS: &str = "assignments";

/// `DB EMPLOYEE DEACT` for a person missing from the import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsentPersonPayload {
    pub person_id: String,
    #[serde(rename = "person_db_id")]
    pub person_db_id: PersonId,
    pub reason: String,
}

/// `DB PROPRELATION ADD`: everything needed to materialize one edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationAddPayload {
    pub person_id: String,
    #[serde(rename = "person_db_id")]
    pub person_db_id: PersonId,
    pub inst_nr: String,
    pub org_id: Option<OrgId>,
    pub role_code: String,
    pub role_name: String,
    pub role_id: RoleId,
    pub sap_role_id: Option<RoleId>,
    pub be_role_id: Option<RoleId>,
    pub period_id: Option<PeriodId>,
    pub assignment: Map<String, Value>,
}

/// `DB PROPRELATION DEACT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDeactPayload {
    #[serde(rename = "proprelation_id")]
    pub proprelation_id: AssignmentId,
    pub person_id: String,
    /// HR role code the edge was created for, when known.
    pub role_code: Option<String>,
    pub reason: String,
}

/// `DB ROLE ADD` for a discovered role code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePayload {
    pub name: String,
    pub shortname: String,
    pub automatic_sync: bool,
    pub is_active: bool,
}

/// `LDAP USER *`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUserPayload {
    pub person_id: String,
    #[serde(rename = "person_db_id")]
    pub person_db_id: PersonId,
    pub name: String,
}

/// `LDAP GROUPMEMBER *`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMemberPayload {
    pub person_id: String,
    #[serde(rename = "person_db_id")]
    pub person_db_id: PersonId,
    #[serde(rename = "proprelation_id")]
    pub proprelation_id: AssignmentId,
    /// Directory group, named after the role code.
    pub group: String,
    pub org_id: Option<OrgId>,
}
