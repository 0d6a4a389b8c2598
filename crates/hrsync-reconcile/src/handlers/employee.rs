//! `DB EMPLOYEE *` handlers.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{info, instrument};

use hrsync_core::{ChangeSet, IdentityStore, Mutation, Person, PersonDetails, PersonType};
use hrsync_import::EmployeeRecord;
use hrsync_tasks::{
    HandlerError, HandlerResult, NewTask, Task, TaskHandler, TaskQueue, UpdateHint,
};

use crate::payload::{DirectoryUserPayload, INST_NR, USER_ADD, USER_DEACT, USER_UPD};
use crate::snapshot::snapshot_text;

fn payload_object(task: &Task) -> HandlerResult<&Map<String, Value>> {
    task.data
        .as_object()
        .ok_or_else(|| HandlerError::payload("task data is not an object"))
}

/// External person id from either payload shape.
fn external_id(data: &Map<String, Value>) -> HandlerResult<String> {
    match data.get("personId") {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(HandlerError::payload("missing personId")),
    }
}

fn institution(data: &Map<String, Value>) -> Option<&str> {
    data.get(INST_NR).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Copy imported attributes onto the local person.
fn apply_record(person: &mut Person, record: &EmployeeRecord) {
    person.first_name = record.first_name.clone();
    person.last_name = record.last_name.clone();
    person.sort_name = record.sort_name();
    person.email = record.email.clone();
    person.birth_date = record.birth_date;
    person.pension_date = record.pension_date;
    person.is_deceased = record.deceased();
    person.updated_at = Utc::now();
}

fn snapshot_for(person: &Person, inst: &str, data: &Value) -> Mutation {
    Mutation::UpsertDetails(PersonDetails::new(person.id, inst, snapshot_text(data)))
}

pub(crate) fn user_payload(person: &Person) -> HandlerResult<Value> {
    Ok(serde_json::to_value(DirectoryUserPayload {
        person_id: person.external_id.clone(),
        person_db_id: person.id,
        name: person.display_name(),
    })?)
}

async fn require_person(identities: &dyn IdentityStore, external_id: &str) -> HandlerResult<Person> {
    identities
        .find_person_by_external_id(external_id)
        .await?
        .ok_or_else(|| HandlerError::NotFound(format!("person {external_id}")))
}

/// `db_employee_add`: create the person and its first detail snapshot.
///
/// Re-entrant: when the person already exists only the snapshot is written.
pub struct EmployeeAddHandler {
    identities: Arc<dyn IdentityStore>,
    queue: TaskQueue,
}

impl EmployeeAddHandler {
    #[must_use]
    pub fn new(identities: Arc<dyn IdentityStore>, queue: TaskQueue) -> Self {
        Self { identities, queue }
    }
}

#[async_trait]
impl TaskHandler for EmployeeAddHandler {
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    async fn handle(&self, task: &Task) -> HandlerResult<()> {
        let data = payload_object(task)?;
        let inst = institution(data).ok_or_else(|| HandlerError::payload("missing instNr"))?;
        let record: EmployeeRecord = serde_json::from_value(task.data.clone())?;

        let mut changes = ChangeSet::new();
        let person = match self.identities.find_person_by_external_id(&record.person_id).await? {
            Some(existing) => existing,
            None => {
                let mut person = Person::new(record.person_id.clone(), PersonType::Employee);
                apply_record(&mut person, &record);
                changes.push(Mutation::InsertPerson(person.clone()));
                person
            }
        };
        changes.push(snapshot_for(&person, inst, &task.data));
        self.identities.apply(changes).await?;
        info!(person_id = %person.external_id, inst = %inst, "Employee added");

        self.queue
            .enqueue(NewTask::new(USER_ADD, user_payload(&person)?).with_identity(person.external_id.clone()))
            .await?;
        Ok(())
    }
}

/// `db_employee_upd`: behaviour depends on the hint in `data2`.
pub struct EmployeeUpdateHandler {
    identities: Arc<dyn IdentityStore>,
    queue: TaskQueue,
}

impl EmployeeUpdateHandler {
    #[must_use]
    pub fn new(identities: Arc<dyn IdentityStore>, queue: TaskQueue) -> Self {
        Self { identities, queue }
    }
}

#[async_trait]
impl TaskHandler for EmployeeUpdateHandler {
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    async fn handle(&self, task: &Task) -> HandlerResult<()> {
        let data = payload_object(task)?;
        let hint = task
            .hint()?
            .ok_or_else(|| HandlerError::payload("missing update hint"))?;
        let mut person = require_person(self.identities.as_ref(), &external_id(data)?).await?;

        let mut changes = ChangeSet::new();
        match &hint {
            UpdateHint::AddDetails { inst_nr } => {
                changes.push(snapshot_for(&person, inst_nr, &task.data));
            }
            UpdateHint::Reactivate | UpdateHint::Update => {
                let record: EmployeeRecord = serde_json::from_value(task.data.clone())?;
                apply_record(&mut person, &record);
                if hint == UpdateHint::Reactivate {
                    person.is_active = true;
                }
                changes.push(Mutation::UpdatePerson(person.clone()));
                if let Some(inst) = institution(data) {
                    changes.push(snapshot_for(&person, inst, &task.data));
                }
            }
        }
        self.identities.apply(changes).await?;

        if hint == UpdateHint::Reactivate {
            info!(person_id = %person.external_id, "Employee re-activated");
            self.queue
                .enqueue(NewTask::new(USER_UPD, user_payload(&person)?).with_identity(person.external_id.clone()))
                .await?;
        }
        Ok(())
    }
}

/// `db_employee_deact`: deactivate the person and every active edge of it.
pub struct EmployeeDeactivateHandler {
    identities: Arc<dyn IdentityStore>,
    queue: TaskQueue,
}

impl EmployeeDeactivateHandler {
    #[must_use]
    pub fn new(identities: Arc<dyn IdentityStore>, queue: TaskQueue) -> Self {
        Self { identities, queue }
    }
}

#[async_trait]
impl TaskHandler for EmployeeDeactivateHandler {
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    async fn handle(&self, task: &Task) -> HandlerResult<()> {
        let data = payload_object(task)?;
        let mut person = require_person(self.identities.as_ref(), &external_id(data)?).await?;

        person.is_active = false;
        let mut changes = ChangeSet::new();
        changes
            .push(Mutation::UpdatePerson(person.clone()))
            .push(Mutation::DeactivateAssignmentsOf(person.id));
        // Deactivations driven by an import record keep its snapshot, so the
        // next run sees the person as unchanged.
        if let Some(inst) = institution(data) {
            changes.push(snapshot_for(&person, inst, &task.data));
        }
        self.identities.apply(changes).await?;
        info!(person_id = %person.external_id, "Employee deactivated");

        self.queue
            .enqueue(NewTask::new(USER_DEACT, user_payload(&person)?).with_identity(person.external_id.clone()))
            .await?;
        Ok(())
    }
}
