//! Task records and the task state machine.
//!
//! ```text
//!   new ──► processing ──► completed_ok
//!    ▲            │
//!    │            ▼
//!    └──(reset)── error
//! ```
//!
//! `error → new` is only taken through an explicit reset and only while the
//! task has retries left. `completed_ok` and an exhausted `error` are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use hrsync_core::{TaskId, TaskTypeId};

use crate::error::{TaskError, TaskResult};
use crate::types::{TaskTriple, TaskType};

/// Default number of failed attempts after which a task needs an operator.
pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be processed.
    New,
    /// Claimed by a processor.
    Processing,
    /// Side effect applied.
    CompletedOk,
    /// Side effect failed; see `error_description`.
    Error,
}

impl TaskStatus {
    /// Whether `self → next` is part of the state machine.
    #[must_use]
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::New, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::CompletedOk)
                | (TaskStatus::Processing, TaskStatus::Error)
                | (TaskStatus::Error, TaskStatus::New)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::New => write!(f, "new"),
            TaskStatus::Processing => write!(f, "processing"),
            TaskStatus::CompletedOk => write!(f, "completed_ok"),
            TaskStatus::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(TaskStatus::New),
            "processing" => Ok(TaskStatus::Processing),
            "completed_ok" => Ok(TaskStatus::CompletedOk),
            "error" => Ok(TaskStatus::Error),
            _ => Err(format!("Unknown task status: {s}")),
        }
    }
}

/// Action refinement carried in `data2` of `UPD` tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum UpdateHint {
    /// Create the detail snapshot for an institution.
    #[serde(rename = "ADD-DETAILS")]
    AddDetails {
        #[serde(rename = "instNr")]
        inst_nr: String,
    },
    /// Re-activate a locally inactive identity.
    #[serde(rename = "REACTIVATE")]
    Reactivate,
    /// Refresh attributes and snapshot.
    #[serde(rename = "UPDATE")]
    Update,
}

impl UpdateHint {
    /// Serialize into a `data2` payload.
    #[must_use]
    pub fn to_value(&self) -> Value {
        // Serializing a unit/struct enum into a Value cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Parse from a `data2` payload.
    pub fn from_value(value: &Value) -> TaskResult<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }
}

/// Request to enqueue a task.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub triple: TaskTriple,
    pub data: Value,
    pub data2: Option<Value>,
    pub auto_sync: bool,
    /// Stable identity of the record the task acts on; drives open-task dedup.
    /// Falls back to the canonical payload when absent.
    pub identity: Option<String>,
}

impl NewTask {
    #[must_use]
    pub fn new(triple: TaskTriple, data: Value) -> Self {
        Self {
            triple,
            data,
            data2: None,
            auto_sync: true,
            identity: None,
        }
    }

    #[must_use]
    pub fn with_data2(mut self, data2: Value) -> Self {
        self.data2 = Some(data2);
        self
    }

    #[must_use]
    pub fn with_hint(self, hint: &UpdateHint) -> Self {
        self.with_data2(hint.to_value())
    }

    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    #[must_use]
    pub fn with_auto_sync(mut self, auto_sync: bool) -> Self {
        self.auto_sync = auto_sync;
        self
    }
}

/// A persisted unit of reconciled work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub type_id: TaskTypeId,
    pub triple: TaskTriple,
    pub name: String,
    pub data: Value,
    pub data2: Option<Value>,
    pub status: TaskStatus,
    pub auto_sync: bool,
    pub dedup_key: String,
    pub last_run: Option<DateTime<Utc>>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_finished_at: Option<DateTime<Utc>>,
    pub error_description: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    /// Cancelled tasks are archived and never processed.
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Build a `new` task of the given type.
    #[must_use]
    pub fn create(task_type: &TaskType, request: NewTask, dedup_key: String, max_retries: i32) -> Self {
        let now = Utc::now();
        let name = display_name(&task_type.triple, &request.data);
        Self {
            id: TaskId::new(),
            type_id: task_type.id,
            triple: task_type.triple,
            name,
            data: request.data,
            data2: request.data2,
            status: TaskStatus::New,
            auto_sync: request.auto_sync,
            dedup_key,
            last_run: None,
            processing_started_at: None,
            processing_finished_at: None,
            error_description: None,
            retry_count: 0,
            max_retries,
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, next: TaskStatus, now: DateTime<Utc>) -> TaskResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(TaskError::InvalidTransition {
                task_id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// `new → processing`.
    pub fn start(&mut self, now: DateTime<Utc>) -> TaskResult<()> {
        self.transition(TaskStatus::Processing, now)?;
        self.last_run = Some(now);
        self.processing_started_at = Some(now);
        self.processing_finished_at = None;
        Ok(())
    }

    /// `processing → completed_ok`, clearing any earlier error.
    pub fn complete(&mut self, now: DateTime<Utc>) -> TaskResult<()> {
        self.transition(TaskStatus::CompletedOk, now)?;
        self.processing_finished_at = Some(now);
        self.error_description = None;
        Ok(())
    }

    /// `processing → error`, counting the failed attempt.
    pub fn fail(&mut self, message: impl Into<String>, now: DateTime<Utc>) -> TaskResult<()> {
        self.transition(TaskStatus::Error, now)?;
        self.processing_finished_at = Some(now);
        self.error_description = Some(message.into());
        self.retry_count += 1;
        Ok(())
    }

    /// `error → new`, refused once retries are exhausted.
    pub fn reset(&mut self, now: DateTime<Utc>) -> TaskResult<()> {
        if self.status == TaskStatus::Error && self.is_exhausted() {
            return Err(TaskError::RetriesExhausted {
                task_id: self.id,
                retry_count: self.retry_count,
                max_retries: self.max_retries,
            });
        }
        self.transition(TaskStatus::New, now)
    }

    /// Operator override: `error → new` with the retry budget restored.
    pub fn force_reset(&mut self, now: DateTime<Utc>) -> TaskResult<()> {
        self.transition(TaskStatus::New, now)?;
        self.retry_count = 0;
        Ok(())
    }

    /// Archive a `new` task so it is never processed.
    pub fn archive(&mut self, now: DateTime<Utc>) -> TaskResult<()> {
        if self.status != TaskStatus::New {
            return Err(TaskError::InvalidTransition {
                task_id: self.id,
                from: self.status,
                to: TaskStatus::New,
            });
        }
        self.archived = true;
        self.updated_at = now;
        Ok(())
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// Open tasks block enqueueing a duplicate.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.archived && matches!(self.status, TaskStatus::New | TaskStatus::Processing)
    }

    /// Parsed `UPD` hint, if any.
    pub fn hint(&self) -> TaskResult<Option<UpdateHint>> {
        self.data2.as_ref().map(UpdateHint::from_value).transpose()
    }
}

/// `"{ACTION} {OBJECT}: {label}"`.
fn display_name(triple: &TaskTriple, data: &Value) -> String {
    let label = ["sortName", "name", "personId", "person_db_id"]
        .iter()
        .find_map(|field| match data.get(*field) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| triple.dispatch_name());
    format!("{} {}: {}", triple.action, triple.object, label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TaskAction, TaskObject, TaskTarget};
    use serde_json::json;

    fn employee_add() -> Task {
        let task_type = TaskType::new(TaskTriple::new(
            TaskTarget::Db,
            TaskObject::Employee,
            TaskAction::Add,
        ));
        let request = NewTask::new(task_type.triple, json!({"personId": "U1", "sortName": "Doe Jane"}));
        Task::create(&task_type, request, "k".into(), DEFAULT_MAX_RETRIES)
    }

    #[test]
    fn test_display_name() {
        assert_eq!(employee_add().name, "ADD EMPLOYEE: Doe Jane");
    }

    #[test]
    fn test_new_to_completed_requires_processing() {
        let mut task = employee_add();
        let err = task.complete(Utc::now()).unwrap_err();
        assert!(matches!(err, TaskError::InvalidTransition { .. }));
        assert_eq!(task.status, TaskStatus::New);

        task.start(Utc::now()).unwrap();
        task.complete(Utc::now()).unwrap();
        assert_eq!(task.status, TaskStatus::CompletedOk);
        assert!(task.last_run.is_some());
    }

    #[test]
    fn test_new_to_error_requires_processing() {
        let mut task = employee_add();
        assert!(task.fail("nope", Utc::now()).is_err());
        assert_eq!(task.retry_count, 0);
    }

    #[test]
    fn test_completed_is_terminal() {
        let mut task = employee_add();
        task.start(Utc::now()).unwrap();
        task.complete(Utc::now()).unwrap();
        assert!(task.start(Utc::now()).is_err());
        assert!(task.reset(Utc::now()).is_err());
        assert!(task.force_reset(Utc::now()).is_err());
    }

    #[test]
    fn test_reset_is_bounded_by_max_retries() {
        let mut task = employee_add();
        for attempt in 1..=DEFAULT_MAX_RETRIES {
            task.start(Utc::now()).unwrap();
            task.fail(format!("attempt {attempt}"), Utc::now()).unwrap();
            if attempt < DEFAULT_MAX_RETRIES {
                task.reset(Utc::now()).unwrap();
            }
        }
        assert_eq!(task.retry_count, DEFAULT_MAX_RETRIES);
        assert!(matches!(
            task.reset(Utc::now()),
            Err(TaskError::RetriesExhausted { .. })
        ));
        assert_eq!(task.status, TaskStatus::Error);

        task.force_reset(Utc::now()).unwrap();
        assert_eq!(task.status, TaskStatus::New);
        assert_eq!(task.retry_count, 0);
    }

    #[test]
    fn test_complete_clears_previous_error() {
        let mut task = employee_add();
        task.start(Utc::now()).unwrap();
        task.fail("boom", Utc::now()).unwrap();
        task.reset(Utc::now()).unwrap();
        task.start(Utc::now()).unwrap();
        task.complete(Utc::now()).unwrap();
        assert!(task.error_description.is_none());
        assert_eq!(task.retry_count, 1);
    }

    #[test]
    fn test_archive_only_new_tasks() {
        let mut task = employee_add();
        task.archive(Utc::now()).unwrap();
        assert!(!task.is_open());

        let mut running = employee_add();
        running.start(Utc::now()).unwrap();
        assert!(running.archive(Utc::now()).is_err());
    }

    #[test]
    fn test_update_hint_wire_format() {
        let hint = UpdateHint::AddDetails {
            inst_nr: "001".into(),
        };
        assert_eq!(hint.to_value(), json!({"action": "ADD-DETAILS", "instNr": "001"}));
        assert_eq!(UpdateHint::Reactivate.to_value(), json!({"action": "REACTIVATE"}));
        assert_eq!(
            UpdateHint::from_value(&json!({"action": "UPDATE"})).unwrap(),
            UpdateHint::Update
        );
    }
}
