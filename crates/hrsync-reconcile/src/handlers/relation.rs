//! `DB PROPRELATION *` handlers.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument};

use hrsync_core::{ChangeSet, EdgeKey, IdentityStore, Mutation, RoleAssignment};
use hrsync_tasks::{HandlerError, HandlerResult, NewTask, Task, TaskHandler, TaskQueue};

use crate::payload::{
    GroupMemberPayload, RelationAddPayload, RelationDeactPayload, GROUPMEMBER_ADD, GROUPMEMBER_REMOVE,
};

/// `db_proprelation_add`: materialize one edge.
pub struct RelationAddHandler {
    identities: Arc<dyn IdentityStore>,
    queue: TaskQueue,
}

impl RelationAddHandler {
    #[must_use]
    pub fn new(identities: Arc<dyn IdentityStore>, queue: TaskQueue) -> Self {
        Self { identities, queue }
    }
}

#[async_trait]
impl TaskHandler for RelationAddHandler {
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    async fn handle(&self, task: &Task) -> HandlerResult<()> {
        let payload: RelationAddPayload = serde_json::from_value(task.data.clone())?;
        let key = EdgeKey {
            person: payload.person_db_id,
            org: payload.org_id,
            role: payload.role_id,
            period: payload.period_id,
        };

        let existing = self.identities.list_active_assignments(payload.person_db_id).await?;
        // A retry after a failed follow-up enqueue finds the edge in place and
        // only enqueues the follow-up again.
        let edge_id = if let Some(edge) = existing.iter().find(|edge| edge.key() == key) {
            debug!(edge = %key, "Edge already active");
            edge.id
        } else {
            if self.identities.get_person(payload.person_db_id).await?.is_none() {
                return Err(HandlerError::NotFound(format!("person {}", payload.person_db_id)));
            }
            let edge = RoleAssignment::from_key(
                key,
                Some(payload.inst_nr.clone()),
                Value::Object(payload.assignment.clone()),
            );
            let edge_id = edge.id;
            let mut changes = ChangeSet::new();
            changes.push(Mutation::InsertAssignment(edge));
            self.identities.apply(changes).await?;
            info!(person_id = %payload.person_id, role = %payload.role_code, "Role assignment added");
            edge_id
        };

        let member = GroupMemberPayload {
            person_id: payload.person_id,
            person_db_id: payload.person_db_id,
            proprelation_id: edge_id,
            group: payload.role_code,
            org_id: payload.org_id,
        };
        self.queue
            .enqueue(NewTask::new(GROUPMEMBER_ADD, serde_json::to_value(&member)?).with_identity(key.to_string()))
            .await?;
        Ok(())
    }
}

/// `db_proprelation_deact`: deactivate one edge.
pub struct RelationDeactivateHandler {
    identities: Arc<dyn IdentityStore>,
    queue: TaskQueue,
}

impl RelationDeactivateHandler {
    #[must_use]
    pub fn new(identities: Arc<dyn IdentityStore>, queue: TaskQueue) -> Self {
        Self { identities, queue }
    }
}

#[async_trait]
impl TaskHandler for RelationDeactivateHandler {
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    async fn handle(&self, task: &Task) -> HandlerResult<()> {
        let payload: RelationDeactPayload = serde_json::from_value(task.data.clone())?;
        let edge = self
            .identities
            .get_assignment(payload.proprelation_id)
            .await?
            .ok_or_else(|| HandlerError::NotFound(format!("assignment {}", payload.proprelation_id)))?;

        // Already inactive after a cascading employee deactivation or an
        // earlier attempt; the membership removal is still enqueued.
        if edge.is_active {
            let mut changes = ChangeSet::new();
            changes.push(Mutation::DeactivateAssignment(edge.id));
            self.identities.apply(changes).await?;
            info!(person_id = %payload.person_id, edge = %edge.id, reason = %payload.reason, "Role assignment deactivated");
        } else {
            debug!(edge = %edge.id, "Edge already inactive");
        }

        let member = GroupMemberPayload {
            person_id: payload.person_id,
            person_db_id: edge.person_id,
            proprelation_id: edge.id,
            group: payload.role_code.unwrap_or_else(|| edge.role_id.to_string()),
            org_id: edge.org_id,
        };
        self.queue
            .enqueue(
                NewTask::new(GROUPMEMBER_REMOVE, serde_json::to_value(&member)?)
                    .with_identity(format!("proprelation:{}", edge.id)),
            )
            .await?;
        Ok(())
    }
}
