//! `DB ROLE ADD` handler.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use hrsync_core::{ChangeSet, IdentityStore, Mutation, ReferenceDirectory, Role};
use hrsync_tasks::{HandlerResult, Task, TaskHandler};

use crate::payload::RolePayload;

/// `db_role_add`: create a discovered canonical role if it is still missing.
pub struct RoleAddHandler {
    identities: Arc<dyn IdentityStore>,
    directory: Arc<dyn ReferenceDirectory>,
}

impl RoleAddHandler {
    #[must_use]
    pub fn new(identities: Arc<dyn IdentityStore>, directory: Arc<dyn ReferenceDirectory>) -> Self {
        Self {
            identities,
            directory,
        }
    }
}

#[async_trait]
impl TaskHandler for RoleAddHandler {
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    async fn handle(&self, task: &Task) -> HandlerResult<()> {
        let payload: RolePayload = serde_json::from_value(task.data.clone())?;
        if self.directory.role_by_code(&payload.shortname).await?.is_some() {
            debug!(code = %payload.shortname, "Role already exists");
            return Ok(());
        }

        let mut role = Role::new(payload.name, payload.shortname);
        role.automatic_sync = payload.automatic_sync;
        role.is_active = payload.is_active;
        info!(code = %role.shortname, name = %role.name, "Creating role");

        let mut changes = ChangeSet::new();
        changes.push(Mutation::InsertRole(role));
        self.identities.apply(changes).await?;
        Ok(())
    }
}
