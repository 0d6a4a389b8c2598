//! Directory account handlers (`LDAP USER *`, `LDAP GROUPMEMBER *`).
//!
//! The directory protocol itself lives behind [`DirectoryService`]; the
//! handlers only decode the payload and pick the operation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use hrsync_tasks::{HandlerError, HandlerResult, Task, TaskAction, TaskHandler};

use crate::payload::{DirectoryUserPayload, GroupMemberPayload};

/// Account operations against the external directory.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn create_user(&self, user: &DirectoryUserPayload) -> HandlerResult<()>;

    async fn update_user(&self, user: &DirectoryUserPayload) -> HandlerResult<()>;

    async fn disable_user(&self, user: &DirectoryUserPayload) -> HandlerResult<()>;

    async fn add_member(&self, member: &GroupMemberPayload) -> HandlerResult<()>;

    async fn remove_member(&self, member: &GroupMemberPayload) -> HandlerResult<()>;
}

/// Directory service that only logs the requested operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDirectoryService;

#[async_trait]
impl DirectoryService for LoggingDirectoryService {
    async fn create_user(&self, user: &DirectoryUserPayload) -> HandlerResult<()> {
        info!(person_id = %user.person_id, name = %user.name, "Directory: create user");
        Ok(())
    }

    async fn update_user(&self, user: &DirectoryUserPayload) -> HandlerResult<()> {
        info!(person_id = %user.person_id, name = %user.name, "Directory: update user");
        Ok(())
    }

    async fn disable_user(&self, user: &DirectoryUserPayload) -> HandlerResult<()> {
        info!(person_id = %user.person_id, "Directory: disable user");
        Ok(())
    }

    async fn add_member(&self, member: &GroupMemberPayload) -> HandlerResult<()> {
        info!(person_id = %member.person_id, group = %member.group, "Directory: add group member");
        Ok(())
    }

    async fn remove_member(&self, member: &GroupMemberPayload) -> HandlerResult<()> {
        info!(person_id = %member.person_id, group = %member.group, "Directory: remove group member");
        Ok(())
    }
}

/// `ldap_user_add`, `ldap_user_upd`, `ldap_user_deact`.
pub struct DirectoryUserHandler {
    service: Arc<dyn DirectoryService>,
}

impl DirectoryUserHandler {
    #[must_use]
    pub fn new(service: Arc<dyn DirectoryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TaskHandler for DirectoryUserHandler {
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    async fn handle(&self, task: &Task) -> HandlerResult<()> {
        let user: DirectoryUserPayload = serde_json::from_value(task.data.clone())?;
        match task.triple.action {
            TaskAction::Add => self.service.create_user(&user).await,
            TaskAction::Upd => self.service.update_user(&user).await,
            TaskAction::Deact => self.service.disable_user(&user).await,
            other => Err(HandlerError::Unsupported(format!("directory user action {other}"))),
        }
    }
}

/// `ldap_groupmember_add`, `ldap_groupmember_remove`.
pub struct GroupMemberHandler {
    service: Arc<dyn DirectoryService>,
}

impl GroupMemberHandler {
    #[must_use]
    pub fn new(service: Arc<dyn DirectoryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TaskHandler for GroupMemberHandler {
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    async fn handle(&self, task: &Task) -> HandlerResult<()> {
        let member: GroupMemberPayload = serde_json::from_value(task.data.clone())?;
        match task.triple.action {
            TaskAction::Add => self.service.add_member(&member).await,
            TaskAction::Remove => self.service.remove_member(&member).await,
            other => Err(HandlerError::Unsupported(format!("group member action {other}"))),
        }
    }
}
