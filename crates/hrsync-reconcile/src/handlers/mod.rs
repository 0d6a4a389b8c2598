//! Standard task handlers.

pub mod directory;
pub mod employee;
pub mod relation;
pub mod role;

use std::sync::Arc;

use hrsync_core::{IdentityStore, ReferenceDirectory};
use hrsync_tasks::{HandlerRegistry, TaskQueue};

pub use directory::{DirectoryService, DirectoryUserHandler, GroupMemberHandler, LoggingDirectoryService};
pub use employee::{EmployeeAddHandler, EmployeeDeactivateHandler, EmployeeUpdateHandler};
pub use relation::{RelationAddHandler, RelationDeactivateHandler};
pub use role::RoleAddHandler;

use crate::payload::{
    EMPLOYEE_ADD, EMPLOYEE_DEACT, EMPLOYEE_UPD, GROUPMEMBER_ADD, GROUPMEMBER_REMOVE, RELATION_ADD,
    RELATION_DEACT, ROLE_ADD, USER_ADD, USER_DEACT, USER_UPD,
};

/// Registry with a handler for every auto-processed standard task type.
#[must_use]
pub fn standard_handlers(
    identities: Arc<dyn IdentityStore>,
    directory: Arc<dyn ReferenceDirectory>,
    queue: TaskQueue,
    service: Arc<dyn DirectoryService>,
) -> HandlerRegistry {
    let users = Arc::new(DirectoryUserHandler::new(Arc::clone(&service)));
    let members = Arc::new(GroupMemberHandler::new(service));

    HandlerRegistry::new()
        .with(ROLE_ADD, Arc::new(RoleAddHandler::new(Arc::clone(&identities), directory)))
        .with(
            EMPLOYEE_ADD,
            Arc::new(EmployeeAddHandler::new(Arc::clone(&identities), queue.clone())),
        )
        .with(
            EMPLOYEE_UPD,
            Arc::new(EmployeeUpdateHandler::new(Arc::clone(&identities), queue.clone())),
        )
        .with(
            EMPLOYEE_DEACT,
            Arc::new(EmployeeDeactivateHandler::new(Arc::clone(&identities), queue.clone())),
        )
        .with(
            RELATION_ADD,
            Arc::new(RelationAddHandler::new(Arc::clone(&identities), queue.clone())),
        )
        .with(
            RELATION_DEACT,
            Arc::new(RelationDeactivateHandler::new(identities, queue)),
        )
        .with(USER_ADD, users.clone())
        .with(USER_UPD, users.clone())
        .with(USER_DEACT, users)
        .with(GROUPMEMBER_ADD, members.clone())
        .with(GROUPMEMBER_REMOVE, members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrsync_core::MemoryStore;
    use hrsync_events::EventLog;
    use hrsync_tasks::{InMemoryTaskStore, TaskTypeRegistry};

    #[test]
    fn test_every_standard_auto_type_has_a_handler() {
        let store = Arc::new(MemoryStore::new());
        let tasks = Arc::new(InMemoryTaskStore::new());
        let registry = Arc::new(TaskTypeRegistry::new(tasks.clone()));
        let queue = TaskQueue::new(registry, tasks, EventLog::tracing_only());

        let handlers = standard_handlers(store.clone(), store, queue, Arc::new(LoggingDirectoryService));
        let names = handlers.dispatch_names();
        for name in [
            "db_role_add",
            "db_employee_add",
            "db_employee_upd",
            "db_employee_deact",
            "db_proprelation_add",
            "db_proprelation_deact",
            "ldap_user_add",
            "ldap_user_upd",
            "ldap_user_deact",
            "ldap_groupmember_add",
            "ldap_groupmember_remove",
        ] {
            assert!(names.contains(&name), "missing handler for {name}");
        }
    }
}
