//! Task classification: `(target, object, action)` triples and task types.

use serde::{Deserialize, Serialize};

use hrsync_core::TaskTypeId;

macro_rules! vocabulary {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Every value, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Upper-case wire name.
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!(concat!("Unknown ", stringify!($name), ": {}"), s)),
                }
            }
        }
    };
}

vocabulary!(
    /// Subsystem a task's side effect acts upon.
    TaskTarget {
        Db => "DB",
        Odoo => "ODOO",
        Ldap => "LDAP",
        Ad => "AD",
        Cloud => "CLOUD",
        Api => "API",
        Email => "EMAIL",
        All => "ALL",
        Manual => "MANUAL",
        System => "SYSTEM",
    }
);

vocabulary!(
    /// Kind of record a task acts upon.
    TaskObject {
        Org => "ORG",
        Person => "PERSON",
        GroupMember => "GROUPMEMBER",
        Student => "STUDENT",
        Employee => "EMPLOYEE",
        Role => "ROLE",
        Period => "PERIOD",
        PropRelation => "PROPRELATION",
        User => "USER",
        Group => "GROUP",
        Config => "CONFIG",
        BlockingMessage => "BLOCKINGMESSAGE",
    }
);

vocabulary!(
    /// What the task does to the record.
    TaskAction {
        Add => "ADD",
        Upd => "UPD",
        Del => "DEL",
        Remove => "REMOVE",
        Deact => "DEACT",
        Arc => "ARC",
        Sync => "SYNC",
        Manual => "MANUAL",
    }
);

/// Processing phase. Tasks of an earlier phase are drained before later ones
/// because later handlers rely on their side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Reference,
    Identity,
    Relationship,
    Account,
}

impl TaskPhase {
    pub const ORDERED: [TaskPhase; 4] = [
        TaskPhase::Reference,
        TaskPhase::Identity,
        TaskPhase::Relationship,
        TaskPhase::Account,
    ];
}

/// A `(target, object, action)` classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskTriple {
    pub target: TaskTarget,
    pub object: TaskObject,
    pub action: TaskAction,
}

impl TaskTriple {
    #[must_use]
    pub const fn new(target: TaskTarget, object: TaskObject, action: TaskAction) -> Self {
        Self {
            target,
            object,
            action,
        }
    }

    /// `TARGET_OBJECT_ACTION`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}_{}_{}", self.target, self.object, self.action)
    }

    /// `target_object_action`; handlers are registered under this name.
    #[must_use]
    pub fn dispatch_name(&self) -> String {
        self.name().to_lowercase()
    }

    #[must_use]
    pub fn phase(&self) -> TaskPhase {
        match self.object {
            TaskObject::Org | TaskObject::Role | TaskObject::Period => TaskPhase::Reference,
            TaskObject::Person | TaskObject::Employee | TaskObject::Student => TaskPhase::Identity,
            TaskObject::PropRelation => TaskPhase::Relationship,
            TaskObject::User
            | TaskObject::Group
            | TaskObject::GroupMember
            | TaskObject::Config
            | TaskObject::BlockingMessage => TaskPhase::Account,
        }
    }

    /// Whether the triple describes work only an operator can do.
    #[must_use]
    pub fn is_manual(&self) -> bool {
        self.action == TaskAction::Manual
            || matches!(self.target, TaskTarget::Manual | TaskTarget::System)
    }
}

impl std::fmt::Display for TaskTriple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

impl std::str::FromStr for TaskTriple {
    type Err = String;

    /// Parses `TARGET_OBJECT_ACTION` (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('_').collect();
        match parts.as_slice() {
            [target, object, action] => Ok(Self {
                target: target.parse()?,
                object: object.parse()?,
                action: action.parse()?,
            }),
            _ => Err(format!(
                "Invalid task type '{s}': expected TARGET_OBJECT_ACTION"
            )),
        }
    }
}

/// Default processing priority; lower runs first within a phase.
pub const DEFAULT_PRIORITY: i32 = 10;

/// Persisted task classification. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskType {
    pub id: TaskTypeId,
    pub triple: TaskTriple,
    pub name: String,
    pub dispatch_name: String,
    pub priority: i32,
    pub auto_process: bool,
    pub requires_confirmation: bool,
    pub description: Option<String>,
    pub is_active: bool,
}

impl TaskType {
    /// New type for a triple with derived names and default flags.
    ///
    /// Manual and system triples are never auto-processed.
    #[must_use]
    pub fn new(triple: TaskTriple) -> Self {
        Self {
            id: TaskTypeId::new(),
            triple,
            name: triple.name(),
            dispatch_name: triple.dispatch_name(),
            priority: DEFAULT_PRIORITY,
            auto_process: !triple.is_manual(),
            requires_confirmation: triple.is_manual(),
            description: None,
            is_active: true,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Ordering key used by the processor.
    #[must_use]
    pub fn processing_order(&self) -> (TaskPhase, i32, &str) {
        (self.triple.phase(), self.priority, self.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_name_is_lowercase_triple() {
        let triple = TaskTriple::new(TaskTarget::Db, TaskObject::Employee, TaskAction::Add);
        assert_eq!(triple.name(), "DB_EMPLOYEE_ADD");
        assert_eq!(triple.dispatch_name(), "db_employee_add");
    }

    #[test]
    fn test_parse_triple() {
        let triple: TaskTriple = "ldap_groupmember_remove".parse().unwrap();
        assert_eq!(
            triple,
            TaskTriple::new(TaskTarget::Ldap, TaskObject::GroupMember, TaskAction::Remove)
        );
        assert!("DB_EMPLOYEE".parse::<TaskTriple>().is_err());
        assert!("DB_TEACHER_ADD".parse::<TaskTriple>().is_err());
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&TaskObject::GroupMember).unwrap();
        assert_eq!(json, "\"GROUPMEMBER\"");
        let obj: TaskObject = serde_json::from_str("\"PROPRELATION\"").unwrap();
        assert_eq!(obj, TaskObject::PropRelation);
    }

    #[test]
    fn test_phase_ordering() {
        let role = TaskTriple::new(TaskTarget::Db, TaskObject::Role, TaskAction::Add);
        let employee = TaskTriple::new(TaskTarget::Db, TaskObject::Employee, TaskAction::Deact);
        let relation = TaskTriple::new(TaskTarget::Db, TaskObject::PropRelation, TaskAction::Add);
        let member = TaskTriple::new(TaskTarget::Ldap, TaskObject::GroupMember, TaskAction::Add);
        assert!(role.phase() < employee.phase());
        assert!(employee.phase() < relation.phase());
        assert!(relation.phase() < member.phase());
    }

    #[test]
    fn test_manual_types_are_not_auto_processed() {
        let blocking = TaskType::new(TaskTriple::new(
            TaskTarget::System,
            TaskObject::BlockingMessage,
            TaskAction::Manual,
        ));
        assert!(!blocking.auto_process);
        assert!(blocking.requires_confirmation);

        let add = TaskType::new(TaskTriple::new(
            TaskTarget::Db,
            TaskObject::Employee,
            TaskAction::Add,
        ));
        assert!(add.auto_process);
        assert_eq!(add.priority, DEFAULT_PRIORITY);
    }
}
