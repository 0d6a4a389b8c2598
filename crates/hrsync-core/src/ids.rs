//! Strongly Typed Identifiers
//!
//! Newtype wrappers around UUIDs for every locally persisted record. The
//! external HR source uses its own string keys (see [`crate::keys`]); these
//! ids only ever name rows owned by this system.
//!
//! # Example
//!
//! ```
//! use hrsync_core::{PersonId, RoleId};
//!
//! let person = PersonId::new();
//! let role = RoleId::new();
//!
//! fn requires_person(id: PersonId) -> String {
//!     id.to_string()
//! }
//!
//! let result = requires_person(person);
//! // requires_person(role); // This would not compile!
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Error type for ID parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse
    pub id_type: &'static str,
    /// The underlying UUID parse error message
    pub message: String,
}

impl Display for ParseIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse {}: {}", self.id_type, self.message)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random ID using UUID v4.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns a reference to the underlying UUID.
            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self).map_err(|e| ParseIdError {
                    id_type: stringify!($name),
                    message: e.to_string(),
                })
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Identifier of a locally persisted person (identity record).
    PersonId
);

define_id!(
    /// Identifier of a per-institution person detail snapshot.
    DetailsId
);

define_id!(
    /// Identifier of an organization.
    OrgId
);

define_id!(
    /// Identifier of a role (external, canonical or backend).
    RoleId
);

define_id!(
    /// Identifier of a period.
    PeriodId
);

define_id!(
    /// Identifier of a role assignment edge.
    AssignmentId
);

define_id!(
    /// Identifier of a queued task.
    TaskId
);

define_id!(
    /// Identifier of a task type.
    TaskTypeId
);

define_id!(
    /// Identifier of a recorded system event.
    EventId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrip_through_string() {
        let id = PersonId::new();
        let parsed: PersonId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_error_names_the_type() {
        let err = "not-a-uuid".parse::<TaskId>().unwrap_err();
        assert_eq!(err.id_type, "TaskId");
        assert!(err.to_string().starts_with("Failed to parse TaskId"));
    }

    #[test]
    fn test_serde_is_transparent() {
        let uuid = Uuid::new_v4();
        let id = OrgId::from_uuid(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
    }
}
