//! Composite keys.
//!
//! Imported records are keyed by the external person id, optionally narrowed
//! by institution and a per-category instance id. Role assignment edges are
//! keyed by the local `(person, organization, role, period)` quadruple.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::ids::{OrgId, PeriodId, PersonId, RoleId};

/// Natural key of an imported record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImportKey {
    /// External (source system) person id.
    pub person_id: String,
    /// Institution number the record was fetched for.
    pub institution: Option<String>,
    /// Per-category instance id (e.g. assignment id).
    pub instance: Option<String>,
}

impl ImportKey {
    /// Key made of the external person id only.
    #[must_use]
    pub fn person(person_id: impl Into<String>) -> Self {
        Self {
            person_id: person_id.into(),
            institution: None,
            instance: None,
        }
    }

    /// Key made of the external person id and an institution.
    #[must_use]
    pub fn person_at(person_id: impl Into<String>, institution: impl Into<String>) -> Self {
        Self {
            person_id: person_id.into(),
            institution: Some(institution.into()),
            instance: None,
        }
    }

    /// Narrow the key by a per-category instance id.
    #[must_use]
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Institution part of the key, or an empty string.
    #[must_use]
    pub fn institution_or_empty(&self) -> &str {
        self.institution.as_deref().unwrap_or("")
    }
}

impl Display for ImportKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.person_id)?;
        if let Some(inst) = &self.institution {
            write!(f, "@{inst}")?;
        }
        if let Some(instance) = &self.instance {
            write!(f, "#{instance}")?;
        }
        Ok(())
    }
}

/// Identity of a role assignment edge.
///
/// Organization and period are optional: an institution that does not map to
/// an organization, or a system without an active period, still produces a
/// stable key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    pub person: PersonId,
    pub org: Option<OrgId>,
    pub role: RoleId,
    pub period: Option<PeriodId>,
}

impl Display for EdgeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let org = self.org.map(|o| o.to_string()).unwrap_or_default();
        let period = self.period.map(|p| p.to_string()).unwrap_or_default();
        write!(f, "{}/{}/{}/{}", self.person, org, self.role, period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_import_key_equality_includes_all_parts() {
        let a = ImportKey::person_at("p1", "001").with_instance("a1");
        let b = ImportKey::person_at("p1", "001").with_instance("a2");
        let c = ImportKey::person_at("p1", "001").with_instance("a1");
        assert_ne!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_import_key_display() {
        let key = ImportKey::person_at("p1", "001").with_instance("a1");
        assert_eq!(key.to_string(), "p1@001#a1");
        assert_eq!(ImportKey::person("p2").to_string(), "p2");
    }

    #[test]
    fn test_edge_key_hashing_distinguishes_missing_org() {
        let person = PersonId::new();
        let role = RoleId::new();
        let with_org = EdgeKey {
            person,
            org: Some(OrgId::new()),
            role,
            period: None,
        };
        let without_org = EdgeKey {
            org: None,
            ..with_org
        };
        let mut set = HashSet::new();
        set.insert(with_org);
        assert!(!set.contains(&without_org));
        assert!(set.contains(&with_org));
    }
}
