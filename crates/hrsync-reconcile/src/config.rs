//! Reconciliation configuration.

use serde::{Deserialize, Serialize};

fn default_excluded_snapshot_keys() -> Vec<String> {
    vec!["instNr".to_string(), "assignments".to_string()]
}

fn default_school_org_type() -> String {
    "SCHOOL".to_string()
}

fn default_true() -> bool {
    true
}

/// Reconciliation engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Top-level keys ignored when comparing detail snapshots. These are
    /// attached by the engine itself and change independently of the person.
    #[serde(default = "default_excluded_snapshot_keys")]
    pub excluded_snapshot_keys: Vec<String>,

    /// Org type preferred when an institution maps to several organizations.
    #[serde(default = "default_school_org_type")]
    pub school_org_type: String,

    /// Queue `DB ROLE ADD` for role codes with no canonical role.
    #[serde(default = "default_true")]
    pub discover_roles: bool,

    /// When some institution could not be fetched, do not treat its people
    /// and edges as absent.
    #[serde(default = "default_true")]
    pub protect_failed_institutions: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            excluded_snapshot_keys: default_excluded_snapshot_keys(),
            school_org_type: default_school_org_type(),
            discover_roles: true,
            protect_failed_institutions: true,
        }
    }
}
