//! Import adapter configuration.

use std::path::PathBuf;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Where records come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Fixture files under the replay directory.
    #[default]
    Replay,
    /// The HR vendor API.
    Live,
}

impl std::fmt::Display for ImportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Replay => write!(f, "replay"),
            Self::Live => write!(f, "live"),
        }
    }
}

impl std::str::FromStr for ImportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "replay" | "dev" => Ok(Self::Replay),
            "live" | "prod" => Ok(Self::Live),
            other => Err(format!("Unknown import mode: {other}")),
        }
    }
}

fn default_identity_url() -> String {
    "https://www.identityserver.be/connect/token".to_string()
}

fn default_employees_url() -> String {
    "https://personeelsapi.informatsoftware.be/employees".to_string()
}

fn default_assignments_url() -> String {
    "https://personeelsapi.informatsoftware.be/employees/assignments".to_string()
}

fn default_students_url() -> String {
    "https://leerlingenapi.informatsoftware.be/1/students".to_string()
}

fn default_api_version() -> String {
    "2".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_token_timeout_secs() -> u64 {
    30
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("storage/sapimport")
}

fn default_replay_dir() -> String {
    "dev".to_string()
}

fn default_live_dir() -> String {
    "prod".to_string()
}

fn default_org() -> String {
    "olvp".to_string()
}

fn default_client_id_name() -> String {
    "sap_informat_api_id".to_string()
}

fn default_client_secret_name() -> String {
    "sap_informat_api_password".to_string()
}

/// Import adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// OAuth2 token endpoint.
    #[serde(default = "default_identity_url")]
    pub identity_url: String,

    #[serde(default = "default_employees_url")]
    pub employees_url: String,

    #[serde(default = "default_assignments_url")]
    pub assignments_url: String,

    /// Base URL of the students API; registrations live under `/registrations`.
    #[serde(default = "default_students_url")]
    pub students_url: String,

    /// `Api-Version` header sent to the employee endpoints.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Per-request timeout for data endpoints (in seconds).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for the token exchange (in seconds).
    #[serde(default = "default_token_timeout_secs")]
    pub token_timeout_secs: u64,

    /// Root of the import storage tree.
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,

    /// Replay fixtures, relative to the storage root.
    #[serde(default = "default_replay_dir")]
    pub replay_dir: String,

    /// Live audit copies, relative to the storage root.
    #[serde(default = "default_live_dir")]
    pub live_dir: String,

    /// Institutions to import. Empty means every org flagged as import source.
    #[serde(default)]
    pub institutions: Vec<String>,

    /// Short name of the organization that owns the import settings.
    #[serde(default = "default_org")]
    pub default_org: String,

    /// School year sent to the API. Derived from today's date when absent.
    #[serde(default)]
    pub school_year: Option<String>,

    /// Credential store name of the API client id.
    #[serde(default = "default_client_id_name")]
    pub client_id_name: String,

    /// Credential store name of the API client secret.
    #[serde(default = "default_client_secret_name")]
    pub client_secret_name: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            identity_url: default_identity_url(),
            employees_url: default_employees_url(),
            assignments_url: default_assignments_url(),
            students_url: default_students_url(),
            api_version: default_api_version(),
            request_timeout_secs: default_request_timeout_secs(),
            token_timeout_secs: default_token_timeout_secs(),
            storage_root: default_storage_root(),
            replay_dir: default_replay_dir(),
            live_dir: default_live_dir(),
            institutions: Vec::new(),
            default_org: default_org(),
            school_year: None,
            client_id_name: default_client_id_name(),
            client_secret_name: default_client_secret_name(),
        }
    }
}

impl ImportConfig {
    #[must_use]
    pub fn replay_path(&self) -> PathBuf {
        self.storage_root.join(&self.replay_dir)
    }

    #[must_use]
    pub fn live_path(&self) -> PathBuf {
        self.storage_root.join(&self.live_dir)
    }

    /// Configured school year, or the one `today` falls in.
    #[must_use]
    pub fn school_year_for(&self, today: NaiveDate) -> String {
        self.school_year
            .clone()
            .unwrap_or_else(|| current_school_year(today))
    }
}

/// School years run from September: `2024-25` covers Sep 2024 to Aug 2025.
#[must_use]
pub fn current_school_year(today: NaiveDate) -> String {
    let start = if today.month() >= 9 {
        today.year()
    } else {
        today.year() - 1
    };
    format!("{}-{:02}", start, (start + 1) % 100)
}
