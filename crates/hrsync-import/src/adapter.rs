//! Import adapter.
//!
//! Fetches raw records per category and institution, either from replay
//! fixtures or from the live HR API, and returns them keyed by their natural
//! composite key. One institution failing never fails the category; a missing
//! token does, and is reported as an error rather than an empty batch.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use hrsync_core::ImportKey;
use hrsync_events::{codes, EventLog};

use crate::audit::AuditWriter;
use crate::auth::TokenClient;
use crate::config::{ImportConfig, ImportMode};
use crate::credentials::CredentialStore;
use crate::error::{ImportError, ImportResult};
use crate::schema::Imported;

/// Record categories offered by the HR source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportCategory {
    Employees,
    EmployeeAssignments,
    Registrations,
    Students,
}

impl ImportCategory {
    pub const ALL: [ImportCategory; 4] = [
        ImportCategory::Employees,
        ImportCategory::EmployeeAssignments,
        ImportCategory::Registrations,
        ImportCategory::Students,
    ];

    /// File name prefix of fixtures and audit copies.
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Employees => "employees",
            Self::EmployeeAssignments => "employeeassignments",
            Self::Registrations => "registrations",
            Self::Students => "students",
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Employees => "Employee",
            Self::EmployeeAssignments => "Employee Assignment",
            Self::Registrations => "Registration",
            Self::Students => "Student",
        }
    }

    /// Fixture path relative to the replay directory.
    #[must_use]
    pub fn replay_file(&self, institution: &str) -> PathBuf {
        let name = format!("dev-{}-{institution}.json", self.prefix());
        match self {
            Self::Students => PathBuf::from("students").join(name),
            _ => PathBuf::from(name),
        }
    }

    fn endpoint(&self, config: &ImportConfig) -> String {
        match self {
            Self::Employees => config.employees_url.clone(),
            Self::EmployeeAssignments => config.assignments_url.clone(),
            Self::Registrations => format!("{}/registrations", config.students_url),
            Self::Students => config.students_url.clone(),
        }
    }

    /// The personnel and student APIs disagree on casing.
    fn school_year_param(&self) -> &'static str {
        match self {
            Self::Employees | Self::EmployeeAssignments => "schoolyear",
            Self::Registrations | Self::Students => "schoolYear",
        }
    }

    fn sends_api_version(&self) -> bool {
        matches!(self, Self::Employees | Self::EmployeeAssignments)
    }

    fn accepts_changed_since(&self) -> bool {
        !matches!(self, Self::EmployeeAssignments)
    }

    fn person_field(&self) -> &'static str {
        match self {
            Self::Employees | Self::EmployeeAssignments => "personId",
            Self::Registrations | Self::Students => "persoonId",
        }
    }

    /// Normalize a raw record in place and derive its key.
    fn key_for(&self, raw: &mut Map<String, Value>, institution: &str) -> Option<ImportKey> {
        if *self == Self::EmployeeAssignments {
            if let Some(id) = raw.remove("id") {
                raw.insert("assignmentId".to_string(), id);
            }
        }
        let person = value_to_key_part(raw.get(self.person_field())?)?;
        Some(match self {
            Self::Employees => ImportKey::person_at(person, institution),
            Self::EmployeeAssignments => {
                let instance = raw
                    .get("assignmentId")
                    .and_then(value_to_key_part)
                    .unwrap_or_default();
                ImportKey::person_at(person, institution).with_instance(instance)
            }
            Self::Registrations | Self::Students => ImportKey::person(person),
        })
    }

    /// Record list inside a response body.
    fn records_in(&self, body: Value) -> Option<Vec<Value>> {
        match (self, body) {
            (Self::Students, Value::Object(mut obj)) => match obj.remove("students") {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            },
            (_, Value::Array(items)) => Some(items),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImportCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

fn value_to_key_part(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// One raw record and its key.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRecord {
    pub key: ImportKey,
    pub raw: Map<String, Value>,
}

/// Records of one category, unique by key, in fetch order.
#[derive(Debug, Clone)]
pub struct ImportBatch {
    category: ImportCategory,
    records: Vec<ImportRecord>,
    index: HashMap<ImportKey, usize>,
    failed_institutions: Vec<String>,
}

impl ImportBatch {
    #[must_use]
    pub fn new(category: ImportCategory) -> Self {
        Self {
            category,
            records: Vec::new(),
            index: HashMap::new(),
            failed_institutions: Vec::new(),
        }
    }

    #[must_use]
    pub fn category(&self) -> ImportCategory {
        self.category
    }

    /// Insert a record; a later record with the same key replaces the earlier
    /// one in place. Returns `true` if the key was new.
    pub fn insert(&mut self, record: ImportRecord) -> bool {
        if let Some(&pos) = self.index.get(&record.key) {
            self.records[pos] = record;
            false
        } else {
            self.index.insert(record.key.clone(), self.records.len());
            self.records.push(record);
            true
        }
    }

    #[must_use]
    pub fn get(&self, key: &ImportKey) -> Option<&ImportRecord> {
        self.index.get(key).map(|&pos| &self.records[pos])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImportRecord> {
        self.records.iter()
    }

    pub fn mark_failed(&mut self, institution: impl Into<String>) {
        self.failed_institutions.push(institution.into());
    }

    /// Institutions that could not be fetched.
    #[must_use]
    pub fn failed_institutions(&self) -> &[String] {
        &self.failed_institutions
    }

    /// Whether some institution is missing from the batch.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failed_institutions.is_empty()
    }

    /// Decode every record into `T`, skipping (and logging) malformed ones.
    #[must_use]
    pub fn decode<T: DeserializeOwned>(&self) -> Vec<Imported<T>> {
        self.records
            .iter()
            .filter_map(|r| {
                match serde_json::from_value::<T>(Value::Object(r.raw.clone())) {
                    Ok(record) => Some(Imported {
                        key: r.key.clone(),
                        record,
                        raw: r.raw.clone(),
                    }),
                    Err(e) => {
                        warn!(key = %r.key, category = %self.category, error = %e, "Skipping malformed record");
                        None
                    }
                }
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a ImportBatch {
    type Item = &'a ImportRecord;
    type IntoIter = std::slice::Iter<'a, ImportRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Source of imported records.
#[async_trait]
pub trait ImportSource: Send + Sync {
    /// Create the storage directories. Failure is fatal to a run.
    async fn ensure_storage(&self) -> ImportResult<()>;

    /// Fetch one category for the given institutions.
    ///
    /// `Err` means the category could not be fetched at all; an `Ok` batch
    /// may be empty or partial.
    async fn fetch(
        &self,
        mode: ImportMode,
        category: ImportCategory,
        institutions: &[String],
        changed_since: Option<&str>,
    ) -> ImportResult<ImportBatch>;
}

/// Replay/live import adapter for the HR vendor API.
pub struct ImportAdapter {
    config: ImportConfig,
    http: reqwest::Client,
    tokens: TokenClient,
    audit: AuditWriter,
    events: EventLog,
}

impl ImportAdapter {
    pub fn new(
        config: ImportConfig,
        credentials: Arc<dyn CredentialStore>,
        events: EventLog,
    ) -> ImportResult<Self> {
        let http = reqwest::Client::builder().build()?;
        let tokens = TokenClient::new(http.clone(), config.identity_url.clone(), credentials)
            .with_timeout(Duration::from_secs(config.token_timeout_secs))
            .with_credential_names(
                config.client_id_name.clone(),
                config.client_secret_name.clone(),
            );
        let audit = AuditWriter::new(config.live_path());
        Ok(Self {
            config,
            http,
            tokens,
            audit,
            events,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    async fn read_replay(
        &self,
        category: ImportCategory,
        institution: &str,
    ) -> ImportResult<Vec<Map<String, Value>>> {
        let path = self.config.replay_path().join(category.replay_file(institution));
        let body = match tokio::fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ImportError::MissingFixture { path });
            }
            Err(e) => return Err(ImportError::storage(&path, e)),
        };
        parse_records(category, institution, &body)
    }

    async fn fetch_live(
        &self,
        category: ImportCategory,
        institution: &str,
        token: &str,
        school_year: &str,
        changed_since: Option<&str>,
    ) -> ImportResult<Vec<Map<String, Value>>> {
        let mut request = self
            .http
            .get(category.endpoint(&self.config))
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .bearer_auth(token)
            .header("InstituteNo", institution)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[(category.school_year_param(), school_year)]);
        if category.sends_api_version() {
            request = request.header("Api-Version", self.config.api_version.as_str());
        }
        if let Some(since) = changed_since.filter(|_| category.accepts_changed_since()) {
            request = request.query(&[("changedSince", since)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                self.tokens.invalidate().await;
            }
            return Err(ImportError::UnexpectedStatus {
                category: category.label().to_string(),
                institution: institution.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed == "[]" {
            debug!(institution = institution, "Empty response, nothing to audit");
            return Ok(Vec::new());
        }
        self.audit
            .write(category.prefix(), institution, &body, &Local::now())
            .await?;
        parse_records(category, institution, &body)
    }
}

fn parse_records(
    category: ImportCategory,
    institution: &str,
    body: &str,
) -> ImportResult<Vec<Map<String, Value>>> {
    let parse_error = |cause: String| ImportError::Parse {
        category: category.label().to_string(),
        institution: institution.to_string(),
        cause,
    };
    let value: Value = serde_json::from_str(body).map_err(|e| parse_error(e.to_string()))?;
    let items = category
        .records_in(value)
        .ok_or_else(|| parse_error("unexpected response shape".to_string()))?;
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect())
}

#[async_trait]
impl ImportSource for ImportAdapter {
    async fn ensure_storage(&self) -> ImportResult<()> {
        for dir in [
            self.config.replay_path(),
            self.config.replay_path().join("students"),
            self.config.live_path(),
        ] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| ImportError::storage(&dir, e))?;
        }
        Ok(())
    }

    #[instrument(skip(self, institutions), fields(category = %category, mode = %mode))]
    async fn fetch(
        &self,
        mode: ImportMode,
        category: ImportCategory,
        institutions: &[String],
        changed_since: Option<&str>,
    ) -> ImportResult<ImportBatch> {
        let label = category.label();
        self.events
            .record_event(codes::SYNC_INFO, format!("Start importing {label} information"))
            .await;

        let token = match mode {
            ImportMode::Replay => None,
            ImportMode::Live => match self.tokens.bearer_token().await {
                Ok(token) => Some(token),
                Err(e) => {
                    self.events
                        .record_error(
                            codes::SYNC_ERROR,
                            format!("Cannot import {label} information: {e}"),
                            false,
                        )
                        .await;
                    return Err(e);
                }
            },
        };
        let school_year = self.config.school_year_for(Local::now().date_naive());

        let mut batch = ImportBatch::new(category);
        for institution in institutions {
            self.events
                .record_event(
                    codes::SYNC_INFO,
                    format!("Start importing {label} data for {institution}"),
                )
                .await;
            let fetched = match &token {
                None => self.read_replay(category, institution).await,
                Some(token) => {
                    self.fetch_live(category, institution, token, &school_year, changed_since)
                        .await
                }
            };
            match fetched {
                Ok(records) => {
                    for mut raw in records {
                        match category.key_for(&mut raw, institution) {
                            Some(key) => {
                                batch.insert(ImportRecord { key, raw });
                            }
                            None => debug!(institution = %institution, "Record without person id skipped"),
                        }
                    }
                }
                Err(e) => {
                    warn!(institution = %institution, error = %e, "Institution import failed");
                    self.events
                        .record_error(
                            codes::SYNC_ERROR,
                            format!("{label} import for {institution} failed: {e}"),
                            false,
                        )
                        .await;
                    batch.mark_failed(institution.clone());
                }
            }
        }

        info!(
            records = batch.len(),
            failed_institutions = batch.failed_institutions().len(),
            "Import finished"
        );
        self.events
            .record_event(
                codes::SYNC_INFO,
                format!("{label} records retrieved: {}", batch.len()),
            )
            .await;
        Ok(batch)
    }
}

impl std::fmt::Debug for ImportAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportAdapter")
            .field("config", &self.config)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}
