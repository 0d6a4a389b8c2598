//! # hrsync-import
//!
//! Retrieval of HR records per institution, from replay fixtures or the live
//! vendor API, with timestamped audit copies of every live payload.
//!
//! A category that cannot be fetched at all (no token) is an error; an
//! institution that cannot be fetched is logged, recorded on the batch and
//! skipped.

pub mod adapter;
pub mod audit;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod dates;
pub mod error;
pub mod schema;

pub use adapter::{ImportAdapter, ImportBatch, ImportCategory, ImportRecord, ImportSource};
pub use audit::AuditWriter;
pub use auth::TokenClient;
pub use config::{current_school_year, ImportConfig, ImportMode};
pub use credentials::{ApiCredentials, CredentialStore, EnvCredentialStore, StaticCredentialStore};
pub use dates::parse_date;
pub use error::{CredentialError, ImportError, ImportResult};
pub use schema::{AssignmentRecord, EmployeeRecord, Imported, RegistrationRecord, StudentRecord};
