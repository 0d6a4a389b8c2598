//! API credential stores.
//!
//! Credentials are looked up by logical name. The environment store maps a
//! name to an upper-cased environment variable (`sap_informat_api_id` →
//! `SAP_INFORMAT_API_ID`) unless an explicit mapping exists.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::error::CredentialError;

/// Source of named credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Retrieve a credential. Empty values count as missing.
    async fn get_credential(&self, name: &str) -> Result<String, CredentialError>;

    /// Whether the store is reachable.
    async fn health_check(&self) -> Result<bool, CredentialError>;

    /// Store type name for diagnostics.
    fn store_type(&self) -> &'static str;
}

/// OAuth2 client credentials for the HR API.
///
/// The [`Debug`] impl redacts the secret.
#[derive(Clone)]
pub struct ApiCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ApiCredentials {
    /// Load both values from a store.
    pub async fn load(
        store: &dyn CredentialStore,
        id_name: &str,
        secret_name: &str,
    ) -> Result<Self, CredentialError> {
        Ok(Self {
            client_id: store.get_credential(id_name).await?,
            client_secret: store.get_credential(secret_name).await?,
        })
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Credentials from environment variables.
#[derive(Debug, Default)]
pub struct EnvCredentialStore {
    /// Explicit logical name → env var name mappings.
    mappings: HashMap<String, String>,
}

impl EnvCredentialStore {
    #[must_use]
    pub fn new(mappings: HashMap<String, String>) -> Self {
        Self { mappings }
    }

    fn env_var_name(&self, name: &str) -> String {
        self.mappings
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_uppercase())
    }
}

#[async_trait]
impl CredentialStore for EnvCredentialStore {
    async fn get_credential(&self, name: &str) -> Result<String, CredentialError> {
        let env_var = self.env_var_name(name);
        match std::env::var(&env_var) {
            Ok(value) if !value.is_empty() => {
                debug!(credential = name, env_var = %env_var, "Credential loaded from environment");
                Ok(value)
            }
            _ => Err(CredentialError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    async fn health_check(&self) -> Result<bool, CredentialError> {
        Ok(true)
    }

    fn store_type(&self) -> &'static str {
        "env"
    }
}

/// Fixed in-memory credentials.
#[derive(Default)]
pub struct StaticCredentialStore {
    values: HashMap<String, String>,
}

impl StaticCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl std::fmt::Debug for StaticCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.values.keys().collect();
        names.sort();
        f.debug_struct("StaticCredentialStore")
            .field("names", &names)
            .finish()
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn get_credential(&self, name: &str) -> Result<String, CredentialError> {
        self.values
            .get(name)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| CredentialError::NotFound {
                name: name.to_string(),
            })
    }

    async fn health_check(&self) -> Result<bool, CredentialError> {
        Ok(true)
    }

    fn store_type(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_env_store_uppercases_name() {
        std::env::set_var("HRSYNC_TEST_CRED_A", "client-a");
        let store = EnvCredentialStore::default();
        assert_eq!(store.get_credential("hrsync_test_cred_a").await.unwrap(), "client-a");
        std::env::remove_var("HRSYNC_TEST_CRED_A");
    }

    #[tokio::test]
    async fn test_env_store_empty_is_missing() {
        std::env::set_var("HRSYNC_TEST_CRED_EMPTY", "");
        let store = EnvCredentialStore::default();
        let err = store.get_credential("hrsync_test_cred_empty").await.unwrap_err();
        assert!(matches!(err, CredentialError::NotFound { .. }));
        std::env::remove_var("HRSYNC_TEST_CRED_EMPTY");
    }

    #[tokio::test]
    async fn test_env_store_explicit_mapping() {
        std::env::set_var("HRSYNC_TEST_MAPPED", "mapped");
        let store = EnvCredentialStore::new(HashMap::from([(
            "api_id".to_string(),
            "HRSYNC_TEST_MAPPED".to_string(),
        )]));
        assert_eq!(store.get_credential("api_id").await.unwrap(), "mapped");
        std::env::remove_var("HRSYNC_TEST_MAPPED");
    }

    #[tokio::test]
    async fn test_credentials_debug_is_redacted() {
        let store = StaticCredentialStore::new()
            .with("id", "client")
            .with("secret", "hunter2");
        let creds = ApiCredentials::load(&store, "id", "secret").await.unwrap();
        let debug = format!("{creds:?}");
        assert!(debug.contains("client"));
        assert!(!debug.contains("hunter2"));
        assert!(!format!("{store:?}").contains("hunter2"));
    }
}
