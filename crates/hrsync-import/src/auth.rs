//! OAuth2 client-credentials token exchange with caching.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::credentials::{ApiCredentials, CredentialStore};
use crate::error::{ImportError, ImportResult};

/// Tokens are refreshed this long before they expire.
const EXPIRY_GRACE_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

/// Bearer token client for the HR API identity server.
#[derive(Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    credentials: Arc<dyn CredentialStore>,
    client_id_name: String,
    client_secret_name: String,
    /// Shared across clones.
    cached: Arc<RwLock<Option<CachedToken>>>,
}

impl TokenClient {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            timeout: Duration::from_secs(30),
            credentials,
            client_id_name: "sap_informat_api_id".to_string(),
            client_secret_name: "sap_informat_api_password".to_string(),
            cached: Arc::new(RwLock::new(None)),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Credential store names of the client id and secret.
    #[must_use]
    pub fn with_credential_names(
        mut self,
        client_id_name: impl Into<String>,
        client_secret_name: impl Into<String>,
    ) -> Self {
        self.client_id_name = client_id_name.into();
        self.client_secret_name = client_secret_name.into();
        self
    }

    /// Cached token, or a fresh one from the identity server.
    pub async fn bearer_token(&self) -> ImportResult<String> {
        {
            let cache = self.cached.read().await;
            if let Some(cached) = cache.as_ref() {
                if !cached.is_expired() {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let creds = ApiCredentials::load(
            self.credentials.as_ref(),
            &self.client_id_name,
            &self.client_secret_name,
        )
        .await?;

        debug!(endpoint = %self.endpoint, client_id = %creds.client_id, "Fetching bearer token");
        let form = [
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ];
        let response = self
            .http
            .post(&self.endpoint)
            .timeout(self.timeout)
            .form(&form)
            .send()
            .await
            .map_err(|e| ImportError::token(format!("Token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(ImportError::token(format!(
                "Token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ImportError::token(format!("Failed to parse token response: {e}")))?;

        let expires_at = token.expires_in.map(|secs| {
            Instant::now() + Duration::from_secs(secs.saturating_sub(EXPIRY_GRACE_SECS))
        });
        let access_token = token.access_token.clone();
        *self.cached.write().await = Some(CachedToken {
            access_token: token.access_token,
            expires_at,
        });
        Ok(access_token)
    }

    /// Drop the cached token, e.g. after a 401.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}

impl std::fmt::Debug for TokenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenClient")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("credential_store", &self.credentials.store_type())
            .finish_non_exhaustive()
    }
}
