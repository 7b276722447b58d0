//! Per-host client registry with persisted app credentials.
//!
//! Remote hosts are polled unauthenticated, but each host still gets an
//! app registration the first time it is contacted; the resulting client
//! credentials are persisted under the secrets directory so restarts do
//! not re-register. Clients are created lazily under a mutex and cached
//! for the process lifetime.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::client::HttpMastodonClient;
use super::types::AppCredentials;
use super::MastodonApi;
use crate::error::ApiError;

/// Hands out API clients for remote hosts.
#[async_trait::async_trait]
pub trait ClientProvider: Send + Sync {
    /// A client for the given host, creating and registering it on first use.
    async fn client_for(&self, host: &str) -> Result<Arc<dyn MastodonApi>, ApiError>;
}

/// Registry of per-host clients backed by a secrets directory.
pub struct ClientRegistry {
    secrets_dir: PathBuf,
    clients: Mutex<HashMap<String, Arc<HttpMastodonClient>>>,
    /// Test hook: route every host to a fixed base URL instead of
    /// `https://{host}`.
    base_url_override: Option<String>,
}

impl ClientRegistry {
    pub fn new(secrets_dir: impl Into<PathBuf>) -> Self {
        Self {
            secrets_dir: secrets_dir.into(),
            clients: Mutex::new(HashMap::new()),
            base_url_override: None,
        }
    }

    #[cfg(test)]
    fn with_base_url(secrets_dir: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            secrets_dir: secrets_dir.into(),
            clients: Mutex::new(HashMap::new()),
            base_url_override: Some(base_url.to_string()),
        }
    }

    fn credential_path(&self, host: &str) -> PathBuf {
        self.secrets_dir.join(format!("{host}_clientcred.json"))
    }

    fn build_client(&self, host: &str) -> Result<HttpMastodonClient, ApiError> {
        match &self.base_url_override {
            Some(base) => HttpMastodonClient::with_base_url(base, None),
            None => HttpMastodonClient::unauthenticated(host),
        }
    }

    /// Load the persisted app credential for a host, or register a new app
    /// and persist the result.
    async fn ensure_credentials(
        &self,
        host: &str,
        client: &HttpMastodonClient,
    ) -> Result<AppCredentials, ApiError> {
        let path = self.credential_path(host);
        if let Some(creds) = read_credentials(&path) {
            tracing::debug!(host, "client credentials already on disk");
            return Ok(creds);
        }

        tracing::info!(host, "registering app with host");
        let creds = client.register_app().await?;
        write_credentials(&path, &creds)?;
        Ok(creds)
    }
}

#[async_trait::async_trait]
impl ClientProvider for ClientRegistry {
    async fn client_for(&self, host: &str) -> Result<Arc<dyn MastodonApi>, ApiError> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(host) {
            return Ok(client.clone() as Arc<dyn MastodonApi>);
        }

        let client = self.build_client(host)?;
        self.ensure_credentials(host, &client).await?;
        let client = Arc::new(client);
        clients.insert(host.to_string(), client.clone());
        Ok(client as Arc<dyn MastodonApi>)
    }
}

fn read_credentials(path: &Path) -> Option<AppCredentials> {
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(creds) => Some(creds),
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "ignoring malformed credential file");
            None
        }
    }
}

fn write_credentials(path: &Path, creds: &AppCredentials) -> Result<(), ApiError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ApiError::CredentialStore {
            path: path.display().to_string(),
            source: e,
        })?;
    }
    let body = serde_json::to_string_pretty(creds).map_err(|e| ApiError::Parse {
        message: e.to_string(),
    })?;
    std::fs::write(path, body).map_err(|e| ApiError::CredentialStore {
        path: path.display().to_string(),
        source: e,
    })
}
