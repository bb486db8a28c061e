//! REST client for the backend's per-table create/update/delete endpoints.

use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::sync::RwLock;
use std::time::Duration;

use kolayfit_core::models::SyncTable;
use kolayfit_core::sync::{classify_http_status, RemoteStoreAdapter, RemoteStoreError, SyncRetryClass};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

/// Remote store backed by a PostgREST-style API: one endpoint per table,
/// filtered by `id=eq.{id}` for row-level updates and deletes.
pub struct RestRemoteStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: RwLock<Option<String>>,
}

impl RestRemoteStore {
    /// Create a new remote store client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the backend (e.g., "https://xyz.supabase.co")
    /// * `api_key` - The project API key, sent on every request
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, RemoteStoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| RemoteStoreError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            access_token: RwLock::new(None),
        })
    }

    /// Install (or clear) the per-user access token. Until one is set,
    /// requests authenticate with the project API key alone.
    pub fn set_access_token(&self, token: Option<String>) {
        let mut guard = self
            .access_token
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = token;
    }

    fn table_url(&self, table: SyncTable) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.as_str())
    }

    fn row_url(&self, table: SyncTable, id: &str) -> String {
        format!("{}?id=eq.{}", self.table_url(table), id)
    }

    fn headers(&self) -> Result<HeaderMap, RemoteStoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let api_key_value = HeaderValue::from_str(&self.api_key)
            .map_err(|_| RemoteStoreError::Auth("Invalid API key format".to_string()))?;
        headers.insert("apikey", api_key_value);

        let token = {
            let guard = self
                .access_token
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            guard.clone().unwrap_or_else(|| self.api_key.clone())
        };
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| RemoteStoreError::Auth("Invalid access token format".to_string()))?;
        headers.insert(AUTHORIZATION, auth_value);

        Ok(headers)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    fn transport_error(err: reqwest::Error) -> RemoteStoreError {
        RemoteStoreError::Network(format!("Transport error: {}", err))
    }

    fn status_error(status: reqwest::StatusCode, body: &str) -> RemoteStoreError {
        let message = format!("HTTP {}: {}", status.as_u16(), body.trim());
        match classify_http_status(status.as_u16()) {
            SyncRetryClass::Retryable => RemoteStoreError::Network(message),
            SyncRetryClass::ReauthRequired => RemoteStoreError::Auth(message),
            SyncRetryClass::Permanent => RemoteStoreError::Validation(message),
        }
    }

    /// Drains the body, logs it, and maps non-success statuses to the error
    /// taxonomy. Returns the body for callers that parse a representation.
    async fn check_response(response: reqwest::Response) -> Result<String, RemoteStoreError> {
        let status = response.status();
        let body = response.text().await.map_err(Self::transport_error)?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(Self::status_error(status, &body));
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl RemoteStoreAdapter for RestRemoteStore {
    /// Create (or merge) a row.
    ///
    /// POST /rest/v1/{table}
    ///
    /// `Prefer: resolution=merge-duplicates` turns a redelivered insert into
    /// an update of the existing row, so applying the same queued action
    /// twice never creates a duplicate entity.
    async fn insert(
        &self,
        table: SyncTable,
        payload: &serde_json::Value,
    ) -> Result<String, RemoteStoreError> {
        let url = self.table_url(table);
        debug!("[Remote] insert {} -> {}", table.as_str(), url);

        let mut headers = self.headers()?;
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
        );

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(payload)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let body = Self::check_response(response).await?;

        // The representation comes back as a one-row array.
        let remote_id = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| value.get(0)?.get("id")?.as_str().map(str::to_string))
            .or_else(|| payload.get("id")?.as_str().map(str::to_string));
        remote_id.ok_or_else(|| {
            RemoteStoreError::Validation("Insert response carried no entity id".to_string())
        })
    }

    /// Update a row in place.
    ///
    /// PATCH /rest/v1/{table}?id=eq.{id}
    async fn update(
        &self,
        table: SyncTable,
        id: &str,
        payload: &serde_json::Value,
    ) -> Result<(), RemoteStoreError> {
        let url = self.row_url(table, id);
        debug!("[Remote] update {} id={}", table.as_str(), id);

        let response = self
            .client
            .patch(&url)
            .headers(self.headers()?)
            .json(payload)
            .send()
            .await
            .map_err(Self::transport_error)?;

        Self::check_response(response).await?;
        Ok(())
    }

    /// Delete a row. Deleting an already-absent row succeeds, which keeps
    /// redelivered deletes harmless.
    ///
    /// DELETE /rest/v1/{table}?id=eq.{id}
    async fn delete(&self, table: SyncTable, id: &str) -> Result<(), RemoteStoreError> {
        let url = self.row_url(table, id);
        debug!("[Remote] delete {} id={}", table.as_str(), id);

        let response = self
            .client
            .delete(&url)
            .headers(self.headers()?)
            .send()
            .await
            .map_err(Self::transport_error)?;

        Self::check_response(response).await?;
        Ok(())
    }
}
