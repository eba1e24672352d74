//! REST API client for d4armory.io.
//!
//! Wraps the three public endpoints (account, hero, recent events) using
//! [`reqwest`].

use serde::de::DeserializeOwned;

use crate::models::{Account, Hero, RecentEvents};

/// Public API root.
pub const DEFAULT_BASE_URL: &str = "https://d4armory.io/api";

/// HTTP client for the armory API.
pub struct ArmoryApi {
    client: reqwest::Client,
    base_url: String,
}

/// Errors from the armory REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ArmoryError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned a non-2xx status code.
    #[error("Armory API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response body was not the expected JSON.
    #[error("Invalid JSON from armory API: {0}")]
    Json(#[from] serde_json::Error),
}

impl ArmoryApi {
    /// Create a client for the API rooted at `base_url`, e.g.
    /// `https://d4armory.io/api`. A trailing slash is ignored.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn account_url(&self, account_id: u64) -> String {
        format!("{}/armory/{}", self.base_url, account_id)
    }

    pub fn hero_url(&self, account_id: u64, character_id: &str) -> String {
        format!("{}/armory/{}/{}", self.base_url, account_id, character_id)
    }

    pub fn recent_events_url(&self) -> String {
        format!("{}/events/recent", self.base_url)
    }

    /// Fetch an account and its character list.
    ///
    /// Sends `GET /armory/{account_id}`.
    pub async fn account(&self, account_id: u64) -> Result<Account, ArmoryError> {
        let mut account: Account = self.get_json(&self.account_url(account_id)).await?;
        account.account_id = account_id;
        Ok(account)
    }

    /// Fetch the hero sheet of one character.
    ///
    /// Sends `GET /armory/{account_id}/{character_id}`.
    pub async fn hero(&self, account_id: u64, character_id: &str) -> Result<Hero, ArmoryError> {
        self.get_json(&self.hero_url(account_id, character_id)).await
    }

    /// Fetch the latest world boss, helltide and legion events.
    ///
    /// Sends `GET /events/recent`.
    pub async fn recent_events(&self) -> Result<RecentEvents, ArmoryError> {
        self.get_json(&self.recent_events_url()).await
    }

    // ---- private helpers ----

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ArmoryError> {
        tracing::debug!(url, "Armory request");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());

        if !status.is_success() {
            return Err(ArmoryError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

impl Default for ArmoryApi {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
