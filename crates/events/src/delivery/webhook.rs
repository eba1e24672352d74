//! Webhook delivery with exponential-backoff retry.
//!
//! [`WebhookDelivery`] POSTs each finished encounter as JSON to an external
//! URL. Failed attempts are retried three times with exponential backoff
//! (1 s, 2 s, 4 s) followed by one final attempt.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::bus::LoggedSummary;

/// Retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// WebhookDelivery
// ---------------------------------------------------------------------------

/// Delivers encounter summaries to an external webhook endpoint.
pub struct WebhookDelivery {
    client: reqwest::Client,
    url: String,
    retry_delays: Vec<Duration>,
}

impl WebhookDelivery {
    pub fn new(url: impl Into<String>) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
            retry_delays: RETRY_DELAYS_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        })
    }

    /// Replace the backoff schedule.
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver one summary with retry.
    ///
    /// Returns `Ok(())` on the first successful attempt, or the first error
    /// seen once every attempt has failed.
    pub async fn deliver(&self, summary: &LoggedSummary) -> Result<(), WebhookError> {
        let mut last_err: Option<WebhookError> = None;

        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            match self.try_send(summary).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url = %self.url,
                        encounter_id = summary.summary.encounter_id,
                        error = %e,
                        "Webhook delivery attempt failed, retrying"
                    );
                    last_err.get_or_insert(e);
                    tokio::time::sleep(*delay).await;
                }
            }
        }

        // Final attempt after the last backoff.
        match self.try_send(summary).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(
                    url = %self.url,
                    encounter_id = summary.summary.encounter_id,
                    error = %e,
                    "Webhook delivery failed after all retries"
                );
                Err(last_err.unwrap_or(e))
            }
        }
    }

    /// Deliver every summary published on the bus until it closes.
    pub async fn run(self, mut receiver: broadcast::Receiver<LoggedSummary>) {
        loop {
            match receiver.recv().await {
                Ok(summary) => {
                    // Failures are already logged; keep serving later encounters.
                    let _ = self.deliver(&summary).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Webhook delivery lagged, some summaries were not sent");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Summary bus closed, webhook delivery shutting down");
                    break;
                }
            }
        }
    }

    /// Execute a single POST request and check the response status.
    async fn try_send(&self, summary: &LoggedSummary) -> Result<(), WebhookError> {
        let response = self.client.post(&self.url).json(summary).send().await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_does_not_panic() {
        let delivery = WebhookDelivery::new("http://localhost/hook").unwrap();
        assert_eq!(delivery.url(), "http://localhost/hook");
        assert_eq!(delivery.retry_delays.len(), 3);
    }

    #[test]
    fn webhook_error_display_http_status() {
        let err = WebhookError::HttpStatus(502);
        assert_eq!(err.to_string(), "Webhook returned HTTP 502");
    }

    #[test]
    fn webhook_error_display_request() {
        // Build a reqwest error from an invalid URL.
        let req_err = reqwest::Client::new().get("://bad").build().unwrap_err();
        let err = WebhookError::Request(req_err);
        assert!(err.to_string().contains("HTTP request failed"));
    }
}
