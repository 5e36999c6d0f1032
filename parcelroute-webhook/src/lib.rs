//! HTTP adapters: a webhook notifier and an evidence upload client.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Proof-of-delivery uploads over HTTP.
pub mod evidence;
/// Fire-and-forget webhook delivery of notifications.
pub mod notifier;

pub use evidence::*;
pub use notifier::*;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(thiserror::Error, Debug)]
/// Errors raised while setting up or calling HTTP endpoints.
pub enum WebhookError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// An endpoint is not a valid absolute URL.
    #[error("Invalid endpoint {url:?}: {reason}")]
    InvalidUrl {
        /// Offending value.
        url: String,
        /// Parser message.
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// `[webhook]` section of the configuration file.
pub struct WebhookConfig {
    /// Endpoint receiving notifications as JSON.
    pub notify_url: String,
    /// Endpoint accepting evidence uploads.
    pub evidence_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl WebhookConfig {
    /// HTTP client honouring the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::Network`] when the client cannot be built.
    pub fn client(&self) -> Result<Client, WebhookError> {
        Ok(Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs.max(1)))
            .build()?)
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, WebhookError> {
    Url::parse(raw.trim()).map_err(|err| WebhookError::InvalidUrl {
        url: raw.to_owned(),
        reason: err.to_string(),
    })
}

// Small helper to send a request and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, WebhookError> {
    req.send()
        .await
        .map_err(WebhookError::from)?
        .error_for_status()
        .map_err(WebhookError::from)?
        .json()
        .await
        .map_err(WebhookError::from)
}

async fn send_checked(req: RequestBuilder) -> Result<(), WebhookError> {
    req.send()
        .await
        .map_err(WebhookError::from)?
        .error_for_status()
        .map_err(WebhookError::from)?;
    Ok(())
}
