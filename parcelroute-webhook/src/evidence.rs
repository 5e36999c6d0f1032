//! Evidence store that uploads proof-of-delivery images to an HTTP endpoint.

use async_trait::async_trait;
use parcelroute_core::{EvidenceError, EvidenceStore, ShipmentId};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::info;

use crate::{WebhookError, fetch_json, parse_endpoint};

/// Response of the upload endpoint.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// Uploads evidence with `POST {endpoint}/{shipment}` and returns the URL the
/// endpoint reports.
#[derive(Debug, Clone)]
pub struct HttpEvidenceStore {
    client: Client,
    endpoint: Url,
}

impl HttpEvidenceStore {
    /// Create a store bound to the given HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::InvalidUrl`] when the endpoint is not an absolute URL.
    pub fn new(client: Client, endpoint: &str) -> Result<Self, WebhookError> {
        Ok(Self {
            client,
            endpoint: parse_endpoint(endpoint)?,
        })
    }

    fn upload_url(&self, shipment: &ShipmentId) -> Result<Url, EvidenceError> {
        let base = self.endpoint.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/{shipment}"))
            .map_err(|err| EvidenceError::Upload(err.to_string()))
    }
}

#[async_trait]
impl EvidenceStore for HttpEvidenceStore {
    async fn upload_and_get_url(
        &self,
        shipment: &ShipmentId,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, EvidenceError> {
        if bytes.is_empty() {
            return Err(EvidenceError::Rejected("upload is empty".to_owned()));
        }
        if !content_type.starts_with("image/") {
            return Err(EvidenceError::Rejected(format!(
                "unsupported content type {content_type}"
            )));
        }

        let size = bytes.len();
        let req = self
            .client
            .post(self.upload_url(shipment)?)
            .header(CONTENT_TYPE, content_type)
            .body(bytes);
        let uploaded = fetch_json::<UploadResponse>(req)
            .await
            .map_err(|err| EvidenceError::Upload(err.to_string()))?;
        if uploaded.url.trim().is_empty() {
            return Err(EvidenceError::Upload(
                "endpoint returned an empty URL".to_owned(),
            ));
        }
        info!(%shipment, size, url = %uploaded.url, "evidence uploaded");
        Ok(uploaded.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> HttpEvidenceStore {
        HttpEvidenceStore::new(Client::new(), "https://files.example.com/evidence/")
            .expect("valid endpoint")
    }

    #[test]
    fn test_upload_url_appends_shipment_id() {
        let shipment = ShipmentId::new();
        let url = store().upload_url(&shipment).expect("valid url");
        assert_eq!(
            url.as_str(),
            format!("https://files.example.com/evidence/{shipment}")
        );
    }

    #[tokio::test]
    async fn test_rejects_before_any_request() {
        let store = store();
        let shipment = ShipmentId::new();
        assert!(matches!(
            store.upload_and_get_url(&shipment, Vec::new(), "image/png").await,
            Err(EvidenceError::Rejected(_))
        ));
        assert!(matches!(
            store
                .upload_and_get_url(&shipment, b"hello".to_vec(), "text/plain")
                .await,
            Err(EvidenceError::Rejected(_))
        ));
    }
}
