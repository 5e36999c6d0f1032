//! Evidence store that keeps uploads in memory and hands out `memory://` URLs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parcelroute_core::{EvidenceError, EvidenceStore, ShipmentId};
use tokio::sync::RwLock;
use tracing::debug;

/// Scheme of the URLs handed out by [`MemoryEvidenceStore`].
pub const MEMORY_SCHEME: &str = "memory://evidence";

#[derive(Debug, Clone, PartialEq, Eq)]
/// One stored upload.
pub struct StoredEvidence {
    /// Shipment the upload belongs to.
    pub shipment: ShipmentId,
    /// MIME type given at upload.
    pub content_type: String,
    /// Raw bytes.
    pub bytes: Vec<u8>,
}

/// Keeps image uploads in memory.
#[derive(Debug, Default)]
pub struct MemoryEvidenceStore {
    uploads: RwLock<BTreeMap<String, StoredEvidence>>,
}

impl MemoryEvidenceStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload stored under a URL.
    pub async fn get(&self, url: &str) -> Option<StoredEvidence> {
        self.uploads.read().await.get(url).cloned()
    }
}

#[async_trait]
impl EvidenceStore for MemoryEvidenceStore {
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

        let mut uploads = self.uploads.write().await;
        let url = format!("{MEMORY_SCHEME}/{shipment}/{}", uploads.len() + 1);
        debug!(%url, size = bytes.len(), "evidence stored");
        uploads.insert(
            url.clone(),
            StoredEvidence {
                shipment: *shipment,
                content_type: content_type.to_owned(),
                bytes,
            },
        );
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_returns_retrievable_url() {
        let store = MemoryEvidenceStore::new();
        let shipment = ShipmentId::new();
        let url = store
            .upload_and_get_url(&shipment, vec![0xFF, 0xD8, 0xFF], "image/jpeg")
            .await
            .expect("accepted");
        assert!(url.starts_with(MEMORY_SCHEME));

        let stored = store.get(&url).await.expect("stored");
        assert_eq!(stored.shipment, shipment);
        assert_eq!(stored.bytes.len(), 3);
    }

    #[tokio::test]
    async fn test_rejects_empty_and_non_image_uploads() {
        let store = MemoryEvidenceStore::new();
        let shipment = ShipmentId::new();
        assert!(matches!(
            store.upload_and_get_url(&shipment, Vec::new(), "image/png").await,
            Err(EvidenceError::Rejected(_))
        ));
        assert!(matches!(
            store
                .upload_and_get_url(&shipment, b"%PDF".to_vec(), "application/pdf")
                .await,
            Err(EvidenceError::Rejected(_))
        ));
    }
}
