//! In-memory adapters for the parcelroute ports, used by the console and in tests.

/// Proof-of-delivery uploads kept in memory.
pub mod evidence;
/// Notifier that records every notification it is given.
pub mod notifier;
/// Shipment and route stores backed by maps.
pub mod store;

use std::sync::Arc;

use parcelroute_core::Collaborators;

pub use evidence::*;
pub use notifier::*;
pub use store::*;

/// All in-memory adapters, with handles kept for inspection.
#[derive(Default)]
pub struct MemoryBackend {
    /// Shipment records.
    pub shipments: Arc<MemoryShipmentStore>,
    /// Route records.
    pub routes: Arc<MemoryRouteStore>,
    /// Evidence uploads.
    pub evidence: Arc<MemoryEvidenceStore>,
    /// Recorded notifications.
    pub notifier: Arc<RecordingNotifier>,
}

impl MemoryBackend {
    /// Fresh, empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collaborators for [`parcelroute_core::ShipmentService::new`].
    #[must_use]
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            shipments: Arc::clone(&self.shipments) as _,
            routes: Arc::clone(&self.routes) as _,
            notifier: Arc::clone(&self.notifier) as _,
            evidence: Arc::clone(&self.evidence) as _,
        }
    }
}
