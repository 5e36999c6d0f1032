//! Shipment and route stores backed by ordered maps behind async locks.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use parcelroute_core::{
    Route, RouteName, RouteStore, Shipment, ShipmentFilter, ShipmentId, ShipmentPatch,
    ShipmentStore, StoreError, TrackingNumber,
};
use tokio::sync::RwLock;

/// Shipment store keeping every record in memory.
#[derive(Debug, Default)]
pub struct MemoryShipmentStore {
    records: RwLock<BTreeMap<ShipmentId, Shipment>>,
}

impl MemoryShipmentStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored shipments.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no shipments.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ShipmentStore for MemoryShipmentStore {
    async fn insert(&self, shipment: Shipment) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let taken = records.contains_key(&shipment.id)
            || records
                .values()
                .any(|stored| stored.tracking_number == shipment.tracking_number);
        if taken {
            return Err(StoreError::Duplicate(shipment.tracking_number.to_string()));
        }
        records.insert(shipment.id, shipment);
        Ok(())
    }

    async fn get(&self, id: &ShipmentId) -> Result<Shipment, StoreError> {
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn find_by_tracking(&self, tracking: &TrackingNumber) -> Result<Shipment, StoreError> {
        self.records
            .read()
            .await
            .values()
            .find(|shipment| &shipment.tracking_number == tracking)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(tracking.to_string()))
    }

    async fn update(&self, id: &ShipmentId, patch: ShipmentPatch) -> Result<Shipment, StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if !patch.guard_matches(record) {
            return Err(StoreError::Conflict(*id));
        }
        patch.apply_to(record);
        Ok(record.clone())
    }

    async fn query(&self, filter: &ShipmentFilter) -> Result<Vec<Shipment>, StoreError> {
        let mut matching: Vec<Shipment> = self
            .records
            .read()
            .await
            .values()
            .filter(|shipment| filter.matches(shipment))
            .cloned()
            .collect();
        matching.sort_by(|left, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(matching)
    }
}

/// Route store keeping every route in memory, keyed by name.
#[derive(Debug, Default)]
pub struct MemoryRouteStore {
    routes: RwLock<BTreeMap<RouteName, Route>>,
}

impl MemoryRouteStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RouteStore for MemoryRouteStore {
    async fn list(&self) -> Result<Vec<Route>, StoreError> {
        Ok(self.routes.read().await.values().cloned().collect())
    }

    async fn upsert(&self, mut route: Route) -> Result<(), StoreError> {
        let mut routes = self.routes.write().await;
        let now = Utc::now();
        let created_at = routes
            .get(&route.name)
            .and_then(|existing| existing.created_at)
            .or(route.created_at)
            .unwrap_or(now);
        route.created_at = Some(created_at);
        route.updated_at = Some(route.updated_at.unwrap_or(now));
        routes.insert(route.name.clone(), route);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use parcelroute_core::{
        Address, AuditNote, BookingFlow, Collection, Composition, Contact, CountryCode, CustomerId, Money,
        Party, PaymentOption, ShipmentStatus,
    };

    use super::*;

    fn shipment(owner: &str) -> Shipment {
        let id = ShipmentId::new();
        let party = Party {
            contact: Contact {
                name: owner.to_owned(),
                phone: "+44 20 7946 0000".to_owned(),
                email: None,
            },
            address: Address {
                line1: "1 Test Street".to_owned(),
                city: "London".to_owned(),
                postal_code: "SW1A 1AA".to_owned(),
                country: CountryCode::new("GB"),
            },
        };
        Shipment {
            id,
            tracking_number: TrackingNumber::from_id(&id),
            owner: CustomerId(owner.to_owned()),
            sender: party.clone(),
            recipient: party,
            flow: BookingFlow::Web,
            composition: Composition::default(),
            payment_option: PaymentOption::Standard,
            total_amount: Money::ZERO,
            currency: "GBP".to_owned(),
            manual_quotes: Vec::new(),
            collection: Collection::Pending {
                resolved_from: "SW1A1AA".to_owned(),
            },
            status: ShipmentStatus::BookingConfirmed,
            can_modify: true,
            can_cancel: true,
            evidence_url: None,
            history: Vec::new(),
            notes: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            revision: 0,
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let store = MemoryShipmentStore::new();
        let record = shipment("ama");
        store.insert(record.clone()).await.expect("first insert");
        assert!(matches!(
            store.insert(record).await,
            Err(StoreError::Duplicate(_))
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_honours_status_guard() {
        let store = MemoryShipmentStore::new();
        let record = shipment("ama");
        let id = record.id;
        store.insert(record).await.expect("insert");

        let stale = ShipmentPatch::new(Utc::now())
            .expect_status(ShipmentStatus::ReadyForPickup)
            .status(ShipmentStatus::ProcessingOriginWarehouse);
        assert_eq!(
            store.update(&id, stale).await.map(|_shipment| ()),
            Err(StoreError::Conflict(id))
        );

        let fresh = ShipmentPatch::new(Utc::now())
            .expect_status(ShipmentStatus::BookingConfirmed)
            .status(ShipmentStatus::ReadyForPickup)
            .lock_booking();
        let updated = store.update(&id, fresh).await.expect("guard matches");
        assert_eq!(updated.status, ShipmentStatus::ReadyForPickup);
        assert!(!updated.can_modify);
        assert_eq!(store.get(&id).await.expect("stored").status, ShipmentStatus::ReadyForPickup);
    }

    #[tokio::test]
    async fn test_update_honours_revision_guard() {
        let store = MemoryShipmentStore::new();
        let record = shipment("ama");
        let id = record.id;
        store.insert(record).await.expect("insert");

        let read = store.get(&id).await.expect("stored");
        let first = ShipmentPatch::new(Utc::now())
            .expect_revision(read.revision)
            .append_note(AuditNote {
                author: "operator:olu".to_owned(),
                note: "called sender".to_owned(),
                written_at: Utc::now(),
            });
        let updated = store.update(&id, first).await.expect("revision matches");
        assert_eq!(updated.revision, read.revision + 1);

        // Same status, but written against the old revision.
        let late = ShipmentPatch::new(Utc::now())
            .expect_status(read.status)
            .expect_revision(read.revision)
            .evidence_url("memory://evidence/late".to_owned());
        assert_eq!(
            store.update(&id, late).await.map(|_shipment| ()),
            Err(StoreError::Conflict(id))
        );
        assert_eq!(store.get(&id).await.expect("stored").evidence_url, None);
    }

    #[tokio::test]
    async fn test_lookup_by_tracking_and_missing_ids() {
        let store = MemoryShipmentStore::new();
        let record = shipment("kofi");
        let tracking = record.tracking_number.clone();
        store.insert(record).await.expect("insert");

        let found = store.find_by_tracking(&tracking).await.expect("found");
        assert_eq!(found.owner, CustomerId("kofi".to_owned()));
        assert!(matches!(
            store.get(&ShipmentId::new()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_query_filters_by_owner() {
        let store = MemoryShipmentStore::new();
        for owner in ["ama", "kofi", "ama"] {
            store.insert(shipment(owner)).await.expect("insert");
        }
        let filter = ShipmentFilter {
            owner: Some(CustomerId("ama".to_owned())),
            ..ShipmentFilter::default()
        };
        let found = store.query(&filter).await.expect("query");
        assert_eq!(found.len(), 2);
        assert!(found.windows(2).all(|pair| match pair {
            [first, second] => first.created_at <= second.created_at,
            _ => true,
        }));
    }

    #[tokio::test]
    async fn test_route_upsert_keeps_creation_time() {
        let store = MemoryRouteStore::new();
        let route = Route {
            name: RouteName::new("London"),
            areas: vec!["SW".to_owned()],
            collection_date: NaiveDate::from_ymd_opt(2026, 10, 24).expect("valid date"),
            priority: 1,
            created_at: None,
            updated_at: None,
        };
        store.upsert(route.clone()).await.expect("insert");
        let created = store.list().await.expect("list")[0].created_at;

        let moved = Route {
            collection_date: NaiveDate::from_ymd_opt(2026, 10, 31).expect("valid date"),
            updated_at: Some(Utc::now()),
            ..route
        };
        store.upsert(moved).await.expect("update");
        let routes = store.list().await.expect("list");
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].created_at, created);
        assert_eq!(
            routes[0].collection_date,
            NaiveDate::from_ymd_opt(2026, 10, 31).expect("valid date")
        );
    }
}
