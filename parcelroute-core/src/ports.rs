//! Traits describing the external collaborators and the records exchanged with them.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::lifecycle::{ShipmentStatus, TransitionRecord};
use crate::model::{
    AuditNote, Collection, Composition, CustomerId, ManualQuote, Money, Party, PaymentOption,
    RouteName, Shipment, ShipmentId, TrackingNumber,
};
use crate::routing::Route;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Errors reported by record stores.
pub enum StoreError {
    /// No record matches.
    #[error("Record not found: {0}")]
    NotFound(String),
    /// The compare-and-swap guard did not match the stored status.
    #[error("Record {0} was changed concurrently")]
    Conflict(ShipmentId),
    /// A record with the same key already exists.
    #[error("Duplicate record: {0}")]
    Duplicate(String),
    /// Backend failure.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Errors reported by evidence stores.
pub enum EvidenceError {
    /// The upload was empty or of an unsupported type.
    #[error("Evidence rejected: {0}")]
    Rejected(String),
    /// The backend failed to store the upload.
    #[error("Evidence upload failed: {0}")]
    Upload(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Errors reported when a notification cannot even be queued.
pub enum NotifyError {
    /// The delivery queue is gone.
    #[error("Notification queue closed")]
    QueueClosed,
    /// Any other dispatch failure.
    #[error("Notification dispatch failed: {0}")]
    Dispatch(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
/// What a notification is about.
pub enum NotificationKind {
    /// A booking was accepted.
    BookingReceived,
    /// The shipment moved to a new status.
    StatusChanged(ShipmentStatus),
    /// The payable amount changed.
    QuoteUpdated,
    /// The collection route or date changed.
    CollectionChanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Message for the notification collaborator.
pub struct Notification {
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Notification type.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Shipment the notification is about.
    pub related_id: ShipmentId,
    /// Recipient user.
    pub user_id: CustomerId,
}

#[derive(Debug, Clone, PartialEq)]
/// Partial update of a shipment, optionally guarded by the expected current status
/// and revision.
pub struct ShipmentPatch {
    /// Reject the update with [`StoreError::Conflict`] unless the stored status matches.
    pub expected_status: Option<ShipmentStatus>,
    /// Reject the update with [`StoreError::Conflict`] unless the stored revision matches.
    pub expected_revision: Option<u64>,
    /// New `updated_at`; always written.
    pub updated_at: DateTime<Utc>,
    /// New status.
    pub status: Option<ShipmentStatus>,
    /// New `can_modify` flag.
    pub can_modify: Option<bool>,
    /// New `can_cancel` flag.
    pub can_cancel: Option<bool>,
    /// New sender.
    pub sender: Option<Party>,
    /// New collection state.
    pub collection: Option<Collection>,
    /// New composition.
    pub composition: Option<Composition>,
    /// New payment option.
    pub payment_option: Option<PaymentOption>,
    /// New total.
    pub total_amount: Option<Money>,
    /// Replace the quotes for custom items.
    pub manual_quotes: Option<Vec<ManualQuote>>,
    /// New evidence URL.
    pub evidence_url: Option<String>,
    /// History entry to append.
    pub history: Option<TransitionRecord>,
    /// Audit note to append.
    pub note: Option<AuditNote>,
}

impl ShipmentPatch {
    /// Empty patch stamped with `updated_at`.
    #[must_use]
    pub fn new(updated_at: DateTime<Utc>) -> Self {
        Self {
            expected_status: None,
            expected_revision: None,
            updated_at,
            status: None,
            can_modify: None,
            can_cancel: None,
            sender: None,
            collection: None,
            composition: None,
            payment_option: None,
            total_amount: None,
            manual_quotes: None,
            evidence_url: None,
            history: None,
            note: None,
        }
    }

    /// Guard the update on the current status.
    #[must_use]
    pub fn expect_status(mut self, status: ShipmentStatus) -> Self {
        self.expected_status = Some(status);
        self
    }

    /// Guard the update on the record being unchanged since it was read.
    #[must_use]
    pub fn expect_revision(mut self, revision: u64) -> Self {
        self.expected_revision = Some(revision);
        self
    }

    /// Set the status.
    #[must_use]
    pub fn status(mut self, status: ShipmentStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Make the booking read-only for its owner.
    #[must_use]
    pub fn lock_booking(mut self) -> Self {
        self.can_modify = Some(false);
        self.can_cancel = Some(false);
        self
    }

    /// Replace the sender and its derived collection.
    #[must_use]
    pub fn sender(mut self, sender: Party, collection: Collection) -> Self {
        self.sender = Some(sender);
        self.collection = Some(collection);
        self
    }

    /// Replace the collection state.
    #[must_use]
    pub fn collection(mut self, collection: Collection) -> Self {
        self.collection = Some(collection);
        self
    }

    /// Replace composition, payment option and the derived total.
    #[must_use]
    pub fn pricing(
        mut self,
        composition: Composition,
        payment_option: PaymentOption,
        total_amount: Money,
    ) -> Self {
        self.composition = Some(composition);
        self.payment_option = Some(payment_option);
        self.total_amount = Some(total_amount);
        self
    }

    /// Replace the custom-item quotes and the derived total.
    #[must_use]
    pub fn manual_quotes(mut self, quotes: Vec<ManualQuote>, total_amount: Money) -> Self {
        self.manual_quotes = Some(quotes);
        self.total_amount = Some(total_amount);
        self
    }

    /// Set the evidence URL.
    #[must_use]
    pub fn evidence_url(mut self, url: String) -> Self {
        self.evidence_url = Some(url);
        self
    }

    /// Append a history entry.
    #[must_use]
    pub fn append_history(mut self, record: TransitionRecord) -> Self {
        self.history = Some(record);
        self
    }

    /// Append an audit note.
    #[must_use]
    pub fn append_note(mut self, note: AuditNote) -> Self {
        self.note = Some(note);
        self
    }

    /// Whether the guard accepts the current record.
    #[must_use]
    pub fn guard_matches(&self, current: &Shipment) -> bool {
        self.expected_status
            .is_none_or(|expected| expected == current.status)
            && self
                .expected_revision
                .is_none_or(|expected| expected == current.revision)
    }

    /// Apply every set field to a record and bump its revision. Does not check the guard.
    pub fn apply_to(self, shipment: &mut Shipment) {
        shipment.updated_at = self.updated_at;
        shipment.revision = shipment.revision.wrapping_add(1);
        if let Some(status) = self.status {
            shipment.status = status;
        }
        if let Some(can_modify) = self.can_modify {
            shipment.can_modify = can_modify;
        }
        if let Some(can_cancel) = self.can_cancel {
            shipment.can_cancel = can_cancel;
        }
        if let Some(sender) = self.sender {
            shipment.sender = sender;
        }
        if let Some(collection) = self.collection {
            shipment.collection = collection;
        }
        if let Some(composition) = self.composition {
            shipment.composition = composition;
        }
        if let Some(payment_option) = self.payment_option {
            shipment.payment_option = payment_option;
        }
        if let Some(total_amount) = self.total_amount {
            shipment.total_amount = total_amount;
        }
        if let Some(quotes) = self.manual_quotes {
            shipment.manual_quotes = quotes;
        }
        if let Some(url) = self.evidence_url {
            shipment.evidence_url = Some(url);
        }
        if let Some(record) = self.history {
            shipment.history.push(record);
        }
        if let Some(note) = self.note {
            shipment.notes.push(note);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Query parameters for listing shipments.
pub struct ShipmentFilter {
    /// Only these statuses, when set.
    pub statuses: Option<Vec<ShipmentStatus>>,
    /// Skip terminal shipments.
    pub active_only: bool,
    /// Only shipments of this owner.
    pub owner: Option<CustomerId>,
    /// Only shipments assigned to this route.
    pub route: Option<RouteName>,
    /// Only shipments collected on this date.
    pub collection_date: Option<NaiveDate>,
}

impl ShipmentFilter {
    /// Non-terminal shipments only.
    #[must_use]
    pub fn active() -> Self {
        Self {
            active_only: true,
            ..Self::default()
        }
    }

    /// Whether a record passes the filter.
    #[must_use]
    pub fn matches(&self, shipment: &Shipment) -> bool {
        if self.active_only && shipment.is_terminal() {
            return false;
        }
        if let Some(statuses) = &self.statuses
            && !statuses.contains(&shipment.status)
        {
            return false;
        }
        if let Some(owner) = &self.owner
            && owner != &shipment.owner
        {
            return false;
        }
        let assignment = shipment.collection.assignment();
        if let Some(route) = &self.route
            && assignment.is_none_or(|assigned| &assigned.route != route)
        {
            return false;
        }
        if let Some(date) = self.collection_date
            && assignment.is_none_or(|assigned| assigned.collection_date != date)
        {
            return false;
        }
        true
    }
}

#[async_trait]
/// Record store holding shipments.
pub trait ShipmentStore: Send + Sync {
    /// Insert a new shipment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] when the id or tracking number exists.
    async fn insert(&self, shipment: Shipment) -> Result<(), StoreError>;

    /// Fetch a shipment by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no shipment has the id.
    async fn get(&self, id: &ShipmentId) -> Result<Shipment, StoreError>;

    /// Fetch a shipment by tracking number.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no shipment has the tracking number.
    async fn find_by_tracking(&self, tracking: &TrackingNumber) -> Result<Shipment, StoreError>;

    /// Atomically apply a patch and return the updated record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the patch guard does not match, or
    /// [`StoreError::NotFound`].
    async fn update(&self, id: &ShipmentId, patch: ShipmentPatch) -> Result<Shipment, StoreError>;

    /// List shipments matching a filter, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    async fn query(&self, filter: &ShipmentFilter) -> Result<Vec<Shipment>, StoreError>;
}

#[async_trait]
/// Record store holding routes.
pub trait RouteStore: Send + Sync {
    /// All stored routes.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    async fn list(&self) -> Result<Vec<Route>, StoreError>;

    /// Insert or replace a route by name.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    async fn upsert(&self, route: Route) -> Result<(), StoreError>;
}

/// Outbound notification collaborator. Dispatch is fire-and-forget.
pub trait NotificationPort: Send + Sync {
    /// Queue a notification without waiting for delivery.
    ///
    /// # Errors
    ///
    /// Returns a [`NotifyError`] when the notification cannot be queued.
    fn emit(&self, notification: Notification) -> Result<(), NotifyError>;
}

#[async_trait]
/// Storage for proof-of-delivery images.
pub trait EvidenceStore: Send + Sync {
    /// Store the bytes and return a URL referencing them.
    ///
    /// # Errors
    ///
    /// Returns an [`EvidenceError`] when the upload is rejected or fails.
    async fn upload_and_get_url(
        &self,
        shipment: &ShipmentId,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, EvidenceError>;
}
