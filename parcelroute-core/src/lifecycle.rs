//! Shipment lifecycle: statuses, legal edges, actor authority and transition planning.
//!
//! ```text
//! BookingConfirmed ─▶ ReadyForPickup ─▶ ProcessingOriginWarehouse ─▶ InTransit
//!        │                                                              │
//!        │            CustomsClearance ◀────────────────────────────────┘
//!        │                   │
//!        │                   ▼
//!        │   ProcessingDestinationWarehouse ─▶ OutForDelivery ─▶ Delivered
//!        │
//!        └─ any non-terminal state ─▶ Cancelled | FailedAttempt
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ShipmentError;
use crate::model::{CustomerId, Shipment};
use crate::ports::{Notification, NotificationKind, ShipmentPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Lifecycle state of a shipment.
pub enum ShipmentStatus {
    /// Booking accepted; the owner may still change or cancel it.
    BookingConfirmed,
    /// Scheduled on a collection route.
    ReadyForPickup,
    /// Collected and being processed at the origin warehouse.
    ProcessingOriginWarehouse,
    /// On its way to the destination country.
    InTransit,
    /// Held at customs.
    CustomsClearance,
    /// Being processed at the destination warehouse.
    ProcessingDestinationWarehouse,
    /// With a delivery driver.
    OutForDelivery,
    /// Handed over to the recipient (terminal).
    Delivered,
    /// Cancelled before completion (terminal).
    Cancelled,
    /// Collection or delivery failed (terminal).
    FailedAttempt,
}

impl ShipmentStatus {
    /// The main chain, in order.
    pub const MAIN_CHAIN: [Self; 8] = [
        Self::BookingConfirmed,
        Self::ReadyForPickup,
        Self::ProcessingOriginWarehouse,
        Self::InTransit,
        Self::CustomsClearance,
        Self::ProcessingDestinationWarehouse,
        Self::OutForDelivery,
        Self::Delivered,
    ];

    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::FailedAttempt)
    }

    /// Whether this state is a terminal side branch.
    #[must_use]
    pub fn is_side_branch(self) -> bool {
        matches!(self, Self::Cancelled | Self::FailedAttempt)
    }

    /// Next state on the main chain.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        let position = Self::MAIN_CHAIN.iter().position(|status| *status == self)?;
        Self::MAIN_CHAIN.get(position + 1).copied()
    }

    /// Whether `self → to` is an edge of the lifecycle graph.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        to.is_side_branch() || self.next() == Some(to)
    }

    /// Human-readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::BookingConfirmed => "Booking confirmed",
            Self::ReadyForPickup => "Ready for pickup",
            Self::ProcessingOriginWarehouse => "Processing at origin warehouse",
            Self::InTransit => "In transit",
            Self::CustomsClearance => "Customs clearance",
            Self::ProcessingDestinationWarehouse => "Processing at destination warehouse",
            Self::OutForDelivery => "Out for delivery",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::FailedAttempt => "Failed attempt",
        }
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Handoff point a driver works at.
pub enum DriverStage {
    /// Collects from senders.
    Collection,
    /// Delivers to recipients.
    Delivery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
/// Who is asking for a transition.
pub enum Actor {
    /// The customer who booked.
    Customer {
        /// Customer identity.
        id: CustomerId,
    },
    /// Back-office operator.
    Operator {
        /// Operator name.
        name: String,
    },
    /// Courier at a handoff point.
    Driver {
        /// Driver name.
        name: String,
        /// Where the driver works.
        stage: DriverStage,
    },
}

impl Actor {
    /// Short description used in history records.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Customer { id } => format!("customer:{id}"),
            Self::Operator { name } => format!("operator:{name}"),
            Self::Driver {
                name,
                stage: DriverStage::Collection,
            } => format!("collection-driver:{name}"),
            Self::Driver {
                name,
                stage: DriverStage::Delivery,
            } => format!("delivery-driver:{name}"),
        }
    }

    /// Whether the actor may perform a legal edge on this shipment.
    #[must_use]
    pub fn may_transition(&self, shipment: &Shipment, to: ShipmentStatus) -> bool {
        use ShipmentStatus::{
            BookingConfirmed, Cancelled, Delivered, FailedAttempt, OutForDelivery,
            ProcessingDestinationWarehouse, ProcessingOriginWarehouse, ReadyForPickup,
        };

        let from = shipment.status;
        match self {
            Self::Operator { .. } => true,
            Self::Customer { id } => {
                *id == shipment.owner
                    && shipment.can_cancel
                    && matches!((from, to), (BookingConfirmed, Cancelled))
            }
            Self::Driver {
                stage: DriverStage::Collection,
                ..
            } => matches!(
                (from, to),
                (ReadyForPickup, ProcessingOriginWarehouse | FailedAttempt)
            ),
            Self::Driver {
                stage: DriverStage::Delivery,
                ..
            } => matches!(
                (from, to),
                (ProcessingDestinationWarehouse, OutForDelivery)
                    | (OutForDelivery, Delivered | FailedAttempt)
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Configurable rules of the lifecycle.
pub struct LifecyclePolicy {
    /// Refuse `Delivered` until proof-of-delivery evidence is attached.
    #[serde(default = "default_require_delivery_evidence")]
    pub require_delivery_evidence: bool,
}

fn default_require_delivery_evidence() -> bool {
    true
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            require_delivery_evidence: default_require_delivery_evidence(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One accepted status change.
pub struct TransitionRecord {
    /// State before.
    pub from: ShipmentStatus,
    /// State after.
    pub to: ShipmentStatus,
    /// [`Actor::label`] of whoever requested it.
    pub actor: String,
    /// When it was accepted.
    pub at: DateTime<Utc>,
    /// Optional free-text reason.
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A validated transition, ready to persist.
pub struct PlannedTransition {
    /// History entry.
    pub record: TransitionRecord,
    /// Whether the booking becomes read-only for its owner.
    pub locks_booking: bool,
}

impl PlannedTransition {
    /// Compare-and-swap patch applying the transition.
    #[must_use]
    pub fn patch(&self) -> ShipmentPatch {
        let mut patch = ShipmentPatch::new(self.record.at)
            .expect_status(self.record.from)
            .status(self.record.to)
            .append_history(self.record.clone());
        if self.locks_booking {
            patch = patch.lock_booking();
        }
        patch
    }

    /// Notification announcing the new status to the shipment owner.
    #[must_use]
    pub fn notification(&self, shipment: &Shipment) -> Notification {
        let to = self.record.to;
        Notification {
            title: format!("Shipment {}: {}", shipment.tracking_number, to.label()),
            message: format!(
                "Your shipment {} is now {}.",
                shipment.tracking_number,
                to.label().to_lowercase()
            ),
            kind: NotificationKind::StatusChanged(to),
            related_id: shipment.id,
            user_id: shipment.owner.clone(),
        }
    }
}

/// Validates and plans status transitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShipmentStateMachine {
    policy: LifecyclePolicy,
}

impl ShipmentStateMachine {
    /// Create a state machine enforcing a policy.
    #[must_use]
    pub fn new(policy: LifecyclePolicy) -> Self {
        Self { policy }
    }

    /// The enforced policy.
    #[must_use]
    pub fn policy(&self) -> LifecyclePolicy {
        self.policy
    }

    /// Validate a request and plan the resulting transition.
    ///
    /// Checks run in order: graph edge, actor authority, delivery evidence.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::InvalidTransition`], [`ShipmentError::Forbidden`] or
    /// [`ShipmentError::MissingEvidence`].
    pub fn plan(
        &self,
        shipment: &Shipment,
        actor: &Actor,
        to: ShipmentStatus,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<PlannedTransition, ShipmentError> {
        let from = shipment.status;
        if !from.can_transition_to(to) {
            return Err(ShipmentError::InvalidTransition { from, to });
        }
        if !actor.may_transition(shipment, to) {
            return Err(ShipmentError::Forbidden {
                actor: actor.label(),
                from,
                to,
            });
        }
        if to == ShipmentStatus::Delivered
            && self.policy.require_delivery_evidence
            && shipment
                .evidence_url
                .as_deref()
                .is_none_or(|url| url.trim().is_empty())
        {
            return Err(ShipmentError::MissingEvidence(shipment.id));
        }

        Ok(PlannedTransition {
            record: TransitionRecord {
                from,
                to,
                actor: actor.label(),
                at,
                reason,
            },
            locks_booking: from == ShipmentStatus::BookingConfirmed,
        })
    }
}
