//! Domain data structures for shipments, parties, line items, and money.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::BookingFlow;
use crate::lifecycle::{ShipmentStatus, TransitionRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Opaque, stable internal identifier of a shipment.
pub struct ShipmentId(pub Uuid);

impl ShipmentId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ShipmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ShipmentId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Externally visible tracking number, e.g. `PR1A2B3C4D`.
pub struct TrackingNumber(pub String);

impl TrackingNumber {
    /// Prefix shared by every tracking number.
    pub const PREFIX: &'static str = "PR";

    /// Derive the tracking number from the leading eight hex digits of an id.
    #[must_use]
    pub fn from_id(id: &ShipmentId) -> Self {
        let hex = id.0.simple().to_string().to_uppercase();
        let digits: String = hex.chars().take(8).collect();
        Self(format!("{}{digits}", Self::PREFIX))
    }
}

impl fmt::Display for TrackingNumber {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Identifier of the customer who owns a booking.
pub struct CustomerId(pub String);

impl fmt::Display for CustomerId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Unique name of a collection route.
pub struct RouteName(pub String);

impl RouteName {
    /// Build a route name from anything string-like.
    #[must_use]
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for RouteName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// ISO 3166 alpha-2 country code, stored upper-case.
pub struct CountryCode(pub String);

impl CountryCode {
    /// Build a normalized (trimmed, upper-case) country code.
    #[must_use]
    pub fn new(code: &str) -> Self {
        Self(code.trim().to_uppercase())
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
/// An amount in minor currency units (pence, cents).
pub struct Money(pub i64);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Construct from major and minor units, e.g. `Money::from_major_minor(12, 50)` is 12.50.
    #[must_use]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        Self(major * 100 + minor)
    }

    /// Addition that reports overflow instead of wrapping.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Subtraction that reports overflow instead of wrapping.
    #[must_use]
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Multiply by a unit quantity.
    #[must_use]
    pub fn checked_mul(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(i64::from(quantity)).map(Self)
    }

    /// Whether the amount is below zero.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(formatter, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Contact details of a sender or recipient.
pub struct Contact {
    /// Full name.
    pub name: String,
    /// Phone number as entered.
    pub phone: String,
    /// Optional e-mail address.
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Postal address.
pub struct Address {
    /// Street and house number.
    pub line1: String,
    /// Town or city.
    pub city: String,
    /// Postal code as entered; may be empty where the country has none.
    pub postal_code: String,
    /// Country of the address.
    pub country: CountryCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A sender or recipient.
pub struct Party {
    /// How to reach the party.
    pub contact: Contact,
    /// Where the party is.
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
/// A single line of a shipment's composition.
pub enum LineItem {
    /// A unit priced from the tariff, such as a standard drum.
    Fixed {
        /// Tariff item type, e.g. `drum`.
        item_type: String,
        /// Number of units.
        quantity: u32,
    },
    /// A free-form item priced by manual operator quotation.
    Custom {
        /// What the customer is sending.
        description: String,
        /// Number of pieces.
        quantity: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
/// Everything the pricing engine needs to know about what is being shipped.
pub struct Composition {
    /// Line items in booking order.
    pub items: Vec<LineItem>,
    /// Names of selected add-on services.
    pub add_ons: BTreeSet<String>,
}

impl Composition {
    /// Total units across all fixed-tariff line items.
    #[must_use]
    pub fn fixed_units(&self) -> u32 {
        self.items
            .iter()
            .map(|item| match item {
                LineItem::Fixed { quantity, .. } => *quantity,
                LineItem::Custom { .. } => 0,
            })
            .fold(0_u32, u32::saturating_add)
    }

    /// Total units of one fixed-tariff item type.
    #[must_use]
    pub fn units_of(&self, wanted: &str) -> u32 {
        self.items
            .iter()
            .filter_map(|item| match item {
                LineItem::Fixed {
                    item_type,
                    quantity,
                } if item_type == wanted => Some(*quantity),
                LineItem::Fixed { .. } | LineItem::Custom { .. } => None,
            })
            .fold(0_u32, u32::saturating_add)
    }

    /// Distinct fixed-tariff item types, sorted.
    #[must_use]
    pub fn fixed_item_types(&self) -> BTreeSet<&str> {
        self.items
            .iter()
            .filter_map(|item| match item {
                LineItem::Fixed { item_type, .. } => Some(item_type.as_str()),
                LineItem::Custom { .. } => None,
            })
            .collect()
    }

    /// Whether the composition has nothing in it.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.iter().all(|item| match item {
            LineItem::Fixed { quantity, .. } | LineItem::Custom { quantity, .. } => *quantity == 0,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// How the customer pays. Each option carries at most one pricing modifier.
pub enum PaymentOption {
    /// Paid in full at booking.
    Standard,
    /// Deferred payment, priced from the pay-later tier table.
    PayLater,
    /// Cash handed to the driver at collection, discounted per unit.
    CashOnCollection,
    /// Paid by the recipient on arrival, with a percentage premium.
    PayOnArrival,
}

impl fmt::Display for PaymentOption {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Standard => "standard",
            Self::PayLater => "pay later",
            Self::CashOnCollection => "cash on collection",
            Self::PayOnArrival => "pay on arrival",
        };
        formatter.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Route assignment derived from the sender address.
pub struct CollectionAssignment {
    /// Route collecting the shipment.
    pub route: RouteName,
    /// Areas serviced by the route.
    pub areas: Vec<String>,
    /// Date the route collects.
    pub collection_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
/// Collection state persisted on a shipment.
pub enum Collection {
    /// A route was found.
    Assigned {
        /// The assignment.
        assignment: CollectionAssignment,
        /// Normalized postal code (or city key) the assignment was derived from.
        resolved_from: String,
    },
    /// The sender is in a restricted area; operators must arrange collection manually.
    Restricted {
        /// Deny-list prefix that matched.
        prefix: String,
        /// Normalized postal code the check was made against.
        resolved_from: String,
    },
    /// Not enough information yet.
    Pending {
        /// Normalized postal code (or city key) that failed to resolve.
        resolved_from: String,
    },
}

impl Collection {
    /// Normalized key the collection was derived from.
    #[must_use]
    pub fn resolved_from(&self) -> &str {
        match self {
            Self::Assigned { resolved_from, .. }
            | Self::Restricted { resolved_from, .. }
            | Self::Pending { resolved_from } => resolved_from,
        }
    }

    /// The route assignment, if any.
    #[must_use]
    pub fn assignment(&self) -> Option<&CollectionAssignment> {
        match self {
            Self::Assigned { assignment, .. } => Some(assignment),
            Self::Restricted { .. } | Self::Pending { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Operator price for one custom line item.
pub struct ManualQuote {
    /// Index of the custom item in [`Composition::items`].
    pub item_index: usize,
    /// Quoted amount.
    pub amount: Money,
    /// Operator who quoted.
    pub quoted_by: String,
    /// When the quote was recorded.
    pub quoted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Free-text note attached to a shipment for audit purposes.
pub struct AuditNote {
    /// Who wrote the note.
    pub author: String,
    /// Note text.
    pub note: String,
    /// When it was written.
    pub written_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// The central shipment record.
pub struct Shipment {
    /// Internal identifier.
    pub id: ShipmentId,
    /// Public tracking number.
    pub tracking_number: TrackingNumber,
    /// Customer who booked the shipment.
    pub owner: CustomerId,
    /// Where the shipment is collected.
    pub sender: Party,
    /// Where the shipment is delivered.
    pub recipient: Party,
    /// Channel the booking came through; selects the tariff.
    pub flow: BookingFlow,
    /// What is being shipped.
    pub composition: Composition,
    /// Chosen payment option.
    pub payment_option: PaymentOption,
    /// Computed payable total (priced items plus custom quotes).
    pub total_amount: Money,
    /// ISO 4217 currency of all amounts.
    pub currency: String,
    /// Operator quotes for custom items.
    pub manual_quotes: Vec<ManualQuote>,
    /// Derived collection state.
    pub collection: Collection,
    /// Current lifecycle state.
    pub status: ShipmentStatus,
    /// Whether the owner may still change the booking.
    pub can_modify: bool,
    /// Whether the owner may still cancel the booking.
    pub can_cancel: bool,
    /// Proof-of-delivery image URL.
    pub evidence_url: Option<String>,
    /// Every accepted status change, oldest first.
    pub history: Vec<TransitionRecord>,
    /// Audit annotations, oldest first.
    pub notes: Vec<AuditNote>,
    /// When the booking was submitted.
    pub created_at: DateTime<Utc>,
    /// When the record last changed.
    pub updated_at: DateTime<Utc>,
    /// Incremented by every stored update.
    #[serde(default)]
    pub revision: u64,
}

impl Shipment {
    /// Whether the shipment has reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Custom items that still have no operator quote.
    #[must_use]
    pub fn unquoted_custom_items(&self) -> Vec<usize> {
        self.composition
            .items
            .iter()
            .enumerate()
            .filter(|(index, item)| {
                matches!(item, LineItem::Custom { .. })
                    && !self
                        .manual_quotes
                        .iter()
                        .any(|quote| quote.item_index == *index)
            })
            .map(|(index, _item)| index)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drums(quantity: u32) -> LineItem {
        LineItem::Fixed {
            item_type: "drum".to_owned(),
            quantity,
        }
    }

    #[test]
    fn test_tracking_number_is_derived_from_id() {
        let id = ShipmentId(Uuid::from_u128(0x1a2b_3c4d_0000_0000_0000_0000_0000_0000));
        assert_eq!(TrackingNumber::from_id(&id).0, "PR1A2B3C4D");
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_major_minor(12, 5).to_string(), "12.05");
        assert_eq!(Money(-250).to_string(), "-2.50");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn test_money_overflow_is_reported() {
        assert_eq!(Money(i64::MAX).checked_add(Money(1)), None);
        assert_eq!(Money(i64::MAX).checked_mul(2), None);
    }

    #[test]
    fn test_composition_unit_counts() {
        let composition = Composition {
            items: vec![
                drums(2),
                LineItem::Custom {
                    description: "bicycle".to_owned(),
                    quantity: 1,
                },
                drums(3),
                LineItem::Fixed {
                    item_type: "box".to_owned(),
                    quantity: 4,
                },
            ],
            add_ons: BTreeSet::new(),
        };
        assert_eq!(composition.fixed_units(), 9);
        assert_eq!(composition.units_of("drum"), 5);
        assert_eq!(composition.units_of("crate"), 0);
        assert_eq!(
            composition.fixed_item_types().into_iter().collect::<Vec<_>>(),
            vec!["box", "drum"]
        );
        assert!(!composition.is_empty());
        assert!(Composition::default().is_empty());
    }
}
