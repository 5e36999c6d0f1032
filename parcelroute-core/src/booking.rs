//! Booking flows and the versioned booking forms they submit.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Composition, CustomerId, LineItem, Party, PaymentOption};

/// Tariff item type of a standard drum.
pub const DRUM_ITEM: &str = "drum";
/// Add-on key for per-unit protective wrapping.
pub const WRAPPING_ADD_ON: &str = "wrapping";
/// Add-on key for door-to-door delivery.
pub const DOOR_TO_DOOR_ADD_ON: &str = "door_to_door";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Booking channel. Each channel prices from its own tariff.
pub enum BookingFlow {
    /// Customer self-service booking.
    Web,
    /// Booking taken by an agent on the customer's behalf.
    Agent,
}

impl BookingFlow {
    /// Every flow, each of which must have a tariff.
    pub const ALL: [Self; 2] = [Self::Web, Self::Agent];
}

impl fmt::Display for BookingFlow {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            Self::Web => "web",
            Self::Agent => "agent",
        };
        write!(formatter, "{slug}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "version")]
/// Booking form as submitted, tagged by form version.
pub enum BookingForm {
    /// Original drums-only form with free-text extras.
    #[serde(rename = "v1")]
    DrumsV1 {
        /// Number of drums.
        drums: u32,
        /// Protective wrapping for every drum.
        #[serde(default)]
        wrapping: bool,
        /// Deliver to the recipient's door.
        #[serde(default)]
        door_to_door: bool,
        /// Other items described in free text, one piece each.
        #[serde(default)]
        other_items: Vec<String>,
    },
    /// Itemized form with explicit line items and add-on keys.
    #[serde(rename = "v2")]
    ItemizedV2 {
        /// Line items.
        items: Vec<LineItem>,
        /// Selected add-on keys.
        #[serde(default)]
        add_ons: BTreeSet<String>,
    },
}

impl BookingForm {
    /// Normalize any form version into a [`Composition`].
    #[must_use]
    pub fn normalize(&self) -> Composition {
        match self {
            Self::DrumsV1 {
                drums,
                wrapping,
                door_to_door,
                other_items,
            } => {
                let mut items = Vec::with_capacity(other_items.len() + 1);
                if *drums > 0 {
                    items.push(LineItem::Fixed {
                        item_type: DRUM_ITEM.to_owned(),
                        quantity: *drums,
                    });
                }
                items.extend(
                    other_items
                        .iter()
                        .map(|description| description.trim())
                        .filter(|description| !description.is_empty())
                        .map(|description| LineItem::Custom {
                            description: description.to_owned(),
                            quantity: 1,
                        }),
                );

                let mut add_ons = BTreeSet::new();
                if *wrapping {
                    add_ons.insert(WRAPPING_ADD_ON.to_owned());
                }
                if *door_to_door {
                    add_ons.insert(DOOR_TO_DOOR_ADD_ON.to_owned());
                }
                Composition { items, add_ons }
            }
            Self::ItemizedV2 { items, add_ons } => Composition {
                items: items
                    .iter()
                    .filter(|item| match item {
                        LineItem::Fixed { quantity, .. } | LineItem::Custom { quantity, .. } => {
                            *quantity > 0
                        }
                    })
                    .cloned()
                    .collect(),
                add_ons: add_ons
                    .iter()
                    .map(|name| name.trim().to_lowercase())
                    .filter(|name| !name.is_empty())
                    .collect(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Everything submitted when a booking is made.
pub struct BookingRequest {
    /// Channel the booking came through.
    pub flow: BookingFlow,
    /// Customer who owns the booking.
    pub owner: CustomerId,
    /// Collection party.
    pub sender: Party,
    /// Delivery party.
    pub recipient: Party,
    /// Submitted form.
    pub form: BookingForm,
    /// Chosen payment option.
    pub payment_option: PaymentOption,
}
