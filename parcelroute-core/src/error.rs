//! Error types raised by configuration loading and shipment operations.

use crate::booking::BookingFlow;
use crate::lifecycle::ShipmentStatus;
use crate::model::{CountryCode, RouteName, ShipmentId};
use crate::ports::{EvidenceError, StoreError};
use crate::pricing::PricingError;
use crate::routing::ResolveError;

#[derive(thiserror::Error, Debug)]
/// Malformed configuration. Fatal at startup; a rejected reload keeps the old config.
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration file is not valid TOML for [`crate::config::ServiceConfig`].
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// Two routes share a name.
    #[error("Route {0} is declared more than once")]
    DuplicateRoute(RouteName),
    /// Two routes share a priority, leaving the tie-break undefined.
    #[error("Routes {first} and {second} share priority {priority}")]
    DuplicatePriority {
        /// Route declared first.
        first: RouteName,
        /// Route declared second.
        second: RouteName,
        /// Shared priority.
        priority: u32,
    },
    /// A route is unusable.
    #[error("Invalid route {route}: {reason}")]
    InvalidRoute {
        /// Offending route.
        route: RouteName,
        /// What is wrong with it.
        reason: String,
    },
    /// A restricted prefix is empty or not alphanumeric.
    #[error("Invalid restricted prefix {0:?}")]
    InvalidRestrictedPrefix(String),
    /// A country is listed twice.
    #[error("Country {0} is declared more than once")]
    DuplicateCountry(CountryCode),
    /// A city entry names a route that does not exist.
    #[error("City {city} points at unknown route {route}")]
    UnknownCityRoute {
        /// City name.
        city: String,
        /// Missing route.
        route: RouteName,
    },
    /// A city is empty or mapped twice.
    #[error("City {0:?} is empty or mapped more than once")]
    DuplicateCity(String),
    /// A tier table is malformed.
    #[error("Invalid tier table for {item_type}: {reason}")]
    InvalidTierTable {
        /// Item type of the table.
        item_type: String,
        /// What is wrong with it.
        reason: String,
    },
    /// A booking flow has no tariff.
    #[error("No tariff configured for booking flow {0}")]
    MissingTariff(BookingFlow),
    /// A booking flow has more than one tariff.
    #[error("Booking flow {0} has more than one tariff")]
    DuplicateTariff(BookingFlow),
    /// Two add-ons share a key.
    #[error("Add-on {0} is declared more than once")]
    DuplicateAddOn(String),
    /// A fee or discount is negative.
    #[error("Negative amount in {0}")]
    NegativeAmount(String),
    /// A reload did not increase the configuration version.
    #[error("Configuration version {proposed} does not supersede {current}")]
    StaleVersion {
        /// Version in use.
        current: u64,
        /// Rejected version.
        proposed: u64,
    },
    /// The currency code is not three upper-case letters.
    #[error("Invalid currency code {0:?}")]
    InvalidCurrency(String),
}

#[derive(thiserror::Error, Debug)]
/// Errors surfaced to whoever asked for a shipment operation. All are recoverable.
pub enum ShipmentError {
    /// The requested edge is not in the lifecycle graph.
    #[error("Cannot move shipment from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: ShipmentStatus,
        /// Requested status.
        to: ShipmentStatus,
    },
    /// The actor lacks authority for an otherwise legal edge.
    #[error("{actor} may not move shipment from {from} to {to}")]
    Forbidden {
        /// [`crate::lifecycle::Actor::label`] of the requester.
        actor: String,
        /// Current status.
        from: ShipmentStatus,
        /// Requested status.
        to: ShipmentStatus,
    },
    /// The actor may not perform a non-transition operation.
    #[error("{actor} may not {action}")]
    Unauthorized {
        /// [`crate::lifecycle::Actor::label`] of the requester.
        actor: String,
        /// What was attempted.
        action: &'static str,
    },
    /// `Delivered` was requested without proof-of-delivery evidence.
    #[error("Shipment {0} has no proof-of-delivery evidence")]
    MissingEvidence(ShipmentId),
    /// No shipment with this id or tracking number exists.
    #[error("Shipment not found: {0}")]
    NotFound(String),
    /// Someone else changed the shipment first; reload and retry.
    #[error("Shipment {0} was changed concurrently")]
    Conflict(ShipmentId),
    /// The owner can no longer change the booking.
    #[error("Shipment {id} can no longer be modified ({status})")]
    NotModifiable {
        /// Shipment.
        id: ShipmentId,
        /// Its current status.
        status: ShipmentStatus,
    },
    /// A manual quote referred to something that is not an unpriced custom item.
    #[error("Invalid quote: {0}")]
    InvalidQuote(String),
    /// Pricing failed.
    #[error(transparent)]
    Pricing(#[from] PricingError),
    /// Route resolution failed hard.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// The record store failed.
    #[error(transparent)]
    Store(StoreError),
    /// The evidence store failed.
    #[error(transparent)]
    Evidence(#[from] EvidenceError),
    /// Configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<StoreError> for ShipmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Conflict(id) => Self::Conflict(id),
            other => Self::Store(other),
        }
    }
}
