//! Core types, rules and service wiring for the parcelroute shipment booking service.

/// Booking channels, submitted forms and their normalization.
pub mod booking;
/// Versioned service configuration and its compiled form.
pub mod config;
/// Errors raised by configuration loading and shipment operations.
pub mod error;
/// Shipment lifecycle states, actors and the transition state machine.
pub mod lifecycle;
/// Domain models and identifiers shared by all adapters.
pub mod model;
/// Traits describing the record stores, notifications and evidence uploads.
pub mod ports;
/// Tiered pricing, add-ons and payment modifiers.
pub mod pricing;
/// Route table and postal-code resolution.
pub mod routing;
/// Grouping of active shipments into collection runs.
pub mod scheduling;
/// High-level service facade used by clients.
pub mod service;

pub use booking::*;
pub use config::*;
pub use error::*;
pub use lifecycle::*;
pub use model::*;
pub use ports::*;
pub use pricing::*;
pub use routing::*;
pub use scheduling::*;
pub use service::*;
