//! Versioned service configuration: routes, tariffs, modifiers and lifecycle policy.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::booking::{BookingFlow, DOOR_TO_DOOR_ADD_ON, DRUM_ITEM, WRAPPING_ADD_ON};
use crate::error::ConfigError;
use crate::lifecycle::{LifecyclePolicy, ShipmentStateMachine};
use crate::model::{CountryCode, Money, RouteName};
use crate::pricing::{
    AddOnCharge, AddOnRule, ItemTariff, PaymentModifiers, PricingConfig, PricingEngine,
    TariffSchedule, Tier, TierTable,
};
use crate::routing::{AddressingScheme, CityRoute, CountryConfig, Route, RouteResolver, RoutingConfig};

const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Settings for dashboard consumers.
pub struct ConsoleConfig {
    /// Seconds between refreshes of the collection-day view.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

impl ConsoleConfig {
    /// Refresh interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Complete, versioned configuration of the booking core.
pub struct ServiceConfig {
    /// Monotonic version; reloads must increase it.
    pub version: u64,
    /// ISO 4217 currency of every amount.
    pub currency: String,
    /// Countries, routes and restricted areas.
    pub routing: RoutingConfig,
    /// Tariffs, add-ons and payment modifiers.
    pub pricing: PricingConfig,
    /// Lifecycle rules.
    #[serde(default)]
    pub lifecycle: LifecyclePolicy,
    /// Dashboard settings.
    #[serde(default)]
    pub console: ConsoleConfig,
}

impl ServiceConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML, or the validation error.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// [`ServiceConfig::from_toml_str`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Check every table without keeping the compiled result.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.clone().compile().map(|_compiled| ())
    }

    /// Validate and build the resolver, pricing engines and state machine.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn compile(self) -> Result<CompiledConfig, ConfigError> {
        let currency_ok =
            self.currency.len() == 3 && self.currency.chars().all(|ch| ch.is_ascii_uppercase());
        if !currency_ok {
            return Err(ConfigError::InvalidCurrency(self.currency));
        }
        let resolver = RouteResolver::from_config(&self.routing)?;
        let engines = self.pricing.engines()?;
        let machine = ShipmentStateMachine::new(self.lifecycle);
        Ok(CompiledConfig {
            config: self,
            resolver,
            engines,
            machine,
        })
    }

    /// Built-in configuration for a UK → Ghana drum service.
    #[must_use]
    pub fn sample() -> Self {
        let route = |name: &str, areas: &[&str], priority: u32, day: u32| Route {
            name: RouteName::new(name),
            areas: areas.iter().map(|area| (*area).to_owned()).collect(),
            collection_date: NaiveDate::from_ymd_opt(2026, 10, day).unwrap_or_default(),
            priority,
            created_at: None,
            updated_at: None,
        };
        let tiers = |prices: [(u32, i64); 3]| {
            TierTable(
                prices
                    .into_iter()
                    .map(|(min_quantity, minor)| Tier {
                        min_quantity,
                        unit_price: Money(minor),
                    })
                    .collect(),
            )
        };

        Self {
            version: 1,
            currency: "GBP".to_owned(),
            routing: RoutingConfig {
                countries: vec![
                    CountryConfig {
                        code: CountryCode::new("GB"),
                        name: "United Kingdom".to_owned(),
                        addressing: AddressingScheme::PostalPrefix,
                    },
                    CountryConfig {
                        code: CountryCode::new("GH"),
                        name: "Ghana".to_owned(),
                        addressing: AddressingScheme::CityLookup,
                    },
                ],
                routes: vec![
                    route("London", &["EC", "WC", "SW", "SE", "NW"], 1, 24),
                    route("South West", &["EX", "TQ", "TA"], 2, 28),
                    route("Birmingham", &["B", "CV", "WS", "WV", "DY"], 3, 25),
                    route("Manchester", &["M", "OL", "SK", "WA"], 4, 26),
                    route("Leeds", &["LS", "HX", "WF"], 5, 27),
                    route("Scotland", &["G", "EH", "KY", "DD"], 6, 29),
                    route("Accra", &["GA"], 20, 30),
                    route("Kumasi", &["AK"], 21, 31),
                ],
                restricted_prefixes: ["BT", "EX4", "GY", "HS", "IM", "JE", "KW", "PL", "TR", "ZE"]
                    .into_iter()
                    .map(str::to_owned)
                    .collect(),
                city_routes: vec![
                    CityRoute {
                        city: "Accra".to_owned(),
                        route: RouteName::new("Accra"),
                    },
                    CityRoute {
                        city: "Tema".to_owned(),
                        route: RouteName::new("Accra"),
                    },
                    CityRoute {
                        city: "Kumasi".to_owned(),
                        route: RouteName::new("Kumasi"),
                    },
                ],
            },
            pricing: PricingConfig {
                tariffs: vec![
                    TariffSchedule {
                        flow: BookingFlow::Web,
                        items: vec![
                            ItemTariff {
                                item_type: DRUM_ITEM.to_owned(),
                                standard: tiers([(1, 8_500), (2, 8_000), (5, 7_500)]),
                                pay_later: tiers([(1, 9_500), (2, 9_000), (5, 8_500)]),
                            },
                            ItemTariff {
                                item_type: "box".to_owned(),
                                standard: tiers([(1, 4_000), (3, 3_500), (10, 3_000)]),
                                pay_later: tiers([(1, 4_500), (3, 4_000), (10, 3_500)]),
                            },
                        ],
                    },
                    TariffSchedule {
                        flow: BookingFlow::Agent,
                        items: vec![
                            ItemTariff {
                                item_type: DRUM_ITEM.to_owned(),
                                standard: tiers([(1, 9_000), (3, 8_200), (6, 7_600)]),
                                pay_later: tiers([(1, 10_000), (3, 9_200), (6, 8_600)]),
                            },
                            ItemTariff {
                                item_type: "box".to_owned(),
                                standard: tiers([(1, 4_200), (3, 3_700), (10, 3_200)]),
                                pay_later: tiers([(1, 4_700), (3, 4_200), (10, 3_700)]),
                            },
                        ],
                    },
                ],
                add_ons: vec![
                    AddOnRule {
                        name: "seal".to_owned(),
                        label: "Security seal".to_owned(),
                        fee: Money(750),
                        charge: AddOnCharge::Mandatory,
                    },
                    AddOnRule {
                        name: WRAPPING_ADD_ON.to_owned(),
                        label: "Protective wrapping".to_owned(),
                        fee: Money(500),
                        charge: AddOnCharge::PerUnit,
                    },
                    AddOnRule {
                        name: DOOR_TO_DOOR_ADD_ON.to_owned(),
                        label: "Door-to-door delivery".to_owned(),
                        fee: Money(2_500),
                        charge: AddOnCharge::Flat,
                    },
                ],
                modifiers: PaymentModifiers {
                    cash_discount_per_unit: Money(500),
                    arrival_premium_bps: 1_000,
                },
            },
            lifecycle: LifecyclePolicy::default(),
            console: ConsoleConfig::default(),
        }
    }
}

/// A validated configuration with everything derived from it.
#[derive(Debug, Clone)]
pub struct CompiledConfig {
    /// Source configuration.
    pub config: ServiceConfig,
    /// Route resolver.
    pub resolver: RouteResolver,
    /// One pricing engine per booking flow.
    pub engines: BTreeMap<BookingFlow, PricingEngine>,
    /// Lifecycle state machine.
    pub machine: ShipmentStateMachine,
}

impl CompiledConfig {
    /// Pricing engine of a booking flow.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingTariff`] when the flow has no tariff.
    pub fn engine(&self, flow: BookingFlow) -> Result<&PricingEngine, ConfigError> {
        self.engines
            .get(&flow)
            .ok_or(ConfigError::MissingTariff(flow))
    }

    /// Configuration version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.config.version
    }
}
