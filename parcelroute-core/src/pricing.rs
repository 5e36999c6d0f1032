//! Tiered unit pricing, add-on surcharges and payment-option modifiers.
//!
//! All arithmetic is done on integer minor units so that pricing the same
//! composition twice always yields the same quote.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::booking::BookingFlow;
use crate::error::ConfigError;
use crate::model::{Composition, LineItem, Money, PaymentOption};

/// Smallest number of tiers a table must define (single, small multiple, bulk).
pub const MIN_TIERS: usize = 3;

const BASIS_POINTS: i128 = 10_000;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Errors raised while pricing a composition.
pub enum PricingError {
    /// The composition has no units at all.
    #[error("Nothing to price")]
    EmptyComposition,
    /// A line item refers to an item type with no tariff.
    #[error("No tariff for item type: {0}")]
    UnknownItemType(String),
    /// A selected add-on is not in the catalogue.
    #[error("Unknown add-on: {0}")]
    UnknownAddOn(String),
    /// An amount no longer fits into the money representation.
    #[error("Amount overflow")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Unit price applying from `min_quantity` units upwards.
pub struct Tier {
    /// First quantity this tier applies to.
    pub min_quantity: u32,
    /// Price per unit within the tier.
    pub unit_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
/// Ordered tier boundaries for one item type and payment basis.
pub struct TierTable(pub Vec<Tier>);

impl TierTable {
    /// Check that tiers start at one, strictly increase, and have non-negative
    /// unit prices that never rise with quantity.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTierTable`] describing the first problem found.
    pub fn validate(&self, item_type: &str) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidTierTable {
            item_type: item_type.to_owned(),
            reason: reason.to_owned(),
        };
        if self.0.len() < MIN_TIERS {
            return Err(invalid("at least three tiers are required"));
        }
        if self.0.first().map(|tier| tier.min_quantity) != Some(1) {
            return Err(invalid("the first tier must start at one unit"));
        }
        if self
            .0
            .windows(2)
            .any(|pair| matches!(pair, [lower, upper] if upper.min_quantity <= lower.min_quantity))
        {
            return Err(invalid("tier boundaries must strictly increase"));
        }
        if self.0.iter().any(|tier| tier.unit_price.is_negative()) {
            return Err(invalid("unit prices must not be negative"));
        }
        if self
            .0
            .windows(2)
            .any(|pair| matches!(pair, [lower, upper] if upper.unit_price > lower.unit_price))
        {
            return Err(invalid("unit prices must not increase with quantity"));
        }
        Ok(())
    }

    /// The tier a quantity falls into, with its index.
    #[must_use]
    pub fn tier_for(&self, quantity: u32) -> Option<(usize, Tier)> {
        self.0
            .iter()
            .copied()
            .enumerate()
            .rev()
            .find(|(_idx, tier)| tier.min_quantity <= quantity)
    }

    fn boundaries(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().map(|tier| tier.min_quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Standard and pay-later tier tables for one fixed-tariff item type.
pub struct ItemTariff {
    /// Item type, e.g. `drum`.
    pub item_type: String,
    /// Tiers used for every payment option except pay-later.
    pub standard: TierTable,
    /// Parallel tiers used for pay-later bookings.
    pub pay_later: TierTable,
}

impl ItemTariff {
    fn validate(&self) -> Result<(), ConfigError> {
        self.standard.validate(&self.item_type)?;
        self.pay_later.validate(&self.item_type)?;
        if !self.standard.boundaries().eq(self.pay_later.boundaries()) {
            return Err(ConfigError::InvalidTierTable {
                item_type: self.item_type.clone(),
                reason: "pay-later tiers must use the standard tier boundaries".to_owned(),
            });
        }
        let cheaper = self
            .standard
            .0
            .iter()
            .zip(&self.pay_later.0)
            .any(|(standard, later)| later.unit_price < standard.unit_price);
        if cheaper {
            return Err(ConfigError::InvalidTierTable {
                item_type: self.item_type.clone(),
                reason: "pay-later prices must not undercut standard prices".to_owned(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Tariff used by one booking flow.
pub struct TariffSchedule {
    /// Booking flow the tariff belongs to.
    pub flow: BookingFlow,
    /// Per item-type tier tables.
    pub items: Vec<ItemTariff>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// How an add-on fee is charged.
pub enum AddOnCharge {
    /// Charged once per shipment whenever a fixed-tariff item is present.
    Mandatory,
    /// Charged per fixed-tariff unit when selected.
    PerUnit,
    /// Charged once per shipment when selected.
    Flat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One entry of the add-on catalogue.
pub struct AddOnRule {
    /// Key used in [`Composition::add_ons`].
    pub name: String,
    /// Display label.
    pub label: String,
    /// Fee per charge.
    pub fee: Money,
    /// Charging basis.
    pub charge: AddOnCharge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
/// Modifiers applied last, one per payment option.
pub struct PaymentModifiers {
    /// Discount per fixed-tariff unit for cash on collection.
    pub cash_discount_per_unit: Money,
    /// Premium on the subtotal for pay on arrival, in basis points.
    pub arrival_premium_bps: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Pricing section of the service configuration.
pub struct PricingConfig {
    /// One tariff per booking flow.
    pub tariffs: Vec<TariffSchedule>,
    /// Add-on catalogue shared by all flows.
    #[serde(default)]
    pub add_ons: Vec<AddOnRule>,
    /// Payment-option modifiers shared by all flows.
    #[serde(default)]
    pub modifiers: PaymentModifiers,
}

impl PricingConfig {
    /// Build one engine per booking flow.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when any tariff is malformed, a flow has two
    /// tariffs, or a flow has none.
    pub fn engines(&self) -> Result<BTreeMap<BookingFlow, PricingEngine>, ConfigError> {
        let mut engines = BTreeMap::new();
        for tariff in &self.tariffs {
            let engine = PricingEngine::new(tariff, &self.add_ons, self.modifiers)?;
            if engines.insert(tariff.flow, engine).is_some() {
                return Err(ConfigError::DuplicateTariff(tariff.flow));
            }
        }
        if let Some(missing) = BookingFlow::ALL
            .iter()
            .find(|flow| !engines.contains_key(*flow))
        {
            return Err(ConfigError::MissingTariff(*missing));
        }
        Ok(engines)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Priced fixed-tariff item type.
pub struct ItemCharge {
    /// Item type.
    pub item_type: String,
    /// Units of this type in the shipment.
    pub quantity: u32,
    /// Index of the applied tier.
    pub tier: usize,
    /// Standard unit price of the tier.
    pub unit_price: Money,
    /// `quantity * unit_price`.
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Applied add-on fee.
pub struct Surcharge {
    /// Add-on key.
    pub name: String,
    /// Charging basis.
    pub charge: AddOnCharge,
    /// Charged amount.
    pub amount: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
/// The single payment-option modifier applied to a quote.
pub enum PaymentAdjustment {
    /// Standard payment has no modifier.
    None,
    /// Difference between pay-later and standard tier prices.
    PayLaterUplift {
        /// Added amount.
        amount: Money,
    },
    /// Per-unit discount for cash on collection.
    CashDiscount {
        /// Deducted amount.
        amount: Money,
    },
    /// Percentage premium for pay on arrival.
    ArrivalPremium {
        /// Premium rate.
        basis_points: u32,
        /// Added amount.
        amount: Money,
    },
}

impl PaymentAdjustment {
    /// Signed effect on the subtotal.
    #[must_use]
    pub fn delta(&self) -> Money {
        match self {
            Self::None => Money::ZERO,
            Self::PayLaterUplift { amount } | Self::ArrivalPremium { amount, .. } => *amount,
            Self::CashDiscount { amount } => Money(-amount.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Custom item left for manual quotation.
pub struct DeferredItem {
    /// Index in [`Composition::items`].
    pub index: usize,
    /// Customer description.
    pub description: String,
    /// Number of pieces.
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Full price breakdown.
pub struct Quote {
    /// Priced fixed-tariff item types.
    pub items: Vec<ItemCharge>,
    /// Sum of item charges at standard prices.
    pub base_amount: Money,
    /// Applied add-ons in catalogue order.
    pub surcharges: Vec<Surcharge>,
    /// Base plus surcharges.
    pub subtotal: Money,
    /// Payment option the quote was computed for.
    pub payment_option: PaymentOption,
    /// Modifier for the payment option.
    pub payment_adjustment: PaymentAdjustment,
    /// Payable amount for everything that is automatically priced.
    pub final_amount: Money,
    /// Custom items awaiting an operator quote.
    pub deferred_items: Vec<DeferredItem>,
}

impl Quote {
    /// Whether every item was priced automatically.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.deferred_items.is_empty()
    }
}

/// Deterministic price calculator for a single tariff.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    items: BTreeMap<String, ItemTariff>,
    add_ons: Vec<AddOnRule>,
    modifiers: PaymentModifiers,
}

impl PricingEngine {
    /// Build an engine from a tariff, the add-on catalogue and payment modifiers.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for malformed tier tables, duplicate item types or
    /// add-ons, or negative fees.
    pub fn new(
        tariff: &TariffSchedule,
        add_ons: &[AddOnRule],
        modifiers: PaymentModifiers,
    ) -> Result<Self, ConfigError> {
        let mut items = BTreeMap::new();
        for item in &tariff.items {
            item.validate()?;
            if items.insert(item.item_type.clone(), item.clone()).is_some() {
                return Err(ConfigError::InvalidTierTable {
                    item_type: item.item_type.clone(),
                    reason: "item type is declared twice".to_owned(),
                });
            }
        }

        let mut names = HashSet::new();
        for rule in add_ons {
            if !names.insert(rule.name.as_str()) {
                return Err(ConfigError::DuplicateAddOn(rule.name.clone()));
            }
            if rule.fee.is_negative() {
                return Err(ConfigError::NegativeAmount(format!("add-on {}", rule.name)));
            }
        }
        if modifiers.cash_discount_per_unit.is_negative() {
            return Err(ConfigError::NegativeAmount(
                "cash discount per unit".to_owned(),
            ));
        }

        Ok(Self {
            items,
            add_ons: add_ons.to_vec(),
            modifiers,
        })
    }

    /// Unit price for `quantity` units of an item type under a payment option.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::UnknownItemType`] when the type has no tariff.
    pub fn unit_price(
        &self,
        item_type: &str,
        quantity: u32,
        option: PaymentOption,
    ) -> Result<Money, PricingError> {
        let tariff = self
            .items
            .get(item_type)
            .ok_or_else(|| PricingError::UnknownItemType(item_type.to_owned()))?;
        let table = match option {
            PaymentOption::PayLater => &tariff.pay_later,
            PaymentOption::Standard
            | PaymentOption::CashOnCollection
            | PaymentOption::PayOnArrival => &tariff.standard,
        };
        Ok(table
            .tier_for(quantity.max(1))
            .map_or(Money::ZERO, |(_idx, tier)| tier.unit_price))
    }

    /// Price a composition under a payment option.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] for empty compositions, unknown item types or
    /// add-ons, and arithmetic overflow.
    pub fn price(
        &self,
        composition: &Composition,
        option: PaymentOption,
    ) -> Result<Quote, PricingError> {
        if composition.is_empty() {
            return Err(PricingError::EmptyComposition);
        }
        for selected in &composition.add_ons {
            if !self.add_ons.iter().any(|rule| &rule.name == selected) {
                return Err(PricingError::UnknownAddOn(selected.clone()));
            }
        }

        let mut items = Vec::new();
        let mut base_amount = Money::ZERO;
        let mut pay_later_uplift = Money::ZERO;
        for item_type in composition.fixed_item_types() {
            let quantity = composition.units_of(item_type);
            if quantity == 0 {
                continue;
            }
            let tariff = self
                .items
                .get(item_type)
                .ok_or_else(|| PricingError::UnknownItemType(item_type.to_owned()))?;
            let (tier, standard) = tariff
                .standard
                .tier_for(quantity)
                .ok_or(PricingError::EmptyComposition)?;
            let later = tariff
                .pay_later
                .tier_for(quantity)
                .map_or(standard.unit_price, |(_idx, later)| later.unit_price);

            let amount = standard
                .unit_price
                .checked_mul(quantity)
                .ok_or(PricingError::Overflow)?;
            base_amount = base_amount.checked_add(amount).ok_or(PricingError::Overflow)?;

            let uplift = later
                .checked_sub(standard.unit_price)
                .and_then(|diff| diff.checked_mul(quantity))
                .ok_or(PricingError::Overflow)?;
            pay_later_uplift = pay_later_uplift
                .checked_add(uplift)
                .ok_or(PricingError::Overflow)?;

            items.push(ItemCharge {
                item_type: item_type.to_owned(),
                quantity,
                tier,
                unit_price: standard.unit_price,
                amount,
            });
        }

        let fixed_units = composition.fixed_units();
        let surcharges = self.surcharges(composition, fixed_units)?;
        let subtotal = surcharges
            .iter()
            .try_fold(base_amount, |acc, surcharge| acc.checked_add(surcharge.amount))
            .ok_or(PricingError::Overflow)?;

        let payment_adjustment = self.adjustment(option, subtotal, fixed_units, pay_later_uplift)?;
        let final_amount = subtotal
            .checked_add(payment_adjustment.delta())
            .ok_or(PricingError::Overflow)?;

        let deferred_items = composition
            .items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| match item {
                LineItem::Custom {
                    description,
                    quantity,
                } => Some(DeferredItem {
                    index,
                    description: description.clone(),
                    quantity: *quantity,
                }),
                LineItem::Fixed { .. } => None,
            })
            .collect();

        Ok(Quote {
            items,
            base_amount,
            surcharges,
            subtotal,
            payment_option: option,
            payment_adjustment,
            final_amount,
            deferred_items,
        })
    }

    fn surcharges(
        &self,
        composition: &Composition,
        fixed_units: u32,
    ) -> Result<Vec<Surcharge>, PricingError> {
        let mut surcharges = Vec::new();
        for rule in &self.add_ons {
            let amount = match rule.charge {
                AddOnCharge::Mandatory if fixed_units > 0 => rule.fee,
                AddOnCharge::PerUnit if composition.add_ons.contains(&rule.name) => rule
                    .fee
                    .checked_mul(fixed_units)
                    .ok_or(PricingError::Overflow)?,
                AddOnCharge::Flat if composition.add_ons.contains(&rule.name) => rule.fee,
                AddOnCharge::Mandatory | AddOnCharge::PerUnit | AddOnCharge::Flat => continue,
            };
            surcharges.push(Surcharge {
                name: rule.name.clone(),
                charge: rule.charge,
                amount,
            });
        }
        Ok(surcharges)
    }

    fn adjustment(
        &self,
        option: PaymentOption,
        subtotal: Money,
        fixed_units: u32,
        pay_later_uplift: Money,
    ) -> Result<PaymentAdjustment, PricingError> {
        Ok(match option {
            PaymentOption::Standard => PaymentAdjustment::None,
            PaymentOption::PayLater => PaymentAdjustment::PayLaterUplift {
                amount: pay_later_uplift,
            },
            PaymentOption::CashOnCollection => {
                let discount = self
                    .modifiers
                    .cash_discount_per_unit
                    .checked_mul(fixed_units)
                    .ok_or(PricingError::Overflow)?;
                PaymentAdjustment::CashDiscount {
                    amount: discount.min(subtotal.max(Money::ZERO)),
                }
            }
            PaymentOption::PayOnArrival => {
                let basis_points = self.modifiers.arrival_premium_bps;
                let scaled = i128::from(subtotal.0) * i128::from(basis_points);
                // Round half up to the nearest minor unit.
                let premium = (scaled + BASIS_POINTS / 2).div_euclid(BASIS_POINTS);
                let amount = i64::try_from(premium).map_err(|_err| PricingError::Overflow)?;
                PaymentAdjustment::ArrivalPremium {
                    basis_points,
                    amount: Money(amount),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use proptest::prelude::*;

    const BULK: Money = Money::from_major_minor(75, 0);
    const SEAL: Money = Money::from_major_minor(7, 50);

    fn tiers(prices: [(u32, i64); 3]) -> TierTable {
        TierTable(
            prices
                .iter()
                .map(|(min_quantity, pounds)| Tier {
                    min_quantity: *min_quantity,
                    unit_price: Money::from_major_minor(*pounds, 0),
                })
                .collect(),
        )
    }

    fn tariff() -> TariffSchedule {
        TariffSchedule {
            flow: BookingFlow::Web,
            items: vec![
                ItemTariff {
                    item_type: "drum".to_owned(),
                    standard: tiers([(1, 85), (2, 80), (5, 75)]),
                    pay_later: tiers([(1, 95), (2, 90), (5, 85)]),
                },
                ItemTariff {
                    item_type: "box".to_owned(),
                    standard: tiers([(1, 40), (3, 35), (10, 30)]),
                    pay_later: tiers([(1, 45), (3, 40), (10, 35)]),
                },
            ],
        }
    }

    fn add_ons() -> Vec<AddOnRule> {
        vec![
            AddOnRule {
                name: "seal".to_owned(),
                label: "Security seal".to_owned(),
                fee: SEAL,
                charge: AddOnCharge::Mandatory,
            },
            AddOnRule {
                name: "wrapping".to_owned(),
                label: "Protective wrapping".to_owned(),
                fee: Money::from_major_minor(5, 0),
                charge: AddOnCharge::PerUnit,
            },
            AddOnRule {
                name: "door_to_door".to_owned(),
                label: "Door-to-door delivery".to_owned(),
                fee: Money::from_major_minor(25, 0),
                charge: AddOnCharge::Flat,
            },
        ]
    }

    fn modifiers() -> PaymentModifiers {
        PaymentModifiers {
            cash_discount_per_unit: Money::from_major_minor(5, 0),
            arrival_premium_bps: 1_000,
        }
    }

    fn engine() -> PricingEngine {
        PricingEngine::new(&tariff(), &add_ons(), modifiers()).expect("valid tariff")
    }

    fn drums(quantity: u32, add_ons: &[&str]) -> Composition {
        Composition {
            items: vec![LineItem::Fixed {
                item_type: "drum".to_owned(),
                quantity,
            }],
            add_ons: add_ons.iter().map(|name| (*name).to_owned()).collect(),
        }
    }

    #[test]
    fn test_bulk_drums_with_seal() {
        let engine = engine();
        let quote = engine
            .price(&drums(5, &["seal"]), PaymentOption::Standard)
            .expect("priced");

        let bulk_unit = engine
            .unit_price("drum", 5, PaymentOption::Standard)
            .expect("known item");
        assert_eq!(bulk_unit, BULK);
        assert_eq!(quote.items.first().map(|item| item.tier), Some(2));
        let expected = bulk_unit.checked_mul(5).and_then(|base| base.checked_add(SEAL));
        assert_eq!(Some(quote.final_amount), expected);
        assert_eq!(quote.payment_adjustment, PaymentAdjustment::None);
        // Selecting a mandatory add-on never charges it twice.
        assert_eq!(quote.surcharges.len(), 1);
    }

    #[test]
    fn test_unit_price_non_increasing_across_tiers() {
        let engine = engine();
        let prices: Vec<Money> = [1, 3, 7]
            .into_iter()
            .map(|quantity| {
                engine
                    .unit_price("drum", quantity, PaymentOption::Standard)
                    .expect("known item")
            })
            .collect();
        assert!(prices.windows(2).all(|pair| matches!(pair, [lower, upper] if upper <= lower)));
    }

    #[test]
    fn test_add_ons() {
        let engine = engine();
        let quote = engine
            .price(&drums(2, &["wrapping", "door_to_door"]), PaymentOption::Standard)
            .expect("priced");
        // 2 * 80 + seal 7.50 + 2 * 5 wrapping + 25 door-to-door.
        assert_eq!(quote.final_amount, Money::from_major_minor(202, 50));
        let names: Vec<&str> = quote.surcharges.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["seal", "wrapping", "door_to_door"]);
    }

    #[test]
    fn test_payment_options() {
        let engine = engine();
        let composition = drums(3, &[]);
        let standard = engine
            .price(&composition, PaymentOption::Standard)
            .expect("priced");
        // 3 * 80 + 7.50
        assert_eq!(standard.final_amount, Money::from_major_minor(247, 50));

        let later = engine
            .price(&composition, PaymentOption::PayLater)
            .expect("priced");
        assert_eq!(
            later.payment_adjustment,
            PaymentAdjustment::PayLaterUplift {
                amount: Money::from_major_minor(30, 0)
            }
        );
        assert_eq!(later.final_amount, Money::from_major_minor(277, 50));

        let cash = engine
            .price(&composition, PaymentOption::CashOnCollection)
            .expect("priced");
        assert_eq!(cash.final_amount, Money::from_major_minor(232, 50));

        let arrival = engine
            .price(&composition, PaymentOption::PayOnArrival)
            .expect("priced");
        // 10% of 247.50 = 24.75
        assert_eq!(arrival.final_amount, Money::from_major_minor(272, 25));

        for quote in [&standard, &later, &cash, &arrival] {
            assert_eq!(quote.subtotal, standard.subtotal);
            assert_eq!(
                quote.subtotal.checked_add(quote.payment_adjustment.delta()),
                Some(quote.final_amount)
            );
        }
    }

    #[test]
    fn test_premium_rounds_half_up() {
        let engine = PricingEngine::new(
            &tariff(),
            &[],
            PaymentModifiers {
                cash_discount_per_unit: Money::ZERO,
                arrival_premium_bps: 250,
            },
        )
        .expect("valid tariff");
        let quote = engine
            .price(&drums(1, &[]), PaymentOption::PayOnArrival)
            .expect("priced");
        // 2.5% of 85.00 = 2.125 -> 2.13
        assert_eq!(
            quote.payment_adjustment,
            PaymentAdjustment::ArrivalPremium {
                basis_points: 250,
                amount: Money(213)
            }
        );
    }

    #[test]
    fn test_custom_items_are_deferred() {
        let engine = engine();
        let composition = Composition {
            items: vec![
                LineItem::Custom {
                    description: "fridge".to_owned(),
                    quantity: 1,
                },
                LineItem::Fixed {
                    item_type: "drum".to_owned(),
                    quantity: 1,
                },
            ],
            add_ons: BTreeSet::new(),
        };
        let quote = engine
            .price(&composition, PaymentOption::Standard)
            .expect("priced");
        assert!(!quote.is_complete());
        assert_eq!(quote.deferred_items.len(), 1);
        assert_eq!(quote.deferred_items.first().map(|item| item.index), Some(0));
        assert_eq!(quote.final_amount, Money::from_major_minor(92, 50));

        let custom_only = Composition {
            items: vec![LineItem::Custom {
                description: "sofa".to_owned(),
                quantity: 1,
            }],
            add_ons: BTreeSet::new(),
        };
        let quote = engine
            .price(&custom_only, PaymentOption::Standard)
            .expect("priced");
        assert_eq!(quote.final_amount, Money::ZERO);
        assert!(quote.surcharges.is_empty());
    }

    #[test]
    fn test_mixed_item_types_use_their_own_tiers() {
        let engine = engine();
        let composition = Composition {
            items: vec![
                LineItem::Fixed {
                    item_type: "drum".to_owned(),
                    quantity: 1,
                },
                LineItem::Fixed {
                    item_type: "box".to_owned(),
                    quantity: 3,
                },
            ],
            add_ons: BTreeSet::new(),
        };
        let quote = engine
            .price(&composition, PaymentOption::Standard)
            .expect("priced");
        // 1 * 85 + 3 * 35 + 7.50
        assert_eq!(quote.base_amount, Money::from_major_minor(190, 0));
        assert_eq!(quote.final_amount, Money::from_major_minor(197, 50));
    }

    #[test]
    fn test_rejects_bad_input() {
        let engine = engine();
        assert_eq!(
            engine.price(&Composition::default(), PaymentOption::Standard),
            Err(PricingError::EmptyComposition)
        );
        assert_eq!(
            engine.price(&drums(1, &["gift_wrap"]), PaymentOption::Standard),
            Err(PricingError::UnknownAddOn("gift_wrap".to_owned()))
        );
        let crates = Composition {
            items: vec![LineItem::Fixed {
                item_type: "crate".to_owned(),
                quantity: 1,
            }],
            add_ons: BTreeSet::new(),
        };
        assert_eq!(
            engine.price(&crates, PaymentOption::Standard),
            Err(PricingError::UnknownItemType("crate".to_owned()))
        );
    }

    #[test]
    fn test_invalid_tariffs() {
        let mut two_tiers = tariff();
        if let Some(item) = two_tiers.items.first_mut() {
            item.standard.0.pop();
        }
        assert!(matches!(
            PricingEngine::new(&two_tiers, &[], modifiers()),
            Err(ConfigError::InvalidTierTable { .. })
        ));

        let mut cheaper_later = tariff();
        if let Some(item) = cheaper_later.items.first_mut() {
            item.pay_later = tiers([(1, 60), (2, 55), (5, 50)]);
        }
        assert!(matches!(
            PricingEngine::new(&cheaper_later, &[], modifiers()),
            Err(ConfigError::InvalidTierTable { .. })
        ));

        let mut rising = tariff();
        if let Some(item) = rising.items.first_mut() {
            item.standard = tiers([(1, 50), (2, 80), (5, 90)]);
            item.pay_later = tiers([(1, 60), (2, 90), (5, 100)]);
        }
        assert!(matches!(
            PricingEngine::new(&rising, &[], modifiers()),
            Err(ConfigError::InvalidTierTable { reason, .. })
                if reason == "unit prices must not increase with quantity"
        ));

        let mut shifted = tariff();
        if let Some(item) = shifted.items.first_mut() {
            item.pay_later = tiers([(1, 95), (3, 90), (5, 85)]);
        }
        assert!(matches!(
            PricingEngine::new(&shifted, &[], modifiers()),
            Err(ConfigError::InvalidTierTable { .. })
        ));

        let mut duplicate = add_ons();
        duplicate.extend(add_ons());
        assert!(matches!(
            PricingEngine::new(&tariff(), &duplicate, modifiers()),
            Err(ConfigError::DuplicateAddOn(_))
        ));
    }

    fn payment_option() -> impl Strategy<Value = PaymentOption> {
        prop_oneof![
            Just(PaymentOption::Standard),
            Just(PaymentOption::PayLater),
            Just(PaymentOption::CashOnCollection),
            Just(PaymentOption::PayOnArrival),
        ]
    }

    proptest! {
        #[test]
        fn prop_pricing_is_deterministic(
            quantity in 1_u32..50,
            wrapping in any::<bool>(),
            option in payment_option(),
        ) {
            let selected: &[&str] = if wrapping { &["wrapping"] } else { &[] };
            let composition = drums(quantity, selected);
            let engine = engine();
            prop_assert_eq!(
                engine.price(&composition, option),
                engine.price(&composition, option)
            );
        }

        #[test]
        fn prop_only_one_modifier_applies(
            quantity in 1_u32..50,
            first in payment_option(),
            second in payment_option(),
        ) {
            let engine = engine();
            let composition = drums(quantity, &[]);
            // Pricing with another option first leaves no trace on the next quote.
            let _other = engine.price(&composition, first);
            let quote = engine.price(&composition, second).expect("priced");
            let fresh = engine.price(&composition, second).expect("priced");
            prop_assert_eq!(&quote, &fresh);
            prop_assert_eq!(
                quote.subtotal.checked_add(quote.payment_adjustment.delta()),
                Some(quote.final_amount)
            );
        }

        #[test]
        fn prop_unit_price_never_increases_with_quantity(quantity in 1_u32..200) {
            let engine = engine();
            let here = engine.unit_price("drum", quantity, PaymentOption::Standard).expect("known item");
            let next = engine.unit_price("drum", quantity + 1, PaymentOption::Standard).expect("known item");
            prop_assert!(next <= here);
        }
    }
}
