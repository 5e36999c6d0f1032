//! Collection-day read model: active shipments grouped by route.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::booking::DRUM_ITEM;
use crate::model::{CollectionAssignment, CountryCode, CustomerId, RouteName, Shipment};
use crate::routing::{Resolution, RouteResolver, UnresolvedReason};

#[derive(Debug, Clone, PartialEq)]
/// Shipments collected by one route.
pub struct RouteGroup {
    /// Route name.
    pub route: RouteName,
    /// Day the route collects.
    pub collection_date: NaiveDate,
    /// Areas the route services.
    pub areas: Vec<String>,
    /// Shipments in booking order.
    pub shipments: Vec<Shipment>,
    /// Drums to collect.
    pub drum_count: u32,
    /// All fixed-tariff units to collect.
    pub unit_count: u32,
    /// Distinct customers on the route.
    pub unique_customer_count: usize,
}

impl RouteGroup {
    fn new(assignment: &CollectionAssignment) -> Self {
        Self {
            route: assignment.route.clone(),
            collection_date: assignment.collection_date,
            areas: assignment.areas.clone(),
            shipments: Vec::new(),
            drum_count: 0,
            unit_count: 0,
            unique_customer_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Why an active shipment is on no route.
pub enum UnassignedReason {
    /// The sender is in a restricted area.
    Restricted {
        /// Deny-list entry that matched.
        prefix: String,
    },
    /// Not enough information to resolve.
    Unresolved(UnresolvedReason),
    /// The sender country is not configured.
    UnknownCountry(CountryCode),
}

#[derive(Debug, Clone, PartialEq)]
/// Active shipment that needs manual scheduling.
pub struct Unassigned {
    /// The shipment.
    pub shipment: Shipment,
    /// Why it has no route.
    pub reason: UnassignedReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Result of grouping active shipments.
pub struct CollectionView {
    /// Groups keyed by route name.
    pub groups: BTreeMap<RouteName, RouteGroup>,
    /// Shipments on no route.
    pub unassigned: Vec<Unassigned>,
    /// How many stored assignments were stale and re-resolved.
    pub re_resolved: usize,
}

impl CollectionView {
    /// Groups collecting on a date, in route-name order.
    pub fn collection_day(&self, date: NaiveDate) -> impl Iterator<Item = &RouteGroup> {
        self.groups
            .values()
            .filter(move |group| group.collection_date == date)
    }

    /// Distinct collection dates, ascending.
    #[must_use]
    pub fn collection_dates(&self) -> BTreeSet<NaiveDate> {
        self.groups
            .values()
            .map(|group| group.collection_date)
            .collect()
    }

    /// Drums across all groups.
    #[must_use]
    pub fn drum_count(&self) -> u32 {
        self.groups
            .values()
            .map(|group| group.drum_count)
            .fold(0, u32::saturating_add)
    }
}

/// Groups shipments by route, re-resolving stale assignments on the fly.
#[derive(Debug, Clone, Copy)]
pub struct SchedulingAggregator<'resolver> {
    resolver: &'resolver RouteResolver,
}

impl<'resolver> SchedulingAggregator<'resolver> {
    /// Create an aggregator backed by a resolver.
    #[must_use]
    pub fn new(resolver: &'resolver RouteResolver) -> Self {
        Self { resolver }
    }

    /// Group active shipments by route. Terminal shipments are skipped.
    pub fn group_by_route<I>(&self, shipments: I) -> CollectionView
    where
        I: IntoIterator<Item = Shipment>,
    {
        let mut view = CollectionView::default();
        let mut customers: BTreeMap<RouteName, BTreeSet<CustomerId>> = BTreeMap::new();

        for shipment in shipments {
            if shipment.is_terminal() {
                continue;
            }
            let assignment = match self.current_assignment(&shipment) {
                Ok((assignment, re_resolved)) => {
                    if re_resolved {
                        view.re_resolved += 1;
                    }
                    assignment
                }
                Err(reason) => {
                    view.unassigned.push(Unassigned { shipment, reason });
                    continue;
                }
            };

            let group = view
                .groups
                .entry(assignment.route.clone())
                .or_insert_with(|| RouteGroup::new(&assignment));
            group.drum_count = group
                .drum_count
                .saturating_add(shipment.composition.units_of(DRUM_ITEM));
            group.unit_count = group
                .unit_count
                .saturating_add(shipment.composition.fixed_units());
            customers
                .entry(assignment.route.clone())
                .or_default()
                .insert(shipment.owner.clone());
            group.shipments.push(shipment);
        }

        for (route, owners) in customers {
            if let Some(group) = view.groups.get_mut(&route) {
                group.unique_customer_count = owners.len();
            }
        }
        view
    }

    fn current_assignment(
        &self,
        shipment: &Shipment,
    ) -> Result<(CollectionAssignment, bool), UnassignedReason> {
        let address = &shipment.sender.address;
        let (key, resolution) = self
            .resolver
            .resolve_address(address)
            .map_err(|_err| UnassignedReason::UnknownCountry(address.country.clone()))?;
        let stale = resolution.clone().into_collection(key) != shipment.collection;
        if stale {
            tracing::debug!(
                shipment = %shipment.tracking_number,
                resolution = ?resolution.route(),
                "re-resolved stale collection"
            );
        }
        match resolution {
            Resolution::Resolved { assignment, .. } => Ok((assignment, stale)),
            Resolution::Restricted { prefix } => Err(UnassignedReason::Restricted { prefix }),
            Resolution::Unresolved(reason) => Err(UnassignedReason::Unresolved(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::lifecycle::ShipmentStatus;
    use crate::model::{
        Address, Collection, Composition, Contact, LineItem, Money, Party, PaymentOption,
        ShipmentId, TrackingNumber,
    };
    use crate::routing::{AddressingScheme, CountryConfig, Route, RoutingConfig};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).expect("valid date")
    }

    fn resolver() -> RouteResolver {
        let route = |name: &str, areas: &[&str], priority: u32, day: u32| Route {
            name: RouteName::new(name),
            areas: areas.iter().map(|area| (*area).to_owned()).collect(),
            collection_date: date(day),
            priority,
            created_at: None,
            updated_at: None,
        };
        RouteResolver::from_config(&RoutingConfig {
            countries: vec![CountryConfig {
                code: CountryCode::new("GB"),
                name: "United Kingdom".to_owned(),
                addressing: AddressingScheme::PostalPrefix,
            }],
            routes: vec![
                route("London", &["SW", "EC"], 1, 20),
                route("Birmingham", &["B"], 2, 21),
                route("Leeds", &["LS"], 3, 20),
            ],
            restricted_prefixes: vec!["EX4".to_owned()],
            city_routes: Vec::new(),
        })
        .expect("valid routing config")
    }

    fn shipment(owner: &str, postal_code: &str, drums: u32) -> Shipment {
        let id = ShipmentId::new();
        let party = Party {
            contact: Contact {
                name: owner.to_owned(),
                phone: "0".to_owned(),
                email: None,
            },
            address: Address {
                line1: "1 Road".to_owned(),
                city: "Somewhere".to_owned(),
                postal_code: postal_code.to_owned(),
                country: CountryCode::new("GB"),
            },
        };
        let (key, resolution) = resolver()
            .resolve_address(&party.address)
            .expect("known country");
        let now = Utc::now();
        Shipment {
            id,
            tracking_number: TrackingNumber::from_id(&id),
            owner: CustomerId(owner.to_owned()),
            sender: party.clone(),
            recipient: party,
            flow: crate::booking::BookingFlow::Web,
            composition: Composition {
                items: vec![LineItem::Fixed {
                    item_type: DRUM_ITEM.to_owned(),
                    quantity: drums,
                }],
                add_ons: BTreeSet::new(),
            },
            payment_option: PaymentOption::Standard,
            total_amount: Money::ZERO,
            currency: "GBP".to_owned(),
            manual_quotes: Vec::new(),
            collection: resolution.into_collection(key),
            status: ShipmentStatus::ReadyForPickup,
            can_modify: false,
            can_cancel: false,
            evidence_url: None,
            history: Vec::new(),
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    #[test]
    fn test_groups_and_rollups() {
        let resolver = resolver();
        let shipments = vec![
            shipment("ama", "SW1A 1AA", 2),
            shipment("ama", "EC1 2BB", 1),
            shipment("kwame", "SW9 8CC", 4),
            shipment("efua", "B12 0AA", 3),
        ];
        let view = SchedulingAggregator::new(&resolver).group_by_route(shipments);

        let london = view.groups.get(&RouteName::new("London")).expect("london group");
        assert_eq!(london.shipments.len(), 3);
        assert_eq!(london.drum_count, 7);
        assert_eq!(london.unique_customer_count, 2);

        let birmingham = view
            .groups
            .get(&RouteName::new("Birmingham"))
            .expect("birmingham group");
        assert_eq!(birmingham.drum_count, 3);
        assert_eq!(birmingham.unique_customer_count, 1);
        assert_eq!(view.drum_count(), 10);
        assert_eq!(view.re_resolved, 0);
    }

    #[test]
    fn test_terminal_shipments_are_skipped() {
        let resolver = resolver();
        let mut delivered = shipment("ama", "SW1A 1AA", 2);
        delivered.status = ShipmentStatus::Delivered;
        let view = SchedulingAggregator::new(&resolver).group_by_route(vec![delivered]);
        assert!(view.groups.is_empty());
        assert!(view.unassigned.is_empty());
    }

    #[test]
    fn test_stale_assignment_is_re_resolved() {
        let resolver = resolver();
        let mut moved = shipment("ama", "SW1A 1AA", 2);
        // Postal code changed without the collection being recomputed.
        moved.sender.address.postal_code = "LS1 4AP".to_owned();
        let view = SchedulingAggregator::new(&resolver).group_by_route(vec![moved]);
        assert!(!view.groups.contains_key(&RouteName::new("London")));
        assert!(view.groups.contains_key(&RouteName::new("Leeds")));
        assert_eq!(view.re_resolved, 1);
    }

    #[test]
    fn test_area_moved_to_another_route_is_re_resolved() {
        let stored = shipment("ama", "SW1A 1AA", 2);
        let moved = RouteResolver::from_config(&RoutingConfig {
            countries: vec![CountryConfig {
                code: CountryCode::new("GB"),
                name: "United Kingdom".to_owned(),
                addressing: AddressingScheme::PostalPrefix,
            }],
            routes: vec![
                Route {
                    name: RouteName::new("London"),
                    areas: vec!["EC".to_owned()],
                    collection_date: date(20),
                    priority: 1,
                    created_at: None,
                    updated_at: None,
                },
                Route {
                    name: RouteName::new("South London"),
                    areas: vec!["SW".to_owned()],
                    collection_date: date(20),
                    priority: 2,
                    created_at: None,
                    updated_at: None,
                },
            ],
            restricted_prefixes: Vec::new(),
            city_routes: Vec::new(),
        })
        .expect("valid routing config");

        let view = SchedulingAggregator::new(&moved).group_by_route(vec![stored]);
        assert!(!view.groups.contains_key(&RouteName::new("London")));
        assert!(view.groups.contains_key(&RouteName::new("South London")));
        assert_eq!(view.re_resolved, 1);
    }

    #[test]
    fn test_restricted_and_unresolved_are_unassigned() {
        let resolver = resolver();
        let shipments = vec![
            shipment("ama", "EX4 1AA", 1),
            shipment("kwame", "Z", 1),
        ];
        let view = SchedulingAggregator::new(&resolver).group_by_route(shipments);
        assert!(view.groups.is_empty());
        let reasons: Vec<&UnassignedReason> =
            view.unassigned.iter().map(|entry| &entry.reason).collect();
        assert_eq!(
            reasons,
            vec![
                &UnassignedReason::Restricted {
                    prefix: "EX4".to_owned()
                },
                &UnassignedReason::Unresolved(UnresolvedReason::TooShort),
            ]
        );
    }

    #[test]
    fn test_collection_day_filter() {
        let resolver = resolver();
        let shipments = vec![
            shipment("ama", "SW1A 1AA", 1),
            shipment("kwame", "LS1 4AP", 1),
            shipment("efua", "B12 0AA", 1),
        ];
        let view = SchedulingAggregator::new(&resolver).group_by_route(shipments);
        let routes: Vec<&str> = view
            .collection_day(date(20))
            .map(|group| group.route.0.as_str())
            .collect();
        assert_eq!(routes, vec!["Leeds", "London"]);
        assert_eq!(
            view.collection_dates().into_iter().collect::<Vec<_>>(),
            vec![date(20), date(21)]
        );
    }

    #[test]
    fn test_pending_collection_is_retried() {
        let resolver = resolver();
        let mut pending = shipment("ama", "SW1A 1AA", 1);
        pending.collection = Collection::Pending {
            resolved_from: "SW1A1AA".to_owned(),
        };
        let view = SchedulingAggregator::new(&resolver).group_by_route(vec![pending]);
        assert!(view.groups.contains_key(&RouteName::new("London")));
        assert_eq!(view.re_resolved, 1);
    }
}
