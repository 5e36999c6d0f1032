//! Route table and postal-code / city resolution of collection routes.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::{Address, Collection, CollectionAssignment, CountryCode, RouteName};

/// Shortest normalized postal code the resolver will try to match.
pub const MIN_POSTAL_CODE_LEN: usize = 2;

/// Number of leading letters of a postal code compared against route areas.
const DISTRICT_LETTERS: usize = 2;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Hard failures while resolving a route. "Not enough input" is never an error.
pub enum ResolveError {
    /// The country is not configured at all.
    #[error("Unsupported country: {0}")]
    UnknownCountry(CountryCode),
    /// The named route does not exist in the table.
    #[error("Unknown route: {0}")]
    UnknownRoute(RouteName),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A named collection circuit.
pub struct Route {
    /// Unique route name.
    pub name: RouteName,
    /// Serviced postal-prefix areas, e.g. `SW`, `B`, `EX4`.
    pub areas: Vec<String>,
    /// Next scheduled collection day.
    pub collection_date: NaiveDate,
    /// Tie-break order when several routes match; lower wins.
    pub priority: u32,
    /// When the route was first registered.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// When the route was last changed.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Route {
    fn matches_letters(&self, letters: &str) -> bool {
        self.areas
            .iter()
            .any(|area| area.starts_with(letters) || letters.starts_with(area.as_str()))
    }

    fn assignment(&self) -> CollectionAssignment {
        CollectionAssignment {
            route: self.name.clone(),
            areas: self.areas.clone(),
            collection_date: self.collection_date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// How addresses in a country are mapped to routes.
pub enum AddressingScheme {
    /// Match the leading letters of the postal code against route areas.
    PostalPrefix,
    /// Postal codes are unreliable; look the city up by name.
    CityLookup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A country the service operates in.
pub struct CountryConfig {
    /// Country code.
    pub code: CountryCode,
    /// Display name.
    pub name: String,
    /// Resolution strategy for addresses in this country.
    pub addressing: AddressingScheme,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// City-name entry for [`AddressingScheme::CityLookup`] countries.
pub struct CityRoute {
    /// City name, matched case-insensitively.
    pub city: String,
    /// Route serving the city.
    pub route: RouteName,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
/// Routing section of the service configuration.
pub struct RoutingConfig {
    /// Countries and their addressing schemes.
    pub countries: Vec<CountryConfig>,
    /// All routes, in any order; priority decides.
    pub routes: Vec<Route>,
    /// Postal prefixes that cannot be collected automatically.
    #[serde(default)]
    pub restricted_prefixes: Vec<String>,
    /// City lookup table.
    #[serde(default)]
    pub city_routes: Vec<CityRoute>,
}

impl RoutingConfig {
    /// Move a route to a new collection date.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownRoute`] when no route has that name.
    pub fn reschedule(
        &mut self,
        name: &RouteName,
        date: NaiveDate,
        at: DateTime<Utc>,
    ) -> Result<&Route, ResolveError> {
        let route = self
            .routes
            .iter_mut()
            .find(|route| &route.name == name)
            .ok_or_else(|| ResolveError::UnknownRoute(name.clone()))?;
        route.collection_date = date;
        route.updated_at = Some(at);
        Ok(route)
    }
}

/// Routes ordered by explicit priority.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Validate and order routes by `(priority, name)`.
    ///
    /// Areas are normalized to upper-case without whitespace.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for duplicate names or priorities, routes without areas,
    /// or areas that are not alphanumeric.
    pub fn new(routes: Vec<Route>) -> Result<Self, ConfigError> {
        let mut names = HashSet::new();
        let mut priorities: HashMap<u32, RouteName> = HashMap::new();
        let mut normalized = Vec::with_capacity(routes.len());

        for mut route in routes {
            if route.name.0.trim().is_empty() {
                return Err(ConfigError::InvalidRoute {
                    route: route.name,
                    reason: "route name is empty".to_owned(),
                });
            }
            if !names.insert(route.name.clone()) {
                return Err(ConfigError::DuplicateRoute(route.name));
            }
            if let Some(first) = priorities.insert(route.priority, route.name.clone()) {
                return Err(ConfigError::DuplicatePriority {
                    first,
                    second: route.name,
                    priority: route.priority,
                });
            }
            if route.areas.is_empty() {
                return Err(ConfigError::InvalidRoute {
                    route: route.name,
                    reason: "route services no areas".to_owned(),
                });
            }
            let mut areas = Vec::with_capacity(route.areas.len());
            for area in &route.areas {
                let area_key = normalize_postal_code(area);
                if area_key.is_empty() || !area_key.chars().all(|ch| ch.is_ascii_alphanumeric()) {
                    return Err(ConfigError::InvalidRoute {
                        route: route.name,
                        reason: format!("invalid area {area:?}"),
                    });
                }
                areas.push(area_key);
            }
            route.areas = areas;
            normalized.push(route);
        }

        normalized.sort_by(|left, right| {
            left.priority
                .cmp(&right.priority)
                .then_with(|| left.name.cmp(&right.name))
        });
        Ok(Self { routes: normalized })
    }

    /// Routes in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    /// Look a route up by name.
    #[must_use]
    pub fn get(&self, name: &RouteName) -> Option<&Route> {
        self.routes.iter().find(|route| &route.name == name)
    }

    /// Number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Why no route could be chosen yet.
pub enum UnresolvedReason {
    /// Fewer than [`MIN_POSTAL_CODE_LEN`] characters were supplied.
    TooShort,
    /// The code is long enough but no route services it.
    NoMatchingRoute,
    /// The country resolves by city and no city was given.
    MissingCity,
    /// The city is not in the lookup table.
    UnknownCity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Outcome of route resolution.
pub enum Resolution {
    /// A route was chosen.
    Resolved {
        /// The chosen route.
        assignment: CollectionAssignment,
        /// Other matching routes that lost the priority tie-break.
        other_candidates: Vec<RouteName>,
    },
    /// The code is in a restricted area and must be handled manually.
    Restricted {
        /// Deny-list entry that matched.
        prefix: String,
    },
    /// Not enough information to pick a route.
    Unresolved(UnresolvedReason),
}

impl Resolution {
    /// Whether a route was chosen.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }

    /// Whether the code is restricted.
    #[must_use]
    pub fn is_restricted(&self) -> bool {
        matches!(self, Self::Restricted { .. })
    }

    /// The chosen route name, if any.
    #[must_use]
    pub fn route(&self) -> Option<&RouteName> {
        match self {
            Self::Resolved { assignment, .. } => Some(&assignment.route),
            Self::Restricted { .. } | Self::Unresolved(_) => None,
        }
    }

    /// Convert into the state persisted on a shipment.
    #[must_use]
    pub fn into_collection(self, resolved_from: String) -> Collection {
        match self {
            Self::Resolved { assignment, .. } => Collection::Assigned {
                assignment,
                resolved_from,
            },
            Self::Restricted { prefix } => Collection::Restricted {
                prefix,
                resolved_from,
            },
            Self::Unresolved(_) => Collection::Pending { resolved_from },
        }
    }
}

/// Upper-case a postal code and strip all whitespace.
#[must_use]
pub fn normalize_postal_code(raw: &str) -> String {
    raw.chars()
        .filter(|ch| !ch.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Leading one or two letters of a normalized postal code.
#[must_use]
pub fn district_letters(normalized: &str) -> &str {
    let end = normalized
        .char_indices()
        .take(DISTRICT_LETTERS)
        .take_while(|(_idx, ch)| ch.is_ascii_alphabetic())
        .last()
        .map_or(0, |(idx, ch)| idx + ch.len_utf8());
    normalized.get(..end).unwrap_or_default()
}

fn city_key(city: &str) -> String {
    city.trim().to_lowercase()
}

/// Pure, thread-safe resolver built from a validated [`RoutingConfig`].
#[derive(Debug, Clone)]
pub struct RouteResolver {
    countries: HashMap<CountryCode, AddressingScheme>,
    table: RouteTable,
    restricted: Vec<String>,
    cities: HashMap<String, RouteName>,
}

impl RouteResolver {
    /// Build a resolver, validating the routing configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when routes, restricted prefixes, countries or
    /// city mappings are malformed.
    pub fn from_config(config: &RoutingConfig) -> Result<Self, ConfigError> {
        let table = RouteTable::new(config.routes.clone())?;

        let mut countries = HashMap::new();
        for country in &config.countries {
            if countries
                .insert(country.code.clone(), country.addressing)
                .is_some()
            {
                return Err(ConfigError::DuplicateCountry(country.code.clone()));
            }
        }

        let mut restricted = Vec::with_capacity(config.restricted_prefixes.len());
        for prefix in &config.restricted_prefixes {
            let normalized = normalize_postal_code(prefix);
            if normalized.is_empty() || !normalized.chars().all(|ch| ch.is_ascii_alphanumeric()) {
                return Err(ConfigError::InvalidRestrictedPrefix(prefix.clone()));
            }
            restricted.push(normalized);
        }
        // Longest first so the most specific entry is reported.
        restricted.sort_by(|left, right| right.len().cmp(&left.len()).then_with(|| left.cmp(right)));
        restricted.dedup();

        let mut cities = HashMap::new();
        for entry in &config.city_routes {
            if table.get(&entry.route).is_none() {
                return Err(ConfigError::UnknownCityRoute {
                    city: entry.city.clone(),
                    route: entry.route.clone(),
                });
            }
            let key = city_key(&entry.city);
            if key.is_empty() || cities.insert(key, entry.route.clone()).is_some() {
                return Err(ConfigError::DuplicateCity(entry.city.clone()));
            }
        }

        Ok(Self {
            countries,
            table,
            restricted,
            cities,
        })
    }

    /// The ordered route table.
    #[must_use]
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Addressing scheme of a country.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownCountry`] when the country is not configured.
    pub fn scheme(&self, country: &CountryCode) -> Result<AddressingScheme, ResolveError> {
        self.countries
            .get(country)
            .copied()
            .ok_or_else(|| ResolveError::UnknownCountry(country.clone()))
    }

    /// Resolve a postal code (or city, for city-lookup countries) to a route.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownCountry`] when the country is not configured.
    pub fn resolve(
        &self,
        postal_code: &str,
        country: &CountryCode,
        city: Option<&str>,
    ) -> Result<Resolution, ResolveError> {
        match self.scheme(country)? {
            AddressingScheme::PostalPrefix => Ok(self.resolve_postal(postal_code)),
            AddressingScheme::CityLookup => Ok(self.resolve_city(city)),
        }
    }

    /// Resolve an address and return the normalized key it was resolved from.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownCountry`] when the country is not configured.
    pub fn resolve_address(&self, address: &Address) -> Result<(String, Resolution), ResolveError> {
        let key = self.lookup_key(address)?;
        let resolution = self.resolve(&address.postal_code, &address.country, Some(&address.city))?;
        Ok((key, resolution))
    }

    /// Normalized key an address resolves from; compared to detect stale assignments.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownCountry`] when the country is not configured.
    pub fn lookup_key(&self, address: &Address) -> Result<String, ResolveError> {
        Ok(match self.scheme(&address.country)? {
            AddressingScheme::PostalPrefix => normalize_postal_code(&address.postal_code),
            AddressingScheme::CityLookup => format!("city:{}", city_key(&address.city)),
        })
    }

    /// The collection the address resolves to now, if it differs from the stored one.
    ///
    /// Compares the whole collection, so a moved area, a priority change, a new
    /// route or a lifted restriction all count as stale.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownCountry`] when the country is not configured.
    pub fn refreshed_collection(
        &self,
        collection: &Collection,
        address: &Address,
    ) -> Result<Option<Collection>, ResolveError> {
        let (key, resolution) = self.resolve_address(address)?;
        let fresh = resolution.into_collection(key);
        Ok((fresh != *collection).then_some(fresh))
    }

    /// Whether a stored collection no longer reflects the address and route table.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownCountry`] when the country is not configured.
    pub fn is_stale(&self, collection: &Collection, address: &Address) -> Result<bool, ResolveError> {
        Ok(self.refreshed_collection(collection, address)?.is_some())
    }

    fn resolve_postal(&self, postal_code: &str) -> Resolution {
        let normalized = normalize_postal_code(postal_code);
        if normalized.chars().count() < MIN_POSTAL_CODE_LEN {
            return Resolution::Unresolved(UnresolvedReason::TooShort);
        }

        if let Some(prefix) = self
            .restricted
            .iter()
            .find(|prefix| normalized.starts_with(prefix.as_str()))
        {
            return Resolution::Restricted {
                prefix: prefix.clone(),
            };
        }

        let letters = district_letters(&normalized);
        if letters.is_empty() {
            return Resolution::Unresolved(UnresolvedReason::NoMatchingRoute);
        }

        let mut candidates = self.table.iter().filter(|route| route.matches_letters(letters));
        let Some(chosen) = candidates.next() else {
            return Resolution::Unresolved(UnresolvedReason::NoMatchingRoute);
        };
        let other_candidates: Vec<RouteName> =
            candidates.map(|route| route.name.clone()).collect();
        if !other_candidates.is_empty() {
            tracing::debug!(
                postal_code = %normalized,
                chosen = %chosen.name,
                others = ?other_candidates,
                "several routes match; highest priority wins"
            );
        }

        Resolution::Resolved {
            assignment: chosen.assignment(),
            other_candidates,
        }
    }

    fn resolve_city(&self, city: Option<&str>) -> Resolution {
        let Some(key) = city.map(city_key).filter(|key| !key.is_empty()) else {
            return Resolution::Unresolved(UnresolvedReason::MissingCity);
        };
        let Some(route_name) = self.cities.get(&key) else {
            return Resolution::Unresolved(UnresolvedReason::UnknownCity);
        };
        match self.table.get(route_name) {
            Some(route) => Resolution::Resolved {
                assignment: route.assignment(),
                other_candidates: Vec::new(),
            },
            None => Resolution::Unresolved(UnresolvedReason::UnknownCity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).expect("valid date")
    }

    fn route(name: &str, areas: &[&str], priority: u32, day: u32) -> Route {
        Route {
            name: RouteName::new(name),
            areas: areas.iter().map(|area| (*area).to_owned()).collect(),
            collection_date: date(day),
            priority,
            created_at: None,
            updated_at: None,
        }
    }

    fn config() -> RoutingConfig {
        RoutingConfig {
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
                route("Birmingham", &["B", "CV"], 2, 21),
                route("Bristol", &["BS", "BA"], 3, 22),
                route("London", &["EC", "SW", "N"], 1, 20),
                route("South West", &["EX", "TQ"], 4, 23),
            ],
            restricted_prefixes: vec!["EX4".to_owned(), "bt".to_owned()],
            city_routes: vec![CityRoute {
                city: "Accra".to_owned(),
                route: RouteName::new("London"),
            }],
        }
    }

    fn resolver() -> RouteResolver {
        RouteResolver::from_config(&config()).expect("valid routing config")
    }

    fn gb() -> CountryCode {
        CountryCode::new("GB")
    }

    #[test]
    fn test_normalize_postal_code() {
        assert_eq!(normalize_postal_code("  sw1a 1aa "), "SW1A1AA");
        assert_eq!(district_letters("SW1A1AA"), "SW");
        assert_eq!(district_letters("B12"), "B");
        assert_eq!(district_letters("123"), "");
    }

    #[test]
    fn test_short_codes_are_unresolved() {
        let resolver = resolver();
        for code in ["", " ", "B", " e "] {
            assert_eq!(
                resolver.resolve(code, &gb(), None),
                Ok(Resolution::Unresolved(UnresolvedReason::TooShort)),
                "code {code:?}"
            );
        }
    }

    #[test]
    fn test_restricted_prefix_short_circuits() {
        let resolver = resolver();
        let resolution = resolver.resolve("EX4", &gb(), None).expect("known country");
        assert_eq!(
            resolution,
            Resolution::Restricted {
                prefix: "EX4".to_owned()
            }
        );
        assert!(resolution.route().is_none());

        // EX2 is not restricted and falls through to the South West route.
        let resolution = resolver.resolve("ex2 5aa", &gb(), None).expect("known country");
        assert_eq!(resolution.route(), Some(&RouteName::new("South West")));
    }

    #[test]
    fn test_bidirectional_prefix_match() {
        let resolver = resolver();
        // Area "B" is a prefix of the letters "BS": Birmingham matches too, but Bristol
        // also matches exactly; Birmingham has the higher priority.
        let resolution = resolver.resolve("BS1 4DJ", &gb(), None).expect("known country");
        let Resolution::Resolved {
            assignment,
            other_candidates,
        } = resolution
        else {
            panic!("expected a route, got {resolution:?}");
        };
        assert_eq!(assignment.route, RouteName::new("Birmingham"));
        assert_eq!(other_candidates, vec![RouteName::new("Bristol")]);
        assert_eq!(assignment.collection_date, date(21));
        assert_eq!(assignment.areas, vec!["B".to_owned(), "CV".to_owned()]);
    }

    #[test]
    fn test_tie_break_follows_priority_not_declaration_order() {
        let mut reordered = config();
        reordered.routes.reverse();
        let resolver = RouteResolver::from_config(&reordered).expect("valid routing config");
        let resolution = resolver.resolve("BS1", &gb(), None).expect("known country");
        assert_eq!(resolution.route(), Some(&RouteName::new("Birmingham")));

        let mut promoted = config();
        for route in &mut promoted.routes {
            if route.name.0 == "Bristol" {
                route.priority = 0;
            }
        }
        let resolver = RouteResolver::from_config(&promoted).expect("valid routing config");
        let resolution = resolver.resolve("BS1", &gb(), None).expect("known country");
        assert_eq!(resolution.route(), Some(&RouteName::new("Bristol")));
    }

    #[test]
    fn test_unmatched_and_numeric_codes() {
        let resolver = resolver();
        assert_eq!(
            resolver.resolve("ZZ9 9ZZ", &gb(), None),
            Ok(Resolution::Unresolved(UnresolvedReason::NoMatchingRoute))
        );
        assert_eq!(
            resolver.resolve("12345", &gb(), None),
            Ok(Resolution::Unresolved(UnresolvedReason::NoMatchingRoute))
        );
    }

    #[test]
    fn test_city_lookup_country() {
        let resolver = resolver();
        let ghana = CountryCode::new("gh");
        assert_eq!(
            resolver
                .resolve("", &ghana, Some("  ACCRA "))
                .expect("known country")
                .route(),
            Some(&RouteName::new("London"))
        );
        assert_eq!(
            resolver.resolve("SW1", &ghana, None),
            Ok(Resolution::Unresolved(UnresolvedReason::MissingCity))
        );
        assert_eq!(
            resolver.resolve("SW1", &ghana, Some("Kumasi")),
            Ok(Resolution::Unresolved(UnresolvedReason::UnknownCity))
        );
    }

    #[test]
    fn test_unknown_country_is_an_error() {
        let resolver = resolver();
        assert_eq!(
            resolver.resolve("SW1", &CountryCode::new("FR"), None),
            Err(ResolveError::UnknownCountry(CountryCode::new("FR")))
        );
    }

    #[test]
    fn test_invalid_tables_are_rejected() {
        let mut duplicate_priority = config();
        if let Some(first) = duplicate_priority.routes.first_mut() {
            first.priority = 3;
        }
        assert!(matches!(
            RouteResolver::from_config(&duplicate_priority),
            Err(ConfigError::DuplicatePriority { priority: 3, .. })
        ));

        let mut empty_areas = config();
        if let Some(first) = empty_areas.routes.first_mut() {
            first.areas.clear();
        }
        assert!(matches!(
            RouteResolver::from_config(&empty_areas),
            Err(ConfigError::InvalidRoute { .. })
        ));

        let mut dangling_city = config();
        dangling_city.city_routes.push(CityRoute {
            city: "Tema".to_owned(),
            route: RouteName::new("Nowhere"),
        });
        assert!(matches!(
            RouteResolver::from_config(&dangling_city),
            Err(ConfigError::UnknownCityRoute { .. })
        ));
    }

    #[test]
    fn test_staleness_detection() {
        let resolver = resolver();
        let mut address = Address {
            line1: "1 High Street".to_owned(),
            city: "London".to_owned(),
            postal_code: "SW1A 1AA".to_owned(),
            country: gb(),
        };
        let (key, resolution) = resolver.resolve_address(&address).expect("known country");
        let collection = resolution.into_collection(key);
        assert_eq!(resolver.is_stale(&collection, &address), Ok(false));

        address.postal_code = "B12 0AA".to_owned();
        assert_eq!(resolver.is_stale(&collection, &address), Ok(true));
    }

    #[test]
    fn test_route_table_changes_make_collections_stale() {
        let address = Address {
            line1: "1 High Street".to_owned(),
            city: "London".to_owned(),
            postal_code: "SW1A 1AA".to_owned(),
            country: gb(),
        };
        let (key, resolution) = resolver().resolve_address(&address).expect("known country");
        let london = resolution.into_collection(key);

        // SW moves to its own route with the same collection date.
        let mut moved = config();
        for route in &mut moved.routes {
            route.areas.retain(|area| area != "SW");
        }
        moved.routes.push(route("South London", &["SW"], 5, 20));
        let moved = RouteResolver::from_config(&moved).expect("valid routing config");
        let fresh = moved
            .refreshed_collection(&london, &address)
            .expect("known country")
            .expect("moved area is stale");
        assert_eq!(
            fresh.assignment().map(|assignment| assignment.route.clone()),
            Some(RouteName::new("South London"))
        );

        // A code nothing served gets picked up once a route covers it.
        let northern = Address {
            postal_code: "YO1 7HH".to_owned(),
            ..address
        };
        let (key, resolution) = resolver().resolve_address(&northern).expect("known country");
        let pending = resolution.into_collection(key);
        assert!(matches!(pending, Collection::Pending { .. }));
        assert_eq!(resolver().is_stale(&pending, &northern), Ok(false));

        let mut extended = config();
        extended.routes.push(route("York", &["YO"], 6, 24));
        let extended = RouteResolver::from_config(&extended).expect("valid routing config");
        assert_eq!(extended.is_stale(&pending, &northern), Ok(true));
    }

    #[test]
    fn test_reschedule_updates_route() {
        let mut routing = config();
        let at = Utc::now();
        let route = routing
            .reschedule(&RouteName::new("London"), date(27), at)
            .expect("route exists");
        assert_eq!(route.collection_date, date(27));
        assert_eq!(route.updated_at, Some(at));
        assert_eq!(
            routing
                .reschedule(&RouteName::new("Nowhere"), date(27), at)
                .map(|route| route.name.clone()),
            Err(ResolveError::UnknownRoute(RouteName::new("Nowhere")))
        );
    }

    proptest! {
        #[test]
        fn prop_short_codes_never_resolve(code in "[A-Za-z0-9 ]{0,1}") {
            let resolution = resolver().resolve(&code, &gb(), None).expect("known country");
            prop_assert_eq!(resolution, Resolution::Unresolved(UnresolvedReason::TooShort));
        }

        #[test]
        fn prop_restricted_wins_over_routes(suffix in "[0-9][A-Z]{2}") {
            let code = format!("EX4 {suffix}");
            let resolution = resolver().resolve(&code, &gb(), None).expect("known country");
            prop_assert!(resolution.is_restricted());
            prop_assert!(resolution.route().is_none());
        }

        #[test]
        fn prop_resolution_is_deterministic(code in "[A-Z]{1,2}[0-9]{1,2} ?[0-9][A-Z]{2}") {
            let resolver = resolver();
            prop_assert_eq!(
                resolver.resolve(&code, &gb(), None),
                resolver.resolve(&code, &gb(), None)
            );
        }
    }
}
