use std::sync::Arc;
use std::time::{Duration, Instant};

use parcelroute_core::{
    Actor, CollectionView, LifecyclePolicy, RouteGroup, RouteName, Shipment, ShipmentService,
    ShipmentStatus, Unassigned,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    Routes,
    Shipments,
    Detail,
}

/// What the shipment list currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Selection {
    Route(RouteName),
    Unassigned,
}

pub(crate) struct App {
    pub service: Arc<ShipmentService>,
    pub operator: Actor,

    pub screen: Screen,
    pub view: CollectionView,
    pub route_index: usize,
    pub selection: Option<Selection>,

    pub shipments: Vec<Shipment>,
    pub shipment_index: usize,
    pub selected: Option<Shipment>,

    pub poll_interval: Duration,
    pub last_refresh: Option<Instant>,
    pub is_loading: bool,
    pub error_message: Option<String>,
    pub info_message: Option<String>,
}

impl App {
    pub(crate) fn new(service: Arc<ShipmentService>, operator: Actor, poll_interval: Duration) -> Self {
        Self {
            service,
            operator,
            screen: Screen::Routes,
            view: CollectionView::default(),
            route_index: 0,
            selection: None,
            shipments: Vec::new(),
            shipment_index: 0,
            selected: None,
            poll_interval,
            last_refresh: None,
            is_loading: false,
            error_message: None,
            info_message: None,
        }
    }

    pub(crate) fn groups(&self) -> impl Iterator<Item = &RouteGroup> {
        self.view.groups.values()
    }

    /// Route rows plus one trailing row for unassigned shipments, if any.
    pub(crate) fn route_row_count(&self) -> usize {
        self.view.groups.len() + usize::from(!self.view.unassigned.is_empty())
    }

    pub(crate) fn needs_refresh(&self) -> bool {
        self.last_refresh
            .is_none_or(|at| at.elapsed() >= self.poll_interval)
    }

    pub(crate) fn select_current_route(&mut self) {
        let selection = match self.groups().nth(self.route_index) {
            Some(group) => Selection::Route(group.route.clone()),
            None if !self.view.unassigned.is_empty() => Selection::Unassigned,
            None => return,
        };
        self.selection = Some(selection);
        self.shipment_index = 0;
        self.sync_shipments();
        self.screen = Screen::Shipments;
    }

    pub(crate) fn select_current_shipment(&mut self) {
        if let Some(shipment) = self.shipments.get(self.shipment_index) {
            self.selected = Some(shipment.clone());
            self.screen = Screen::Detail;
        }
    }

    /// Install a fresh view, keeping the current selection where it still exists.
    pub(crate) fn apply_view(&mut self, view: CollectionView) {
        self.view = view;
        self.last_refresh = Some(Instant::now());
        self.route_index = self
            .route_index
            .min(self.route_row_count().saturating_sub(1));
        self.sync_shipments();
    }

    /// Replace the detail record after an operation changed it.
    pub(crate) fn replace_selected(&mut self, shipment: Shipment) {
        if let Some(listed) = self
            .shipments
            .iter_mut()
            .find(|listed| listed.id == shipment.id)
        {
            *listed = shipment.clone();
        }
        self.selected = Some(shipment);
    }

    fn sync_shipments(&mut self) {
        self.shipments = match &self.selection {
            Some(Selection::Route(route)) => self
                .view
                .groups
                .get(route)
                .map(|group| group.shipments.clone())
                .unwrap_or_default(),
            Some(Selection::Unassigned) => self
                .view
                .unassigned
                .iter()
                .map(|Unassigned { shipment, .. }| shipment.clone())
                .collect(),
            None => Vec::new(),
        };
        self.shipment_index = self
            .shipment_index
            .min(self.shipments.len().saturating_sub(1));
        let selected_id = self.selected.as_ref().map(|selected| selected.id);
        if let Some(id) = selected_id
            && let Some(fresh) = self.shipments.iter().find(|listed| listed.id == id)
        {
            self.selected = Some(fresh.clone());
        }
    }
}

/// Status the console moves a shipment to next, or why it cannot.
///
/// Proof of delivery comes from the driver app, so `Delivered` is not offered while
/// evidence is required and missing.
pub(crate) fn advance_target(
    shipment: &Shipment,
    policy: LifecyclePolicy,
) -> Result<ShipmentStatus, String> {
    let Some(next) = shipment.status.next() else {
        return Err(format!("{} has no next status", shipment.status.label()));
    };
    if next == ShipmentStatus::Delivered
        && policy.require_delivery_evidence
        && shipment.evidence_url.is_none()
    {
        return Err(
            "Waiting for proof of delivery from the driver; press x to cancel instead".to_owned(),
        );
    }
    Ok(next)
}
