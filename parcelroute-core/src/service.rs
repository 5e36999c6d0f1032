//! High-level service facade combining configuration, record stores and notifications.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::booking::{BookingFlow, BookingForm, BookingRequest};
use crate::config::{CompiledConfig, ServiceConfig};
use crate::error::{ConfigError, ShipmentError};
use crate::lifecycle::{Actor, DriverStage, ShipmentStatus};
use crate::model::{
    Address, AuditNote, Collection, LineItem, ManualQuote, Money, Party, PaymentOption, RouteName,
    Shipment, ShipmentId, TrackingNumber,
};
use crate::ports::{
    EvidenceStore, Notification, NotificationKind, NotificationPort, RouteStore, ShipmentFilter,
    ShipmentPatch, ShipmentStore, StoreError,
};
use crate::pricing::{PricingError, Quote};
use crate::routing::{Resolution, ResolveError, Route};
use crate::scheduling::{CollectionView, RouteGroup, SchedulingAggregator};

/// External collaborators the service talks to.
pub struct Collaborators {
    /// Shipment records.
    pub shipments: Arc<dyn ShipmentStore>,
    /// Route records.
    pub routes: Arc<dyn RouteStore>,
    /// Outbound notifications.
    pub notifier: Arc<dyn NotificationPort>,
    /// Proof-of-delivery uploads.
    pub evidence: Arc<dyn EvidenceStore>,
}

/// Public entry point for booking, tracking and moving shipments.
pub struct ShipmentService {
    config: RwLock<Arc<CompiledConfig>>,
    shipments: Arc<dyn ShipmentStore>,
    routes: Arc<dyn RouteStore>,
    notifier: Arc<dyn NotificationPort>,
    evidence: Arc<dyn EvidenceStore>,
}

impl ShipmentService {
    /// Create a service from a compiled configuration and its collaborators.
    #[must_use]
    pub fn new(config: CompiledConfig, collaborators: Collaborators) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
            shipments: collaborators.shipments,
            routes: collaborators.routes,
            notifier: collaborators.notifier,
            evidence: collaborators.evidence,
        }
    }

    /// Snapshot of the configuration in use.
    #[must_use]
    pub fn config(&self) -> Arc<CompiledConfig> {
        Arc::clone(&self.config.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn install(&self, compiled: CompiledConfig) -> Result<Arc<CompiledConfig>, ConfigError> {
        let mut current = self.config.write().unwrap_or_else(PoisonError::into_inner);
        if compiled.version() <= current.version() {
            return Err(ConfigError::StaleVersion {
                current: current.version(),
                proposed: compiled.version(),
            });
        }
        let compiled = Arc::new(compiled);
        *current = Arc::clone(&compiled);
        Ok(compiled)
    }

    /// Replace the configuration, publish its routes and refresh stale assignments.
    ///
    /// A rejected configuration leaves the running one untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::Config`] when the configuration is invalid or its
    /// version does not exceed the running one, or a store error.
    pub async fn reload(&self, config: ServiceConfig) -> Result<u64, ShipmentError> {
        let installed = self.install(config.compile()?)?;
        info!(version = installed.version(), "configuration reloaded");
        self.publish_routes().await?;
        self.refresh_assignments().await?;
        Ok(installed.version())
    }

    /// Write every configured route to the route store.
    ///
    /// # Errors
    ///
    /// Returns a store error when an upsert fails.
    pub async fn publish_routes(&self) -> Result<usize, ShipmentError> {
        let config = self.config();
        let mut published = 0_usize;
        for route in config.resolver.table().iter() {
            self.routes.upsert(route.clone()).await?;
            published += 1;
        }
        debug!(routes = published, "routes published");
        Ok(published)
    }

    /// Resolve an address against the current route table.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownCountry`] for unconfigured countries.
    pub fn resolve(&self, address: &Address) -> Result<Resolution, ResolveError> {
        let config = self.config();
        config.resolver.resolve_address(address).map(|(_key, resolution)| resolution)
    }

    /// Price a form without booking it.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::Pricing`] or [`ShipmentError::Config`].
    pub fn quote(
        &self,
        flow: BookingFlow,
        form: &BookingForm,
        payment_option: PaymentOption,
    ) -> Result<Quote, ShipmentError> {
        let config = self.config();
        let quote = config
            .engine(flow)?
            .price(&form.normalize(), payment_option)?;
        Ok(quote)
    }

    /// Accept a booking: price it, resolve its collection and store it.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::Pricing`] for unpriceable forms,
    /// [`ShipmentError::Resolve`] for unknown sender countries, or a store error.
    pub async fn book(&self, request: BookingRequest) -> Result<Shipment, ShipmentError> {
        let config = self.config();
        let composition = request.form.normalize();
        let quote = config
            .engine(request.flow)?
            .price(&composition, request.payment_option)?;
        let (resolved_from, resolution) =
            config.resolver.resolve_address(&request.sender.address)?;

        let now = Utc::now();
        let id = ShipmentId::new();
        let shipment = Shipment {
            id,
            tracking_number: TrackingNumber::from_id(&id),
            owner: request.owner,
            sender: request.sender,
            recipient: request.recipient,
            flow: request.flow,
            composition,
            payment_option: request.payment_option,
            total_amount: quote.final_amount,
            currency: config.config.currency.clone(),
            manual_quotes: Vec::new(),
            collection: resolution.into_collection(resolved_from),
            status: ShipmentStatus::BookingConfirmed,
            can_modify: true,
            can_cancel: true,
            evidence_url: None,
            history: Vec::new(),
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
            revision: 0,
        };
        self.shipments.insert(shipment.clone()).await?;

        info!(
            tracking = %shipment.tracking_number,
            owner = %shipment.owner,
            total = %shipment.total_amount,
            flow = %shipment.flow,
            "booking confirmed"
        );
        if let Some(prefix) = restricted_prefix(&shipment) {
            warn!(
                tracking = %shipment.tracking_number,
                prefix,
                "collection address is restricted; manual contact required"
            );
        }
        if !quote.deferred_items.is_empty() {
            info!(
                tracking = %shipment.tracking_number,
                items = quote.deferred_items.len(),
                "custom items awaiting operator quote"
            );
        }
        self.notify(Notification {
            title: format!("Booking {} received", shipment.tracking_number),
            message: format!(
                "We have received your booking. Amount due: {} {}.",
                shipment.total_amount, shipment.currency
            ),
            kind: NotificationKind::BookingReceived,
            related_id: shipment.id,
            user_id: shipment.owner.clone(),
        });
        Ok(shipment)
    }

    /// Fetch a shipment by id.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::NotFound`] or a store error.
    pub async fn shipment(&self, id: &ShipmentId) -> Result<Shipment, ShipmentError> {
        Ok(self.shipments.get(id).await?)
    }

    /// Fetch a shipment by tracking number.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::NotFound`] or a store error.
    pub async fn track(&self, tracking: &TrackingNumber) -> Result<Shipment, ShipmentError> {
        Ok(self.shipments.find_by_tracking(tracking).await?)
    }

    /// List shipments matching a filter.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn shipments(&self, filter: &ShipmentFilter) -> Result<Vec<Shipment>, ShipmentError> {
        Ok(self.shipments.query(filter).await?)
    }

    /// Replace the sender and re-resolve the collection.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::NotModifiable`] when the actor may not edit the
    /// booking, [`ShipmentError::Resolve`], [`ShipmentError::Conflict`], or a store error.
    pub async fn change_sender(
        &self,
        id: &ShipmentId,
        actor: &Actor,
        sender: Party,
    ) -> Result<Shipment, ShipmentError> {
        let current = self.shipments.get(id).await?;
        ensure_editable(&current, actor)?;

        let config = self.config();
        let (resolved_from, resolution) = config.resolver.resolve_address(&sender.address)?;
        let collection = resolution.into_collection(resolved_from);
        let moved = collection.assignment() != current.collection.assignment();

        let patch = ShipmentPatch::new(Utc::now())
            .expect_status(current.status)
            .expect_revision(current.revision)
            .sender(sender, collection);
        let updated = self.shipments.update(id, patch).await?;
        info!(
            tracking = %updated.tracking_number,
            actor = %actor.label(),
            postal_code = %updated.sender.address.postal_code,
            "sender changed"
        );
        if moved {
            self.notify(collection_notification(&updated));
        }
        Ok(updated)
    }

    /// Replace the booked items and payment option, and reprice.
    ///
    /// Operator quotes are discarded because item positions may have changed.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::NotModifiable`], [`ShipmentError::Pricing`],
    /// [`ShipmentError::Conflict`], or a store error.
    pub async fn change_booking(
        &self,
        id: &ShipmentId,
        actor: &Actor,
        form: &BookingForm,
        payment_option: PaymentOption,
    ) -> Result<Shipment, ShipmentError> {
        let current = self.shipments.get(id).await?;
        ensure_editable(&current, actor)?;

        let config = self.config();
        let composition = form.normalize();
        let quote = config
            .engine(current.flow)?
            .price(&composition, payment_option)?;

        let patch = ShipmentPatch::new(Utc::now())
            .expect_status(current.status)
            .expect_revision(current.revision)
            .pricing(composition, payment_option, quote.final_amount)
            .manual_quotes(Vec::new(), quote.final_amount);
        let updated = self.shipments.update(id, patch).await?;
        info!(
            tracking = %updated.tracking_number,
            actor = %actor.label(),
            total = %updated.total_amount,
            "booking changed"
        );
        if updated.total_amount != current.total_amount {
            self.notify(quote_notification(&updated));
        }
        Ok(updated)
    }

    /// Record an operator quote for a custom item and add it to the total.
    ///
    /// Quoting the same item again replaces the earlier quote.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::Unauthorized`] for non-operators,
    /// [`ShipmentError::InvalidQuote`] when the index is not a custom item or the
    /// amount is negative, [`ShipmentError::NotModifiable`] for terminal shipments,
    /// [`ShipmentError::Conflict`], or a store error.
    pub async fn quote_custom_item(
        &self,
        id: &ShipmentId,
        actor: &Actor,
        item_index: usize,
        amount: Money,
    ) -> Result<Shipment, ShipmentError> {
        let Actor::Operator { name } = actor else {
            return Err(ShipmentError::Unauthorized {
                actor: actor.label(),
                action: "quote custom items",
            });
        };
        let current = self.shipments.get(id).await?;
        if current.is_terminal() {
            return Err(ShipmentError::NotModifiable {
                id: current.id,
                status: current.status,
            });
        }
        if !matches!(
            current.composition.items.get(item_index),
            Some(LineItem::Custom { .. })
        ) {
            return Err(ShipmentError::InvalidQuote(format!(
                "item {item_index} is not a custom item"
            )));
        }
        if amount.is_negative() {
            return Err(ShipmentError::InvalidQuote(format!(
                "amount {amount} is negative"
            )));
        }

        let priced = sum_quotes(&current.manual_quotes)
            .and_then(|quoted| current.total_amount.checked_sub(quoted))
            .ok_or(PricingError::Overflow)?;
        let mut quotes: Vec<ManualQuote> = current
            .manual_quotes
            .iter()
            .filter(|quote| quote.item_index != item_index)
            .cloned()
            .collect();
        let now = Utc::now();
        quotes.push(ManualQuote {
            item_index,
            amount,
            quoted_by: name.clone(),
            quoted_at: now,
        });
        quotes.sort_by_key(|quote| quote.item_index);
        let total = sum_quotes(&quotes)
            .and_then(|quoted| priced.checked_add(quoted))
            .ok_or(PricingError::Overflow)?;

        let patch = ShipmentPatch::new(now)
            .expect_status(current.status)
            .expect_revision(current.revision)
            .manual_quotes(quotes, total);
        let updated = self.shipments.update(id, patch).await?;
        info!(
            tracking = %updated.tracking_number,
            item = item_index,
            amount = %amount,
            total = %updated.total_amount,
            "custom item quoted"
        );
        self.notify(quote_notification(&updated));
        Ok(updated)
    }

    /// Upload proof-of-delivery and attach its URL to a shipment out for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::Unauthorized`] unless the actor is an operator or a
    /// delivery driver, [`ShipmentError::NotModifiable`] unless the shipment is out
    /// for delivery, [`ShipmentError::Evidence`], [`ShipmentError::Conflict`], or a
    /// store error.
    pub async fn attach_delivery_evidence(
        &self,
        id: &ShipmentId,
        actor: &Actor,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<Shipment, ShipmentError> {
        let permitted = matches!(
            actor,
            Actor::Operator { .. }
                | Actor::Driver {
                    stage: DriverStage::Delivery,
                    ..
                }
        );
        if !permitted {
            return Err(ShipmentError::Unauthorized {
                actor: actor.label(),
                action: "attach delivery evidence",
            });
        }
        let current = self.shipments.get(id).await?;
        if current.status != ShipmentStatus::OutForDelivery {
            return Err(ShipmentError::NotModifiable {
                id: current.id,
                status: current.status,
            });
        }

        let url = self
            .evidence
            .upload_and_get_url(id, bytes, content_type)
            .await?;
        let patch = ShipmentPatch::new(Utc::now())
            .expect_status(ShipmentStatus::OutForDelivery)
            .evidence_url(url);
        let updated = self.shipments.update(id, patch).await?;
        info!(
            tracking = %updated.tracking_number,
            actor = %actor.label(),
            "delivery evidence attached"
        );
        Ok(updated)
    }

    /// Move a shipment to a new status.
    ///
    /// The change is persisted with a compare-and-swap on the status it was
    /// planned from, so a concurrent change surfaces as a conflict.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::InvalidTransition`], [`ShipmentError::Forbidden`],
    /// [`ShipmentError::MissingEvidence`], [`ShipmentError::Conflict`], or a store error.
    pub async fn transition(
        &self,
        id: &ShipmentId,
        actor: &Actor,
        to: ShipmentStatus,
        reason: Option<String>,
    ) -> Result<Shipment, ShipmentError> {
        let current = self.shipments.get(id).await?;
        let config = self.config();
        let planned = match config
            .machine
            .plan(&current, actor, to, reason, Utc::now())
        {
            Ok(planned) => planned,
            Err(err) => {
                warn!(
                    tracking = %current.tracking_number,
                    actor = %actor.label(),
                    error = %err,
                    "transition rejected"
                );
                return Err(err);
            }
        };

        let updated = match self.shipments.update(id, planned.patch()).await {
            Ok(updated) => updated,
            Err(StoreError::Conflict(conflicted)) => {
                debug!(shipment = %conflicted, to = %to, "transition lost a race");
                return Err(ShipmentError::Conflict(conflicted));
            }
            Err(err) => return Err(err.into()),
        };
        info!(
            tracking = %updated.tracking_number,
            from = %planned.record.from,
            to = %planned.record.to,
            actor = %planned.record.actor,
            "status changed"
        );
        self.notify(planned.notification(&updated));
        Ok(updated)
    }

    /// Cancel a booking on behalf of its owner or an operator.
    ///
    /// # Errors
    ///
    /// As [`ShipmentService::transition`].
    pub async fn cancel(
        &self,
        id: &ShipmentId,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<Shipment, ShipmentError> {
        self.transition(id, actor, ShipmentStatus::Cancelled, reason)
            .await
    }

    /// Append an audit note. Allowed in every state, terminal ones included.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::NotFound`] or a store error.
    pub async fn annotate(
        &self,
        id: &ShipmentId,
        author: &Actor,
        note: String,
    ) -> Result<Shipment, ShipmentError> {
        let now = Utc::now();
        let patch = ShipmentPatch::new(now).append_note(AuditNote {
            author: author.label(),
            note,
            written_at: now,
        });
        Ok(self.shipments.update(id, patch).await?)
    }

    /// Move a route to a new collection date.
    ///
    /// Produces a new configuration version, stores the route and refreshes the
    /// shipments assigned to it.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::Resolve`] for unknown routes,
    /// [`ShipmentError::Config`] when a concurrent reload won, or a store error.
    pub async fn reschedule_route(
        &self,
        name: &RouteName,
        date: NaiveDate,
    ) -> Result<Route, ShipmentError> {
        let mut next = self.config().config.clone();
        next.version += 1;
        let route = next.routing.reschedule(name, date, Utc::now())?.clone();
        let installed = self.install(next.compile()?)?;
        self.routes.upsert(route.clone()).await?;
        info!(
            route = %route.name,
            date = %route.collection_date,
            version = installed.version(),
            "route rescheduled"
        );
        self.refresh_assignments().await?;
        Ok(route)
    }

    /// Re-resolve every active shipment whose stored collection is stale.
    ///
    /// Shipments changed concurrently are skipped and picked up on the next run.
    ///
    /// # Errors
    ///
    /// Returns a store error when listing shipments fails.
    pub async fn refresh_assignments(&self) -> Result<usize, ShipmentError> {
        let config = self.config();
        let mut refreshed = 0_usize;
        for shipment in self.shipments.query(&ShipmentFilter::active()).await? {
            let collection = match config
                .resolver
                .refreshed_collection(&shipment.collection, &shipment.sender.address)
            {
                Ok(Some(collection)) => collection,
                Ok(None) => continue,
                Err(err) => {
                    warn!(tracking = %shipment.tracking_number, error = %err, "cannot re-resolve collection");
                    continue;
                }
            };

            let moved = collection.assignment() != shipment.collection.assignment();
            let patch = ShipmentPatch::new(Utc::now())
                .expect_status(shipment.status)
                .expect_revision(shipment.revision)
                .collection(collection);
            match self.shipments.update(&shipment.id, patch).await {
                Ok(updated) => {
                    refreshed += 1;
                    if moved {
                        self.notify(collection_notification(&updated));
                    }
                }
                Err(err) => {
                    warn!(tracking = %shipment.tracking_number, error = %err, "collection refresh skipped");
                }
            }
        }
        if refreshed > 0 {
            info!(shipments = refreshed, "collection assignments refreshed");
        }
        Ok(refreshed)
    }

    /// Group active shipments by collection route.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn collection_view(&self) -> Result<CollectionView, ShipmentError> {
        let config = self.config();
        let shipments = self.shipments.query(&ShipmentFilter::active()).await?;
        Ok(SchedulingAggregator::new(&config.resolver).group_by_route(shipments))
    }

    /// Route groups collected on a given day.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn collection_day(&self, date: NaiveDate) -> Result<Vec<RouteGroup>, ShipmentError> {
        let view = self.collection_view().await?;
        Ok(view.collection_day(date).cloned().collect())
    }

    fn notify(&self, notification: Notification) {
        let related = notification.related_id;
        if let Err(err) = self.notifier.emit(notification) {
            warn!(shipment = %related, error = %err, "notification dropped");
        }
    }
}

fn ensure_editable(shipment: &Shipment, actor: &Actor) -> Result<(), ShipmentError> {
    let allowed = !shipment.is_terminal()
        && match actor {
            Actor::Operator { .. } => true,
            Actor::Customer { id } => *id == shipment.owner && shipment.can_modify,
            Actor::Driver { .. } => false,
        };
    if allowed {
        Ok(())
    } else {
        Err(ShipmentError::NotModifiable {
            id: shipment.id,
            status: shipment.status,
        })
    }
}

fn restricted_prefix(shipment: &Shipment) -> Option<&str> {
    match &shipment.collection {
        Collection::Restricted { prefix, .. } => Some(prefix),
        _ => None,
    }
}

fn sum_quotes(quotes: &[ManualQuote]) -> Option<Money> {
    quotes
        .iter()
        .try_fold(Money::ZERO, |acc, quote| acc.checked_add(quote.amount))
}

fn quote_notification(shipment: &Shipment) -> Notification {
    Notification {
        title: format!("Shipment {}: price updated", shipment.tracking_number),
        message: format!(
            "The amount due is now {} {}.",
            shipment.total_amount, shipment.currency
        ),
        kind: NotificationKind::QuoteUpdated,
        related_id: shipment.id,
        user_id: shipment.owner.clone(),
    }
}

fn collection_notification(shipment: &Shipment) -> Notification {
    let message = match shipment.collection.assignment() {
        Some(assignment) => format!(
            "Your shipment will be collected on {} ({} route).",
            assignment.collection_date, assignment.route
        ),
        None => "We will contact you to arrange collection.".to_owned(),
    };
    Notification {
        title: format!("Shipment {}: collection updated", shipment.tracking_number),
        message,
        kind: NotificationKind::CollectionChanged,
        related_id: shipment.id,
        user_id: shipment.owner.clone(),
    }
}
