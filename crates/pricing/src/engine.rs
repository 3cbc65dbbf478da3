//! Pricing orchestration.
//!
//! ## Flows
//!
//! ```text
//! catalog event -> snapshot store -> formula (demand = 0) -> repository
//! order event   -> demand tracker -> formula (current snapshot) -> repository -> bus
//! read miss     -> formula (current snapshot + demand) -> repository
//! ```
//!
//! In-memory state is only locked for the map operation itself. The formula,
//! the repository call and the publish all run with no lock held, so a slow
//! store stalls one consumer, not every product.
//!
//! There is no ordering between the catalog and order streams: a catalog
//! update racing an order for the same product may land on either side of
//! it. Each individual update is atomic.

use serde_json::Value as JsonValue;
use tracing::{debug, error, info, instrument, warn};

use dynprice_core::ProductId;
use dynprice_events::{
    BusMessage, CatalogProductPayload, EventBus, EventEnvelope, OrderPayload, PriceUpdatedPayload,
    event_types,
};

use crate::demand_tracker::DemandTracker;
use crate::error::PricingError;
use crate::formula::compute_price;
use crate::model::{Price, ProductSnapshot};
use crate::repository::PriceRepository;
use crate::snapshot_store::SnapshotStore;

/// Derives and persists product prices from catalog and order events.
///
/// Construct once at start-up and share (`Arc`) between the two consumer
/// workers and the read path.
#[derive(Debug)]
pub struct PricingEngine<R, B> {
    repo: R,
    bus: B,
    price_topic: String,
    snapshots: SnapshotStore,
    demand: DemandTracker,
}

impl<R, B> PricingEngine<R, B> {
    /// `price_topic` is where `price_updated` notifications are published.
    pub fn new(repo: R, bus: B, price_topic: impl Into<String>) -> Self {
        Self {
            repo,
            bus,
            price_topic: price_topic.into(),
            snapshots: SnapshotStore::new(),
            demand: DemandTracker::new(),
        }
    }

    pub fn snapshot(&self, product_id: &ProductId) -> Option<ProductSnapshot> {
        self.snapshots.get(product_id)
    }

    pub fn current_demand(&self, product_id: &ProductId) -> usize {
        self.demand.current_demand(product_id)
    }
}

impl<R, B> PricingEngine<R, B>
where
    R: PriceRepository,
    B: EventBus,
{
    /// Apply a catalog change and persist the baseline (demand-free) price.
    ///
    /// The demand window itself is left alone; only this price ignores it.
    /// Catalog-driven repricing is not published.
    #[instrument(skip_all)]
    pub async fn handle_catalog_event(&self, raw: &[u8]) -> Result<Price, PricingError> {
        let envelope = EventEnvelope::from_slice(raw)?;
        let product: CatalogProductPayload = envelope.decode_payload()?;

        let snapshot = ProductSnapshot {
            product_id: product.id,
            base_price: product.base_price,
            stock_level: product.stock,
            observed_at: envelope.ts(),
        };
        self.snapshots.put(snapshot.clone());
        info!(
            product_id = %snapshot.product_id,
            base_price = %snapshot.base_price,
            stock = snapshot.stock_level,
            "catalog snapshot applied"
        );

        let price = compute_price(snapshot.base_price, snapshot.stock_level, 0);
        let stored = self.repo.upsert(snapshot.product_id, price).await?;
        info!(product_id = %stored.product_id, price = %stored.current_price, "initial price persisted");

        Ok(stored)
    }

    /// Record demand from an order event, reprice, persist and publish.
    ///
    /// Returns `Ok(None)` for event types the engine does not act on.
    /// Canceled orders add demand exactly like placed ones.
    #[instrument(skip_all)]
    pub async fn handle_order_event(&self, raw: &[u8]) -> Result<Option<Price>, PricingError> {
        let envelope = EventEnvelope::from_slice(raw)?;
        if !is_demand_event(&envelope) {
            debug!(event_type = envelope.event_type(), "ignoring order event");
            return Ok(None);
        }
        let order: OrderPayload = envelope.decode_payload()?;
        let product_id = order.product_id;

        // Snapshots are never removed, so once this check passes the product stays known.
        let Some(observed) = self.snapshots.get(&product_id) else {
            warn!(%product_id, "order for unknown product (no snapshot)");
            return Err(PricingError::UnknownProduct(product_id));
        };

        let units = demand_units(order.qty);
        let demand = self.demand.record_demand(product_id, units, envelope.ts());
        let snapshot = self.snapshots.get(&product_id).unwrap_or(observed);

        let price = compute_price(snapshot.base_price, snapshot.stock_level, demand);
        let stored = self.repo.upsert(product_id, price).await?;
        info!(
            %product_id,
            event_type = envelope.event_type(),
            units,
            demand,
            price = %stored.current_price,
            "demand recorded, price persisted"
        );

        if let Err(reason) = self.publish_price(&stored).await {
            error!(%product_id, error = %reason, "price persisted but publish failed");
            return Err(PricingError::Publish { price: stored, reason });
        }

        Ok(Some(stored))
    }

    /// Price a product from the current snapshot and demand count and persist
    /// it. Used by readers when no price has been persisted yet. Does not
    /// evict demand and does not publish.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn compute_and_persist_current_price(&self, product_id: ProductId) -> Result<Price, PricingError> {
        let snapshot = self
            .snapshots
            .get(&product_id)
            .ok_or(PricingError::UnknownProduct(product_id))?;
        let demand = self.demand.current_demand(&product_id);

        let price = compute_price(snapshot.base_price, snapshot.stock_level, demand);
        let stored = self.repo.upsert(product_id, price).await?;
        debug!(demand, price = %stored.current_price, "price computed on read");

        Ok(stored)
    }

    /// Persisted price if there is one, otherwise compute it on demand.
    pub async fn read_price(&self, product_id: ProductId) -> Result<Price, PricingError> {
        match self.repo.get(product_id).await? {
            Some(price) => Ok(price),
            None => self.compute_and_persist_current_price(product_id).await,
        }
    }

    async fn publish_price(&self, price: &Price) -> Result<(), String> {
        let envelope = price_updated_envelope(price);
        let bytes = envelope.to_vec().map_err(|e| e.to_string())?;

        self.bus
            .publish(&self.price_topic, BusMessage::new(price.product_id.to_string(), bytes))
            .await
            .map_err(|e| format!("{e:?}"))
    }
}

fn is_demand_event(envelope: &EventEnvelope<JsonValue>) -> bool {
    matches!(
        envelope.event_type(),
        event_types::ORDER_PLACED | event_types::ORDER_CANCELED
    )
}

/// Every acted-on order counts as at least one unit of demand.
fn demand_units(qty: i64) -> usize {
    usize::try_from(qty).ok().filter(|q| *q > 0).unwrap_or(1)
}

fn price_updated_envelope(price: &Price) -> EventEnvelope<PriceUpdatedPayload> {
    EventEnvelope::new(
        event_types::PRICE_UPDATED,
        chrono::Utc::now(),
        PriceUpdatedPayload {
            product_id: price.product_id,
            current_price: price.current_price,
        },
    )
}
