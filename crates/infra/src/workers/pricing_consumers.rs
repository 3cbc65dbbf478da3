//! The two pricing consumers: catalog changes and order activity.

use std::sync::Arc;

use tokio::sync::watch;

use dynprice_events::{BusMessage, EventBus, Subscription};
use dynprice_pricing::{PriceRepository, PricingEngine};

use super::consumer_worker::{ConsumerWorker, WorkerHandle};

pub const CATALOG_WORKER: &str = "pricing.catalog";
pub const ORDERS_WORKER: &str = "pricing.orders";

/// Spawn both consumers against a shared engine.
pub fn spawn_pricing_consumers<R, B>(
    engine: Arc<PricingEngine<R, B>>,
    catalog: Subscription,
    orders: Subscription,
    shutdown: watch::Receiver<bool>,
) -> Vec<WorkerHandle>
where
    R: PriceRepository + 'static,
    B: EventBus + 'static,
{
    let catalog_worker = {
        let engine = engine.clone();
        ConsumerWorker::spawn(CATALOG_WORKER, catalog, shutdown.clone(), move |msg: BusMessage| {
            let engine = engine.clone();
            async move { engine.handle_catalog_event(msg.payload()).await.map(|_| ()) }
        })
    };

    let orders_worker = ConsumerWorker::spawn(ORDERS_WORKER, orders, shutdown, move |msg: BusMessage| {
        let engine = engine.clone();
        async move { engine.handle_order_event(msg.payload()).await.map(|_| ()) }
    });

    vec![catalog_worker, orders_worker]
}
