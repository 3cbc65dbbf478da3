//! Infrastructure wiring: repository + bus + engine + consumers.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{info, warn};

use dynprice_core::ProductId;
use dynprice_events::{EventBus, InMemoryEventBus, Subscription};
use dynprice_infra::{
    InMemoryPriceRepository, PostgresPriceRepository, PricingConfig, TopicConfig, WorkerHandle,
    spawn_pricing_consumers,
};
#[cfg(feature = "redis")]
use dynprice_infra::event_bus::{RedisStreamsError, RedisStreamsEventBus};
use dynprice_pricing::{Price, PriceRepository, PricingEngine, PricingError, RepositoryError};

/// What the HTTP layer needs from the engine, with the storage and transport
/// types erased.
#[async_trait]
pub trait PriceService: Send + Sync {
    async fn read_price(&self, product_id: ProductId) -> Result<Price, PricingError>;
}

#[async_trait]
impl<R, B> PriceService for PricingEngine<R, B>
where
    R: PriceRepository,
    B: EventBus,
{
    async fn read_price(&self, product_id: ProductId) -> Result<Price, PricingError> {
        PricingEngine::read_price(self, product_id).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("price repository: {0}")]
    Repository(#[from] RepositoryError),

    #[cfg(feature = "redis")]
    #[error("event bus: {0}")]
    Bus(#[from] RedisStreamsError),
}

/// Running pricing services: the read side plus the two consumers.
pub struct Services {
    pub prices: Arc<dyn PriceService>,
    workers: Vec<WorkerHandle>,
    shutdown: watch::Sender<bool>,
}

impl Services {
    /// Signal the consumers to stop and wait for them.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for worker in self.workers {
            let name = worker.name();
            worker.join().await;
            info!(worker = name, "consumer joined");
        }
    }
}

/// Build services from configuration: Postgres/Redis when configured,
/// in-memory otherwise.
pub async fn build_services(config: &PricingConfig) -> Result<Services, StartupError> {
    match &config.database {
        Some(db) => {
            let repo = PostgresPriceRepository::connect(&db.url, db.max_connections).await?;
            repo.ensure_schema().await?;
            info!(max_connections = db.max_connections, "using postgres price repository");
            with_bus(Arc::new(repo), config).await
        }
        None => {
            warn!("DATABASE_URL not set; prices are kept in memory only");
            with_bus(Arc::new(InMemoryPriceRepository::new()), config).await
        }
    }
}

async fn with_bus<R>(repo: R, config: &PricingConfig) -> Result<Services, StartupError>
where
    R: PriceRepository + 'static,
{
    #[cfg(feature = "redis")]
    {
        if let Some(url) = &config.redis_url {
            let bus = Arc::new(RedisStreamsEventBus::connect(url, config.topics.clone()).await?);
            let catalog = bus.subscribe(&config.topics.catalog);
            let orders = bus.subscribe(&config.topics.orders);
            info!("using redis streams event bus");
            return Ok(start(repo, bus, &config.topics, catalog, orders));
        }
    }
    #[cfg(not(feature = "redis"))]
    {
        if config.redis_url.is_some() {
            warn!("REDIS_URL set but the redis feature is disabled; using the in-memory bus");
        }
    }

    let (services, _bus) = in_memory_bus(repo, &config.topics);
    Ok(services)
}

/// Fully in-memory services (dev/test). The bus is returned so callers can
/// feed catalog and order events.
pub fn build_in_memory_services(topics: &TopicConfig) -> (Services, Arc<InMemoryEventBus>) {
    in_memory_bus(Arc::new(InMemoryPriceRepository::new()), topics)
}

fn in_memory_bus<R>(repo: R, topics: &TopicConfig) -> (Services, Arc<InMemoryEventBus>)
where
    R: PriceRepository + 'static,
{
    let bus = Arc::new(InMemoryEventBus::new());
    let catalog = bus.subscribe(&topics.catalog);
    let orders = bus.subscribe(&topics.orders);
    (start(repo, bus.clone(), topics, catalog, orders), bus)
}

fn start<R, B>(repo: R, bus: B, topics: &TopicConfig, catalog: Subscription, orders: Subscription) -> Services
where
    R: PriceRepository + 'static,
    B: EventBus + 'static,
{
    let engine = Arc::new(PricingEngine::new(repo, bus, topics.prices.clone()));
    let (shutdown, shutdown_rx) = watch::channel(false);
    let workers = spawn_pricing_consumers(engine.clone(), catalog, orders, shutdown_rx);

    Services {
        prices: engine,
        workers,
        shutdown,
    }
}
