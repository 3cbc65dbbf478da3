//! Infrastructure layer: price storage, Redis transport, consumers, config.

pub mod config;
pub mod event_bus;
pub mod repository;
pub mod workers;


pub use config::{ConfigError, DatabaseConfig, PricingConfig, TopicConfig};
pub use repository::{InMemoryPriceRepository, PostgresPriceRepository};
pub use workers::{ConsumerWorker, WorkerHandle, spawn_pricing_consumers};
