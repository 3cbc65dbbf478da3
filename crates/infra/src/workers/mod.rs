//! Background consumers.

pub mod consumer_worker;
pub mod pricing_consumers;

pub use consumer_worker::{ConsumerWorker, WorkerHandle};
pub use pricing_consumers::{CATALOG_WORKER, ORDERS_WORKER, spawn_pricing_consumers};
