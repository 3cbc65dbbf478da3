//! `dynprice-pricing`: demand-driven product pricing.
//!
//! The engine keeps two pieces of in-memory state, the last known catalog
//! snapshot per product and a sliding window of recent demand, and derives a
//! price from them whenever a catalog or order event arrives (or a reader asks
//! for a product that has never been priced). Persistence and change
//! notification go through the [`PriceRepository`] and
//! [`EventBus`](dynprice_events::EventBus) ports.

pub mod demand_tracker;
pub mod engine;
pub mod error;
pub mod formula;
pub mod model;
pub mod repository;
pub mod snapshot_store;

pub use demand_tracker::{DEMAND_WINDOW_SECS, DemandTracker};
pub use engine::PricingEngine;
pub use error::PricingError;
pub use formula::compute_price;
pub use model::{Price, ProductSnapshot};
pub use repository::{PriceRepository, RepositoryError};
pub use snapshot_store::SnapshotStore;
