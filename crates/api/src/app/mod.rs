//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (repository, bus, engine, consumers)
//! - `routes/`: HTTP routes + handlers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

pub mod errors;
pub mod routes;
pub mod services;

use services::PriceService;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(prices: Arc<dyn PriceService>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .route("/prices/:product_id", get(routes::prices::get_price))
        .layer(Extension(prices))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
}
