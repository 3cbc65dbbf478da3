//! Typed payloads carried inside [`EventEnvelope`](crate::EventEnvelope)s.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use dynprice_core::ProductId;

/// Event type names on the wire.
pub mod event_types {
    pub const ORDER_PLACED: &str = "order_placed";
    pub const ORDER_CANCELED: &str = "order_canceled";
    pub const PRICE_UPDATED: &str = "price_updated";
}

/// Catalog change (product created / updated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProductPayload {
    pub id: ProductId,
    #[serde(default)]
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub base_price: Decimal,
    pub stock: i64,
}

/// Order activity for a single product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPayload {
    pub product_id: ProductId,
    pub qty: i64,
    #[serde(default)]
    pub status: String,
}

/// Published after every demand-driven reprice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdatedPayload {
    pub product_id: ProductId,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_price: Decimal,
}
