use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use dynprice_core::ProductId;

/// Last known catalog state of a product.
///
/// Replaced wholesale on every catalog event; never merged field by field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub base_price: Decimal,
    /// Negative values are treated as out of stock.
    pub stock_level: i64,
    pub observed_at: DateTime<Utc>,
}

/// The durable, externally visible price of a product (one row per product).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub product_id: ProductId,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_price: Decimal,
    pub updated_at: DateTime<Utc>,
}
