use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use dynprice_core::ProductId;

use crate::model::Price;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The store could not be reached (pool closed, connection refused, poisoned lock).
    #[error("price store unavailable: {0}")]
    Unavailable(String),

    /// The store answered with an error.
    #[error("price store query failed: {0}")]
    Query(String),
}

/// Durable price storage, one row per product.
///
/// `upsert` stamps `updated_at` itself; callers only supply the amount.
#[async_trait]
pub trait PriceRepository: Send + Sync {
    async fn upsert(&self, product_id: ProductId, current_price: Decimal) -> Result<Price, RepositoryError>;

    async fn get(&self, product_id: ProductId) -> Result<Option<Price>, RepositoryError>;
}

#[async_trait]
impl<R> PriceRepository for Arc<R>
where
    R: PriceRepository + ?Sized,
{
    async fn upsert(&self, product_id: ProductId, current_price: Decimal) -> Result<Price, RepositoryError> {
        (**self).upsert(product_id, current_price).await
    }

    async fn get(&self, product_id: ProductId) -> Result<Option<Price>, RepositoryError> {
        (**self).get(product_id).await
    }
}
