use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use dynprice_core::ProductId;
use dynprice_pricing::{Price, PriceRepository, RepositoryError};

/// In-memory price table for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryPriceRepository {
    inner: RwLock<HashMap<ProductId, Price>>,
}

impl InMemoryPriceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PriceRepository for InMemoryPriceRepository {
    async fn upsert(&self, product_id: ProductId, current_price: Decimal) -> Result<Price, RepositoryError> {
        let price = Price {
            product_id,
            current_price,
            updated_at: Utc::now(),
        };
        let mut map = self
            .inner
            .write()
            .map_err(|_| RepositoryError::Unavailable("price table lock poisoned".into()))?;
        map.insert(product_id, price.clone());
        Ok(price)
    }

    async fn get(&self, product_id: ProductId) -> Result<Option<Price>, RepositoryError> {
        let map = self
            .inner
            .read()
            .map_err(|_| RepositoryError::Unavailable("price table lock poisoned".into()))?;
        Ok(map.get(&product_id).cloned())
    }
}
