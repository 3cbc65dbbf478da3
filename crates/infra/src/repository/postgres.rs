//! Postgres-backed price table.
//!
//! One row per product, overwritten on every reprice:
//!
//! ```sql
//! CREATE TABLE prices (
//!     product_id    UUID PRIMARY KEY,
//!     current_price NUMERIC(12, 2) NOT NULL,
//!     updated_at    TIMESTAMPTZ NOT NULL
//! );
//! ```
//!
//! ## Error Mapping
//!
//! | SQLx Error | RepositoryError |
//! |------------|-----------------|
//! | `PoolClosed`, `PoolTimedOut`, `Io`, `Tls` | `Unavailable` |
//! | Database / decode / anything else | `Query` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::instrument;

use dynprice_core::ProductId;
use dynprice_pricing::{Price, PriceRepository, RepositoryError};

const CREATE_PRICES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS prices (
    product_id    UUID PRIMARY KEY,
    current_price NUMERIC(12, 2) NOT NULL,
    updated_at    TIMESTAMPTZ NOT NULL
)
"#;

#[derive(Debug, Clone)]
pub struct PostgresPriceRepository {
    pool: Arc<PgPool>,
}

impl PostgresPriceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Open a pool against `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the `prices` table if it does not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        sqlx::query(CREATE_PRICES_TABLE)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl PriceRepository for PostgresPriceRepository {
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn upsert(&self, product_id: ProductId, current_price: Decimal) -> Result<Price, RepositoryError> {
        let row = sqlx::query_as::<_, PriceRow>(
            r#"
            INSERT INTO prices (product_id, current_price, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (product_id)
            DO UPDATE SET current_price = EXCLUDED.current_price, updated_at = EXCLUDED.updated_at
            RETURNING product_id, current_price, updated_at
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(current_price)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert", e))?;

        Ok(row.into())
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn get(&self, product_id: ProductId) -> Result<Option<Price>, RepositoryError> {
        let row = sqlx::query_as::<_, PriceRow>(
            r#"
            SELECT product_id, current_price, updated_at
            FROM prices
            WHERE product_id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;

        Ok(row.map(Into::into))
    }
}

#[derive(Debug)]
struct PriceRow {
    product_id: uuid::Uuid,
    current_price: Decimal,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for PriceRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(PriceRow {
            product_id: row.try_get("product_id")?,
            current_price: row.try_get("current_price")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<PriceRow> for Price {
    fn from(row: PriceRow) -> Self {
        Price {
            product_id: ProductId::from_uuid(row.product_id),
            current_price: row.current_price,
            updated_at: row.updated_at,
        }
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            RepositoryError::Unavailable(format!("connection pool unavailable in {operation}"))
        }
        sqlx::Error::Io(e) => RepositoryError::Unavailable(format!("io error in {operation}: {e}")),
        sqlx::Error::Tls(e) => RepositoryError::Unavailable(format!("tls error in {operation}: {e}")),
        sqlx::Error::Database(db_err) => {
            RepositoryError::Query(format!("database error in {operation}: {}", db_err.message()))
        }
        other => RepositoryError::Query(format!("sqlx error in {operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_errors_are_reported_as_unavailable() {
        assert!(matches!(
            map_sqlx_error("get", sqlx::Error::PoolTimedOut),
            RepositoryError::Unavailable(_)
        ));
        assert!(matches!(
            map_sqlx_error("upsert", sqlx::Error::PoolClosed),
            RepositoryError::Unavailable(_)
        ));
    }

    #[test]
    fn other_errors_are_query_failures() {
        let err = map_sqlx_error("get", sqlx::Error::RowNotFound);
        assert!(matches!(err, RepositoryError::Query(msg) if msg.starts_with("sqlx error in get")));
    }

    #[test]
    fn row_converts_to_price() {
        let id = ProductId::new();
        let now = Utc::now();
        let price: Price = PriceRow {
            product_id: *id.as_uuid(),
            current_price: Decimal::new(12_345, 2),
            updated_at: now,
        }
        .into();

        assert_eq!(price.product_id, id);
        assert_eq!(price.current_price.to_string(), "123.45");
        assert_eq!(price.updated_at, now);
    }
}
