use thiserror::Error;

use dynprice_core::ProductId;
use dynprice_events::EnvelopeError;

use crate::model::Price;
use crate::repository::RepositoryError;

/// Failures of a single pricing operation.
///
/// None of these are fatal to the process; consumers log them and move on to
/// the next message.
#[derive(Debug, Error)]
pub enum PricingError {
    /// Envelope or payload failed to decode. Nothing was mutated.
    #[error("malformed event: {0}")]
    MalformedEvent(#[from] EnvelopeError),

    /// No catalog snapshot exists for the product. Nothing was mutated.
    #[error("unknown product {0}")]
    UnknownProduct(ProductId),

    /// The repository call failed; the price was not persisted.
    #[error("failed to persist price: {0}")]
    Persistence(#[from] RepositoryError),

    /// The price was persisted but the change notification was not sent.
    #[error("price for {} persisted but not published: {reason}", price.product_id)]
    Publish { price: Price, reason: String },
}

impl PricingError {
    /// The persisted price, when the failure happened after the write.
    pub fn persisted_price(&self) -> Option<&Price> {
        match self {
            PricingError::Publish { price, .. } => Some(price),
            _ => None,
        }
    }
}
