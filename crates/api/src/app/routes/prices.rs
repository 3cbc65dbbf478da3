use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use dynprice_core::ProductId;

use crate::app::errors::{json_error, pricing_error_to_response};
use crate::app::services::PriceService;

/// `GET /prices/{product_id}`: the persisted price, computed on first read.
pub async fn get_price(
    Extension(prices): Extension<Arc<dyn PriceService>>,
    Path(raw_id): Path<String>,
) -> Response {
    let product_id: ProductId = match raw_id.parse() {
        Ok(id) => id,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("{e}")),
    };

    match prices.read_price(product_id).await {
        Ok(price) => Json(price).into_response(),
        Err(err) => pricing_error_to_response(err),
    }
}
