use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use dynprice_pricing::PricingError;

pub fn pricing_error_to_response(err: PricingError) -> axum::response::Response {
    match err {
        PricingError::UnknownProduct(id) => json_error(
            StatusCode::NOT_FOUND,
            "unknown_product",
            format!("no catalog snapshot for product {id}"),
        ),
        other => {
            error!(error = %other, "price lookup failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", other.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
