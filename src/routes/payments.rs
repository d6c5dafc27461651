use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::post,
    Router,
};

use crate::error::{AppError, AppResult};
use crate::middleware::validation::validate_uuid;
use crate::middleware::ValidJson;
use crate::response::ApiResponse;
use crate::routes::method_not_allowed;
use crate::state::AppState;
use crate::types::VerifyPaymentRequest;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/create/{id}", post(create))
        .route("/verify", post(verify))
        .method_not_allowed_fallback(method_not_allowed)
}

pub async fn create(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<impl IntoResponse> {
    validate_uuid(&id)?;
    let payment = state.payments.create_for_order(&state.db, &id).await?;
    Ok(ApiResponse::ok(payment).with_message("Payment order created"))
}

pub async fn verify(State(state): State<AppState>, ValidJson(body): ValidJson<VerifyPaymentRequest>) -> AppResult<impl IntoResponse> {
    match state.payments.verify(&state.db, &body).await {
        Ok(order) => {
            state.metrics.inc_payments_verified();
            Ok(ApiResponse::ok(order).with_message("Payment verified successfully"))
        }
        Err(e) => {
            if matches!(e, AppError::BadRequest(_)) {
                state.metrics.inc_payments_rejected();
            }
            Err(e)
        }
    }
}
