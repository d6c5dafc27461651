//! Development helpers. Only mounted when `app.environment = "development"`.

use axum::{extract::State, response::IntoResponse, routing::post, Router};
use serde_json::json;

use crate::error::AppResult;
use crate::middleware::ValidJson;
use crate::response::ApiResponse;
use crate::routes::method_not_allowed;
use crate::state::AppState;
use crate::types::DevEmailRequest;

pub fn routes() -> Router<AppState> {
    Router::new().route("/email", post(send_test_email)).method_not_allowed_fallback(method_not_allowed)
}

pub async fn send_test_email(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<DevEmailRequest>,
) -> AppResult<impl IntoResponse> {
    let id = state.email.send_test(&body.email).await?;
    tracing::info!(message_id = %id, "Dev test email sent");
    Ok(ApiResponse::ok(json!({ "id": id })).with_message("Test email sent"))
}
