use axum::{extract::State, response::IntoResponse, routing::get, Router};

use crate::error::AppResult;
use crate::middleware::{AdminSession, ValidJson};
use crate::response::ApiResponse;
use crate::routes::method_not_allowed;
use crate::services::categories;
use crate::state::AppState;
use crate::types::CreateCategoryRequest;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list).post(create)).method_not_allowed_fallback(method_not_allowed)
}

pub async fn list(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let items = categories::list(&state.db).await?;
    Ok(ApiResponse::ok(items))
}

pub async fn create(
    AdminSession(admin): AdminSession,
    State(state): State<AppState>,
    ValidJson(body): ValidJson<CreateCategoryRequest>,
) -> AppResult<impl IntoResponse> {
    let category = categories::create(&state.db, body).await?;
    tracing::info!(admin = %admin.email, category_id = %category.id, "Category created");
    Ok(ApiResponse::created(category).with_message("Category created successfully"))
}
