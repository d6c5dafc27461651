use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, patch},
    Router,
};
use chrono::Utc;

use crate::error::{AppError, AppResult};
use crate::middleware::validation::validate_uuid;
use crate::middleware::{AdminSession, ValidJson, ValidQuery};
use crate::response::ApiResponse;
use crate::routes::method_not_allowed;
use crate::services::email::EmailError;
use crate::services::orders;
use crate::state::AppState;
use crate::types::{AnalyticsQuery, CreateOrderRequest, Order, PaginationQuery, UpdateOrderStatusRequest};

/// Tracking ids are short; anything longer is rejected before hitting the database.
const MAX_TRACKING_ID_LEN: usize = 32;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/stats", get(stats))
        .route("/analytics", get(analytics))
        .route("/track/{tracking_id}", get(track))
        .route("/{id}", get(by_id))
        .route("/{id}/status", patch(update_status))
        .method_not_allowed_fallback(method_not_allowed)
}

/// Fire-and-forget confirmation email. Delivery problems are logged and
/// counted; the order itself is already committed.
fn spawn_confirmation(state: &AppState, order: Order) {
    let email = state.email.clone();
    let metrics = state.metrics.clone();
    tokio::spawn(async move {
        match email.send_order_confirmation(&order).await {
            Ok(_) => metrics.inc_emails_sent(),
            Err(EmailError::Disabled) => {}
            Err(e) => {
                metrics.inc_emails_failed();
                tracing::error!(tracking_id = %order.tracking_id, "Failed to send order confirmation: {}", e);
            }
        }
    });
}

pub async fn create(State(state): State<AppState>, ValidJson(body): ValidJson<CreateOrderRequest>) -> AppResult<impl IntoResponse> {
    let order = orders::create(&state.db, state.order_settings(), body).await?;
    state.metrics.inc_orders_created();
    spawn_confirmation(&state, order.clone());
    Ok(ApiResponse::created(order).with_message("Order created successfully"))
}

pub async fn list(
    AdminSession(_admin): AdminSession,
    State(state): State<AppState>,
    ValidQuery(q): ValidQuery<PaginationQuery>,
) -> AppResult<impl IntoResponse> {
    let (items, meta) = orders::list(&state.db, q.page, q.limit).await?;
    Ok(ApiResponse::ok(items).with_meta(meta))
}

pub async fn stats(AdminSession(_admin): AdminSession, State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(ApiResponse::ok(orders::stats(&state.db).await?))
}

pub async fn analytics(
    AdminSession(_admin): AdminSession,
    State(state): State<AppState>,
    ValidQuery(q): ValidQuery<AnalyticsQuery>,
) -> AppResult<impl IntoResponse> {
    let series = orders::analytics(&state.db, q.days, Utc::now()).await?;
    Ok(ApiResponse::ok(series))
}

pub async fn track(State(state): State<AppState>, Path(tracking_id): Path<String>) -> AppResult<impl IntoResponse> {
    let tracking_id = tracking_id.trim().to_uppercase();
    if tracking_id.is_empty() || tracking_id.len() > MAX_TRACKING_ID_LEN {
        return Err(AppError::BadRequest("Invalid tracking id".into()));
    }
    let order = orders::find_by_tracking_id(&state.db, &tracking_id).await?;
    Ok(ApiResponse::ok(order))
}

pub async fn by_id(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<impl IntoResponse> {
    validate_uuid(&id)?;
    Ok(ApiResponse::ok(orders::find_by_id(&state.db, &id).await?))
}

pub async fn update_status(
    AdminSession(admin): AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<UpdateOrderStatusRequest>,
) -> AppResult<impl IntoResponse> {
    validate_uuid(&id)?;
    let status = body.status;
    let order = orders::update_status(&state.db, &id, body).await?;
    tracing::info!(admin = %admin.email, order_id = %id, %status, "Order status updated");
    Ok(ApiResponse::ok(order).with_message("Order status updated successfully"))
}
