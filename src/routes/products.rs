use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::error::AppResult;
use crate::middleware::validation::validate_uuid;
use crate::middleware::{AdminSession, ValidJson, ValidQuery};
use crate::response::ApiResponse;
use crate::routes::method_not_allowed;
use crate::services::products;
use crate::state::AppState;
use crate::types::{CreateProductRequest, FeaturedQuery, ProductListQuery, UpdateProductRequest};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/featured", get(featured))
        .route("/slug/{slug}", get(by_slug))
        .route("/{id}", get(by_id).patch(update).delete(remove))
        .method_not_allowed_fallback(method_not_allowed)
}

pub async fn list(State(state): State<AppState>, ValidQuery(q): ValidQuery<ProductListQuery>) -> AppResult<impl IntoResponse> {
    let (items, meta) = products::list(&state.db, &q).await?;
    Ok(ApiResponse::ok(items).with_meta(meta))
}

pub async fn featured(State(state): State<AppState>, ValidQuery(q): ValidQuery<FeaturedQuery>) -> AppResult<impl IntoResponse> {
    let items = products::featured(&state.db, q.limit).await?;
    Ok(ApiResponse::ok(items))
}

pub async fn by_slug(State(state): State<AppState>, Path(slug): Path<String>) -> AppResult<impl IntoResponse> {
    let product = products::find_by_slug(&state.db, &slug).await?;
    Ok(ApiResponse::ok(product))
}

pub async fn by_id(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<impl IntoResponse> {
    validate_uuid(&id)?;
    let product = products::find_by_id(&state.db, &id).await?;
    Ok(ApiResponse::ok(product))
}

pub async fn create(
    AdminSession(_admin): AdminSession,
    State(state): State<AppState>,
    ValidJson(body): ValidJson<CreateProductRequest>,
) -> AppResult<impl IntoResponse> {
    let product = products::create(&state.db, body).await?;
    Ok(ApiResponse::created(product).with_message("Product created successfully"))
}

pub async fn update(
    AdminSession(_admin): AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<UpdateProductRequest>,
) -> AppResult<impl IntoResponse> {
    validate_uuid(&id)?;
    let product = products::update(&state.db, &id, body).await?;
    Ok(ApiResponse::ok(product).with_message("Product updated successfully"))
}

pub async fn remove(
    AdminSession(_admin): AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    validate_uuid(&id)?;
    products::delete(&state.db, &id).await?;
    Ok(ApiResponse::message("Product deleted successfully"))
}
