//! HTTP route handlers for the CrestSports API.
//!
//! Each sub-module owns one resource and exposes a `routes()` builder:
//!
//! - `auth`: admin login, logout and session checks
//! - `categories`: category listing and creation
//! - `dev`: development-only helpers, mounted outside production
//! - `health`: liveness, metrics and build info
//! - `orders`: checkout, tracking and order administration
//! - `payments`: gateway order creation and signature verification
//! - `products`: catalogue browsing and product administration
//!
//! [`router`] assembles them under the versioned prefix and applies the
//! middleware stack.

pub mod auth;
pub mod categories;
pub mod dev;
pub mod health;
pub mod orders;
pub mod payments;
pub mod products;

use std::time::Duration;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::Level;

use crate::error::AppError;
use crate::middleware::{
    rate_limit::rate_limit_middleware,
    request_id::{request_id_middleware, RequestId, REQUEST_ID_HEADER},
    security_headers::security_headers_middleware,
    validation::{validate_request_middleware, MAX_BODY_BYTES},
};
use crate::state::AppState;

/// Fallback for unmatched routes.
pub async fn not_found() -> AppError {
    AppError::NotFound("Route not found".into())
}

/// Fallback for known routes hit with an unsupported method.
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o.trim()) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, request_id.clone()])
        .expose_headers([
            request_id,
            header::RETRY_AFTER,
            HeaderName::from_static("ratelimit-limit"),
            HeaderName::from_static("ratelimit-remaining"),
        ])
        .max_age(Duration::from_secs(600))
}

/// Builds the complete application router.
pub fn router(state: AppState) -> Router {
    let cfg = state.config.clone();

    let mut api = Router::new()
        .nest("/health", health::routes())
        .nest("/auth", auth::routes())
        .nest("/categories", categories::routes())
        .nest("/products", products::routes())
        .nest("/orders", orders::routes())
        .nest("/payments", payments::routes());
    if cfg.is_development() {
        api = api.nest("/dev", dev::routes());
    }
    let api = api.fallback(not_found).layer(from_fn_with_state(state.clone(), rate_limit_middleware));

    let trace = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            let request_id = req.extensions().get::<RequestId>().map(RequestId::as_str).unwrap_or("-");
            tracing::info_span!(
                "http_request",
                method = %req.method(),
                uri = %req.uri(),
                request_id = %request_id,
            )
        })
        .on_response(DefaultOnResponse::new().level(Level::INFO).latency_unit(LatencyUnit::Millis));

    Router::new()
        .nest(&cfg.api_prefix(), api)
        .fallback(not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(from_fn(validate_request_middleware))
        .layer(CompressionLayer::new())
        .layer(cors_layer(&cfg.cors.origins))
        .layer(from_fn_with_state(cfg.clone(), security_headers_middleware))
        .layer(trace)
        .layer(from_fn(request_id_middleware))
}
