use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::error::AppResult;
use crate::middleware::auth::{cleared_cookies, has_valid_session, session_cookies};
use crate::middleware::{AdminSession, ValidJson};
use crate::response::ApiResponse;
use crate::routes::method_not_allowed;
use crate::state::AppState;
use crate::types::LoginRequest;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/status", get(status))
        .route("/me", get(me))
        .method_not_allowed_fallback(method_not_allowed)
}

/// Checks the admin credentials and opens a cookie session. The token is
/// also returned in the body for bearer-style clients.
pub async fn login(State(state): State<AppState>, ValidJson(body): ValidJson<LoginRequest>) -> AppResult<impl IntoResponse> {
    let login = match state.auth.login(&body.email, &body.password) {
        Ok(login) => login,
        Err(e) => {
            state.metrics.inc_logins_failed();
            tracing::warn!("Failed admin login attempt");
            return Err(e.into());
        }
    };
    state.metrics.inc_logins_succeeded();
    tracing::info!(admin = %login.admin.email, "Admin logged in");

    let [flag, token] = session_cookies(&login.token, state.auth.ttl(), state.config.cookie_secure());
    Ok((
        AppendHeaders([(SET_COOKIE, flag), (SET_COOKIE, token)]),
        ApiResponse::ok(login).with_message("Login successful"),
    ))
}

pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let [flag, token] = cleared_cookies(state.config.cookie_secure());
    (
        AppendHeaders([(SET_COOKIE, flag), (SET_COOKIE, token)]),
        ApiResponse::message("Logged out successfully"),
    )
}

// Cookie-only check used by the admin UI on page load
pub async fn status(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if has_valid_session(&headers, &state.auth) {
        (StatusCode::OK, Json(json!({ "authenticated": true })))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "authenticated": false })))
    }
}

pub async fn me(AdminSession(admin): AdminSession) -> impl IntoResponse {
    ApiResponse::ok(admin)
}
