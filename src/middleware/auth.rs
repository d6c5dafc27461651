//! Admin session: cookie helpers and the `AdminSession` extractor that
//! guards admin-only handlers.

use std::time::Duration;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

use crate::error::AppError;
use crate::services::auth::AdminAuth;
use crate::state::AppState;
use crate::types::AdminPayload;

/// Holds the literal `true` while a session is open.
pub const AUTH_FLAG_COOKIE: &str = "admin_authenticated";
/// Holds the signed admin token.
pub const TOKEN_COOKIE: &str = "admin_token";

/// Value of cookie `name`, searching every `Cookie` header.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn cookie(name: &str, value: &str, max_age_secs: u64, secure: bool) -> String {
    let mut out = format!("{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax", name, value, max_age_secs);
    if secure {
        out.push_str("; Secure");
    }
    out
}

/// `Set-Cookie` values opening a session that lasts `ttl`.
pub fn session_cookies(token: &str, ttl: Duration, secure: bool) -> [String; 2] {
    let max_age = ttl.as_secs();
    [cookie(AUTH_FLAG_COOKIE, "true", max_age, secure), cookie(TOKEN_COOKIE, token, max_age, secure)]
}

/// `Set-Cookie` values expiring both session cookies immediately.
pub fn cleared_cookies(secure: bool) -> [String; 2] {
    [cookie(AUTH_FLAG_COOKIE, "", 0, secure), cookie(TOKEN_COOKIE, "", 0, secure)]
}

/// True only when the flag cookie is exactly `true` and the token cookie verifies.
pub fn has_valid_session(headers: &HeaderMap, auth: &AdminAuth) -> bool {
    if read_cookie(headers, AUTH_FLAG_COOKIE) != Some("true") {
        return false;
    }
    read_cookie(headers, TOKEN_COOKIE).is_some_and(|token| auth.verify_token(token).is_ok())
}

/// Verified admin identity. Taken from `Authorization: Bearer`, falling back
/// to the `admin_token` cookie.
#[derive(Debug, Clone)]
pub struct AdminSession(pub AdminPayload);

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .or_else(|| read_cookie(&parts.headers, TOKEN_COOKIE).filter(|t| !t.is_empty()))
            .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;
        let payload = state.auth.verify_token(token)?;
        Ok(AdminSession(payload))
    }
}
