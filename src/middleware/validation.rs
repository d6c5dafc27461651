use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{header::CONTENT_LENGTH, request::Parts, Method},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Largest request body accepted anywhere in the API.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Field-level rules checked after a request body or query has parsed.
pub trait Validate {
    /// Returns `AppError::Validation` listing every broken field.
    fn validate(&self) -> AppResult<()>;
}

/// JSON body extractor: malformed JSON is a 400, rule violations a 422.
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Query string extractor with the same split as [`ValidJson`].
#[derive(Debug)]
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// An Axum middleware that validates incoming requests for common security issues.
///
/// This middleware checks for:
/// - Path traversal attempts in the request URI.
/// - Suspicious user agents (logged, not rejected).
/// - A declared `content-length` above [`MAX_BODY_BYTES`].
pub async fn validate_request_middleware(req: Request, next: Next) -> Response {
    if contains_path_traversal(req.uri().path()) {
        return AppError::BadRequest("Path traversal detected in request".into()).into_response();
    }

    if let Some(ua) = req.headers().get("user-agent").and_then(|v| v.to_str().ok()) {
        if is_suspicious_user_agent(ua) {
            tracing::warn!("Suspicious user agent detected: {}", sanitize_for_logging(ua));
        }
    }

    // Early rejection; DefaultBodyLimit still guards chunked bodies
    if matches!(req.method(), &Method::POST | &Method::PUT | &Method::PATCH) {
        let declared = req
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > MAX_BODY_BYTES) {
            return AppError::PayloadTooLarge { limit: MAX_BODY_BYTES }.into_response();
        }
    }

    next.run(req).await
}

/// Looks for directory traversal sequences, raw or percent-encoded.
fn contains_path_traversal(path: &str) -> bool {
    let lower = path.to_lowercase();

    if path.contains("/..") || path.contains("\\..") || path.starts_with("..") {
        return true;
    }
    if path.contains("/./") || path.contains("\\.\\") || path.contains("....") {
        return true;
    }

    const ENCODED_PATTERNS: [&str; 11] = [
        "%2e%2e", "%252e%252e", "%2e/", "%252e%2f", "/%2e", "%2f%2e", "%2e\\", "%2e%5c", "%5c%2e", "%5c%5c",
        "%00",
    ];
    if ENCODED_PATTERNS.iter().any(|p| lower.contains(p)) {
        return true;
    }

    path.contains('\0')
}

fn is_suspicious_user_agent(ua: &str) -> bool {
    let ua_lower = ua.to_lowercase();
    ua_lower.contains("scanner")
        || (ua_lower.contains("crawler") && !ua_lower.contains("googlebot") && !ua_lower.contains("bingbot"))
        || ua_lower.contains("nikto")
        || ua_lower.contains("sqlmap")
        || ua_lower.contains("havij")
        || ua_lower.contains("acunetix")
}

/// Parses a path id, answering 400 for anything that is not a UUID.
pub fn validate_uuid(id: &str) -> AppResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| AppError::BadRequest(format!("Invalid id format: {}", sanitize_for_logging(id))))
}

/// Strips control characters and caps length before echoing user input.
pub fn sanitize_for_logging(input: &str) -> String {
    input.chars().filter(|c| !c.is_control()).take(200).collect()
}
