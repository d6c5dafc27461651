use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// A single failed validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

/// The primary error type for the application.
///
/// Every variant renders as the JSON error envelope
/// `{success: false, message, error: {code, details?}, statusCode, timestamp}`.
#[derive(Debug, Error)]
pub enum AppError {
    /// For internal server errors that are not expected to be handled by the client.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
    /// For client errors due to malformed requests.
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// For request bodies or queries that parsed but broke a rule.
    #[error("Validation failed: {} field(s)", .0.len())]
    Validation(Vec<FieldError>),
    /// For missing or invalid credentials or tokens.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// For when a requested resource or route is not found.
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Method not allowed")]
    MethodNotAllowed,
    /// For when a request conflicts with the current state of the server.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// For bodies larger than the configured limit.
    #[error("Payload too large (limit {limit} bytes)")]
    PayloadTooLarge { limit: usize },
    /// For when a client has sent too many requests in the current window.
    #[error("Rate limited. Retry after {retry_after_seconds} seconds")]
    RateLimited {
        /// The number of seconds to wait before retrying the request.
        retry_after_seconds: u64,
    },
    /// For when a dependency is not configured or temporarily unavailable.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    /// For errors returned by a third-party API.
    #[error("Upstream error: {0}")]
    Upstream(String),
    /// For errors related to database operations.
    #[error("Database error: {0}")]
    Database(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            AppError::Conflict(_) => "CONFLICT",
            AppError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            AppError::RateLimited { .. } => "RATE_LIMITED",
            AppError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::Upstream(_) => "UPSTREAM_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Shorthand for a single-field validation failure.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let mut retry_after = None;

        let (message, details) = match self {
            AppError::Internal(e) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!(%error_id, "Internal error: {:?}", e);
                (
                    "An unexpected error occurred. Please try again later.".to_string(),
                    Some(json!({ "errorId": error_id.to_string() })),
                )
            }
            AppError::Database(msg) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!(%error_id, "Database error: {}", msg);
                (
                    "A database error occurred".to_string(),
                    Some(json!({ "errorId": error_id.to_string() })),
                )
            }
            AppError::Upstream(msg) => {
                tracing::warn!("Upstream error: {}", msg);
                ("An upstream service returned an error".to_string(), None)
            }
            AppError::Validation(fields) => ("Validation failed".to_string(), Some(json!(fields))),
            AppError::RateLimited { retry_after_seconds } => {
                retry_after = Some(retry_after_seconds);
                (
                    "Too many requests from this IP, please try again later.".to_string(),
                    Some(json!({ "retryAfterSeconds": retry_after_seconds })),
                )
            }
            AppError::MethodNotAllowed => ("Method not allowed".to_string(), None),
            AppError::PayloadTooLarge { limit } => (
                format!("Request body exceeds maximum size of {} bytes", limit),
                Some(json!({ "limitBytes": limit })),
            ),
            AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::ServiceUnavailable(msg) => (msg, None),
        };

        let mut body = json!({
            "success": false,
            "message": message,
            "error": {
                "code": code,
            },
            "statusCode": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        if let Some(details) = details {
            body["error"]["details"] = details;
        }

        let mut res = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            res.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        res
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    AppError::Conflict("A record with this value already exists".to_string())
                } else if db_err.is_foreign_key_violation() {
                    AppError::BadRequest("Foreign key constraint failed".to_string())
                } else {
                    AppError::Database(db_err.message().to_string())
                }
            }
            sqlx::Error::PoolTimedOut => {
                AppError::ServiceUnavailable("Database connection pool timed out".to_string())
            }
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(anyhow::anyhow!("JSON column could not be decoded: {}", err))
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;

/// An extension trait for `Option` that provides a convenient way to convert
/// an `Option` to a `Result` with a `NotFound` error.
pub trait OptionExt<T> {
    /// Converts `None` into `AppError::NotFound("<entity> not found")`.
    fn ok_or_not_found(self, entity: &str) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, entity: &str) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(format!("{} not found", entity)))
    }
}

/// Field-level rules shared by the request types.
///
/// Each helper pushes onto an error list instead of returning early so that a
/// single response reports every broken field.
pub mod validation {
    use super::FieldError;

    pub fn is_valid_email(value: &str) -> bool {
        let value = value.trim();
        if value.len() > 254 || value.chars().any(char::is_whitespace) {
            return false;
        }
        let Some((local, domain)) = value.split_once('@') else {
            return false;
        };
        !local.is_empty()
            && !domain.contains('@')
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
    }

    pub fn length(errors: &mut Vec<FieldError>, field: &str, value: &str, min: usize, max: usize) {
        let len = value.trim().chars().count();
        if len < min {
            let message = if min == 1 {
                "Must not be empty".to_string()
            } else {
                format!("Must be at least {} characters", min)
            };
            errors.push(FieldError::new(field, message));
        } else if len > max {
            errors.push(FieldError::new(field, format!("Must be at most {} characters", max)));
        }
    }

    pub fn email(errors: &mut Vec<FieldError>, field: &str, value: &str) {
        if !is_valid_email(value) {
            errors.push(FieldError::new(field, "Invalid email address"));
        }
    }

    pub fn positive(errors: &mut Vec<FieldError>, field: &str, value: f64) {
        if !value.is_finite() || value <= 0.0 {
            errors.push(FieldError::new(field, format!("Must be a positive number, got {}", value)));
        }
    }

    pub fn http_url(errors: &mut Vec<FieldError>, field: &str, value: &str) {
        match url::Url::parse(value) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
            _ => errors.push(FieldError::new(field, "Invalid URL")),
        }
    }

    pub fn uuid(errors: &mut Vec<FieldError>, field: &str, value: &str) {
        if uuid::Uuid::parse_str(value).is_err() {
            errors.push(FieldError::new(field, "Invalid id"));
        }
    }

    pub fn slug(errors: &mut Vec<FieldError>, field: &str, value: &str) {
        length(errors, field, value, 1, 200);
        if !value.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            errors.push(FieldError::new(
                field,
                "Must contain only lowercase letters, digits and hyphens",
            ));
        }
    }
}
