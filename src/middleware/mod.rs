//! Middleware components for HTTP request processing.
//!
//! Cross-cutting concerns (request ids, security headers, rate limiting,
//! request validation) plus the extractors that enforce admin sessions and
//! body/query rules. `routes::router` layers them in order.

pub mod auth;
pub mod ip;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod validation;

pub use auth::AdminSession;
pub use rate_limit::RateLimiter;
pub use request_id::RequestId;
pub use validation::{ValidJson, ValidQuery};
