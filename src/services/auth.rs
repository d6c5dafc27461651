//! Single-admin authentication with HS256 tokens.

use std::time::Duration;

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::types::{AdminPayload, LoginResponse};

pub const ADMIN_ID: &str = "admin";
pub const ADMIN_ROLE: &str = "ADMIN";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::Unauthorized("Invalid email or password".into()),
            AuthError::InvalidToken => AppError::Unauthorized("Invalid or expired token".into()),
            AuthError::Signing(e) => AppError::Internal(anyhow::Error::new(e).context("token signing failed")),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    id: String,
    email: String,
    role: String,
    iat: i64,
    exp: i64,
}

/// Issues and verifies admin tokens for the one configured admin account.
pub struct AdminAuth {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    admin_email: String,
    admin_password: String,
    ttl: Duration,
}

impl AdminAuth {
    pub fn new(secret: &str, admin_email: &str, admin_password: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            admin_email: admin_email.to_string(),
            admin_password: admin_password.to_string(),
            ttl,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            &cfg.security.jwt_secret,
            &cfg.security.admin_email,
            &cfg.security.admin_password,
            cfg.token_ttl(),
        )
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn payload(&self) -> AdminPayload {
        AdminPayload { id: ADMIN_ID.to_string(), email: self.admin_email.clone(), role: ADMIN_ROLE.to_string() }
    }

    /// Exact match against the configured pair. Both sides are always
    /// compared so timing does not reveal which one was wrong.
    pub fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let email_ok = constant_time_eq(email.as_bytes(), self.admin_email.as_bytes());
        let password_ok = constant_time_eq(password.as_bytes(), self.admin_password.as_bytes());
        if !(email_ok & password_ok) {
            return Err(AuthError::InvalidCredentials);
        }
        let admin = self.payload();
        let token = self.sign_at(&admin, chrono::Utc::now().timestamp())?;
        Ok(LoginResponse { token, admin })
    }

    /// Signs `payload` as if issued at `issued_at` (unix seconds).
    pub fn sign_at(&self, payload: &AdminPayload, issued_at: i64) -> Result<String, AuthError> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            id: payload.id.clone(),
            email: payload.email.clone(),
            role: payload.role.clone(),
            iat: issued_at,
            exp: issued_at.saturating_add(ttl),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(AuthError::Signing)
    }

    pub fn verify_token(&self, token: &str) -> Result<AdminPayload, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("Rejected expired admin token"),
                _ => tracing::debug!("Rejected admin token: {}", e),
            }
            AuthError::InvalidToken
        })?;
        let Claims { id, email, role, .. } = data.claims;
        if id.is_empty() || email.is_empty() || role.is_empty() {
            return Err(AuthError::InvalidToken);
        }
        Ok(AdminPayload { id, email, role })
    }
}

/// Compares two byte strings without short-circuiting on the first mismatch.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}
