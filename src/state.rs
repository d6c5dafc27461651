use std::sync::Arc;

use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::middleware::rate_limit::RateLimiter;
use crate::services::auth::AdminAuth;
use crate::services::email::EmailService;
use crate::services::orders::OrderSettings;
use crate::services::payments::PaymentService;

/// The shared application state.
///
/// Cloned into every handler; everything heavy sits behind an `Arc` or is a
/// cheap handle (the pool, the limiter map).
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Arc<AppConfig>,
    pub metrics: Metrics,
    /// Per-IP limiter for everything under the API prefix.
    pub rate_limiter: RateLimiter,
    pub auth: Arc<AdminAuth>,
    pub email: EmailService,
    pub payments: PaymentService,
}

impl AppState {
    /// Wires the production integrations from configuration.
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> anyhow::Result<Self> {
        let email = EmailService::from_config(&config)?;
        let payments = PaymentService::from_config(&config)?;
        Ok(Self::with_services(db, config, email, payments))
    }

    /// Same as [`AppState::new`] with caller-supplied email and payment backends.
    pub fn with_services(
        db: sqlx::SqlitePool,
        config: AppConfig,
        email: EmailService,
        payments: PaymentService,
    ) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limit.max_requests, config.rate_limit.window_ms);
        let auth = Arc::new(AdminAuth::from_config(&config));
        Self { db, config: Arc::new(config), metrics: Metrics::new(), rate_limiter, auth, email, payments }
    }

    pub fn order_settings(&self) -> OrderSettings {
        OrderSettings {
            shipping_cost: self.config.orders.shipping_cost,
            skip_payment: self.config.orders.skip_payment,
        }
    }
}
