//! Razorpay integration: gateway order creation and checkout signature checks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::services::orders;
use crate::types::{Order, PaymentOrderResponse, PaymentStatus, VerifyPaymentRequest};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment gateway is not configured")]
    NotConfigured,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gateway rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::NotConfigured => AppError::ServiceUnavailable("Payment gateway is not configured".into()),
            PaymentError::Http(e) => AppError::Upstream(format!("payment gateway unreachable: {}", e)),
            PaymentError::Rejected { status, body } => {
                AppError::Upstream(format!("payment gateway returned {}: {}", status, body))
            }
        }
    }
}

/// Body of `POST /orders` on the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayOrderRequest {
    /// Smallest currency unit.
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key id handed to the checkout widget.
    fn key_id(&self) -> &str;

    async fn create_order(&self, request: GatewayOrderRequest) -> Result<GatewayOrder, PaymentError>;
}

pub struct RazorpayGateway {
    client: reqwest::Client,
    key_id: String,
    key_secret: String,
    endpoint: String,
}

impl RazorpayGateway {
    pub fn new(key_id: &str, key_secret: &str, api_base: &str) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
            endpoint: format!("{}/orders", api_base.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_order(&self, request: GatewayOrderRequest) -> Result<GatewayOrder, PaymentError> {
        let res = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&request)
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(PaymentError::Rejected { status: status.as_u16(), body });
        }
        Ok(res.json().await?)
    }
}

/// Converts a rupee total into paise.
pub fn amount_in_paise(total: f64) -> i64 {
    (total * 100.0).round() as i64
}

/// Checks a checkout signature: hex(HMAC-SHA256(secret, "{order_id}|{payment_id}")).
pub fn verify_payment_signature(secret: &str, gateway_order_id: &str, payment_id: &str, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(gateway_order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

#[derive(Clone)]
pub struct PaymentService {
    gateway: Option<Arc<dyn PaymentGateway>>,
    key_secret: String,
    currency: String,
}

impl PaymentService {
    pub fn new(gateway: Option<Arc<dyn PaymentGateway>>, key_secret: &str, currency: &str) -> Self {
        Self { gateway, key_secret: key_secret.to_string(), currency: currency.to_string() }
    }

    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let p = &cfg.payments;
        let gateway: Option<Arc<dyn PaymentGateway>> = if p.key_id.is_empty() {
            tracing::warn!("payments.key_id not set, payment endpoints will answer 503");
            None
        } else {
            Some(Arc::new(RazorpayGateway::new(&p.key_id, &p.key_secret, &p.api_base)?))
        };
        Ok(Self::new(gateway, &p.key_secret, &p.currency))
    }

    fn gateway(&self) -> Result<&Arc<dyn PaymentGateway>, PaymentError> {
        self.gateway.as_ref().ok_or(PaymentError::NotConfigured)
    }

    /// Opens a gateway order for an unpaid shop order and remembers its id.
    pub async fn create_for_order(&self, pool: &SqlitePool, order_id: &str) -> AppResult<PaymentOrderResponse> {
        let gateway = self.gateway()?;
        let order = orders::find_by_id(pool, order_id).await?;
        if order.payment_status == PaymentStatus::Completed {
            return Err(AppError::Conflict("Order has already been paid".into()));
        }

        let gateway_order = gateway
            .create_order(GatewayOrderRequest {
                amount: amount_in_paise(order.total),
                currency: self.currency.clone(),
                receipt: order.tracking_id.clone(),
                notes: json!({ "orderId": order.id, "customerEmail": order.customer_email }),
            })
            .await?;

        orders::attach_gateway_order(pool, &order.id, &gateway_order.id).await?;
        tracing::info!(order_id = %order.id, gateway_order_id = %gateway_order.id, "Gateway order created");

        let order = orders::find_by_id(pool, &order.id).await?;
        Ok(PaymentOrderResponse {
            razorpay_order_id: gateway_order.id,
            amount: gateway_order.amount,
            currency: gateway_order.currency,
            key_id: gateway.key_id().to_string(),
            order,
        })
    }

    /// Verifies the checkout signature and marks the order paid.
    pub async fn verify(&self, pool: &SqlitePool, req: &VerifyPaymentRequest) -> AppResult<Order> {
        if self.key_secret.is_empty() {
            return Err(PaymentError::NotConfigured.into());
        }
        if !verify_payment_signature(
            &self.key_secret,
            &req.razorpay_order_id,
            &req.razorpay_payment_id,
            &req.razorpay_signature,
        ) {
            tracing::warn!(order_id = %req.order_id, "Rejected payment with invalid signature");
            return Err(AppError::BadRequest("Invalid payment signature".into()));
        }

        let order = orders::find_by_id(pool, &req.order_id).await?;
        if order.payment_status == PaymentStatus::Completed {
            return Err(AppError::Conflict("Order has already been paid".into()));
        }
        // Only the gateway order opened for this shop order can settle it
        if order.razorpay_order_id.as_deref() != Some(req.razorpay_order_id.as_str()) {
            return Err(AppError::BadRequest("Payment does not belong to this order".into()));
        }

        orders::mark_paid(pool, &order.id, &req.razorpay_order_id, &req.razorpay_payment_id, &req.razorpay_signature)
            .await
    }
}
