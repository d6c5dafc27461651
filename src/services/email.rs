//! Transactional email: order confirmations over the Resend HTTP API.

use std::sync::Arc;
use std::time::Duration;

use askama::Template;
use async_trait::async_trait;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::types::{Order, ShippingAddress};

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email delivery is not configured")]
    Disabled,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

impl From<EmailError> for AppError {
    fn from(err: EmailError) -> Self {
        match err {
            EmailError::Disabled => AppError::ServiceUnavailable("Email delivery is not configured".into()),
            EmailError::Template(e) => AppError::Internal(anyhow::Error::new(e).context("email template failed")),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

/// A rendered message ready for delivery.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

/// Delivery backend. Returns the provider's message id.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<String, EmailError>;
}

/// Mailer used when no API key is configured.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<String, EmailError> {
        tracing::debug!(subject = %email.subject, "Email delivery disabled, dropping message");
        Err(EmailError::Disabled)
    }
}

pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

#[derive(Deserialize)]
struct ResendResponse {
    id: String,
}

impl ResendMailer {
    pub fn new(api_key: &str, api_base: &str) -> Result<Self, EmailError> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            endpoint: format!("{}/emails", api_base.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<String, EmailError> {
        let res = self.client.post(&self.endpoint).bearer_auth(&self.api_key).json(&email).send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(EmailError::Rejected { status: status.as_u16(), body });
        }
        let parsed: ResendResponse = res.json().await?;
        Ok(parsed.id)
    }
}

struct EmailLine {
    name: String,
    quantity: i64,
    total: String,
    image_url: String,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationEmail<'a> {
    first_name: &'a str,
    tracking_id: &'a str,
    track_url: String,
    lines: Vec<EmailLine>,
    subtotal: String,
    shipping: String,
    total: String,
    address: &'a ShippingAddress,
    address_line2: &'a str,
    year: i32,
}

fn rupees(amount: f64) -> String {
    format!("₹{:.2}", amount)
}

#[derive(Clone)]
pub struct EmailService {
    mailer: Arc<dyn Mailer>,
    from: String,
    reply_to: Option<String>,
    public_url: String,
}

impl EmailService {
    pub fn new(cfg: &AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            mailer,
            from: cfg.email.from.clone(),
            reply_to: cfg.email.reply_to.clone(),
            public_url: cfg.app.public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Picks the Resend mailer when an API key is configured.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let mailer: Arc<dyn Mailer> = if cfg.email.api_key.is_empty() {
            tracing::warn!("email.api_key not set, order confirmations will not be sent");
            Arc::new(DisabledMailer)
        } else {
            Arc::new(ResendMailer::new(&cfg.email.api_key, &cfg.email.api_base)?)
        };
        Ok(Self::new(cfg, mailer))
    }

    pub fn render_order_confirmation(&self, order: &Order) -> Result<String, EmailError> {
        let first_name = order.customer_name.split_whitespace().next().unwrap_or(&order.customer_name);
        let track_url = format!("{}/track-order?id={}", self.public_url, order.tracking_id);

        let lines = order
            .items
            .iter()
            .map(|item| EmailLine {
                name: item.name.clone(),
                quantity: item.quantity,
                total: rupees(item.total),
                image_url: item.product.as_ref().and_then(|p| p.image_url.clone()).unwrap_or_default(),
            })
            .collect();

        let template = OrderConfirmationEmail {
            first_name,
            tracking_id: &order.tracking_id,
            track_url,
            lines,
            subtotal: rupees(order.subtotal),
            shipping: if order.shipping_cost == 0.0 { "Free".to_string() } else { rupees(order.shipping_cost) },
            total: rupees(order.total),
            address: &order.shipping_address,
            address_line2: order.shipping_address.address_line2.as_deref().unwrap_or(""),
            year: chrono::Utc::now().year(),
        };
        Ok(template.render()?)
    }

    pub async fn send_order_confirmation(&self, order: &Order) -> Result<String, EmailError> {
        let html = self.render_order_confirmation(order)?;
        let id = self
            .mailer
            .send(OutgoingEmail {
                from: self.from.clone(),
                to: vec![order.customer_email.clone()],
                subject: format!("Order Confirmation - {}", order.tracking_id),
                html,
                reply_to: self.reply_to.clone(),
            })
            .await?;
        tracing::info!(tracking_id = %order.tracking_id, message_id = %id, "Order confirmation sent");
        Ok(id)
    }

    /// Plain test message for the development tools.
    pub async fn send_test(&self, to: &str) -> Result<String, EmailError> {
        self.mailer
            .send(OutgoingEmail {
                from: self.from.clone(),
                to: vec![to.to_string()],
                subject: "Test Email from CrestSports Dev".to_string(),
                html: "<h1>It works!</h1><p>This is a test email from the dev tools.</p>".to_string(),
                reply_to: None,
            })
            .await
    }
}
