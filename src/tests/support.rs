//! Shared fixtures for the test modules.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::ServiceExt;

use crate::config::{self, AppConfig};
use crate::db;
use crate::routes;
use crate::services::email::{EmailError, EmailService, Mailer, OutgoingEmail};
use crate::services::payments::{GatewayOrder, GatewayOrderRequest, PaymentError, PaymentGateway, PaymentService};
use crate::services::{categories, products};
use crate::state::AppState;
use crate::types::{Category, CreateCategoryRequest, CreateProductRequest, Product};

pub const ADMIN_EMAIL: &str = "admin@crestsports.test";
pub const ADMIN_PASSWORD: &str = "s3cret-admin-pass";
pub const JWT_SECRET: &str = "test-jwt-secret-that-is-long-enough-0123";
pub const PAYMENT_KEY_ID: &str = "rzp_test_key";
pub const PAYMENT_SECRET: &str = "rzp_test_secret";

/// Valid config for tests: in-memory database, known credentials, payments enabled.
pub fn test_config() -> AppConfig {
    let overrides = format!(
        r#"
[app]
environment = "test"

[database]
url = "sqlite::memory:"
max_connections = 1

[security]
jwt_secret = "{JWT_SECRET}"
jwt_expires_in = "1h"
admin_email = "{ADMIN_EMAIL}"
admin_password = "{ADMIN_PASSWORD}"

[payments]
key_id = "{PAYMENT_KEY_ID}"
key_secret = "{PAYMENT_SECRET}"
"#
    );
    config::from_toml_str(&overrides).expect("test config should be valid")
}

pub async fn test_pool(cfg: &AppConfig) -> SqlitePool {
    let pool = db::connect(&cfg.database).await.unwrap();
    db::init_db(&pool).await.unwrap();
    pool
}

/// Mailer that keeps every message in memory.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<String, EmailError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(email);
        Ok(format!("msg_{}", sent.len()))
    }
}

/// Gateway that answers every order request locally.
#[derive(Default)]
pub struct FakeGateway {
    pub requests: Mutex<Vec<GatewayOrderRequest>>,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn key_id(&self) -> &str {
        PAYMENT_KEY_ID
    }

    async fn create_order(&self, request: GatewayOrderRequest) -> Result<GatewayOrder, PaymentError> {
        let mut requests = self.requests.lock().unwrap();
        let order = GatewayOrder {
            id: format!("order_TEST{}", requests.len() + 1),
            amount: request.amount,
            currency: request.currency.clone(),
        };
        requests.push(request);
        Ok(order)
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
    pub gateway: Arc<FakeGateway>,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(cfg: AppConfig) -> TestApp {
    let pool = test_pool(&cfg).await;
    let mailer = Arc::new(RecordingMailer::default());
    let gateway = Arc::new(FakeGateway::default());
    let email = EmailService::new(&cfg, mailer.clone());
    let payments = PaymentService::new(Some(gateway.clone()), &cfg.payments.key_secret, &cfg.payments.currency);
    let state = AppState::with_services(pool, cfg, email, payments);
    let router = routes::router(state.clone());
    TestApp { router, state, mailer, gateway }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn pool(&self) -> &SqlitePool {
        &self.state.db
    }

    pub fn admin_token(&self) -> String {
        self.state.auth.login(ADMIN_EMAIL, ADMIN_PASSWORD).unwrap().token
    }

    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        TestResponse { status, headers, body }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn get_as_admin(&self, uri: &str) -> TestResponse {
        let req = Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.admin_token()))
            .body(Body::empty())
            .unwrap();
        self.send(req).await
    }

    pub async fn json(&self, method: Method, uri: &str, body: &Value, token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    pub async fn post(&self, uri: &str, body: &Value) -> TestResponse {
        self.json(Method::POST, uri, body, None).await
    }
}

pub async fn seed_category(pool: &SqlitePool, slug: &str) -> Category {
    let req = CreateCategoryRequest {
        name: slug.replace('-', " "),
        slug: slug.to_string(),
        description: None,
        image_url: None,
    };
    categories::create(pool, req).await.unwrap()
}

pub async fn seed_product(pool: &SqlitePool, category_id: &str, slug: &str, price: f64, stock: i64) -> Product {
    let req: CreateProductRequest = serde_json::from_value(json!({
        "name": slug.replace('-', " "),
        "slug": slug,
        "description": format!("{} jersey", slug),
        "price": price,
        "sku": slug.to_uppercase(),
        "stock": stock,
        "categoryId": category_id,
    }))
    .unwrap();
    products::create(pool, req).await.unwrap()
}

pub fn shipping_address() -> Value {
    json!({
        "fullName": "Asha Rao",
        "phone": "9876543210",
        "addressLine1": "12 MG Road",
        "city": "Bengaluru",
        "state": "Karnataka",
        "pincode": "560001",
    })
}

/// Order body for `(product_id, quantity)` lines.
pub fn order_body(items: &[(&str, i64)]) -> Value {
    let items: Vec<Value> = items.iter().map(|(id, qty)| json!({ "productId": id, "quantity": qty })).collect();
    json!({
        "customerName": "Asha Rao",
        "customerEmail": "asha@example.com",
        "customerPhone": "9876543210",
        "shippingAddress": shipping_address(),
        "items": items,
    })
}
