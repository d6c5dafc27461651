use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{validation, AppError, AppResult, FieldError};
use crate::middleware::validation::Validate;

// ---------------------------------------------------------------------------
// Order and payment states
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// States whose totals count as revenue.
    pub const REVENUE: [OrderStatus; 4] =
        [OrderStatus::Paid, OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered];
    /// States of orders that still need work.
    pub const ACTIVE: [OrderStatus; 4] =
        [OrderStatus::Pending, OrderStatus::Paid, OrderStatus::Processing, OrderStatus::Shipped];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "PAID" => Ok(OrderStatus::Paid),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "REFUNDED" => Ok(OrderStatus::Refunded),
            other => Err(AppError::Internal(anyhow::anyhow!("unknown order status in store: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "COMPLETED" => Ok(PaymentStatus::Completed),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(AppError::Internal(anyhow::anyhow!("unknown payment status in store: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// ---------------------------------------------------------------------------
// Catalogue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub id: String,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: f64,
    pub sale_price: Option<f64>,
    pub sku: String,
    pub stock: i64,
    pub category_id: String,
    pub category: CategorySummary,
    pub image_url: Option<String>,
    pub images: Vec<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Price charged per unit: the sale price when one is set.
    pub fn effective_price(&self) -> f64 {
        self.sale_price.unwrap_or(self.price)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub image_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

fn default_country() -> String {
    "India".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub address_line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    #[serde(default = "default_country")]
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub sku: String,
    pub price: f64,
    pub quantity: i64,
    pub total: f64,
    pub product: Option<ProductSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub tracking_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderItem>,
    pub subtotal: f64,
    pub shipping_cost: f64,
    pub tax: f64,
    pub discount: f64,
    pub total: f64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub status_history: Vec<StatusHistoryEntry>,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_revenue: f64,
    pub total_orders: i64,
    pub active_orders: i64,
    pub avg_order_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStat {
    /// `YYYY-MM-DD` in UTC.
    pub date: String,
    pub revenue: f64,
    pub orders: i64,
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Identity embedded in every admin token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminPayload {
    pub id: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub admin: AdminPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> AppResult<()> {
        let mut errors = Vec::new();
        validation::email(&mut errors, "email", &self.email);
        if self.password.is_empty() {
            errors.push(FieldError::new("password", "Must not be empty"));
        }
        finish(errors)
    }
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrderResponse {
    pub razorpay_order_id: String,
    /// Amount in the smallest currency unit (paise).
    pub amount: i64,
    pub currency: String,
    /// Public key id the checkout widget needs.
    pub key_id: String,
    pub order: Order,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    pub order_id: String,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

impl Validate for VerifyPaymentRequest {
    fn validate(&self) -> AppResult<()> {
        let mut errors = Vec::new();
        validation::uuid(&mut errors, "orderId", &self.order_id);
        validation::length(&mut errors, "razorpayOrderId", &self.razorpay_order_id, 1, 100);
        validation::length(&mut errors, "razorpayPaymentId", &self.razorpay_payment_id, 1, 100);
        validation::length(&mut errors, "razorpaySignature", &self.razorpay_signature, 1, 256);
        finish(errors)
    }
}

// ---------------------------------------------------------------------------
// Request bodies and queries
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

fn default_featured_limit() -> u32 {
    10
}

fn default_days() -> u32 {
    90
}

fn finish(errors: Vec<FieldError>) -> AppResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

fn check_page(errors: &mut Vec<FieldError>, page: u32, limit: u32) {
    if page == 0 {
        errors.push(FieldError::new("page", "Must be a positive integer"));
    }
    if limit == 0 || limit > 100 {
        errors.push(FieldError::new("limit", "Must be between 1 and 100"));
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl Validate for CreateCategoryRequest {
    fn validate(&self) -> AppResult<()> {
        let mut errors = Vec::new();
        validation::length(&mut errors, "name", &self.name, 1, 100);
        validation::slug(&mut errors, "slug", &self.slug);
        if let Some(url) = &self.image_url {
            validation::http_url(&mut errors, "imageUrl", url);
        }
        finish(errors)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: f64,
    pub sale_price: Option<f64>,
    pub sku: String,
    #[serde(default)]
    pub stock: i64,
    pub category_id: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    pub metadata: Option<Map<String, Value>>,
}

impl Validate for CreateProductRequest {
    fn validate(&self) -> AppResult<()> {
        let mut errors = Vec::new();
        validation::length(&mut errors, "name", &self.name, 1, 200);
        validation::slug(&mut errors, "slug", &self.slug);
        validation::positive(&mut errors, "price", self.price);
        if let Some(sale) = self.sale_price {
            validation::positive(&mut errors, "salePrice", sale);
        }
        validation::length(&mut errors, "sku", &self.sku, 1, 100);
        if self.stock < 0 {
            errors.push(FieldError::new("stock", "Must be zero or greater"));
        }
        validation::uuid(&mut errors, "categoryId", &self.category_id);
        if let Some(url) = &self.image_url {
            validation::http_url(&mut errors, "imageUrl", url);
        }
        for (i, url) in self.images.iter().enumerate() {
            validation::http_url(&mut errors, &format!("images.{}", i), url);
        }
        finish(errors)
    }
}

/// Maps a present field to `Some(value)`, so an explicit `null` becomes
/// `Some(None)` while an absent field stays `None` via `#[serde(default)]`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial product update; absent fields are left unchanged.
///
/// The nullable columns use `Option<Option<T>>`: the outer option is field
/// presence, the inner one the new value, so `null` clears them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "nullable")]
    pub sale_price: Option<Option<f64>>,
    pub sku: Option<String>,
    pub stock: Option<i64>,
    pub category_id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub image_url: Option<Option<String>>,
    pub images: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub metadata: Option<Option<Map<String, Value>>>,
}

impl UpdateProductRequest {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.slug.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.sale_price.is_none()
            && self.sku.is_none()
            && self.stock.is_none()
            && self.category_id.is_none()
            && self.image_url.is_none()
            && self.images.is_none()
            && self.is_active.is_none()
            && self.is_featured.is_none()
            && self.metadata.is_none()
    }
}

impl Validate for UpdateProductRequest {
    fn validate(&self) -> AppResult<()> {
        if self.is_empty() {
            return Err(AppError::BadRequest("Update must change at least one field".into()));
        }
        let mut errors = Vec::new();
        if let Some(name) = &self.name {
            validation::length(&mut errors, "name", name, 1, 200);
        }
        if let Some(slug) = &self.slug {
            validation::slug(&mut errors, "slug", slug);
        }
        if let Some(price) = self.price {
            validation::positive(&mut errors, "price", price);
        }
        if let Some(Some(sale)) = self.sale_price {
            validation::positive(&mut errors, "salePrice", sale);
        }
        if let Some(sku) = &self.sku {
            validation::length(&mut errors, "sku", sku, 1, 100);
        }
        if matches!(self.stock, Some(s) if s < 0) {
            errors.push(FieldError::new("stock", "Must be zero or greater"));
        }
        if let Some(id) = &self.category_id {
            validation::uuid(&mut errors, "categoryId", id);
        }
        if let Some(Some(url)) = &self.image_url {
            validation::http_url(&mut errors, "imageUrl", url);
        }
        if let Some(images) = &self.images {
            for (i, url) in images.iter().enumerate() {
                validation::http_url(&mut errors, &format!("images.{}", i), url);
            }
        }
        finish(errors)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProductSort {
    Price,
    Name,
    #[default]
    CreatedAt,
}

impl ProductSort {
    /// Column name; only ever one of a fixed set, safe to splice into SQL.
    pub fn column(&self) -> &'static str {
        match self {
            ProductSort::Price => "p.price",
            ProductSort::Name => "p.name",
            ProductSort::CreatedAt => "p.created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub category_id: Option<String>,
    pub search: Option<String>,
    pub is_featured: Option<bool>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub sort_by: ProductSort,
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl Default for ProductListQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            category_id: None,
            search: None,
            is_featured: None,
            is_active: true,
            sort_by: ProductSort::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl Validate for ProductListQuery {
    fn validate(&self) -> AppResult<()> {
        let mut errors = Vec::new();
        check_page(&mut errors, self.page, self.limit);
        if let Some(id) = &self.category_id {
            validation::uuid(&mut errors, "categoryId", id);
        }
        if matches!(&self.search, Some(s) if s.chars().count() > 100) {
            errors.push(FieldError::new("search", "Must be at most 100 characters"));
        }
        finish(errors)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeaturedQuery {
    #[serde(default = "default_featured_limit")]
    pub limit: u32,
}

impl Validate for FeaturedQuery {
    fn validate(&self) -> AppResult<()> {
        let mut errors = Vec::new();
        check_page(&mut errors, 1, self.limit);
        finish(errors)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl Validate for PaginationQuery {
    fn validate(&self) -> AppResult<()> {
        let mut errors = Vec::new();
        check_page(&mut errors, self.page, self.limit);
        finish(errors)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsQuery {
    #[serde(default = "default_days")]
    pub days: u32,
}

impl Validate for AnalyticsQuery {
    fn validate(&self) -> AppResult<()> {
        if self.days == 0 || self.days > 365 {
            return Err(AppError::invalid("days", "Must be between 1 and 365"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemInput {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderItemInput>,
    pub notes: Option<String>,
}

impl Validate for CreateOrderRequest {
    fn validate(&self) -> AppResult<()> {
        let mut errors = Vec::new();
        validation::length(&mut errors, "customerName", &self.customer_name, 1, 100);
        validation::email(&mut errors, "customerEmail", &self.customer_email);
        validation::length(&mut errors, "customerPhone", &self.customer_phone, 10, 15);

        let addr = &self.shipping_address;
        validation::length(&mut errors, "shippingAddress.fullName", &addr.full_name, 1, 100);
        validation::length(&mut errors, "shippingAddress.phone", &addr.phone, 10, 15);
        validation::length(&mut errors, "shippingAddress.addressLine1", &addr.address_line1, 1, 200);
        if let Some(line2) = &addr.address_line2 {
            validation::length(&mut errors, "shippingAddress.addressLine2", line2, 0, 200);
        }
        validation::length(&mut errors, "shippingAddress.city", &addr.city, 1, 100);
        validation::length(&mut errors, "shippingAddress.state", &addr.state, 1, 100);
        validation::length(&mut errors, "shippingAddress.pincode", &addr.pincode, 6, 10);
        validation::length(&mut errors, "shippingAddress.country", &addr.country, 1, 100);

        if self.items.is_empty() {
            errors.push(FieldError::new("items", "Order must contain at least one item"));
        }
        let mut seen = std::collections::HashSet::new();
        for (i, item) in self.items.iter().enumerate() {
            validation::uuid(&mut errors, &format!("items.{}.productId", i), &item.product_id);
            if item.quantity <= 0 {
                errors.push(FieldError::new(format!("items.{}.quantity", i), "Must be a positive integer"));
            }
            if !seen.insert(item.product_id.as_str()) {
                errors.push(FieldError::new(format!("items.{}.productId", i), "Duplicate product in order"));
            }
        }
        if matches!(&self.notes, Some(n) if n.chars().count() > 1000) {
            errors.push(FieldError::new("notes", "Must be at most 1000 characters"));
        }
        finish(errors)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
}

impl Validate for UpdateOrderStatusRequest {
    fn validate(&self) -> AppResult<()> {
        let mut errors = Vec::new();
        if let Some(tn) = &self.tracking_number {
            validation::length(&mut errors, "trackingNumber", tn, 1, 100);
        }
        if matches!(&self.notes, Some(n) if n.chars().count() > 500) {
            errors.push(FieldError::new("notes", "Must be at most 500 characters"));
        }
        finish(errors)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevEmailRequest {
    pub email: String,
}

impl Validate for DevEmailRequest {
    fn validate(&self) -> AppResult<()> {
        let mut errors = Vec::new();
        validation::email(&mut errors, "email", &self.email);
        finish(errors)
    }
}
