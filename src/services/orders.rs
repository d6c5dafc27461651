//! Order placement, lookup, status changes and dashboard aggregates.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::error::{AppError, AppResult, OptionExt};
use crate::response::Pagination;
use crate::types::{
    CreateOrderRequest, DailyStat, DashboardStats, Order, OrderItem, OrderStatus, PaymentStatus, ProductSummary,
    ShippingAddress, StatusHistoryEntry, UpdateOrderStatusRequest,
};

const TRACKING_PREFIX: &str = "TRK-";
const TRACKING_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const TRACKING_LEN: usize = 12;

/// Order-level knobs taken from `[orders]` config.
#[derive(Debug, Clone, Copy)]
pub struct OrderSettings {
    pub shipping_cost: f64,
    pub skip_payment: bool,
}

/// `TRK-` followed by 12 uppercase alphanumerics.
pub fn generate_tracking_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..TRACKING_LEN)
        .map(|_| TRACKING_CHARSET[rng.random_range(0..TRACKING_CHARSET.len())] as char)
        .collect();
    format!("{}{}", TRACKING_PREFIX, suffix)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn status_list(statuses: &[OrderStatus]) -> String {
    statuses.iter().map(|s| format!("'{}'", s.as_str())).collect::<Vec<_>>().join(", ")
}

const ORDER_COLUMNS: &str = "id, tracking_id, customer_name, customer_email, customer_phone, shipping_address, \
     subtotal, shipping_cost, tax, discount, total, status, payment_status, status_history, notes, \
     tracking_number, razorpay_order_id, razorpay_payment_id, paid_at, shipped_at, delivered_at, \
     created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: String,
    tracking_id: String,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    shipping_address: String,
    subtotal: f64,
    shipping_cost: f64,
    tax: f64,
    discount: f64,
    total: f64,
    status: String,
    payment_status: String,
    status_history: String,
    notes: Option<String>,
    tracking_number: Option<String>,
    razorpay_order_id: Option<String>,
    razorpay_payment_id: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> AppResult<Order> {
        let shipping_address: ShippingAddress = serde_json::from_str(&self.shipping_address)?;
        let status_history: Vec<StatusHistoryEntry> = serde_json::from_str(&self.status_history)?;
        Ok(Order {
            id: self.id,
            tracking_id: self.tracking_id,
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            customer_phone: self.customer_phone,
            shipping_address,
            items,
            subtotal: self.subtotal,
            shipping_cost: self.shipping_cost,
            tax: self.tax,
            discount: self.discount,
            total: self.total,
            status: self.status.parse()?,
            payment_status: self.payment_status.parse()?,
            status_history,
            notes: self.notes,
            tracking_number: self.tracking_number,
            razorpay_order_id: self.razorpay_order_id,
            razorpay_payment_id: self.razorpay_payment_id,
            paid_at: self.paid_at,
            shipped_at: self.shipped_at,
            delivered_at: self.delivered_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: String,
    order_id: String,
    product_id: String,
    name: String,
    sku: String,
    price: f64,
    quantity: i64,
    total: f64,
    product_name: Option<String>,
    product_slug: Option<String>,
    product_image_url: Option<String>,
}

impl From<ItemRow> for OrderItem {
    fn from(row: ItemRow) -> Self {
        let product = match (row.product_name, row.product_slug) {
            (Some(name), Some(slug)) => Some(ProductSummary {
                id: row.product_id.clone(),
                name,
                slug,
                image_url: row.product_image_url,
            }),
            _ => None,
        };
        OrderItem {
            id: row.id,
            product_id: row.product_id,
            name: row.name,
            sku: row.sku,
            price: row.price,
            quantity: row.quantity,
            total: row.total,
            product,
        }
    }
}

async fn load_items(pool: &SqlitePool, order_ids: &[String]) -> AppResult<HashMap<String, Vec<OrderItem>>> {
    let mut grouped: HashMap<String, Vec<OrderItem>> = HashMap::new();
    if order_ids.is_empty() {
        return Ok(grouped);
    }
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT oi.id, oi.order_id, oi.product_id, oi.name, oi.sku, oi.price, oi.quantity, oi.total, \
         p.name AS product_name, p.slug AS product_slug, p.image_url AS product_image_url \
         FROM order_items oi LEFT JOIN products p ON p.id = oi.product_id WHERE oi.order_id IN (",
    );
    let mut ids = qb.separated(", ");
    for id in order_ids {
        ids.push_bind(id.clone());
    }
    qb.push(") ORDER BY oi.rowid ASC");

    let rows: Vec<ItemRow> = qb.build_query_as().fetch_all(pool).await?;
    for row in rows {
        grouped.entry(row.order_id.clone()).or_default().push(row.into());
    }
    Ok(grouped)
}

async fn hydrate(pool: &SqlitePool, rows: Vec<OrderRow>) -> AppResult<Vec<Order>> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let mut items = load_items(pool, &ids).await?;
    rows.into_iter()
        .map(|row| {
            let order_items = items.remove(&row.id).unwrap_or_default();
            row.into_order(order_items)
        })
        .collect()
}

async fn find_one(pool: &SqlitePool, column: &str, value: &str) -> AppResult<Order> {
    let sql = format!("SELECT {} FROM orders WHERE {} = ?", ORDER_COLUMNS, column);
    let row: Option<OrderRow> = sqlx::query_as(&sql).bind(value).fetch_optional(pool).await?;
    let row = row.ok_or_not_found("Order")?;
    hydrate(pool, vec![row]).await?.pop().ok_or_not_found("Order")
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Order> {
    find_one(pool, "id", id).await
}

pub async fn find_by_tracking_id(pool: &SqlitePool, tracking_id: &str) -> AppResult<Order> {
    find_one(pool, "tracking_id", tracking_id).await
}

pub async fn list(pool: &SqlitePool, page: u32, limit: u32) -> AppResult<(Vec<Order>, Pagination)> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders").fetch_one(pool).await?;
    let sql = format!("SELECT {} FROM orders ORDER BY created_at DESC, id ASC LIMIT ? OFFSET ?", ORDER_COLUMNS);
    let rows: Vec<OrderRow> = sqlx::query_as(&sql)
        .bind(i64::from(limit))
        .bind(Pagination::offset(page, limit))
        .fetch_all(pool)
        .await?;
    Ok((hydrate(pool, rows).await?, Pagination::new(page, limit, total)))
}

#[derive(sqlx::FromRow)]
struct StockRow {
    id: String,
    name: String,
    sku: String,
    price: f64,
    sale_price: Option<f64>,
    stock: i64,
    is_active: bool,
}

struct PricedLine {
    id: String,
    product_id: String,
    name: String,
    sku: String,
    price: f64,
    quantity: i64,
    total: f64,
}

/// Places an order. Stock is checked and decremented inside one transaction;
/// either every line is reserved and the order exists, or nothing changes.
pub async fn create(pool: &SqlitePool, settings: OrderSettings, req: CreateOrderRequest) -> AppResult<Order> {
    let mut tx = pool.begin().await?;

    let mut products = Vec::with_capacity(req.items.len());
    for item in &req.items {
        let row: Option<StockRow> = sqlx::query_as(
            "SELECT id, name, sku, price, sale_price, stock, is_active FROM products WHERE id = ?",
        )
        .bind(&item.product_id)
        .fetch_optional(&mut *tx)
        .await?;
        match row {
            Some(p) if p.is_active => products.push(p),
            _ => return Err(AppError::BadRequest("One or more products not found or inactive".into())),
        }
    }

    for (item, product) in req.items.iter().zip(&products) {
        if product.stock < item.quantity {
            return Err(AppError::BadRequest(format!("Insufficient stock for product: {}", product.name)));
        }
    }

    let lines: Vec<PricedLine> = req
        .items
        .iter()
        .zip(&products)
        .map(|(item, product)| {
            let price = product.sale_price.unwrap_or(product.price);
            PricedLine {
                id: Uuid::new_v4().to_string(),
                product_id: product.id.clone(),
                name: product.name.clone(),
                sku: product.sku.clone(),
                price,
                quantity: item.quantity,
                total: round2(price * item.quantity as f64),
            }
        })
        .collect();

    let subtotal = round2(lines.iter().map(|l| l.total).sum());
    let shipping_cost = settings.shipping_cost;
    let tax = 0.0;
    let discount = 0.0;
    let total = round2(subtotal + shipping_cost + tax - discount);

    let now = Utc::now();
    let mut history = vec![StatusHistoryEntry {
        status: OrderStatus::Pending,
        timestamp: now,
        note: Some("Order created".into()),
    }];
    let (status, payment_status, paid_at) = if settings.skip_payment {
        history.push(StatusHistoryEntry {
            status: OrderStatus::Paid,
            timestamp: now,
            note: Some("Payment skipped".into()),
        });
        (OrderStatus::Paid, PaymentStatus::Completed, Some(now))
    } else {
        (OrderStatus::Pending, PaymentStatus::Pending, None)
    };

    for line in &lines {
        let res = sqlx::query("UPDATE products SET stock = stock - ?, updated_at = ? WHERE id = ? AND stock >= ?")
            .bind(line.quantity)
            .bind(now)
            .bind(&line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        if res.rows_affected() == 0 {
            return Err(AppError::BadRequest(format!("Insufficient stock for product: {}", line.name)));
        }
    }

    let order_id = Uuid::new_v4().to_string();
    let tracking_id = generate_tracking_id();
    let notes = req.notes.filter(|n| !n.trim().is_empty());
    sqlx::query(
        "INSERT INTO orders (id, tracking_id, customer_name, customer_email, customer_phone, shipping_address, \
         subtotal, shipping_cost, tax, discount, total, status, payment_status, status_history, notes, \
         paid_at, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&order_id)
    .bind(&tracking_id)
    .bind(req.customer_name.trim())
    .bind(req.customer_email.trim())
    .bind(req.customer_phone.trim())
    .bind(serde_json::to_string(&req.shipping_address)?)
    .bind(subtotal)
    .bind(shipping_cost)
    .bind(tax)
    .bind(discount)
    .bind(total)
    .bind(status.as_str())
    .bind(payment_status.as_str())
    .bind(serde_json::to_string(&history)?)
    .bind(&notes)
    .bind(paid_at)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    for line in &lines {
        sqlx::query(
            "INSERT INTO order_items (id, order_id, product_id, name, sku, price, quantity, total) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&line.id)
        .bind(&order_id)
        .bind(&line.product_id)
        .bind(&line.name)
        .bind(&line.sku)
        .bind(line.price)
        .bind(line.quantity)
        .bind(line.total)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::info!(order_id = %order_id, tracking_id = %tracking_id, total, items = lines.len(), "Order created");

    find_by_id(pool, &order_id).await
}

/// Appends `entry` to the JSON history column in the same statement as the update.
const APPEND_HISTORY: &str = "status_history = json_insert(status_history, '$[#]', json(?))";

pub async fn update_status(pool: &SqlitePool, id: &str, req: UpdateOrderStatusRequest) -> AppResult<Order> {
    let now = Utc::now();
    let entry = StatusHistoryEntry {
        status: req.status,
        timestamp: now,
        note: Some(
            req.notes
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| format!("Status updated to {}", req.status)),
        ),
    };
    let shipped_at = (req.status == OrderStatus::Shipped).then_some(now);
    let delivered_at = (req.status == OrderStatus::Delivered).then_some(now);

    let sql = format!(
        "UPDATE orders SET status = ?, {}, tracking_number = COALESCE(?, tracking_number), \
         shipped_at = COALESCE(?, shipped_at), delivered_at = COALESCE(?, delivered_at), updated_at = ? \
         WHERE id = ?",
        APPEND_HISTORY
    );
    let res = sqlx::query(&sql)
        .bind(req.status.as_str())
        .bind(serde_json::to_string(&entry)?)
        .bind(req.tracking_number.as_deref().map(str::trim))
        .bind(shipped_at)
        .bind(delivered_at)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("Order not found".into()));
    }

    tracing::info!(order_id = %id, status = %req.status, "Order status updated");
    find_by_id(pool, id).await
}

pub async fn attach_gateway_order(pool: &SqlitePool, id: &str, gateway_order_id: &str) -> AppResult<()> {
    sqlx::query("UPDATE orders SET razorpay_order_id = ?, updated_at = ? WHERE id = ?")
        .bind(gateway_order_id)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Records a verified payment against the gateway order attached to `id`.
/// Guarded so a second verification cannot append a duplicate history entry.
pub async fn mark_paid(
    pool: &SqlitePool,
    id: &str,
    gateway_order_id: &str,
    payment_id: &str,
    signature: &str,
) -> AppResult<Order> {
    let now = Utc::now();
    let entry = StatusHistoryEntry {
        status: OrderStatus::Paid,
        timestamp: now,
        note: Some("Payment completed successfully".into()),
    };
    let sql = format!(
        "UPDATE orders SET status = ?, payment_status = ?, {}, razorpay_payment_id = ?, razorpay_signature = ?, \
         paid_at = ?, updated_at = ? WHERE id = ? AND razorpay_order_id = ? AND payment_status != ?",
        APPEND_HISTORY
    );
    let res = sqlx::query(&sql)
        .bind(OrderStatus::Paid.as_str())
        .bind(PaymentStatus::Completed.as_str())
        .bind(serde_json::to_string(&entry)?)
        .bind(payment_id)
        .bind(signature)
        .bind(now)
        .bind(now)
        .bind(id)
        .bind(gateway_order_id)
        .bind(PaymentStatus::Completed.as_str())
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        let current = find_by_id(pool, id).await?;
        if current.payment_status == PaymentStatus::Completed {
            return Err(AppError::Conflict("Order has already been paid".into()));
        }
        return Err(AppError::BadRequest("Payment does not belong to this order".into()));
    }

    tracing::info!(order_id = %id, payment_id = %payment_id, "Payment recorded");
    find_by_id(pool, id).await
}

pub async fn stats(pool: &SqlitePool) -> AppResult<DashboardStats> {
    let revenue = status_list(&OrderStatus::REVENUE);
    let active = status_list(&OrderStatus::ACTIVE);
    let sql = format!(
        "SELECT \
            COALESCE(SUM(CASE WHEN status IN ({revenue}) THEN total END), 0.0), \
            COUNT(*), \
            COUNT(CASE WHEN status IN ({active}) THEN 1 END), \
            COUNT(CASE WHEN status IN ({revenue}) THEN 1 END) \
         FROM orders"
    );
    let (total_revenue, total_orders, active_orders, paid_orders): (f64, i64, i64, i64) =
        sqlx::query_as(&sql).fetch_one(pool).await?;

    let avg_order_value = if paid_orders > 0 { round2(total_revenue / paid_orders as f64) } else { 0.0 };
    Ok(DashboardStats { total_revenue: round2(total_revenue), total_orders, active_orders, avg_order_value })
}

/// Revenue and order counts per UTC day for the window `[now - days, now]`,
/// one entry per calendar day including both ends, zero-filled.
pub async fn analytics(pool: &SqlitePool, days: u32, now: DateTime<Utc>) -> AppResult<Vec<DailyStat>> {
    let start = now - Duration::days(i64::from(days));
    let sql = format!(
        "SELECT created_at, total FROM orders WHERE created_at >= ? AND status IN ({}) ORDER BY created_at ASC",
        status_list(&OrderStatus::REVENUE)
    );
    let rows: Vec<(DateTime<Utc>, f64)> = sqlx::query_as(&sql).bind(start).fetch_all(pool).await?;

    let mut buckets: HashMap<chrono::NaiveDate, (f64, i64)> = HashMap::new();
    for (created_at, total) in rows {
        let slot = buckets.entry(created_at.date_naive()).or_insert((0.0, 0));
        slot.0 += total;
        slot.1 += 1;
    }

    let first = start.date_naive();
    Ok((0..=i64::from(days))
        .map(|offset| {
            let day = first + Duration::days(offset);
            let (revenue, orders) = buckets.get(&day).copied().unwrap_or((0.0, 0));
            DailyStat { date: day.format("%Y-%m-%d").to_string(), revenue: round2(revenue), orders }
        })
        .collect())
}
