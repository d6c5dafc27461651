use std::time::Duration;

use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqlitePool, SqlitePoolOptions},
    Sqlite,
};

use crate::config::DatabaseConfig;

/// Opens the pool, creating the SQLite file on first start.
///
/// Per-connection pragmas are applied in `after_connect` so every pooled
/// connection enforces foreign keys, not just the first one.
pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<SqlitePool> {
    let in_memory = cfg.url.contains(":memory:");
    if !in_memory && !Sqlite::database_exists(&cfg.url).await.unwrap_or(false) {
        tracing::info!("Creating SQLite database at {}", cfg.url);
        Sqlite::create_database(&cfg.url).await?;
    }

    let mut options = SqlitePoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // Foreign keys are critical - fail the connection if this doesn't work
                sqlx::query("PRAGMA foreign_keys=ON;").execute(&mut *conn).await?;
                for pragma in ["PRAGMA busy_timeout=10000;", "PRAGMA temp_store=MEMORY;"] {
                    if let Err(e) = sqlx::query(pragma).execute(&mut *conn).await {
                        tracing::warn!("Failed to apply {}: {}", pragma, e);
                    }
                }
                Ok(())
            })
        });

    // An in-memory database lives exactly as long as its connection.
    if in_memory {
        options = options.min_connections(1).idle_timeout(None).max_lifetime(None);
    }

    Ok(options.connect(&cfg.url).await?)
}

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    // Pragmas for better durability/performance
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            description TEXT NULL,
            image_url TEXT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            description TEXT NULL,
            price REAL NOT NULL CHECK (price > 0),
            sale_price REAL NULL,
            sku TEXT NOT NULL UNIQUE,
            stock INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
            category_id TEXT NOT NULL,
            image_url TEXT NULL,
            images TEXT NOT NULL DEFAULT '[]',
            metadata TEXT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            is_featured INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(category_id) REFERENCES categories(id) ON DELETE RESTRICT
        )"#,
    )
    .execute(pool)
    .await?;

    // shipping_address and status_history hold JSON documents
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            tracking_id TEXT NOT NULL UNIQUE,
            customer_name TEXT NOT NULL,
            customer_email TEXT NOT NULL,
            customer_phone TEXT NOT NULL,
            shipping_address TEXT NOT NULL,
            subtotal REAL NOT NULL,
            shipping_cost REAL NOT NULL,
            tax REAL NOT NULL DEFAULT 0,
            discount REAL NOT NULL DEFAULT 0,
            total REAL NOT NULL,
            status TEXT NOT NULL,
            payment_status TEXT NOT NULL,
            status_history TEXT NOT NULL DEFAULT '[]',
            notes TEXT NULL,
            tracking_number TEXT NULL,
            razorpay_order_id TEXT NULL,
            razorpay_payment_id TEXT NULL,
            razorpay_signature TEXT NULL,
            paid_at TEXT NULL,
            shipped_at TEXT NULL,
            delivered_at TEXT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS order_items (
            id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL,
            product_id TEXT NOT NULL,
            name TEXT NOT NULL,
            sku TEXT NOT NULL,
            price REAL NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            total REAL NOT NULL,
            FOREIGN KEY(order_id) REFERENCES orders(id) ON DELETE CASCADE,
            FOREIGN KEY(product_id) REFERENCES products(id) ON DELETE RESTRICT
        )"#,
    )
    .execute(pool)
    .await?;

    let indexes = [
        ("idx_products_category", "CREATE INDEX IF NOT EXISTS idx_products_category ON products(category_id)"),
        (
            "idx_products_active_created",
            "CREATE INDEX IF NOT EXISTS idx_products_active_created ON products(is_active, created_at DESC)",
        ),
        (
            "idx_products_featured",
            "CREATE INDEX IF NOT EXISTS idx_products_featured ON products(is_featured, is_active)",
        ),
        ("idx_orders_created", "CREATE INDEX IF NOT EXISTS idx_orders_created ON orders(created_at DESC)"),
        ("idx_orders_status", "CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)"),
        ("idx_orders_razorpay", "CREATE INDEX IF NOT EXISTS idx_orders_razorpay ON orders(razorpay_order_id)"),
        ("idx_order_items_order", "CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items(order_id)"),
        ("idx_order_items_product", "CREATE INDEX IF NOT EXISTS idx_order_items_product ON order_items(product_id)"),
    ];

    for (name, query) in indexes {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            tracing::warn!("Failed to create index {}: {}", name, e);
        }
    }

    Ok(())
}

/// Cheap liveness probe used by the health endpoint.
pub async fn ping(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}
