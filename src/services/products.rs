//! Catalogue queries. Filters are assembled with `QueryBuilder`; the sort
//! column comes from a closed enum and is the only spliced fragment.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::error::{AppError, AppResult, OptionExt};
use crate::response::Pagination;
use crate::services::categories;
use crate::types::{CategorySummary, CreateProductRequest, Product, ProductListQuery, UpdateProductRequest};

const SELECT_PRODUCT: &str = "SELECT p.id, p.name, p.slug, p.description, p.price, p.sale_price, p.sku, \
     p.stock, p.category_id, p.image_url, p.images, p.metadata, p.is_active, p.is_featured, \
     p.created_at, p.updated_at, c.name AS category_name, c.slug AS category_slug \
     FROM products p JOIN categories c ON c.id = p.category_id";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    slug: String,
    description: Option<String>,
    price: f64,
    sale_price: Option<f64>,
    sku: String,
    stock: i64,
    category_id: String,
    image_url: Option<String>,
    images: String,
    metadata: Option<String>,
    is_active: bool,
    is_featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    category_name: String,
    category_slug: String,
}

impl TryFrom<ProductRow> for Product {
    type Error = AppError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let images: Vec<String> = serde_json::from_str(&row.images)?;
        let metadata: Option<Value> = row.metadata.as_deref().map(serde_json::from_str).transpose()?;
        Ok(Product {
            category: CategorySummary { id: row.category_id.clone(), name: row.category_name, slug: row.category_slug },
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            price: row.price,
            sale_price: row.sale_price,
            sku: row.sku,
            stock: row.stock,
            category_id: row.category_id,
            image_url: row.image_url,
            images,
            is_active: row.is_active,
            is_featured: row.is_featured,
            metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_products(rows: Vec<ProductRow>) -> AppResult<Vec<Product>> {
    rows.into_iter().map(Product::try_from).collect()
}

/// Escapes `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, q: &ProductListQuery) {
    qb.push(" WHERE p.is_active = ").push_bind(q.is_active);
    if let Some(category_id) = &q.category_id {
        qb.push(" AND p.category_id = ").push_bind(category_id.clone());
    }
    if let Some(featured) = q.is_featured {
        qb.push(" AND p.is_featured = ").push_bind(featured);
    }
    if let Some(search) = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
        qb.push(" AND (LOWER(p.name) LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR LOWER(COALESCE(p.description, '')) LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR LOWER(p.sku) LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

pub async fn list(pool: &SqlitePool, q: &ProductListQuery) -> AppResult<(Vec<Product>, Pagination)> {
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM products p");
    push_filters(&mut count, q);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut select = QueryBuilder::<Sqlite>::new(SELECT_PRODUCT);
    push_filters(&mut select, q);
    select
        .push(format!(" ORDER BY {} {}, p.id ASC", q.sort_by.column(), q.sort_order.keyword()))
        .push(" LIMIT ")
        .push_bind(i64::from(q.limit))
        .push(" OFFSET ")
        .push_bind(Pagination::offset(q.page, q.limit));
    let rows: Vec<ProductRow> = select.build_query_as().fetch_all(pool).await?;

    Ok((into_products(rows)?, Pagination::new(q.page, q.limit, total)))
}

pub async fn featured(pool: &SqlitePool, limit: u32) -> AppResult<Vec<Product>> {
    let sql = format!(
        "{} WHERE p.is_active = 1 AND p.is_featured = 1 ORDER BY p.created_at DESC, p.id ASC LIMIT ?",
        SELECT_PRODUCT
    );
    let rows: Vec<ProductRow> = sqlx::query_as(&sql).bind(i64::from(limit)).fetch_all(pool).await?;
    into_products(rows)
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Product> {
    let sql = format!("{} WHERE p.id = ?", SELECT_PRODUCT);
    let row: Option<ProductRow> = sqlx::query_as(&sql).bind(id).fetch_optional(pool).await?;
    row.ok_or_not_found("Product")?.try_into()
}

pub async fn find_by_slug(pool: &SqlitePool, slug: &str) -> AppResult<Product> {
    let sql = format!("{} WHERE p.slug = ?", SELECT_PRODUCT);
    let row: Option<ProductRow> = sqlx::query_as(&sql).bind(slug).fetch_optional(pool).await?;
    row.ok_or_not_found("Product")?.try_into()
}

fn duplicate_to_conflict(err: sqlx::Error) -> AppError {
    match AppError::from(err) {
        AppError::Conflict(_) => AppError::Conflict("A product with this slug or SKU already exists".into()),
        other => other,
    }
}

async fn ensure_category(pool: &SqlitePool, category_id: &str) -> AppResult<()> {
    if categories::exists(pool, category_id).await? {
        Ok(())
    } else {
        Err(AppError::BadRequest("Category not found".into()))
    }
}

fn images_json(images: &[String]) -> AppResult<String> {
    Ok(serde_json::to_string(images)?)
}

fn metadata_json(metadata: Option<&serde_json::Map<String, Value>>) -> AppResult<Option<String>> {
    Ok(metadata.map(serde_json::to_string).transpose()?)
}

pub async fn create(pool: &SqlitePool, req: CreateProductRequest) -> AppResult<Product> {
    ensure_category(pool, &req.category_id).await?;

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO products (id, name, slug, description, price, sale_price, sku, stock, category_id, \
         image_url, images, metadata, is_active, is_featured, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(req.name.trim())
    .bind(&req.slug)
    .bind(&req.description)
    .bind(req.price)
    .bind(req.sale_price)
    .bind(&req.sku)
    .bind(req.stock)
    .bind(&req.category_id)
    .bind(&req.image_url)
    .bind(images_json(&req.images)?)
    .bind(metadata_json(req.metadata.as_ref())?)
    .bind(req.is_active)
    .bind(req.is_featured)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(duplicate_to_conflict)?;

    tracing::info!(product_id = %id, sku = %req.sku, "Product created");
    find_by_id(pool, &id).await
}

pub async fn update(pool: &SqlitePool, id: &str, req: UpdateProductRequest) -> AppResult<Product> {
    let current = find_by_id(pool, id).await?;
    if let Some(category_id) = req.category_id.as_deref().filter(|c| *c != current.category_id) {
        ensure_category(pool, category_id).await?;
    }

    let images = req.images.unwrap_or(current.images);
    let metadata = match req.metadata {
        Some(replacement) => replacement.map(serde_json::Value::Object),
        None => current.metadata,
    };
    let metadata = metadata.as_ref().map(serde_json::to_string).transpose()?;

    sqlx::query(
        "UPDATE products SET name = ?, slug = ?, description = ?, price = ?, sale_price = ?, sku = ?, \
         stock = ?, category_id = ?, image_url = ?, images = ?, metadata = ?, is_active = ?, \
         is_featured = ?, updated_at = ? WHERE id = ?",
    )
    .bind(req.name.map(|n| n.trim().to_string()).unwrap_or(current.name))
    .bind(req.slug.unwrap_or(current.slug))
    .bind(req.description.unwrap_or(current.description))
    .bind(req.price.unwrap_or(current.price))
    .bind(req.sale_price.unwrap_or(current.sale_price))
    .bind(req.sku.unwrap_or(current.sku))
    .bind(req.stock.unwrap_or(current.stock))
    .bind(req.category_id.unwrap_or(current.category_id))
    .bind(req.image_url.unwrap_or(current.image_url))
    .bind(images_json(&images)?)
    .bind(metadata)
    .bind(req.is_active.unwrap_or(current.is_active))
    .bind(req.is_featured.unwrap_or(current.is_featured))
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .map_err(duplicate_to_conflict)?;

    tracing::info!(product_id = %id, "Product updated");
    find_by_id(pool, id).await
}

pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<()> {
    let res = sqlx::query("DELETE FROM products WHERE id = ?").bind(id).execute(pool).await.map_err(|e| {
        if matches!(&e, sqlx::Error::Database(db) if db.is_foreign_key_violation()) {
            AppError::Conflict("Product is referenced by existing orders; deactivate it instead".into())
        } else {
            AppError::from(e)
        }
    })?;
    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("Product not found".into()));
    }
    tracing::info!(product_id = %id, "Product deleted");
    Ok(())
}
