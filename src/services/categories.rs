use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::types::{Category, CreateCategoryRequest};

const COLUMNS: &str = "id, name, slug, description, image_url, created_at, updated_at";

pub async fn list(pool: &SqlitePool) -> AppResult<Vec<Category>> {
    let sql = format!("SELECT {} FROM categories ORDER BY name ASC", COLUMNS);
    Ok(sqlx::query_as::<_, Category>(&sql).fetch_all(pool).await?)
}

pub async fn exists<'e>(db: impl SqliteExecutor<'e>, id: &str) -> AppResult<bool> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM categories WHERE id = ?").bind(id).fetch_optional(db).await?;
    Ok(found.is_some())
}

pub async fn create(pool: &SqlitePool, req: CreateCategoryRequest) -> AppResult<Category> {
    let now = Utc::now();
    let category = Category {
        id: Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        slug: req.slug,
        description: req.description.filter(|d| !d.trim().is_empty()),
        image_url: req.image_url,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO categories (id, name, slug, description, image_url, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&category.id)
    .bind(&category.name)
    .bind(&category.slug)
    .bind(&category.description)
    .bind(&category.image_url)
    .bind(category.created_at)
    .bind(category.updated_at)
    .execute(pool)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict(format!("Category slug '{}' is already taken", category.slug)),
        other => other,
    })?;

    tracing::info!(category_id = %category.id, slug = %category.slug, "Category created");
    Ok(category)
}
