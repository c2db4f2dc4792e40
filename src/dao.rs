use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::AnyPool;

use crate::types::ListingRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileInsert {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingInsert {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub images: String, // JSON array string
    pub videos: String, // JSON array string
    pub status: String,
    pub created_at: Option<String>, // ISO string; None lets the store stamp it
}

type ListingRow = (String, String, String, String, f64, String, String, String, String, String);

const LISTING_COLUMNS: &str =
    "id, user_id, title, description, price, category, images, videos, status, created_at";

fn listing_from_row(row: ListingRow) -> Result<ListingRecord> {
    let (id, user_id, title, description, price, category, images, videos, status, created_at) = row;
    let images: Vec<String> = serde_json::from_str(&images)
        .with_context(|| format!("listing {id}: images column is not a JSON array"))?;
    let videos: Vec<String> = serde_json::from_str(&videos)
        .with_context(|| format!("listing {id}: videos column is not a JSON array"))?;
    Ok(ListingRecord { id, user_id, title, description, price, category, images, videos, status, created_at })
}

pub async fn upsert_profile(pool: &AnyPool, p: &ProfileInsert) -> Result<()> {
    sqlx::query(
        "INSERT INTO profiles(id, display_name) VALUES(?, ?)\n         ON CONFLICT(id) DO UPDATE SET display_name=excluded.display_name, updated_at=CURRENT_TIMESTAMP",
    )
    .bind(&p.id)
    .bind(&p.display_name)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn insert_listing(pool: &AnyPool, l: &ListingInsert) -> Result<()> {
    match &l.created_at {
        Some(ts) => {
            sqlx::query(
                "INSERT INTO listings(id, user_id, title, description, price, category, images, videos, status, created_at)\n                 VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&l.id)
            .bind(&l.user_id)
            .bind(&l.title)
            .bind(&l.description)
            .bind(l.price)
            .bind(&l.category)
            .bind(&l.images)
            .bind(&l.videos)
            .bind(&l.status)
            .bind(ts)
            .execute(pool)
            .await?;
        }
        None => {
            sqlx::query(
                "INSERT INTO listings(id, user_id, title, description, price, category, images, videos, status)\n                 VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&l.id)
            .bind(&l.user_id)
            .bind(&l.title)
            .bind(&l.description)
            .bind(l.price)
            .bind(&l.category)
            .bind(&l.images)
            .bind(&l.videos)
            .bind(&l.status)
            .execute(pool)
            .await?;
        }
    }
    Ok(())
}

pub async fn get_listing(pool: &AnyPool, id: &str) -> Result<Option<ListingRecord>> {
    let sql = format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = ?");
    let row: Option<ListingRow> = sqlx::query_as::<_, ListingRow>(&sql).bind(id).fetch_optional(pool).await?;
    row.map(listing_from_row).transpose()
}

/// Active listings, newest first, optionally restricted to one category.
pub async fn list_active_listings(pool: &AnyPool, category: Option<&str>) -> Result<Vec<ListingRecord>> {
    let rows: Vec<ListingRow> = if let Some(c) = category {
        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE status = 'active' AND category = ? ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, ListingRow>(&sql).bind(c).fetch_all(pool).await?
    } else {
        let sql = format!("SELECT {LISTING_COLUMNS} FROM listings WHERE status = 'active' ORDER BY created_at DESC");
        sqlx::query_as::<_, ListingRow>(&sql).fetch_all(pool).await?
    };
    rows.into_iter().map(listing_from_row).collect()
}

/// Display names for the given profile ids in a single query. Profiles without a
/// name are left out.
pub async fn display_names(pool: &AnyPool, ids: &[String]) -> Result<Vec<(String, String)>> {
    if ids.is_empty() { return Ok(Vec::new()); }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT id, display_name FROM profiles WHERE display_name IS NOT NULL AND id IN ({placeholders})"
    );
    let mut q = sqlx::query_as::<_, (String, String)>(&sql);
    for id in ids {
        q = q.bind(id);
    }
    Ok(q.fetch_all(pool).await?)
}

pub async fn set_listing_status(pool: &AnyPool, id: &str, status: &str) -> Result<u64> {
    let res = sqlx::query("UPDATE listings SET status = ? WHERE id = ?")
        .bind(status)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}
