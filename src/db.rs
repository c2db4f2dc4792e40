use anyhow::{Context, Result};
use async_trait::async_trait;
use directories::ProjectDirs;
use sqlx::{any::AnyConnectOptions, AnyPool, ConnectOptions, migrate::Migrator};
use sqlx::any::AnyPoolOptions;
use std::collections::HashMap;
use std::{path::PathBuf, str::FromStr};
use std::sync::Once;
use tracing::debug;

use crate::dao;
use crate::error::FetchError;
use crate::source::ListingSource;
use crate::types::{Category, ListingRecord, NewListing};

// Ensure drivers are installed exactly once for sqlx::any
static INSTALL_DRIVERS: Once = Once::new();

// Embed SQL migrations from the migrations/ directory
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Local SQLite listing store. Serves the same queries as the remote backend.
#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
}

impl Database {
    // Create a connection pool. If database_url is None, use a sensible default
    // (SQLite file in the user's data directory).
    pub async fn connect(database_url: Option<&str>) -> Result<Self> {
        INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);

        let url = match database_url {
            Some(u) if !u.trim().is_empty() => u.to_string(),
            _ => default_sqlite_url()?,
        };

        let opts = AnyConnectOptions::from_str(&url)
            .with_context(|| format!("invalid database URL: {url}"))?;
        // Quiet by default; callers can enable SQLX_LOG if they want
        let opts = opts.disable_statement_logging();

        let pool = AnyPoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .with_context(|| format!("failed to connect to database: {url}"))?;

        debug!(%url, "connected listing store");
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.context("running migrations")
    }

    pub fn pool(&self) -> &AnyPool { &self.pool }

    pub async fn upsert_profile(&self, id: &str, display_name: Option<&str>) -> Result<()> {
        let p = dao::ProfileInsert { id: id.to_string(), display_name: display_name.map(str::to_string) };
        dao::upsert_profile(&self.pool, &p).await
    }

    /// Marks a listing as no longer active. Returns rows touched.
    pub async fn archive_listing(&self, id: &str) -> Result<u64> {
        dao::set_listing_status(&self.pool, id, "archived").await
    }
}

fn store_err(e: anyhow::Error) -> FetchError {
    FetchError::Store(format!("{e:#}"))
}

#[async_trait]
impl ListingSource for Database {
    async fn active_listings(&self, category: Category) -> Result<Vec<ListingRecord>, FetchError> {
        dao::list_active_listings(&self.pool, category.filter_value()).await.map_err(store_err)
    }

    async fn display_names(&self, seller_ids: &[String]) -> Result<HashMap<String, String>, FetchError> {
        let rows = dao::display_names(&self.pool, seller_ids).await.map_err(store_err)?;
        Ok(rows.into_iter().collect())
    }

    async fn insert_listing(&self, listing: &NewListing) -> Result<ListingRecord, FetchError> {
        let id = uuid::Uuid::new_v4().to_string();
        let row = dao::ListingInsert {
            id: id.clone(),
            user_id: listing.user_id.clone(),
            title: listing.title.clone(),
            description: listing.description.clone(),
            price: listing.price,
            category: listing.category.clone(),
            images: serde_json::to_string(&listing.images)?,
            videos: serde_json::to_string(&listing.videos)?,
            status: listing.status.clone(),
            created_at: None,
        };
        dao::insert_listing(&self.pool, &row).await.map_err(store_err)?;
        dao::get_listing(&self.pool, &id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| FetchError::Store(format!("listing {id} missing after insert")))
    }
}

fn default_sqlite_url() -> Result<String> {
    let proj = ProjectDirs::from("dev", "reelmart", "reelmart")
        .context("unable to determine data directory for default sqlite path")?;
    let mut path: PathBuf = proj.data_dir().to_path_buf();
    std::fs::create_dir_all(&path).with_context(|| format!("creating data dir: {}", path.display()))?;
    path.push("reelmart.db");

    // Ensure the file exists so SQLite can open it in rw mode
    let _ = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path);

    // Encode spaces in the path for a valid sqlite URL
    let mut path_str = path.to_string_lossy().to_string();
    if path_str.contains(' ') { path_str = path_str.replace(' ', "%20"); }
    Ok(format!("sqlite:///{path_str}?mode=rwc"))
}
