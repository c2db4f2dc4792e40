pub mod carousel;
pub mod config;
pub mod dao;
pub mod db;
pub mod driver;
pub mod error;
pub mod feed;
pub mod listing;
pub mod mapping;
pub mod overlay;
pub mod playback;
pub mod rest;
pub mod screen;
pub mod source;
pub mod types;
pub mod upload;
pub mod visibility;

// --- Library API for embedding ---

/// Convenience re-exports for embedders.
pub mod prelude {
    pub use crate::carousel::{MediaCarousel, SlotChanged};
    pub use crate::config::{Config, FeedSettings};
    pub use crate::driver::{LoggingPlayer, MediaPlayer, PlayerDriver};
    pub use crate::error::{FetchError, ListingError, PlaybackCommandError, UploadError};
    pub use crate::feed::{FeedDataController, FeedDataSet, LoadOutcome};
    pub use crate::listing::ListingDraft;
    pub use crate::playback::{CommandAck, PlaybackCoordinator, PlaybackIntent, PlayerAction, PlayerCommand, SlotKey};
    pub use crate::screen::{FeedScreen, RenderDirective, ScreenEvent, ScreenOutput};
    pub use crate::source::ListingSource;
    pub use crate::types::{Category, FeedItem, MediaKind, MediaRef};
    pub use crate::upload::{MediaUploader, ProgressFn};
    pub use crate::visibility::{ViewableItem, VisibilityTracker};
    pub use crate::Reelmart;
}

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::Database;
use crate::error::ListingError;
use crate::feed::FeedDataController;
use crate::listing::ListingDraft;
use crate::rest::RestSource;
use crate::screen::FeedScreen;
use crate::source::ListingSource;
use crate::types::ListingRecord;

/// Wires a listing source, the feed controller and the screen settings together.
pub struct Reelmart {
    config: Config,
    source: Arc<dyn ListingSource>,
    local: Option<Arc<Database>>,
    feed: FeedDataController,
}

impl Reelmart {
    /// Use the remote backend when asked for and configured, otherwise the local
    /// store (migrated on connect).
    pub async fn connect(config: Config, prefer_remote: bool) -> Result<Self> {
        let (source, local): (Arc<dyn ListingSource>, Option<Arc<Database>>) = match config.remote().filter(|_| prefer_remote) {
            Some(remote) => {
                info!(url = %remote.url, "using remote listing source");
                let rest: Arc<dyn ListingSource> = Arc::new(RestSource::new(&remote.url, remote.anon_key.clone())?);
                (rest, None)
            }
            None => {
                if prefer_remote {
                    warn!("remote backend not configured; using local store");
                }
                let db = Arc::new(Database::connect(config.database_url.as_deref()).await?);
                db.run_migrations().await?;
                let store: Arc<dyn ListingSource> = db.clone();
                (store, Some(db))
            }
        };
        let feed = FeedDataController::new(source.clone());
        Ok(Self { config, source, local, feed })
    }

    pub fn config(&self) -> &Config { &self.config }
    pub fn feed(&self) -> &FeedDataController { &self.feed }
    pub fn source(&self) -> Arc<dyn ListingSource> { self.source.clone() }

    /// The local store, when it is the active source.
    pub fn local(&self) -> Option<&Database> { self.local.as_deref() }

    /// Screen over the feed's current items.
    pub async fn new_screen(&self) -> FeedScreen {
        let data = self.feed.snapshot().await;
        FeedScreen::new(data.items, self.config.feed.clone())
    }

    pub async fn publish_listing(&self, seller_id: &str, draft: &ListingDraft) -> Result<ListingRecord, ListingError> {
        listing::publish(self.source.as_ref(), seller_id, draft).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, ANONYMOUS_SELLER};

    fn local_config(dir: &tempfile::TempDir) -> Config {
        Config {
            database_url: Some(format!("sqlite://{}?mode=rwc", dir.path().join("app.db").display())),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn falls_back_to_local_store_without_remote() {
        let dir = tempfile::tempdir().unwrap();
        let app = Reelmart::connect(local_config(&dir), true).await.unwrap();
        assert!(app.local().is_some());
    }

    #[tokio::test]
    async fn published_listing_reaches_the_screen() {
        let dir = tempfile::tempdir().unwrap();
        let app = Reelmart::connect(local_config(&dir), false).await.unwrap();
        let draft = ListingDraft {
            title: "Lamp".into(),
            description: "Brass desk lamp".into(),
            price: "15".into(),
            category: "Home".into(),
            images: vec!["https://img/lamp.jpg".into()],
            video: Some("https://vid/lamp.mp4".into()),
        };
        app.publish_listing("seller-1", &draft).await.unwrap();

        app.feed().load(Category::Home).await.unwrap();
        let screen = app.new_screen().await;
        assert_eq!(screen.items().len(), 1);
        assert_eq!(screen.items()[0].seller_display_name, ANONYMOUS_SELLER);
        assert!(screen.is_mounted(0));
        assert_eq!(screen.overlay(0).unwrap().page_dots, vec![true, false]);
    }
}
