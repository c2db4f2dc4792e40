use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::mapping::{assemble_feed, distinct_seller_ids};
use crate::source::ListingSource;
use crate::types::{Category, FeedItem};

/// What the feed screen renders: the ordered items for one category filter plus
/// the two loading affordances.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedDataSet {
    pub items: Vec<FeedItem>,
    pub category: Category,
    pub is_loading: bool,
    pub is_refreshing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    /// Full-screen spinner.
    Load,
    /// Pull-to-refresh affordance.
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A later request was issued while this one was in flight; its result was dropped.
    Superseded,
}

/// Fetch listings for `category` and join seller names in one batch lookup.
///
/// A failed name lookup does not fail the feed: every seller falls back to the
/// anonymous name.
pub async fn fetch_feed<S>(source: &S, category: Category) -> Result<Vec<FeedItem>, FetchError>
where
    S: ListingSource + ?Sized,
{
    let listings = source.active_listings(category).await?;
    let seller_ids = distinct_seller_ids(&listings);
    let names = if seller_ids.is_empty() {
        HashMap::new()
    } else {
        match source.display_names(&seller_ids).await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, sellers = seller_ids.len(), "profile lookup failed; using anonymous names");
                HashMap::new()
            }
        }
    };
    Ok(assemble_feed(listings, &names))
}

struct ControllerState {
    data: FeedDataSet,
    latest_token: u64,
}

/// Owns the feed data set. Loads may overlap; only the most recently issued one
/// is allowed to write its result.
pub struct FeedDataController {
    source: Arc<dyn ListingSource>,
    state: Mutex<ControllerState>,
    updates: watch::Sender<FeedDataSet>,
}

impl FeedDataController {
    pub fn new(source: Arc<dyn ListingSource>) -> Self {
        let (updates, _) = watch::channel(FeedDataSet::default());
        Self {
            source,
            state: Mutex::new(ControllerState { data: FeedDataSet::default(), latest_token: 0 }),
            updates,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedDataSet> { self.updates.subscribe() }

    pub async fn snapshot(&self) -> FeedDataSet { self.state.lock().await.data.clone() }

    pub async fn load(&self, category: Category) -> Result<LoadOutcome, FetchError> {
        self.run(category, LoadKind::Load).await
    }

    /// Re-run the load for the selected category behind the pull-to-refresh flag.
    pub async fn refresh(&self) -> Result<LoadOutcome, FetchError> {
        let category = self.state.lock().await.data.category;
        self.run(category, LoadKind::Refresh).await
    }

    /// Switches the selected category before fetching. On failure the previous
    /// items stay under the new label and the next [`refresh`](Self::refresh)
    /// retries the new category.
    pub async fn set_category(&self, category: Category) -> Result<LoadOutcome, FetchError> {
        self.load(category).await
    }

    async fn run(&self, category: Category, kind: LoadKind) -> Result<LoadOutcome, FetchError> {
        let token = self.begin(category, kind).await;
        let result = fetch_feed(self.source.as_ref(), category).await;
        self.complete(token, category, result).await
    }

    async fn begin(&self, category: Category, kind: LoadKind) -> u64 {
        let mut st = self.state.lock().await;
        st.latest_token += 1;
        st.data.category = category;
        st.data.is_loading = kind == LoadKind::Load;
        st.data.is_refreshing = kind == LoadKind::Refresh;
        debug!(token = st.latest_token, %category, ?kind, "feed load started");
        self.updates.send_replace(st.data.clone());
        st.latest_token
    }

    async fn complete(
        &self,
        token: u64,
        category: Category,
        result: Result<Vec<FeedItem>, FetchError>,
    ) -> Result<LoadOutcome, FetchError> {
        let mut st = self.state.lock().await;
        if token != st.latest_token {
            debug!(token, latest = st.latest_token, %category, "dropping superseded feed load");
            return Ok(LoadOutcome::Superseded);
        }
        st.data.is_loading = false;
        st.data.is_refreshing = false;
        let outcome = match result {
            Ok(items) => {
                info!(%category, items = items.len(), "feed loaded");
                st.data.items = items;
                Ok(LoadOutcome::Applied)
            }
            Err(e) => {
                warn!(%category, error = %e, "feed load failed; keeping previous items");
                Err(e)
            }
        };
        self.updates.send_replace(st.data.clone());
        outcome
    }
}
