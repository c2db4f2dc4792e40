use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::types::{Category, ListingRecord, NewListing};

/// Remote listing data the feed is assembled from.
///
/// Implementations must return only `active` listings, filtered by category
/// equality unless the wildcard is given, newest first. Callers never re-sort.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn active_listings(&self, category: Category) -> Result<Vec<ListingRecord>, FetchError>;

    /// Batch lookup of display names. Ids with no profile (or no name) are simply
    /// absent from the returned map.
    async fn display_names(&self, seller_ids: &[String]) -> Result<HashMap<String, String>, FetchError>;

    async fn insert_listing(&self, listing: &NewListing) -> Result<ListingRecord, FetchError>;
}
