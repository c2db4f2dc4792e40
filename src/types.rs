use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Seller name used when the profile lookup has no entry for a listing's seller.
pub const ANONYMOUS_SELLER: &str = "Anonymous User";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// One photo or video of a listing. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    url: String,
    kind: MediaKind,
}

impl MediaRef {
    pub fn image(url: impl Into<String>) -> Self { Self { url: url.into(), kind: MediaKind::Image } }
    pub fn video(url: impl Into<String>) -> Self { Self { url: url.into(), kind: MediaKind::Video } }
    pub fn url(&self) -> &str { &self.url }
    pub fn kind(&self) -> MediaKind { self.kind }
    pub fn is_video(&self) -> bool { self.kind == MediaKind::Video }
}

/// Category filter. `All` is the wildcard and never stored on a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    #[default]
    All,
    Fashion,
    Electronics,
    Home,
    Sports,
    Books,
    Other,
}

impl Category {
    /// Display order of the category strip.
    pub const ALL: [Category; 7] = [
        Category::All,
        Category::Fashion,
        Category::Electronics,
        Category::Home,
        Category::Sports,
        Category::Books,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::All => "All",
            Category::Fashion => "Fashion",
            Category::Electronics => "Electronics",
            Category::Home => "Home",
            Category::Sports => "Sports",
            Category::Books => "Books",
            Category::Other => "Other",
        }
    }

    /// `None` for the wildcard, otherwise the equality value to filter on.
    pub fn filter_value(&self) -> Option<&'static str> {
        match self {
            Category::All => None,
            other => Some(other.as_str()),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Listing row as stored by the remote source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub category: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub images: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub videos: Vec<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: String, // ISO string
}

fn null_as_empty<'de, D>(d: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(d)?.unwrap_or_default())
}

/// Seller profile row; only the display name is consumed by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: String,
    pub display_name: Option<String>,
}

/// A listing as shown in the feed, with its seller's name joined in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    /// Images first, then videos, each in source order.
    pub media: Vec<MediaRef>,
    pub seller_display_name: String,
}

impl FeedItem {
    pub fn has_video(&self) -> bool { self.media.iter().any(MediaRef::is_video) }
}

/// Insert payload for a new active listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewListing {
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub images: Vec<String>,
    pub videos: Vec<String>,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("books".parse::<Category>().unwrap(), Category::Books);
        assert_eq!(" All ".parse::<Category>().unwrap(), Category::All);
        assert!("garden".parse::<Category>().is_err());
    }

    #[test]
    fn wildcard_has_no_filter_value() {
        assert_eq!(Category::All.filter_value(), None);
        assert_eq!(Category::Electronics.filter_value(), Some("Electronics"));
    }

    #[test]
    fn listing_record_tolerates_null_videos() {
        let raw = r#"{"id":"l1","user_id":"u1","title":"Lamp","description":"desk lamp","price":12.5,
            "category":"Home","images":["a.jpg"],"videos":null,"status":"active","created_at":"2024-01-01T00:00:00Z"}"#;
        let rec: ListingRecord = serde_json::from_str(raw).unwrap();
        assert!(rec.videos.is_empty());
        assert_eq!(rec.images, vec!["a.jpg".to_string()]);
    }
}
