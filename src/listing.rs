use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ListingError;
use crate::source::ListingSource;
use crate::types::{Category, ListingRecord, NewListing};

pub const ACTIVE_STATUS: &str = "active";

/// User input of the create-listing form. Media are already-hosted urls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingDraft {
    pub title: String,
    pub description: String,
    /// Raw text as typed.
    pub price: String,
    pub category: String,
    pub images: Vec<String>,
    pub video: Option<String>,
}

impl ListingDraft {
    pub fn validate(&self, seller_id: &str) -> Result<NewListing, ListingError> {
        let title = required(&self.title, "title")?;
        let description = required(&self.description, "description")?;
        let price_text = required(&self.price, "price")?;
        let category_text = required(&self.category, "category")?;

        let price: f64 = price_text.parse().map_err(|_| ListingError::InvalidPrice(price_text.to_string()))?;
        if !price.is_finite() || price < 0.0 {
            return Err(ListingError::InvalidPrice(price_text.to_string()));
        }
        let category = match category_text.parse::<Category>() {
            Ok(Category::All) | Err(_) => return Err(ListingError::Missing("category")),
            Ok(c) => c,
        };
        let images: Vec<String> = self.images.iter().map(|u| u.trim()).filter(|u| !u.is_empty()).map(String::from).collect();
        if images.is_empty() {
            return Err(ListingError::NoImages);
        }

        Ok(NewListing {
            user_id: seller_id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            price,
            category: category.as_str().to_string(),
            images,
            videos: self.video.iter().map(|v| v.trim()).filter(|v| !v.is_empty()).map(String::from).collect(),
            status: ACTIVE_STATUS.to_string(),
        })
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ListingError> {
    let v = value.trim();
    if v.is_empty() { Err(ListingError::Missing(field)) } else { Ok(v) }
}

/// Validate and insert a draft as an active listing of `seller_id`.
pub async fn publish<S>(source: &S, seller_id: &str, draft: &ListingDraft) -> Result<ListingRecord, ListingError>
where
    S: ListingSource + ?Sized,
{
    let listing = draft.validate(seller_id)?;
    let record = source.insert_listing(&listing).await?;
    info!(id = %record.id, category = %record.category, "listing published");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::tests::FakeSource;
    use crate::feed::fetch_feed;

    fn draft() -> ListingDraft {
        ListingDraft {
            title: "Road bike".into(),
            description: "Aluminium frame, 54cm".into(),
            price: "120.50".into(),
            category: "sports".into(),
            images: vec!["https://img/bike.jpg".into()],
            video: Some("https://vid/bike.mp4".into()),
        }
    }

    #[test]
    fn valid_draft_becomes_active_listing() {
        let l = draft().validate("u1").unwrap();
        assert_eq!(l.price, 120.5);
        assert_eq!(l.category, "Sports");
        assert_eq!(l.status, "active");
        assert_eq!(l.videos, vec!["https://vid/bike.mp4".to_string()]);
    }

    #[test]
    fn required_fields_are_checked() {
        let d = ListingDraft { title: "  ".into(), ..draft() };
        assert!(matches!(d.validate("u1"), Err(ListingError::Missing("title"))));
        let d = ListingDraft { category: "All".into(), ..draft() };
        assert!(matches!(d.validate("u1"), Err(ListingError::Missing("category"))));
        let d = ListingDraft { images: vec![], ..draft() };
        assert!(matches!(d.validate("u1"), Err(ListingError::NoImages)));
    }

    #[test]
    fn price_must_be_a_non_negative_number() {
        for bad in ["abc", "-1", "NaN"] {
            let d = ListingDraft { price: bad.into(), ..draft() };
            assert!(matches!(d.validate("u1"), Err(ListingError::InvalidPrice(_))), "{bad}");
        }
        let d = ListingDraft { price: "0".into(), video: None, ..draft() };
        assert!(d.validate("u1").unwrap().videos.is_empty());
    }

    #[tokio::test]
    async fn published_listing_shows_up_first_in_feed() {
        let src = FakeSource::default();
        let rec = publish(&src, "u9", &draft()).await.unwrap();
        let feed = fetch_feed(&src, Category::Sports).await.unwrap();
        assert_eq!(feed[0].id, rec.id);
        assert!(feed[0].has_video());
    }

    #[tokio::test]
    async fn invalid_draft_never_reaches_the_source() {
        let src = FakeSource::default();
        let d = ListingDraft { price: String::new(), ..draft() };
        assert!(matches!(publish(&src, "u1", &d).await, Err(ListingError::Missing("price"))));
        assert!(src.listings.lock().unwrap().is_empty());
    }
}
