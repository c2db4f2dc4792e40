use std::collections::{HashMap, HashSet};

use crate::types::{FeedItem, ListingRecord, MediaRef, ANONYMOUS_SELLER};

/// Distinct seller ids in first-seen order.
pub fn distinct_seller_ids(listings: &[ListingRecord]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(listings.len());
    listings
        .iter()
        .filter(|l| seen.insert(l.user_id.as_str()))
        .map(|l| l.user_id.clone())
        .collect()
}

pub fn media_from_record(rec: &ListingRecord) -> Vec<MediaRef> {
    rec.images
        .iter()
        .map(MediaRef::image)
        .chain(rec.videos.iter().map(MediaRef::video))
        .collect()
}

pub fn feed_item_from_record(rec: ListingRecord, names: &HashMap<String, String>) -> FeedItem {
    let media = media_from_record(&rec);
    let seller_display_name = names
        .get(&rec.user_id)
        .filter(|n| !n.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| ANONYMOUS_SELLER.to_string());
    FeedItem {
        id: rec.id,
        title: rec.title,
        description: rec.description,
        price: rec.price,
        category: rec.category,
        media,
        seller_display_name,
    }
}

/// Keeps the source order; the remote already sorted newest first.
pub fn assemble_feed(listings: Vec<ListingRecord>, names: &HashMap<String, String>) -> Vec<FeedItem> {
    listings.into_iter().map(|l| feed_item_from_record(l, names)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MediaKind;

    fn rec(id: &str, user: &str, images: &[&str], videos: &[&str]) -> ListingRecord {
        ListingRecord {
            id: id.into(),
            user_id: user.into(),
            title: format!("title {id}"),
            description: String::new(),
            price: 1.0,
            category: "Electronics".into(),
            images: images.iter().map(|s| s.to_string()).collect(),
            videos: videos.iter().map(|s| s.to_string()).collect(),
            status: "active".into(),
            created_at: String::new(),
        }
    }

    #[test]
    fn media_lists_images_before_videos() {
        let r = rec("l1", "u1", &["a.jpg", "b.jpg"], &["c.mp4"]);
        let media = media_from_record(&r);
        let kinds: Vec<MediaKind> = media.iter().map(|m| m.kind()).collect();
        assert_eq!(kinds, vec![MediaKind::Image, MediaKind::Image, MediaKind::Video]);
        assert_eq!(media[1].url(), "b.jpg");
        assert_eq!(media[2].url(), "c.mp4");
    }

    #[test]
    fn seller_ids_are_deduplicated_in_order() {
        let list = vec![rec("1", "u2", &[], &[]), rec("2", "u1", &[], &[]), rec("3", "u2", &[], &[])];
        assert_eq!(distinct_seller_ids(&list), vec!["u2".to_string(), "u1".to_string()]);
    }

    #[test]
    fn missing_profile_defaults_to_anonymous() {
        let list = vec![rec("1", "u1", &["a"], &[]), rec("2", "u2", &["b"], &[])];
        let names = HashMap::from([("u1".to_string(), "alice".to_string())]);
        let feed = assemble_feed(list, &names);
        assert_eq!(feed[0].seller_display_name, "alice");
        assert_eq!(feed[1].seller_display_name, ANONYMOUS_SELLER);
        assert_eq!(feed[0].id, "1");
    }
}
