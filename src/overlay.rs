use serde::Serialize;

use crate::types::FeedItem;

pub const DEFAULT_PREVIEW_CHARS: usize = 100;
pub const DEFAULT_COLLAPSED_LINES: u32 = 2;
pub const MORE_LABEL: &str = "More…";
pub const LESS_LABEL: &str = "Show less";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptionView {
    pub text: String,
    /// `None` means no line cap.
    pub max_lines: Option<u32>,
    /// Expand/collapse affordance, only present for long descriptions.
    pub toggle_label: Option<&'static str>,
}

/// Collapsed descriptions show the first `preview_chars` characters under a
/// line cap; expanded ones show everything.
pub fn description_view(description: &str, expanded: bool, preview_chars: usize, collapsed_lines: u32) -> DescriptionView {
    let is_long = description.chars().count() > preview_chars;
    if expanded {
        return DescriptionView {
            text: description.to_string(),
            max_lines: None,
            toggle_label: is_long.then_some(LESS_LABEL),
        };
    }
    DescriptionView {
        text: description.chars().take(preview_chars).collect(),
        max_lines: Some(collapsed_lines),
        toggle_label: is_long.then_some(MORE_LABEL),
    }
}

pub fn format_price(price: f64) -> String { format!("${price}") }

/// Text laid over a feed item's media.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOverlay {
    pub title: String,
    pub price: String,
    pub seller: String,
    pub category: String,
    pub description: DescriptionView,
    pub page_dots: Vec<bool>,
}

impl ItemOverlay {
    pub fn build(item: &FeedItem, expanded: bool, preview_chars: usize, collapsed_lines: u32, page_dots: Vec<bool>) -> Self {
        Self {
            title: item.title.clone(),
            price: format_price(item.price),
            seller: format!("@{}", item.seller_display_name),
            category: item.category.clone(),
            description: description_view(&item.description, expanded, preview_chars, collapsed_lines),
            page_dots,
        }
    }
}
