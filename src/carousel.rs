use crate::types::{FeedItem, MediaKind, MediaRef};

/// Published when a swipe settles on a different slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotChanged {
    pub item_id: String,
    pub previous: usize,
    pub current: usize,
}

/// Horizontal media pager of one feed item.
#[derive(Debug, Clone)]
pub struct MediaCarousel {
    item_id: String,
    media: Vec<MediaRef>,
    active_slot: usize,
}

impl MediaCarousel {
    pub fn new(item: &FeedItem) -> Self {
        Self { item_id: item.id.clone(), media: item.media.clone(), active_slot: 0 }
    }

    pub fn item_id(&self) -> &str { &self.item_id }
    pub fn media(&self) -> &[MediaRef] { &self.media }
    pub fn len(&self) -> usize { self.media.len() }
    pub fn is_empty(&self) -> bool { self.media.is_empty() }
    pub fn active_slot(&self) -> usize { self.active_slot }

    /// Swipe momentum settled at `offset_x`. The active slot becomes the nearest
    /// page, clamped to the media range.
    pub fn on_scroll_settled(&mut self, offset_x: f32, viewport_width: f32) -> Option<SlotChanged> {
        if self.media.is_empty() || !offset_x.is_finite() || !(viewport_width > 0.0) {
            return None;
        }
        let page = (offset_x / viewport_width).round();
        let last = self.media.len() - 1;
        let next = if page <= 0.0 { 0 } else { (page as usize).min(last) };
        self.select(next)
    }

    /// Jump straight to a slot (dot tap, programmatic scroll).
    pub fn select(&mut self, slot: usize) -> Option<SlotChanged> {
        if self.media.is_empty() { return None; }
        let next = slot.min(self.media.len() - 1);
        if next == self.active_slot { return None; }
        let change = SlotChanged { item_id: self.item_id.clone(), previous: self.active_slot, current: next };
        self.active_slot = next;
        Some(change)
    }

    pub fn is_carousel_visible(&self, slot: usize) -> bool {
        slot < self.media.len() && slot == self.active_slot
    }

    pub fn is_effectively_visible(&self, slot: usize, item_visible: bool) -> bool {
        item_visible && self.is_carousel_visible(slot)
    }

    pub fn video_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.media.iter().enumerate().filter(|(_, m)| m.kind() == MediaKind::Video).map(|(i, _)| i)
    }

    /// Page indicator: one entry per slot, `true` for the active one.
    pub fn page_dots(&self) -> Vec<bool> {
        (0..self.media.len()).map(|i| i == self.active_slot).collect()
    }
}
