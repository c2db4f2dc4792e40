use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::carousel::MediaCarousel;
use crate::config::FeedSettings;
use crate::driver::{MediaPlayer, PlayerDriver};
use crate::overlay::ItemOverlay;
use crate::playback::{CommandAck, PlaybackCoordinator, PlaybackIntent, PlayerCommand, SlotKey};
use crate::types::{FeedItem, MediaKind};
use crate::visibility::{ViewableItem, VisibilityTracker};

/// Input delivered to a [`FeedScreen`] by the host UI.
#[derive(Debug, Clone)]
pub enum ScreenEvent {
    ViewableItems(Vec<ViewableItem>),
    CarouselSettled { item_index: usize, offset_x: f32, viewport_width: f32 },
    Focus(bool),
    Tap { item_index: usize, slot: usize },
    ToggleDescription { item_index: usize },
    ReplaceItems(Vec<FeedItem>),
}

/// What the host should draw for one media slot of a mounted item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderDirective {
    pub item_id: String,
    pub item_index: usize,
    pub slot: usize,
    pub url: String,
    pub kind: MediaKind,
    /// Only video slots carry a playback intent.
    pub intent: Option<PlaybackIntent>,
    pub carousel_visible: bool,
}

/// Result of one [`FeedScreen::handle`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScreenOutput {
    pub commands: Vec<PlayerCommand>,
    /// Items torn down by this event; queued player work for them is obsolete.
    pub unmounted: Vec<String>,
}

/// Vertical feed of full-page items: ties visibility, carousels and playback together.
pub struct FeedScreen {
    items: Vec<FeedItem>,
    tracker: VisibilityTracker,
    carousels: HashMap<String, MediaCarousel>,
    coordinator: PlaybackCoordinator,
    mounted: HashSet<String>,
    unmounted: Vec<String>,
    expanded: HashSet<String>,
    settings: FeedSettings,
}

impl FeedScreen {
    pub fn new(items: Vec<FeedItem>, settings: FeedSettings) -> Self {
        let mut screen = Self {
            items: Vec::new(),
            tracker: VisibilityTracker::new(settings.visibility_threshold),
            carousels: HashMap::new(),
            coordinator: PlaybackCoordinator::new(),
            mounted: HashSet::new(),
            unmounted: Vec::new(),
            expanded: HashSet::new(),
            settings,
        };
        screen.replace_items(items);
        screen.unmounted.clear();
        screen
    }

    pub fn items(&self) -> &[FeedItem] { &self.items }
    pub fn active_item(&self) -> Option<usize> { self.tracker.active_item() }
    pub fn is_mounted(&self, item_index: usize) -> bool {
        self.items.get(item_index).is_some_and(|i| self.mounted.contains(&i.id))
    }

    pub fn intent(&self, item_index: usize, slot: usize) -> Option<PlaybackIntent> {
        let item = self.items.get(item_index)?;
        self.coordinator.intent(&SlotKey::new(item.id.as_str(), slot))
    }

    pub fn playing_slot(&self) -> Option<&SlotKey> { self.coordinator.playing_slot() }

    pub fn handle(&mut self, event: ScreenEvent) -> ScreenOutput {
        let commands = self.apply(event);
        ScreenOutput { commands, unmounted: std::mem::take(&mut self.unmounted) }
    }

    fn apply(&mut self, event: ScreenEvent) -> Vec<PlayerCommand> {
        match event {
            ScreenEvent::ViewableItems(report) => {
                if let Some(change) = self.tracker.on_viewable_items(&report) {
                    debug!(previous = ?change.previous, current = ?change.current, "active item changed");
                }
                self.sync()
            }
            ScreenEvent::CarouselSettled { item_index, offset_x, viewport_width } => {
                let Some(id) = self.items.get(item_index).map(|i| i.id.clone()) else { return Vec::new() };
                let changed = self
                    .carousels
                    .get_mut(&id)
                    .and_then(|c| c.on_scroll_settled(offset_x, viewport_width));
                match changed {
                    Some(change) => {
                        debug!(item = %change.item_id, previous = change.previous, current = change.current, "carousel slot changed");
                        self.sync()
                    }
                    None => Vec::new(),
                }
            }
            ScreenEvent::Focus(focused) => {
                self.tracker.on_focus_changed(focused);
                self.sync()
            }
            ScreenEvent::Tap { item_index, slot } => match self.items.get(item_index) {
                Some(item) => self.coordinator.tap(&SlotKey::new(item.id.as_str(), slot)),
                None => Vec::new(),
            },
            ScreenEvent::ToggleDescription { item_index } => {
                if let Some(item) = self.items.get(item_index) {
                    if !self.expanded.remove(&item.id) {
                        self.expanded.insert(item.id.clone());
                    }
                }
                Vec::new()
            }
            ScreenEvent::ReplaceItems(items) => self.replace_items(items),
        }
    }

    pub fn acknowledge(&mut self, ack: CommandAck) -> Vec<PlayerCommand> { self.coordinator.acknowledge(ack) }

    /// Swap in a new item list after a load or refresh. Items that survive keep
    /// their carousel position; items that are gone are unmounted. The active
    /// item stays active while the same id still sits at its index.
    fn replace_items(&mut self, items: Vec<FeedItem>) -> Vec<PlayerCommand> {
        let mut out = Vec::new();
        let previous = self.tracker.active_item().and_then(|i| self.items.get(i)).map(|i| i.id.clone());
        let fresh: HashMap<&str, &FeedItem> = items.iter().map(|i| (i.id.as_str(), i)).collect();

        let stale: Vec<String> = self
            .mounted
            .iter()
            .filter(|id| fresh.get(id.as_str()).map_or(true, |i| self.carousels.get(*id).map_or(true, |c| c.media() != i.media.as_slice())))
            .cloned()
            .collect();
        for id in stale {
            out.extend(self.unmount(&id));
        }
        self.carousels.retain(|id, c| fresh.get(id.as_str()).is_some_and(|i| c.media() == i.media.as_slice()));
        self.expanded.retain(|id| fresh.contains_key(id.as_str()));

        self.items = items;
        let kept = match (self.tracker.active_item(), previous) {
            (Some(index), Some(id)) => self.items.get(index).is_some_and(|i| i.id == id),
            _ => false,
        };
        if !kept {
            self.tracker.reset();
        }
        match self.tracker.active_item() {
            Some(index) => out.extend(self.mount_window(index)),
            None if !self.items.is_empty() => out.extend(self.mount_window(0)),
            None => {}
        }
        out.extend(self.sync());
        out
    }

    /// Draw list for every mounted item, in feed order.
    pub fn render(&self) -> Vec<RenderDirective> {
        let mut out = Vec::new();
        for (index, item) in self.items.iter().enumerate() {
            let Some(carousel) = self.carousels.get(&item.id).filter(|_| self.mounted.contains(&item.id)) else { continue };
            for (slot, media) in carousel.media().iter().enumerate() {
                let intent = if media.is_video() {
                    self.coordinator.intent(&SlotKey::new(item.id.as_str(), slot))
                } else {
                    None
                };
                out.push(RenderDirective {
                    item_id: item.id.clone(),
                    item_index: index,
                    slot,
                    url: media.url().to_string(),
                    kind: media.kind(),
                    intent,
                    carousel_visible: carousel.is_carousel_visible(slot),
                });
            }
        }
        out
    }

    pub fn overlay(&self, item_index: usize) -> Option<ItemOverlay> {
        let item = self.items.get(item_index)?;
        let dots = match self.carousels.get(&item.id) {
            Some(c) => c.page_dots(),
            None => MediaCarousel::new(item).page_dots(),
        };
        Some(ItemOverlay::build(
            item,
            self.expanded.contains(&item.id),
            self.settings.description_preview_chars,
            self.settings.collapsed_description_lines,
            dots,
        ))
    }

    /// Event loop: applies host events and feeds player acknowledgements back
    /// until the event channel closes and every command has settled.
    pub async fn run(mut self, player: Arc<dyn MediaPlayer>, mut events: mpsc::Receiver<ScreenEvent>) -> Self {
        let mut driver = PlayerDriver::new(player);
        let mut open = true;
        loop {
            tokio::select! {
                ev = events.recv(), if open => match ev {
                    Some(ev) => {
                        let out = self.handle(ev);
                        for id in &out.unmounted {
                            driver.forget_item(id);
                        }
                        driver.dispatch(out.commands);
                    }
                    None => open = false,
                },
                Some(ack) = driver.next_ack(), if !driver.is_idle() => {
                    let cmds = self.acknowledge(ack);
                    driver.dispatch(cmds);
                }
                else => break,
            }
        }
        info!(items = self.items.len(), "feed screen closed");
        self
    }

    /// Mount the items around the active one and unmount the rest. With no
    /// active item the current mounts are kept.
    fn sync(&mut self) -> Vec<PlayerCommand> {
        let mut out = Vec::new();
        let active = self.tracker.active_item();
        if let Some(index) = active {
            out.extend(self.mount_window(index));
        }

        let mut hide = Vec::new();
        let mut show = Vec::new();
        for key in self.coordinator.mounted_slots() {
            let visible = active
                .and_then(|i| self.items.get(i))
                .filter(|item| item.id == key.item_id)
                .and_then(|item| self.carousels.get(&item.id))
                .is_some_and(|c| c.is_effectively_visible(key.slot, true));
            if visible { show.push(key.clone()) } else { hide.push(key.clone()) }
        }
        // Pauses go out before plays so a handoff never overlaps.
        for key in hide {
            out.extend(self.coordinator.set_visible(&key, false));
        }
        for key in show {
            out.extend(self.coordinator.set_visible(&key, true));
        }
        out
    }

    fn mount_window(&mut self, center: usize) -> Vec<PlayerCommand> {
        let mut out = Vec::new();
        let Some(last) = self.items.len().checked_sub(1) else { return out };
        let center = center.min(last);
        let lo = center.saturating_sub(self.settings.mount_window);
        let hi = center.saturating_add(self.settings.mount_window).min(last);
        let wanted: HashSet<String> = self.items[lo..=hi].iter().map(|i| i.id.clone()).collect();

        let gone: Vec<String> = self.mounted.difference(&wanted).cloned().collect();
        for id in gone {
            out.extend(self.unmount(&id));
        }
        for item in &self.items[lo..=hi] {
            if !self.mounted.insert(item.id.clone()) { continue; }
            let carousel = self.carousels.entry(item.id.clone()).or_insert_with(|| MediaCarousel::new(item));
            for slot in carousel.video_slots() {
                self.coordinator.mount(SlotKey::new(item.id.as_str(), slot));
            }
        }
        out
    }

    fn unmount(&mut self, item_id: &str) -> Vec<PlayerCommand> {
        if !self.mounted.remove(item_id) { return Vec::new(); }
        self.unmounted.push(item_id.to_string());
        self.coordinator.unmount_item(item_id)
    }
}
