use tracing::trace;

pub const DEFAULT_VISIBILITY_THRESHOLD: f32 = 0.5;

/// One entry of a scroll container's viewability report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewableItem {
    pub index: usize,
    /// Share of the viewport the item covers, 0.0 ..= 1.0.
    pub visible_fraction: f32,
}

impl ViewableItem {
    pub fn new(index: usize, visible_fraction: f32) -> Self { Self { index, visible_fraction } }
}

/// Published when the active item index changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveItemChanged {
    pub previous: Option<usize>,
    pub current: Option<usize>,
}

/// Decides which single feed item of a full-page vertical list is active.
#[derive(Debug, Clone)]
pub struct VisibilityTracker {
    threshold: f32,
    active: Option<usize>,
    focused: bool,
}

impl Default for VisibilityTracker {
    fn default() -> Self { Self::new(DEFAULT_VISIBILITY_THRESHOLD) }
}

impl VisibilityTracker {
    /// Non-finite thresholds fall back to [`DEFAULT_VISIBILITY_THRESHOLD`].
    pub fn new(threshold: f32) -> Self {
        let threshold = if threshold.is_finite() { threshold } else { DEFAULT_VISIBILITY_THRESHOLD };
        Self { threshold: threshold.clamp(f32::MIN_POSITIVE, 1.0), active: None, focused: true }
    }

    pub fn active_item(&self) -> Option<usize> { self.active }
    pub fn is_focused(&self) -> bool { self.focused }

    /// Feed a viewability report. The lowest index at or above the threshold wins;
    /// no qualifying index means nothing is active. Ignored while unfocused.
    pub fn on_viewable_items(&mut self, items: &[ViewableItem]) -> Option<ActiveItemChanged> {
        if !self.focused {
            trace!("visibility report ignored while unfocused");
            return None;
        }
        let next = items
            .iter()
            .filter(|v| v.visible_fraction >= self.threshold)
            .map(|v| v.index)
            .min();
        self.set_active(next)
    }

    /// Losing focus forces the active item to none until focus returns and a new
    /// viewability report arrives.
    pub fn on_focus_changed(&mut self, focused: bool) -> Option<ActiveItemChanged> {
        self.focused = focused;
        if focused { None } else { self.set_active(None) }
    }

    /// Clears the measurement after the underlying list was replaced.
    pub fn reset(&mut self) -> Option<ActiveItemChanged> { self.set_active(None) }

    fn set_active(&mut self, next: Option<usize>) -> Option<ActiveItemChanged> {
        if next == self.active { return None; }
        let change = ActiveItemChanged { previous: self.active, current: next };
        self.active = next;
        Some(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(pairs: &[(usize, f32)]) -> Vec<ViewableItem> {
        pairs.iter().map(|&(i, f)| ViewableItem::new(i, f)).collect()
    }

    #[test]
    fn none_before_first_measurement() {
        assert_eq!(VisibilityTracker::default().active_item(), None);
    }

    #[test]
    fn item_at_threshold_becomes_active() {
        let mut t = VisibilityTracker::default();
        let change = t.on_viewable_items(&report(&[(0, 0.5), (1, 0.5)])).unwrap();
        assert_eq!(change, ActiveItemChanged { previous: None, current: Some(0) });
    }

    #[test]
    fn lower_index_wins_tie() {
        let mut t = VisibilityTracker::default();
        t.on_viewable_items(&report(&[(4, 0.9), (3, 0.7)]));
        assert_eq!(t.active_item(), Some(3));
    }

    #[test]
    fn mid_transition_has_no_active_item() {
        let mut t = VisibilityTracker::default();
        t.on_viewable_items(&report(&[(1, 1.0)]));
        let change = t.on_viewable_items(&report(&[(1, 0.45), (2, 0.45)])).unwrap();
        assert_eq!(change.current, None);
        assert_eq!(change.previous, Some(1));
    }

    #[test]
    fn repeated_report_is_idempotent() {
        let mut t = VisibilityTracker::default();
        let r = report(&[(2, 0.6), (3, 0.4)]);
        assert!(t.on_viewable_items(&r).is_some());
        assert!(t.on_viewable_items(&r).is_none());
    }

    #[test]
    fn non_finite_threshold_uses_default() {
        let mut t = VisibilityTracker::new(f32::NAN);
        assert_eq!(t.on_viewable_items(&report(&[(0, 0.6)])).unwrap().current, Some(0));
        let mut t = VisibilityTracker::new(f32::INFINITY);
        t.on_viewable_items(&report(&[(0, 0.4), (1, 0.5)]));
        assert_eq!(t.active_item(), Some(1));
    }

    #[test]
    fn focus_loss_overrides_until_fresh_report() {
        let mut t = VisibilityTracker::default();
        t.on_viewable_items(&report(&[(0, 1.0)]));
        assert_eq!(t.on_focus_changed(false).unwrap().current, None);
        assert!(t.on_viewable_items(&report(&[(0, 1.0)])).is_none());
        assert_eq!(t.active_item(), None);

        assert!(t.on_focus_changed(true).is_none());
        assert_eq!(t.active_item(), None);
        assert_eq!(t.on_viewable_items(&report(&[(0, 1.0)])).unwrap().current, Some(0));
    }
}
