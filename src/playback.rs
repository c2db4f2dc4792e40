//! Play/pause arbitration for every video slot in the feed.
//!
//! The coordinator is a synchronous state machine. Entry points return the
//! player commands to issue; each command carries a token, and the matching
//! [`CommandAck`] is applied only if its token is still the latest one issued
//! for that slot. At most one slot holds the play grant at any time, and a new
//! grant is only handed out after the previous holder's pause was acknowledged.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::PlaybackCommandError;

/// One media slot of one feed item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SlotKey {
    pub item_id: String,
    pub slot: usize,
}

impl SlotKey {
    pub fn new(item_id: impl Into<String>, slot: usize) -> Self { Self { item_id: item_id.into(), slot } }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}#{}", self.item_id, self.slot) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackIntent {
    Stopped,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlayerAction {
    Play,
    Pause,
}

impl PlayerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerAction::Play => "play",
            PlayerAction::Pause => "pause",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCommand {
    pub slot: SlotKey,
    pub action: PlayerAction,
    pub token: u64,
}

/// Completion of a [`PlayerCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandAck {
    pub slot: SlotKey,
    pub token: u64,
    pub result: Result<(), PlaybackCommandError>,
}

impl CommandAck {
    pub fn ok(cmd: &PlayerCommand) -> Self { Self { slot: cmd.slot.clone(), token: cmd.token, result: Ok(()) } }
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    token: u64,
    action: PlayerAction,
}

#[derive(Debug)]
struct SlotRecord {
    intent: PlaybackIntent,
    visible: bool,
    user_paused: bool,
    in_flight: Option<InFlight>,
    queued_tap: bool,
}

impl SlotRecord {
    fn new() -> Self {
        Self { intent: PlaybackIntent::Stopped, visible: false, user_paused: false, in_flight: None, queued_tap: false }
    }
}

#[derive(Debug, Default)]
pub struct PlaybackCoordinator {
    slots: HashMap<SlotKey, SlotRecord>,
    /// Slot holding the play grant; its intent is `Playing`.
    holder: Option<SlotKey>,
    /// Former holder whose pause has not been acknowledged yet.
    draining: Option<SlotKey>,
    /// Slot that asked to play while `draining` was set.
    waiting: Option<SlotKey>,
    next_token: u64,
}

impl PlaybackCoordinator {
    pub fn new() -> Self { Self::default() }

    /// Register a video slot. New slots start `Stopped` and not visible.
    pub fn mount(&mut self, key: SlotKey) {
        self.slots.entry(key).or_insert_with(SlotRecord::new);
    }

    pub fn is_mounted(&self, key: &SlotKey) -> bool { self.slots.contains_key(key) }

    pub fn intent(&self, key: &SlotKey) -> Option<PlaybackIntent> { self.slots.get(key).map(|r| r.intent) }

    pub fn playing_slot(&self) -> Option<&SlotKey> { self.holder.as_ref() }

    pub fn playing_count(&self) -> usize {
        self.slots.values().filter(|r| r.intent == PlaybackIntent::Playing).count()
    }

    pub fn mounted_slots(&self) -> impl Iterator<Item = &SlotKey> { self.slots.keys() }

    /// Tear down a slot. Any command still in flight for it is forgotten.
    pub fn unmount(&mut self, key: &SlotKey) -> Vec<PlayerCommand> {
        let mut out = Vec::new();
        if self.slots.remove(key).is_none() { return out; }
        debug!(slot = %key, "slot unmounted");
        if self.holder.as_ref() == Some(key) { self.holder = None; }
        if self.waiting.as_ref() == Some(key) { self.waiting = None; }
        if self.draining.as_ref() == Some(key) {
            self.draining = None;
            self.grant_waiting(&mut out);
        }
        out
    }

    pub fn unmount_item(&mut self, item_id: &str) -> Vec<PlayerCommand> {
        let keys: Vec<SlotKey> = self.slots.keys().filter(|k| k.item_id == item_id).cloned().collect();
        keys.iter().flat_map(|k| self.unmount(k)).collect()
    }

    /// Effective visibility (item visible and carousel slot centred) changed.
    pub fn set_visible(&mut self, key: &SlotKey, visible: bool) -> Vec<PlayerCommand> {
        let mut out = Vec::new();
        let Some(rec) = self.slots.get_mut(key) else { return out; };
        if rec.visible == visible { return out; }
        rec.visible = visible;
        // A tap pause only lasts while the slot stays visible.
        rec.user_paused = false;
        if visible {
            self.request_play(key, &mut out);
        } else {
            rec.queued_tap = false;
            if self.waiting.as_ref() == Some(key) { self.waiting = None; }
            if self.holder.as_ref() == Some(key) { self.pause_holder(&mut out); }
        }
        out
    }

    /// User tapped the video. Applied against the settled state; while a command
    /// for this slot is in flight the tap is queued until it settles.
    pub fn tap(&mut self, key: &SlotKey) -> Vec<PlayerCommand> {
        let mut out = Vec::new();
        let busy = self.waiting.as_ref() == Some(key);
        let Some(rec) = self.slots.get_mut(key) else { return out; };
        if busy || rec.in_flight.is_some() {
            rec.queued_tap = !rec.queued_tap;
            debug!(slot = %key, queued = rec.queued_tap, "tap deferred until command settles");
            return out;
        }
        self.apply_tap(key, &mut out);
        out
    }

    pub fn acknowledge(&mut self, ack: CommandAck) -> Vec<PlayerCommand> {
        let mut out = Vec::new();
        let Some(rec) = self.slots.get_mut(&ack.slot) else {
            debug!(slot = %ack.slot, token = ack.token, "ack for unmounted slot ignored");
            return out;
        };
        let Some(in_flight) = rec.in_flight.filter(|f| f.token == ack.token) else {
            debug!(slot = %ack.slot, token = ack.token, "stale ack ignored");
            return out;
        };
        rec.in_flight = None;

        if let Err(e) = &ack.result {
            warn!(slot = %ack.slot, action = in_flight.action.as_str(), error = %e, "player command failed; forcing pause");
            rec.intent = PlaybackIntent::Paused;
            if self.holder.as_ref() == Some(&ack.slot) { self.holder = None; }
        }

        if self.draining.as_ref() == Some(&ack.slot) {
            self.draining = None;
            self.grant_waiting(&mut out);
        }

        if let Some(rec) = self.slots.get_mut(&ack.slot) {
            if rec.queued_tap && rec.in_flight.is_none() {
                rec.queued_tap = false;
                self.apply_tap(&ack.slot, &mut out);
            }
        }
        out
    }

    fn apply_tap(&mut self, key: &SlotKey, out: &mut Vec<PlayerCommand>) {
        let Some(rec) = self.slots.get_mut(key) else { return; };
        match rec.intent {
            PlaybackIntent::Playing => {
                rec.user_paused = true;
                if self.holder.as_ref() == Some(key) { self.pause_holder(out); }
            }
            PlaybackIntent::Paused | PlaybackIntent::Stopped if rec.visible => {
                rec.user_paused = false;
                self.request_play(key, out);
            }
            _ => {}
        }
    }

    fn request_play(&mut self, key: &SlotKey, out: &mut Vec<PlayerCommand>) {
        if self.holder.as_ref() == Some(key) || self.waiting.as_ref() == Some(key) { return; }
        if self.slots.get(key).map_or(true, |r| r.user_paused) { return; }

        if self.holder.is_some() {
            debug!(from = ?self.holder, to = %key, "handing off playback");
            self.pause_holder(out);
        }
        if self.draining.is_some() {
            if let Some(prev) = self.waiting.replace(key.clone()) {
                if let Some(r) = self.slots.get_mut(&prev) { r.queued_tap = false; }
            }
            return;
        }
        self.grant(key.clone(), out);
    }

    fn grant_waiting(&mut self, out: &mut Vec<PlayerCommand>) {
        if let Some(next) = self.waiting.take() {
            let eligible = self.slots.get(&next).is_some_and(|r| r.visible && !r.user_paused);
            if eligible { self.grant(next, out); }
        }
    }

    fn grant(&mut self, key: SlotKey, out: &mut Vec<PlayerCommand>) {
        debug_assert!(self.holder.is_none());
        let token = self.issue(&key, PlayerAction::Play, out);
        if let Some(rec) = self.slots.get_mut(&key) { rec.intent = PlaybackIntent::Playing; }
        debug!(slot = %key, token, "playback granted");
        self.holder = Some(key);
    }

    fn pause_holder(&mut self, out: &mut Vec<PlayerCommand>) {
        let Some(key) = self.holder.take() else { return; };
        self.issue(&key, PlayerAction::Pause, out);
        if let Some(rec) = self.slots.get_mut(&key) { rec.intent = PlaybackIntent::Paused; }
        self.draining = Some(key);
    }

    fn issue(&mut self, key: &SlotKey, action: PlayerAction, out: &mut Vec<PlayerCommand>) -> u64 {
        self.next_token += 1;
        let token = self.next_token;
        if let Some(rec) = self.slots.get_mut(key) { rec.in_flight = Some(InFlight { token, action }); }
        out.push(PlayerCommand { slot: key.clone(), action, token });
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(item: &str, slot: usize) -> SlotKey { SlotKey::new(item, slot) }

    fn only(cmds: &[PlayerCommand]) -> &PlayerCommand {
        assert_eq!(cmds.len(), 1, "expected one command, got {cmds:?}");
        &cmds[0]
    }

    fn ack_all(c: &mut PlaybackCoordinator, cmds: Vec<PlayerCommand>) -> Vec<PlayerCommand> {
        cmds.iter().flat_map(|cmd| c.acknowledge(CommandAck::ok(cmd))).collect()
    }

    #[test]
    fn visible_video_plays_and_pauses_when_hidden() {
        let mut c = PlaybackCoordinator::new();
        let b = key("B", 1);
        c.mount(b.clone());
        assert_eq!(c.intent(&b), Some(PlaybackIntent::Stopped));

        let cmds = c.set_visible(&b, true);
        assert_eq!(only(&cmds).action, PlayerAction::Play);
        assert_eq!(c.intent(&b), Some(PlaybackIntent::Playing));
        assert!(ack_all(&mut c, cmds).is_empty());

        let cmds = c.set_visible(&b, false);
        assert_eq!(only(&cmds).action, PlayerAction::Pause);
        assert_eq!(c.intent(&b), Some(PlaybackIntent::Paused));
    }

    #[test]
    fn repeated_visibility_is_idempotent() {
        let mut c = PlaybackCoordinator::new();
        let a = key("A", 0);
        c.mount(a.clone());
        assert_eq!(c.set_visible(&a, true).len(), 1);
        assert!(c.set_visible(&a, true).is_empty());
    }

    #[test]
    fn handoff_waits_for_previous_pause_ack() {
        let mut c = PlaybackCoordinator::new();
        let (a, b) = (key("A", 0), key("B", 0));
        c.mount(a.clone());
        c.mount(b.clone());
        let play_a = c.set_visible(&a, true);
        ack_all(&mut c, play_a);

        let pause_a = c.set_visible(&a, false);
        assert_eq!(only(&pause_a).action, PlayerAction::Pause);
        assert!(c.set_visible(&b, true).is_empty(), "B must wait for A's pause");
        assert_eq!(c.intent(&b), Some(PlaybackIntent::Stopped));

        let next = ack_all(&mut c, pause_a);
        let play_b = only(&next);
        assert_eq!((play_b.slot.clone(), play_b.action), (b.clone(), PlayerAction::Play));
        assert_eq!(c.playing_slot(), Some(&b));
        assert_eq!(c.playing_count(), 1);
    }

    #[test]
    fn taking_over_a_playing_slot_pauses_it_first() {
        let mut c = PlaybackCoordinator::new();
        let (a, b) = (key("A", 0), key("B", 0));
        c.mount(a.clone());
        c.mount(b.clone());
        let play_a = c.set_visible(&a, true);
        ack_all(&mut c, play_a);

        // B reports visible before A reports hidden.
        let cmds = c.set_visible(&b, true);
        let pause = only(&cmds);
        assert_eq!((pause.slot.clone(), pause.action), (a.clone(), PlayerAction::Pause));
        assert_eq!(c.playing_count(), 0);
        let next = ack_all(&mut c, cmds);
        assert_eq!(only(&next).slot, b);
    }

    #[test]
    fn last_command_wins_over_late_play_ack() {
        let mut c = PlaybackCoordinator::new();
        let a = key("A", 0);
        c.mount(a.clone());
        let play = c.set_visible(&a, true).remove(0);
        let pause = c.set_visible(&a, false).remove(0);
        assert!(pause.token > play.token);

        assert!(c.acknowledge(CommandAck::ok(&play)).is_empty());
        assert_eq!(c.intent(&a), Some(PlaybackIntent::Paused));
        c.acknowledge(CommandAck::ok(&pause));
        assert_eq!(c.intent(&a), Some(PlaybackIntent::Paused));
        assert_eq!(c.playing_count(), 0);
    }

    #[test]
    fn tap_pause_sticks_until_tapped_again() {
        let mut c = PlaybackCoordinator::new();
        let a = key("A", 0);
        c.mount(a.clone());
        let play = c.set_visible(&a, true);
        ack_all(&mut c, play);

        let pause = c.tap(&a);
        assert_eq!(only(&pause).action, PlayerAction::Pause);
        ack_all(&mut c, pause);
        assert!(c.set_visible(&a, true).is_empty());
        assert_eq!(c.intent(&a), Some(PlaybackIntent::Paused));

        let resume = c.tap(&a);
        assert_eq!(only(&resume).action, PlayerAction::Play);
        assert_eq!(c.intent(&a), Some(PlaybackIntent::Playing));
    }

    #[test]
    fn tap_pause_is_forgotten_after_visibility_cycle() {
        let mut c = PlaybackCoordinator::new();
        let a = key("A", 2);
        c.mount(a.clone());
        let play = c.set_visible(&a, true);
        ack_all(&mut c, play);
        let pause = c.tap(&a);
        ack_all(&mut c, pause);

        assert!(c.set_visible(&a, false).is_empty());
        let cmds = c.set_visible(&a, true);
        assert_eq!(only(&cmds).action, PlayerAction::Play);
    }

    #[test]
    fn tap_during_transition_is_applied_after_it_settles() {
        let mut c = PlaybackCoordinator::new();
        let a = key("A", 0);
        c.mount(a.clone());
        let play = c.set_visible(&a, true);
        assert!(c.tap(&a).is_empty());
        assert_eq!(c.intent(&a), Some(PlaybackIntent::Playing));

        let after = ack_all(&mut c, play);
        assert_eq!(only(&after).action, PlayerAction::Pause);
        assert_eq!(c.intent(&a), Some(PlaybackIntent::Paused));
    }

    #[test]
    fn double_tap_while_busy_cancels_out() {
        let mut c = PlaybackCoordinator::new();
        let a = key("A", 0);
        c.mount(a.clone());
        let play = c.set_visible(&a, true);
        c.tap(&a);
        c.tap(&a);
        assert!(ack_all(&mut c, play).is_empty());
        assert_eq!(c.intent(&a), Some(PlaybackIntent::Playing));
    }

    #[test]
    fn rejected_play_falls_back_to_paused() {
        let mut c = PlaybackCoordinator::new();
        let (a, b) = (key("A", 0), key("B", 0));
        c.mount(a.clone());
        c.mount(b.clone());
        let play = c.set_visible(&a, true).remove(0);
        let err = PlaybackCommandError { slot: a.to_string(), action: "play", reason: "decoder busy".into() };
        c.acknowledge(CommandAck { slot: a.clone(), token: play.token, result: Err(err) });
        assert_eq!(c.intent(&a), Some(PlaybackIntent::Paused));
        assert_eq!(c.playing_slot(), None);

        c.set_visible(&a, false);
        let cmds = c.set_visible(&b, true);
        assert_eq!(only(&cmds).slot, b);
    }

    #[test]
    fn unmount_discards_in_flight_and_releases_waiter() {
        let mut c = PlaybackCoordinator::new();
        let (a, b) = (key("A", 0), key("B", 0));
        c.mount(a.clone());
        c.mount(b.clone());
        let play_a = c.set_visible(&a, true);
        ack_all(&mut c, play_a);
        let pause_a = c.set_visible(&a, false);
        assert!(c.set_visible(&b, true).is_empty());

        let cmds = c.unmount_item("A");
        assert_eq!(only(&cmds).slot, b);
        assert_eq!(c.intent(&a), None);
        assert!(ack_all(&mut c, pause_a).is_empty());
        assert_eq!(c.playing_slot(), Some(&b));
    }

    #[test]
    fn at_most_one_slot_playing_under_random_events() {
        let keys: Vec<SlotKey> = (0..4).map(|i| key(&format!("item{}", i / 2), i % 2)).collect();
        let mut c = PlaybackCoordinator::new();
        let mut pending: Vec<PlayerCommand> = Vec::new();
        let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut next = || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) as usize
        };

        for _ in 0..2_000 {
            let k = &keys[next() % keys.len()];
            let cmds = match next() % 6 {
                0 => { c.mount(k.clone()); Vec::new() }
                1 => c.unmount(k),
                2 => c.set_visible(k, true),
                3 => c.set_visible(k, false),
                4 => c.tap(k),
                _ if !pending.is_empty() => {
                    let cmd = pending.remove(next() % pending.len());
                    let result = if next() % 10 == 0 {
                        Err(PlaybackCommandError { slot: cmd.slot.to_string(), action: cmd.action.as_str(), reason: "x".into() })
                    } else {
                        Ok(())
                    };
                    c.acknowledge(CommandAck { slot: cmd.slot.clone(), token: cmd.token, result })
                }
                _ => Vec::new(),
            };
            pending.extend(cmds);
            assert!(c.playing_count() <= 1);
            if let Some(h) = c.playing_slot() {
                assert_eq!(c.intent(h), Some(PlaybackIntent::Playing));
            }
        }
    }
}
