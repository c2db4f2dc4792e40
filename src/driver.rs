use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info};

use crate::error::PlaybackCommandError;
use crate::playback::{CommandAck, PlayerAction, PlayerCommand, SlotKey};

/// Device media layer. Both calls complete once the player has applied the change.
#[async_trait]
pub trait MediaPlayer: Send + Sync {
    async fn play(&self, slot: &SlotKey) -> Result<(), PlaybackCommandError>;
    async fn pause(&self, slot: &SlotKey) -> Result<(), PlaybackCommandError>;
}

/// Runs player commands without blocking event delivery.
///
/// Commands for one slot execute strictly one after another in issue order.
/// While a slot is busy only its newest queued command is kept; older queued
/// ones are superseded and never reach the player.
pub struct PlayerDriver {
    player: Arc<dyn MediaPlayer>,
    running: FuturesUnordered<BoxFuture<'static, CommandAck>>,
    busy: HashSet<SlotKey>,
    queued: HashMap<SlotKey, PlayerCommand>,
}

impl PlayerDriver {
    pub fn new(player: Arc<dyn MediaPlayer>) -> Self {
        Self { player, running: FuturesUnordered::new(), busy: HashSet::new(), queued: HashMap::new() }
    }

    pub fn is_idle(&self) -> bool { self.running.is_empty() && self.queued.is_empty() }

    pub fn dispatch(&mut self, cmds: impl IntoIterator<Item = PlayerCommand>) {
        for cmd in cmds {
            if self.busy.contains(&cmd.slot) {
                if let Some(old) = self.queued.insert(cmd.slot.clone(), cmd) {
                    debug!(slot = %old.slot, token = old.token, "queued command superseded");
                }
            } else {
                self.start(cmd);
            }
        }
    }

    /// Drop anything queued for the slots of an unmounted item.
    pub fn forget_item(&mut self, item_id: &str) {
        self.queued.retain(|k, _| k.item_id != item_id);
    }

    /// Next completed command, or `None` once nothing is running.
    pub async fn next_ack(&mut self) -> Option<CommandAck> {
        let ack = self.running.next().await?;
        self.busy.remove(&ack.slot);
        if let Some(cmd) = self.queued.remove(&ack.slot) {
            self.start(cmd);
        }
        Some(ack)
    }

    fn start(&mut self, cmd: PlayerCommand) {
        self.busy.insert(cmd.slot.clone());
        let player = Arc::clone(&self.player);
        self.running.push(Box::pin(async move {
            let result = match cmd.action {
                PlayerAction::Play => player.play(&cmd.slot).await,
                PlayerAction::Pause => player.pause(&cmd.slot).await,
            };
            CommandAck { slot: cmd.slot, token: cmd.token, result }
        }));
    }
}

/// Player that only logs, for headless runs of the feed.
#[derive(Debug, Clone, Default)]
pub struct LoggingPlayer {
    latency: Duration,
}

impl LoggingPlayer {
    pub fn with_latency(latency: Duration) -> Self { Self { latency } }
}

#[async_trait]
impl MediaPlayer for LoggingPlayer {
    async fn play(&self, slot: &SlotKey) -> Result<(), PlaybackCommandError> {
        if !self.latency.is_zero() { tokio::time::sleep(self.latency).await; }
        info!(%slot, "play");
        Ok(())
    }

    async fn pause(&self, slot: &SlotKey) -> Result<(), PlaybackCommandError> {
        if !self.latency.is_zero() { tokio::time::sleep(self.latency).await; }
        info!(%slot, "pause");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Records every call; play calls block until released when `gate` is set.
    #[derive(Default)]
    pub(crate) struct RecordingPlayer {
        pub calls: Mutex<Vec<(SlotKey, PlayerAction)>>,
        pub gate: Option<Arc<Notify>>,
        pub reject_play: bool,
    }

    #[async_trait]
    impl MediaPlayer for RecordingPlayer {
        async fn play(&self, slot: &SlotKey) -> Result<(), PlaybackCommandError> {
            if let Some(g) = &self.gate { g.notified().await; }
            self.calls.lock().unwrap().push((slot.clone(), PlayerAction::Play));
            if self.reject_play {
                return Err(PlaybackCommandError { slot: slot.to_string(), action: "play", reason: "rejected".into() });
            }
            Ok(())
        }

        async fn pause(&self, slot: &SlotKey) -> Result<(), PlaybackCommandError> {
            self.calls.lock().unwrap().push((slot.clone(), PlayerAction::Pause));
            Ok(())
        }
    }

    fn cmd(item: &str, action: PlayerAction, token: u64) -> PlayerCommand {
        PlayerCommand { slot: SlotKey::new(item, 0), action, token }
    }

    #[tokio::test]
    async fn commands_for_one_slot_run_in_order_and_coalesce() {
        let gate = Arc::new(Notify::new());
        let player = Arc::new(RecordingPlayer { gate: Some(gate.clone()), ..Default::default() });
        let mut driver = PlayerDriver::new(player.clone());

        driver.dispatch([
            cmd("a", PlayerAction::Play, 1),
            cmd("a", PlayerAction::Pause, 2),
            cmd("a", PlayerAction::Play, 3),
            cmd("a", PlayerAction::Pause, 4),
        ]);
        gate.notify_one();

        let mut tokens = Vec::new();
        while let Some(ack) = driver.next_ack().await {
            tokens.push(ack.token);
        }
        assert_eq!(tokens, vec![1, 4]);
        let calls = player.calls.lock().unwrap();
        assert_eq!(calls.last().map(|c| c.1), Some(PlayerAction::Pause));
        assert!(driver.is_idle());
    }

    #[tokio::test]
    async fn distinct_slots_do_not_block_each_other() {
        let gate = Arc::new(Notify::new());
        let player = Arc::new(RecordingPlayer { gate: Some(gate.clone()), ..Default::default() });
        let mut driver = PlayerDriver::new(player.clone());

        driver.dispatch([cmd("a", PlayerAction::Play, 1), cmd("b", PlayerAction::Pause, 2)]);
        let first = driver.next_ack().await.unwrap();
        assert_eq!(first.token, 2);
        gate.notify_one();
        assert_eq!(driver.next_ack().await.unwrap().token, 1);
    }

    #[tokio::test]
    async fn forgotten_item_drops_queued_commands() {
        let gate = Arc::new(Notify::new());
        let player = Arc::new(RecordingPlayer { gate: Some(gate.clone()), ..Default::default() });
        let mut driver = PlayerDriver::new(player.clone());
        driver.dispatch([cmd("a", PlayerAction::Play, 1), cmd("a", PlayerAction::Pause, 2)]);
        driver.forget_item("a");
        gate.notify_one();
        assert_eq!(driver.next_ack().await.unwrap().token, 1);
        assert!(driver.next_ack().await.is_none());
    }
}
