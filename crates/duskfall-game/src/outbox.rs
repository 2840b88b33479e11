//! Collaborators the engine talks to: the chat bridge and the stats store.
//!
//! Game code never calls these directly. It buffers `(Recipient, Notice)`
//! pairs and outcome records, and the owning actor hands them over after
//! each command, so a slow bridge can never stall a dispatch.

use std::sync::{Mutex, PoisonError};

use duskfall_protocol::{GameId, Notice, PlayerId, Recipient, Role};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Delivers notices. Fire-and-forget: failures are the bridge's problem.
pub trait Messenger: Send + Sync {
    fn send_to_player(&self, game: GameId, player: PlayerId, notice: &Notice);

    fn send_to_channel(&self, game: GameId, notice: &Notice);

    fn deliver(&self, game: GameId, recipient: Recipient, notice: &Notice) {
        match recipient {
            Recipient::Channel => self.send_to_channel(game, notice),
            Recipient::Player(player) => self.send_to_player(game, player, notice),
        }
    }
}

/// Persists per-player results. Called once per participant at game end.
pub trait StatsSink: Send + Sync {
    fn record_outcome(&self, outcome: &OutcomeRecord);
}

/// One participant's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub game: GameId,
    pub player: PlayerId,
    /// Final role, after any conversion.
    pub role: Role,
    pub won: bool,
    /// Won on their own terms rather than with a team.
    pub individually_won: bool,
}

// ---------------------------------------------------------------------------
// Channel messenger
// ---------------------------------------------------------------------------

/// A notice addressed to someone in a specific game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub game: GameId,
    pub recipient: Recipient,
    pub notice: Notice,
}

/// Forwards every notice into an unbounded channel.
///
/// The usual bridge: a task on the other end renders and sends them.
#[derive(Debug, Clone)]
pub struct ChannelMessenger {
    sender: mpsc::UnboundedSender<Delivery>,
}

impl ChannelMessenger {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Delivery>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Messenger for ChannelMessenger {
    fn send_to_player(&self, game: GameId, player: PlayerId, notice: &Notice) {
        self.deliver(game, Recipient::Player(player), notice);
    }

    fn send_to_channel(&self, game: GameId, notice: &Notice) {
        self.deliver(game, Recipient::Channel, notice);
    }

    fn deliver(&self, game: GameId, recipient: Recipient, notice: &Notice) {
        // A closed receiver means nobody is listening any more.
        let _ = self.sender.send(Delivery {
            game,
            recipient,
            notice: notice.clone(),
        });
    }
}

/// Drops every notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMessenger;

impl Messenger for NullMessenger {
    fn send_to_player(&self, _game: GameId, _player: PlayerId, _notice: &Notice) {}

    fn send_to_channel(&self, _game: GameId, _notice: &Notice) {}
}

// ---------------------------------------------------------------------------
// Stats sinks
// ---------------------------------------------------------------------------

/// Keeps outcomes in memory.
#[derive(Debug, Default)]
pub struct MemoryStats {
    outcomes: Mutex<Vec<OutcomeRecord>>,
}

impl MemoryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcomes(&self) -> Vec<OutcomeRecord> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StatsSink for MemoryStats {
    fn record_outcome(&self, outcome: &OutcomeRecord) {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome.clone());
    }
}

/// Discards outcomes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStats;

impl StatsSink for NullStats {
    fn record_outcome(&self, _outcome: &OutcomeRecord) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_messenger_forwards_with_recipient() {
        let (messenger, mut rx) = ChannelMessenger::new();
        messenger.send_to_player(GameId(1), PlayerId(4), &Notice::NoLynch);
        messenger.send_to_channel(GameId(1), &Notice::ActionRetracted);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.recipient, Recipient::Player(PlayerId(4)));
        assert_eq!(first.notice, Notice::NoLynch);
        assert_eq!(rx.try_recv().unwrap().recipient, Recipient::Channel);
    }

    #[test]
    fn test_channel_messenger_ignores_closed_receiver() {
        let (messenger, rx) = ChannelMessenger::new();
        drop(rx);
        messenger.send_to_channel(GameId(1), &Notice::NoLynch);
    }

    #[test]
    fn test_memory_stats_keeps_outcomes() {
        let stats = MemoryStats::new();
        stats.record_outcome(&OutcomeRecord {
            game: GameId(2),
            player: PlayerId(1),
            role: Role::Jester,
            won: true,
            individually_won: true,
        });
        assert_eq!(stats.outcomes().len(), 1);
        assert!(stats.outcomes()[0].individually_won);
    }
}
