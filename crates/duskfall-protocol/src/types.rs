//! Identity types and message addressing.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A stable identifier for a participant.
///
/// Newtype over `u64` so a `GameId` can never be passed where a player is
/// expected. `#[serde(transparent)]` keeps it a bare number on the wire.
///
/// The ordering is meaningful: resolution sorts by `PlayerId` whenever it
/// needs a deterministic tie order that is not the join order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for one game instance.
///
/// Timer fires carry the game id so a callback that outlives its game (or
/// was routed to the wrong one) can be recognized as stale.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who should receive a notice.
///
/// The engine never talks to the transport directly. It produces
/// `(Recipient, Notice)` pairs and the owning actor hands them to the
/// messenger after the current command has been fully processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// The public game channel.
    Channel,

    /// One player, privately.
    Player(PlayerId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_display() {
        assert_eq!(PlayerId(42).to_string(), "P-42");
    }

    #[test]
    fn test_game_id_display() {
        assert_eq!(GameId(7).to_string(), "G-7");
    }

    #[test]
    fn test_player_id_orders_numerically() {
        let mut ids = vec![PlayerId(10), PlayerId(2), PlayerId(7)];
        ids.sort();
        assert_eq!(ids, vec![PlayerId(2), PlayerId(7), PlayerId(10)]);
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_player_id_serializes_transparently() {
        let json = serde_json::to_string(&PlayerId(42)).unwrap();
        assert_eq!(json, "42");
    }
}
