//! Error types for the game layer.

use duskfall_bus::BusError;
use duskfall_protocol::{GameId, PlayerId};

/// Errors that can occur while running a game.
///
/// Two classes matter to callers. Most variants are *rejections*: the
/// request was refused, nothing changed, and the actor gets a private
/// notice. [`Invariant`](Self::Invariant) and [`Bus`](Self::Bus) are
/// *fatal*: engine and role modules disagree about the world, so the game
/// instance is aborted (see [`is_fatal`](Self::is_fatal)).
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The game does not exist.
    #[error("game {0} not found")]
    NotFound(GameId),

    /// No more player slots.
    #[error("game {0} is full")]
    GameFull(GameId),

    /// The player already joined this game.
    #[error("player {0} already joined game {1}")]
    AlreadyJoined(PlayerId, GameId),

    /// The player is not a participant of this game.
    #[error("player {0} is not in game {1}")]
    NotInGame(PlayerId, GameId),

    /// The game is in a phase that doesn't allow this operation.
    #[error("invalid game state for this operation: {0}")]
    InvalidState(String),

    /// A player action was refused (wrong target, wrong phase, self-target).
    /// The message is shown to the player.
    #[error("{0}")]
    InvalidAction(String),

    /// The player was already removed from the living.
    #[error("player {0} is already dead")]
    AlreadyDead(PlayerId),

    /// The engine's own bookkeeping is inconsistent.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// Event dispatch failed as a whole.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// The configuration could not be parsed.
    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),

    /// The game's command channel is full or closed.
    #[error("game {0} is unavailable")]
    Unavailable(GameId),
}

impl GameError {
    /// Shorthand for a player-facing rejection.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::InvalidAction(reason.into())
    }

    /// Returns `true` for errors that must abort the game instance.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Invariant(_) | Self::Bus(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_are_not_fatal() {
        assert!(!GameError::rejected("no").is_fatal());
        assert!(!GameError::AlreadyDead(PlayerId(1)).is_fatal());
        assert!(!GameError::GameFull(GameId(1)).is_fatal());
    }

    #[test]
    fn test_invariant_and_bus_errors_are_fatal() {
        assert!(GameError::Invariant("role set out of sync".into()).is_fatal());
        let bus = BusError::RecursionLimit {
            kind: "DelPlayer".into(),
            depth: 32,
        };
        assert!(GameError::from(bus).is_fatal());
    }

    #[test]
    fn test_invalid_action_displays_reason_only() {
        assert_eq!(
            GameError::rejected("you can't see yourself").to_string(),
            "you can't see yourself"
        );
    }
}
