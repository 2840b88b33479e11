//! Unified error type for the Duskfall engine.

use duskfall_bus::BusError;
use duskfall_game::GameError;
use duskfall_protocol::ProtocolError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` variants let `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum DuskfallError {
    /// Encoding or decoding a notice failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The event bus refused a dispatch.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// A game rejected an operation or failed.
    #[error(transparent)]
    Game(#[from] GameError),

    /// Reading a config file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DuskfallError {
    /// Whether a player's command was refused, as opposed to the engine or a
    /// game failing.
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::Game(
                GameError::NotFound(_) | GameError::Unavailable(_) | GameError::Config(_),
            ) => false,
            Self::Game(err) => !err.is_fatal(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duskfall_protocol::{GameId, PlayerId};

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let duskfall_err: DuskfallError = err.into();
        assert!(matches!(duskfall_err, DuskfallError::Protocol(_)));
        assert!(duskfall_err.to_string().contains("bad"));
    }

    #[test]
    fn test_from_bus_error() {
        let err = BusError::RecursionLimit {
            kind: "chk_win".into(),
            depth: 16,
        };
        let duskfall_err: DuskfallError = err.into();
        assert!(matches!(duskfall_err, DuskfallError::Bus(_)));
    }

    #[test]
    fn test_from_game_error() {
        let err = GameError::NotInGame(PlayerId(3), GameId(1));
        let duskfall_err: DuskfallError = err.into();
        assert!(matches!(duskfall_err, DuskfallError::Game(_)));
        assert!(duskfall_err.is_rejection());
    }

    #[test]
    fn test_fatal_game_error_is_not_a_rejection() {
        let duskfall_err: DuskfallError = GameError::Invariant("broken".into()).into();
        assert!(!duskfall_err.is_rejection());
        let gone: DuskfallError = GameError::Unavailable(GameId(2)).into();
        assert!(!gone.is_rejection());
    }

    #[test]
    fn test_invalid_action_is_a_rejection() {
        let duskfall_err: DuskfallError = GameError::InvalidAction("no".into()).into();
        assert!(duskfall_err.is_rejection());
    }

    #[test]
    fn test_from_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.json");
        let duskfall_err: DuskfallError = err.into();
        assert!(matches!(duskfall_err, DuskfallError::Io(_)));
    }
}
