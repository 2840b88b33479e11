//! # Duskfall
//!
//! A social-deduction game engine for chat bots.
//!
//! Players join a game in a channel, are dealt secret roles, and alternate
//! between nights (private actions: kills, visions, protections, totems)
//! and days (public voting that lynches one player). The engine resolves
//! every night in a fixed order, evaluates win conditions after each death,
//! and drives the phases on timers.
//!
//! A chat bridge supplies a [`Messenger`](prelude::Messenger) and feeds
//! player commands to an [`Engine`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use duskfall::prelude::*;
//!
//! # async fn run() -> Result<(), DuskfallError> {
//! duskfall::logging::init();
//!
//! let engine = Engine::builder().build();
//! let game_id = engine.join(PlayerId(1), "alice").await?;
//! engine
//!     .command(CommandCall::public(PlayerId(1), "start", &[]), Some(game_id))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
pub mod logging;

pub use engine::{Engine, EngineBuilder};
pub use error::DuskfallError;

pub use duskfall_bus as bus;
pub use duskfall_game as game;
pub use duskfall_protocol as protocol;
pub use duskfall_timer as timer;

/// Everything a chat bridge usually needs.
pub mod prelude {
    pub use crate::{DuskfallError, Engine, EngineBuilder};

    pub use duskfall_game::{
        ChannelMessenger, CommandCall, CommandSpec, Delivery, Game, GameConfig, GameError,
        GameEvent, GameHandle, GameInfo, GameManager, MemoryStats, Messenger, NullMessenger,
        NullStats, OutcomeRecord, Phase, RoleModule, StatsSink,
    };
    pub use duskfall_protocol::{
        Codec, DeathCause, GameId, JsonCodec, Notice, PlayerId, Recipient, Role, Winner,
    };
}
