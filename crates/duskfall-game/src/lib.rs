//! The Duskfall game engine.
//!
//! One [`Game`] is one instance of the social-deduction game: a registry
//! of players and roles, an event bus that role modules subscribe to, the
//! phase scheduler that drives night and day, and the night resolution
//! pipeline. A game is plain synchronous state; [`spawn_game`] wraps it in
//! an actor task and [`GameManager`] tracks many of them.
//!
//! # Key types
//!
//! - [`Game`]: the per-game world and its operations
//! - [`GameEvent`] / [`EventKind`]: what role modules subscribe to
//! - [`RoleModule`]: one role's commands and handlers
//! - [`GameConfig`]: limits, timers, role table
//! - [`GameHandle`] / [`GameManager`]: the async surface
//! - [`Messenger`] / [`StatsSink`]: collaborators supplied by the host
//!
//! # Night pipeline
//!
//! ```text
//! night_kills → redirect → night_defenses → protection_consumed*
//!             → night_overrides → del_player* → night_resolved
//! ```

mod actor;
mod command;
mod config;
mod error;
mod event;
mod game;
mod manager;
mod night;
mod outbox;
mod phase;
mod registry;
pub mod roles;
mod state;
mod vote;
mod win;

pub use duskfall_bus::{DEFAULT_PRIORITY, Event, SubscriptionId};

pub use actor::{GameHandle, GameInfo, spawn_game};
pub use command::{CommandCall, CommandSpec, RoleGate, Visibility};
pub use config::{GameConfig, Phase, RoleQuota, RoleTable, TotemChances};
pub use error::GameError;
pub use event::{EventKind, GameEvent};
pub use game::Game;
pub use manager::{DEFAULT_CHANNEL_SIZE, GameManager};
pub use night::{
    ActionKind, Defense, DefenseKind, Direction, Effect, KillIntent, KillSource, NightEffects,
    NightRecords, NightReport, NightState, Outstanding, PendingKill, Protection, adjacent,
    apply_defenses, redirect_chain,
};
pub use outbox::{
    ChannelMessenger, Delivery, MemoryStats, Messenger, NullMessenger, NullStats, OutcomeRecord,
    StatsSink,
};
pub use phase::{TimerFire, TimerKind, TimerRequest};
pub use registry::{Death, FinalRole, LivingCounts, Player, Registry};
pub use roles::{Action, PhaseChange, RoleModule, standard_modules};
pub use state::RoleStates;
pub use vote::{DayVotes, majority};
pub use win::{WinResult, default_outcome};
