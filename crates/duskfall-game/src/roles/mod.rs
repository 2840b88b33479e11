//! Role behaviors.
//!
//! Each role is a [`RoleModule`]: a set of commands plus bus subscriptions.
//! Modules never call each other. They cooperate through the events the
//! engine dispatches while it runs a phase, and keep their private state in
//! the game's [`RoleStates`](crate::RoleStates) arena.

mod guardian;
mod gunner;
mod matchmaker;
mod neutral;
mod seer;
mod shaman;
mod wolf;

use std::sync::Arc;

use duskfall_bus::EventBus;
use duskfall_protocol::{PlayerId, Role};

use crate::command::CommandSpec;
use crate::night::ActionKind;
use crate::registry::Death;
use crate::{Game, GameError};

pub use guardian::{GuardianModule, GuardianState};
pub use gunner::GunnerModule;
pub use matchmaker::{MatchmakerModule, MatchmakerState};
pub use neutral::NeutralModule;
pub use seer::SeerModule;
pub use shaman::{ShamanModule, ShamanState};
pub use wolf::{WolfModule, WolfState};

/// A phase boundary, as seen by role modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseChange {
    NightBegan(u32),
    /// Before the night is resolved.
    NightEnding(u32),
    DayBegan(u32),
    /// Before the lynch is carried out.
    DayEnding(u32),
}

/// A command that passed the gate, with its targets resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub actor: PlayerId,
    pub command: &'static str,
    pub targets: Vec<PlayerId>,
}

impl Action {
    /// The first target. The gate guarantees it for commands that take one.
    pub fn target(&self) -> Result<PlayerId, GameError> {
        self.targets
            .first()
            .copied()
            .ok_or_else(|| GameError::rejected(format!("{} needs a target", self.command)))
    }
}

/// One role's behavior.
///
/// Commands listed in [`commands`](Self::commands) are routed to
/// [`on_night_action`](Self::on_night_action) or
/// [`on_day_action`](Self::on_day_action) after the gate accepted them.
/// Everything else happens in bus handlers registered by
/// [`install`](Self::install).
pub trait RoleModule: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn commands(&self) -> &'static [CommandSpec] {
        &[]
    }

    /// Subscribes the module's handlers. Called once per game.
    fn install(self: Arc<Self>, _bus: &mut EventBus<Game>) {}

    fn on_night_action(&self, _game: &mut Game, action: &Action) -> Result<(), GameError> {
        Err(GameError::rejected(format!("{} does nothing at night", action.command)))
    }

    fn on_day_action(&self, _game: &mut Game, action: &Action) -> Result<(), GameError> {
        Err(GameError::rejected(format!("{} does nothing by day", action.command)))
    }

    /// Called for every death, after the registry has recorded it.
    fn on_death(&self, _game: &mut Game, _death: &Death) -> Result<(), GameError> {
        Ok(())
    }

    fn on_phase_change(&self, _game: &mut Game, _change: PhaseChange) -> Result<(), GameError> {
        Ok(())
    }
}

/// The modules every standard game installs.
pub fn standard_modules() -> Vec<Arc<dyn RoleModule>> {
    vec![
        Arc::new(WolfModule),
        Arc::new(SeerModule),
        Arc::new(GuardianModule),
        Arc::new(ShamanModule),
        Arc::new(MatchmakerModule),
        Arc::new(NeutralModule),
        Arc::new(GunnerModule),
    ]
}

/// Living holders of `roles`, and how many of them recorded `kind` tonight.
pub(crate) fn outstanding(game: &Game, roles: &[Role], kind: ActionKind) -> (usize, usize) {
    let actors = game.registry.players_with_any(roles);
    let acted = actors
        .iter()
        .filter(|a| game.night.records.has_acted(kind, **a))
        .count();
    (actors.len(), acted)
}

/// Refuses actions aimed at the actor.
pub(crate) fn not_self(action: &Action, target: PlayerId) -> Result<(), GameError> {
    if target == action.actor {
        return Err(GameError::rejected(format!("you can't {} yourself", action.command)));
    }
    Ok(())
}
