//! The gunner template.

use duskfall_protocol::{DeathCause, Notice, ShotOutcome, Template};
use rand::Rng;
use tracing::info;

use super::{Action, RoleModule, not_self};
use crate::command::{CommandSpec, RoleGate, Visibility};
use crate::registry::Death;
use crate::{Game, GameError, Phase};

const COMMANDS: &[CommandSpec] = &[CommandSpec {
    name: "shoot",
    phases: &[Phase::Day],
    gate: RoleGate::Template(Template::Gunner),
    visibility: Visibility::Public,
    targets: 1,
}];

/// Gunners shoot by day, a bullet per shot, and sometimes miss.
#[derive(Debug, Default)]
pub struct GunnerModule;

impl RoleModule for GunnerModule {
    fn name(&self) -> &'static str {
        "gunner"
    }

    fn commands(&self) -> &'static [CommandSpec] {
        COMMANDS
    }

    fn on_day_action(&self, game: &mut Game, action: &Action) -> Result<(), GameError> {
        let target = action.target()?;
        not_self(action, target)?;
        let left = game.registry.use_charge(action.actor, Template::Gunner)?;

        let missed = game.rng.random_bool(game.config.gunner_miss_chance);
        let outcome = if missed {
            ShotOutcome::Missed
        } else {
            ShotOutcome::Killed
        };
        info!(
            game_id = %game.id,
            shooter = %action.actor,
            %target,
            ?outcome,
            bullets_left = left,
            "shot fired"
        );
        game.announce(Notice::Shot {
            shooter: action.actor,
            target,
            outcome,
        });

        if !missed {
            let deaths = game.kill_players(vec![(target, DeathCause::Shot)])?;
            let chained: Vec<Death> = deaths.into_iter().filter(|d| d.player != target).collect();
            if !chained.is_empty() {
                game.announce(Notice::Deaths {
                    deaths: chained.iter().map(Death::report).collect(),
                });
            }
        }
        Ok(())
    }
}
