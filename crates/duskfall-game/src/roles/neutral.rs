//! Jesters and monsters. Neither has commands; both bend the rules.

use std::sync::Arc;

use duskfall_bus::{Event, EventBus};
use duskfall_protocol::{Notice, Role, Winner};
use tracing::info;

use super::RoleModule;
use crate::event::{EventKind, GameEvent};
use crate::night::KillSource;
use crate::win::{WinResult, default_outcome};
use crate::Game;

#[derive(Debug, Default)]
pub struct NeutralModule;

impl RoleModule for NeutralModule {
    fn name(&self) -> &'static str {
        "neutral"
    }

    fn install(self: Arc<Self>, bus: &mut EventBus<Game>) {
        bus.subscribe(EventKind::Lynch, 10, |game: &mut Game, ev: &mut Event<GameEvent>| {
            let GameEvent::Lynch { target, .. } = *ev.payload() else {
                return Ok(());
            };
            if game.registry.main_role(target) == Some(Role::Jester) {
                info!(game_id = %game.id, player_id = %target, "jester lynched");
                game.individual_winners.insert(target);
                game.announce(Notice::JesterWins { player: target });
            }
            Ok(())
        });

        // Wolves can't kill a monster.
        bus.subscribe(EventKind::NightOverrides, 10, |game: &mut Game, ev: &mut Event<GameEvent>| {
            let GameEvent::NightOverrides { pending } = ev.payload_mut() else {
                return Ok(());
            };
            for kill in pending.iter_mut() {
                if game.registry.main_role(kill.target) == Some(Role::Monster) {
                    kill.attacks.retain(|a| a.source != KillSource::Wolves);
                }
            }
            pending.retain(|p| !p.attacks.is_empty());
            Ok(())
        });

        bus.subscribe(EventKind::ChkWin, 20, |game: &mut Game, ev: &mut Event<GameEvent>| {
            let monsters = game.registry.players_with_role(Role::Monster);
            if monsters.is_empty() {
                return Ok(());
            }
            let GameEvent::ChkWin { counts, result } = ev.payload_mut() else {
                return Ok(());
            };
            if default_outcome(counts).is_none() {
                return Ok(());
            }
            *result = Some(
                WinResult::new(
                    Winner::Monsters,
                    "The game is over, but the monsters are still alive. The monsters win.",
                )
                .with_members(monsters),
            );
            ev.stop();
            ev.prevent_default();
            Ok(())
        });
    }
}
