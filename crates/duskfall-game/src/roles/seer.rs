//! Seers and their nightly visions.

use std::sync::Arc;

use duskfall_bus::{DEFAULT_PRIORITY, Event, EventBus};
use duskfall_protocol::{Notice, Role};

use super::{Action, RoleModule, not_self, outstanding};
use crate::command::{CommandSpec, RoleGate, Visibility};
use crate::event::{EventKind, GameEvent};
use crate::night::ActionKind;
use crate::{Game, GameError, Phase};

const SEERS: &[Role] = &[Role::Seer];

const COMMANDS: &[CommandSpec] = &[CommandSpec {
    name: "see",
    phases: &[Phase::Night],
    gate: RoleGate::Roles(SEERS),
    visibility: Visibility::Private,
    targets: 1,
}];

/// Seers learn one player's role each night.
#[derive(Debug, Default)]
pub struct SeerModule;

impl RoleModule for SeerModule {
    fn name(&self) -> &'static str {
        "seer"
    }

    fn commands(&self) -> &'static [CommandSpec] {
        COMMANDS
    }

    fn install(self: Arc<Self>, bus: &mut EventBus<Game>) {
        bus.subscribe(EventKind::ChkNightDone, DEFAULT_PRIORITY, |game: &mut Game, ev: &mut Event<GameEvent>| {
            let (total, acted) = outstanding(game, SEERS, ActionKind::See);
            if let GameEvent::ChkNightDone { outstanding } = ev.payload_mut() {
                outstanding.add(total, acted);
            }
            Ok(())
        });

        // Visions are handed out once the night is settled, against the
        // targets left after redirection.
        bus.subscribe(EventKind::NightResolved, 10, |game: &mut Game, _ev: &mut Event<GameEvent>| {
            for (seer, targets) in game.night.records.entries(ActionKind::See) {
                if !game.registry.is_alive(seer) {
                    continue;
                }
                let Some(target) = targets.first().copied() else {
                    continue;
                };
                let role = game.registry.role_of(target)?;
                game.tell(seer, Notice::Vision { target, role });
            }
            Ok(())
        });
    }

    fn on_night_action(&self, game: &mut Game, action: &Action) -> Result<(), GameError> {
        let target = action.target()?;
        not_self(action, target)?;
        if game.has_acted(ActionKind::See, action.actor) {
            return Err(GameError::rejected("you may only have one vision per night"));
        }
        game.night
            .records
            .record(ActionKind::See, action.actor, vec![target]);
        let nick = game.nick(target);
        game.tell(action.actor, Notice::ActionRecorded {
            action: format!("you will see {nick} tonight"),
        });
        Ok(())
    }
}
