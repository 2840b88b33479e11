//! Guardian angels and bodyguards.

use std::collections::BTreeMap;
use std::sync::Arc;

use duskfall_bus::{DEFAULT_PRIORITY, Event, EventBus};
use duskfall_protocol::{DeathCause, Notice, PlayerId, Role};
use tracing::info;

use super::{Action, PhaseChange, RoleModule, outstanding};
use crate::command::{CommandSpec, RoleGate, Visibility};
use crate::event::{EventKind, GameEvent};
use crate::night::{ActionKind, Defense, DefenseKind};
use crate::{Game, GameError, Phase};

const GUARDIANS: &[Role] = &[Role::GuardianAngel, Role::Bodyguard];

const COMMANDS: &[CommandSpec] = &[CommandSpec {
    name: "guard",
    phases: &[Phase::Night],
    gate: RoleGate::Roles(GUARDIANS),
    visibility: Visibility::Private,
    targets: 1,
}];

#[derive(Debug, Default)]
pub struct GuardianState {
    /// Angel → the ward they guarded last night.
    pub last_guarded: BTreeMap<PlayerId, PlayerId>,
}

#[derive(Debug, Default)]
pub struct GuardianModule;

impl RoleModule for GuardianModule {
    fn name(&self) -> &'static str {
        "guardian"
    }

    fn commands(&self) -> &'static [CommandSpec] {
        COMMANDS
    }

    fn install(self: Arc<Self>, bus: &mut EventBus<Game>) {
        bus.subscribe(EventKind::ChkNightDone, DEFAULT_PRIORITY, |game: &mut Game, ev: &mut Event<GameEvent>| {
            let (total, acted) = outstanding(game, GUARDIANS, ActionKind::Guard);
            if let GameEvent::ChkNightDone { outstanding } = ev.payload_mut() {
                outstanding.add(total, acted);
            }
            Ok(())
        });

        bus.subscribe(EventKind::NightDefenses, 10, |game: &mut Game, ev: &mut Event<GameEvent>| {
            let mut found = Vec::new();
            for (defender, targets) in game.night.records.entries(ActionKind::Guard) {
                let kind = match game.registry.main_role(defender) {
                    Some(Role::GuardianAngel) => DefenseKind::Angel,
                    Some(Role::Bodyguard) => DefenseKind::Bodyguard,
                    _ => continue,
                };
                if let Some(ward) = targets.first().copied() {
                    found.push(Defense { defender, ward, kind });
                }
            }
            if let GameEvent::NightDefenses { defenses } = ev.payload_mut() {
                defenses.extend(found);
            }
            Ok(())
        });

        bus.subscribe(EventKind::ProtectionConsumed, DEFAULT_PRIORITY, |game: &mut Game, ev: &mut Event<GameEvent>| {
            let GameEvent::ProtectionConsumed { defense, .. } = ev.payload() else {
                return Ok(());
            };
            let Defense {
                defender,
                ward,
                kind,
            } = defense.clone();
            match kind {
                DefenseKind::Angel => game.tell(defender, Notice::Protected { ward }),
                DefenseKind::Bodyguard => {
                    info!(game_id = %game.id, bodyguard = %defender, %ward, "bodyguard took the blow");
                    game.tell(defender, Notice::Protected { ward });
                    game.queue_death(defender, DeathCause::Sacrifice);
                }
                DefenseKind::Totem => {}
            }
            Ok(())
        });
    }

    fn on_night_action(&self, game: &mut Game, action: &Action) -> Result<(), GameError> {
        let ward = action.target()?;
        let angel = game.registry.main_role(action.actor) == Some(Role::GuardianAngel);
        if ward == action.actor && !(angel && game.config.guardian_can_self) {
            return Err(GameError::rejected("you can't guard yourself"));
        }
        if game.has_acted(ActionKind::Guard, action.actor) {
            return Err(GameError::rejected("you are already guarding someone tonight"));
        }
        if angel
            && game
                .states
                .get::<GuardianState>()
                .and_then(|s| s.last_guarded.get(&action.actor))
                == Some(&ward)
        {
            return Err(GameError::rejected(
                "you guarded that player last night, choose someone else",
            ));
        }

        game.night
            .records
            .record(ActionKind::Guard, action.actor, vec![ward]);
        let nick = game.nick(ward);
        game.tell(action.actor, Notice::ActionRecorded {
            action: format!("you are guarding {nick} tonight"),
        });
        Ok(())
    }

    fn on_phase_change(&self, game: &mut Game, change: PhaseChange) -> Result<(), GameError> {
        if let PhaseChange::NightEnding(_) = change {
            let tonight: BTreeMap<PlayerId, PlayerId> = game
                .night
                .records
                .entries(ActionKind::Guard)
                .into_iter()
                .filter(|(g, _)| game.registry.main_role(*g) == Some(Role::GuardianAngel))
                .filter_map(|(g, targets)| targets.first().map(|w| (g, *w)))
                .collect();
            game.states.get_mut::<GuardianState>().last_guarded = tonight;
        }
        Ok(())
    }
}
