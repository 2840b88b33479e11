//! Shamans and their totems.

use std::collections::BTreeMap;
use std::sync::Arc;

use duskfall_bus::{DEFAULT_PRIORITY, Event, EventBus};
use duskfall_protocol::{Notice, PlayerId, Role, Totem};
use tracing::debug;

use super::{Action, PhaseChange, RoleModule, not_self, outstanding};
use crate::command::{CommandSpec, RoleGate, Visibility};
use crate::event::{EventKind, GameEvent};
use crate::night::{ActionKind, Defense, DefenseKind, Effect, KillIntent, KillSource};
use crate::{Game, GameError, Phase};

const SHAMANS: &[Role] = &[Role::Shaman];

const COMMANDS: &[CommandSpec] = &[CommandSpec {
    name: "give",
    phases: &[Phase::Night],
    gate: RoleGate::Roles(SHAMANS),
    visibility: Visibility::Private,
    targets: 1,
}];

#[derive(Debug, Default)]
pub struct ShamanState {
    /// Tonight's totem per shaman.
    pub totems: BTreeMap<PlayerId, Totem>,
    /// `(shaman, holder, totem)` for every totem passed tonight.
    pub given: Vec<(PlayerId, PlayerId, Totem)>,
}

fn effect_of(totem: Totem) -> Effect {
    match totem {
        Totem::Protection => Effect::Protected,
        Totem::Luck => Effect::Lucky,
        Totem::Misdirection => Effect::Misdirected,
        Totem::Death => Effect::Doomed,
    }
}

#[derive(Debug, Default)]
pub struct ShamanModule;

impl ShamanModule {
    fn given(game: &Game, totem: Totem) -> Vec<(PlayerId, PlayerId)> {
        game.states
            .get::<ShamanState>()
            .map(|s| {
                s.given
                    .iter()
                    .filter(|(_, _, t)| *t == totem)
                    .map(|(shaman, holder, _)| (*shaman, *holder))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl RoleModule for ShamanModule {
    fn name(&self) -> &'static str {
        "shaman"
    }

    fn commands(&self) -> &'static [CommandSpec] {
        COMMANDS
    }

    fn install(self: Arc<Self>, bus: &mut EventBus<Game>) {
        bus.subscribe(EventKind::ChkNightDone, DEFAULT_PRIORITY, |game: &mut Game, ev: &mut Event<GameEvent>| {
            let (total, acted) = outstanding(game, SHAMANS, ActionKind::Give);
            if let GameEvent::ChkNightDone { outstanding } = ev.payload_mut() {
                outstanding.add(total, acted);
            }
            Ok(())
        });

        bus.subscribe(EventKind::NightKills, 20, |game: &mut Game, ev: &mut Event<GameEvent>| {
            let doomed = ShamanModule::given(game, Totem::Death);
            if let GameEvent::NightKills { intents } = ev.payload_mut() {
                intents.extend(doomed.into_iter().map(|(shaman, holder)| KillIntent {
                    source: KillSource::DeathTotem,
                    actors: vec![shaman],
                    target: holder,
                }));
            }
            Ok(())
        });

        bus.subscribe(EventKind::NightDefenses, 5, |game: &mut Game, ev: &mut Event<GameEvent>| {
            let protected = ShamanModule::given(game, Totem::Protection);
            if let GameEvent::NightDefenses { defenses } = ev.payload_mut() {
                defenses.extend(protected.into_iter().map(|(shaman, holder)| Defense {
                    defender: shaman,
                    ward: holder,
                    kind: DefenseKind::Totem,
                }));
            }
            Ok(())
        });

        bus.subscribe(EventKind::ProtectionConsumed, DEFAULT_PRIORITY, |game: &mut Game, ev: &mut Event<GameEvent>| {
            if let GameEvent::ProtectionConsumed { defense, .. } = ev.payload() {
                if defense.kind == DefenseKind::Totem {
                    game.night.effects.consume(defense.ward, Effect::Protected);
                }
            }
            Ok(())
        });
    }

    fn on_night_action(&self, game: &mut Game, action: &Action) -> Result<(), GameError> {
        let target = action.target()?;
        not_self(action, target)?;
        if game.has_acted(ActionKind::Give, action.actor) {
            return Err(GameError::rejected("you have already given your totem away tonight"));
        }
        let Some(totem) = game
            .states
            .get::<ShamanState>()
            .and_then(|s| s.totems.get(&action.actor).copied())
        else {
            return Err(GameError::rejected("you have no totem tonight"));
        };

        game.night
            .records
            .record(ActionKind::Give, action.actor, vec![target]);
        game.night.effects.grant(target, effect_of(totem));
        game.states
            .get_mut::<ShamanState>()
            .given
            .push((action.actor, target, totem));

        debug!(game_id = %game.id, shaman = %action.actor, holder = %target, %totem, "totem given");
        let nick = game.nick(target);
        game.tell(action.actor, Notice::ActionRecorded {
            action: format!("you gave your {totem} to {nick}"),
        });
        game.tell(target, Notice::TotemHeld { totem });
        Ok(())
    }

    fn on_phase_change(&self, game: &mut Game, change: PhaseChange) -> Result<(), GameError> {
        if let PhaseChange::NightBegan(_) = change {
            let shamans = game.registry.players_with_role(Role::Shaman);
            let mut totems = BTreeMap::new();
            for shaman in shamans {
                let totem = game.config.totem_chances.pick(&mut game.rng);
                totems.insert(shaman, totem);
                game.tell(shaman, Notice::TotemReceived { totem });
            }
            let state = game.states.get_mut::<ShamanState>();
            state.totems = totems;
            state.given.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_totem_maps_to_its_own_effect() {
        let effects: Vec<Effect> = Totem::ALL.into_iter().map(effect_of).collect();
        for (i, a) in effects.iter().enumerate() {
            for b in &effects[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
