//! The matchmaker and the lovers they bind.

use std::sync::Arc;

use duskfall_bus::{DEFAULT_PRIORITY, Event, EventBus};
use duskfall_protocol::{DeathCause, Notice, PlayerId, Role, Winner};
use rand::seq::SliceRandom;
use tracing::info;

use super::{Action, PhaseChange, RoleModule, outstanding};
use crate::command::{CommandSpec, RoleGate, Visibility};
use crate::event::{EventKind, GameEvent};
use crate::night::ActionKind;
use crate::registry::Death;
use crate::win::WinResult;
use crate::{Game, GameError, Phase};

const MATCHMAKERS: &[Role] = &[Role::Matchmaker];

const COMMANDS: &[CommandSpec] = &[CommandSpec {
    name: "match",
    phases: &[Phase::Night],
    gate: RoleGate::Roles(MATCHMAKERS),
    visibility: Visibility::Private,
    targets: 2,
}];

#[derive(Debug, Default)]
pub struct MatchmakerState {
    pub pairs: Vec<(PlayerId, PlayerId)>,
}

impl MatchmakerState {
    pub fn lover_of(&self, player: PlayerId) -> Option<PlayerId> {
        self.pairs.iter().find_map(|(a, b)| {
            if *a == player {
                Some(*b)
            } else if *b == player {
                Some(*a)
            } else {
                None
            }
        })
    }
}

#[derive(Debug, Default)]
pub struct MatchmakerModule;

impl RoleModule for MatchmakerModule {
    fn name(&self) -> &'static str {
        "matchmaker"
    }

    fn commands(&self) -> &'static [CommandSpec] {
        COMMANDS
    }

    fn install(self: Arc<Self>, bus: &mut EventBus<Game>) {
        bus.subscribe(EventKind::ChkNightDone, DEFAULT_PRIORITY, |game: &mut Game, ev: &mut Event<GameEvent>| {
            if game.night_count != 1 {
                return Ok(());
            }
            let (total, acted) = outstanding(game, MATCHMAKERS, ActionKind::Match);
            if let GameEvent::ChkNightDone { outstanding } = ev.payload_mut() {
                outstanding.add(total, acted);
            }
            Ok(())
        });

        bus.subscribe(EventKind::ChkWin, 10, |game: &mut Game, ev: &mut Event<GameEvent>| {
            let living = game.registry.living();
            let [a, b] = living[..] else {
                return Ok(());
            };
            let paired = game
                .states
                .get::<MatchmakerState>()
                .is_some_and(|s| s.lover_of(a) == Some(b));
            if !paired {
                return Ok(());
            }
            if let GameEvent::ChkWin { result, .. } = ev.payload_mut() {
                *result = Some(
                    WinResult::new(Winner::Lovers, "The lovers are the last ones standing. Love wins.")
                        .with_members([a, b]),
                );
            }
            ev.stop();
            ev.prevent_default();
            Ok(())
        });
    }

    fn on_night_action(&self, game: &mut Game, action: &Action) -> Result<(), GameError> {
        if game.night_count != 1 {
            return Err(GameError::rejected("you can only match lovers on the first night"));
        }
        let [a, b] = action.targets[..] else {
            return Err(GameError::rejected("match needs two players"));
        };
        if a == b {
            return Err(GameError::rejected("you need two different players"));
        }
        if game.has_acted(ActionKind::Match, action.actor) {
            return Err(GameError::rejected("you have already matched a pair"));
        }
        game.night
            .records
            .record(ActionKind::Match, action.actor, vec![a, b]);
        let (first, second) = (game.nick(a), game.nick(b));
        game.tell(action.actor, Notice::ActionRecorded {
            action: format!("you matched {first} and {second}"),
        });
        Ok(())
    }

    fn on_death(&self, game: &mut Game, death: &Death) -> Result<(), GameError> {
        let lover = game
            .states
            .get::<MatchmakerState>()
            .and_then(|s| s.lover_of(death.player));
        if let Some(lover) = lover.filter(|l| game.registry.is_alive(*l)) {
            info!(game_id = %game.id, player_id = %lover, "lover dies of grief");
            game.queue_death(lover, DeathCause::Grief);
        }
        Ok(())
    }

    fn on_phase_change(&self, game: &mut Game, change: PhaseChange) -> Result<(), GameError> {
        if change != PhaseChange::NightEnding(1) {
            return Ok(());
        }
        for matchmaker in game.registry.players_with_role(Role::Matchmaker) {
            let pair = match game.night.records.get(ActionKind::Match, matchmaker) {
                Some(&[a, b]) => Some((a, b)),
                _ => {
                    let mut living = game.registry.living();
                    living.shuffle(&mut game.rng);
                    match living[..] {
                        [a, b, ..] => Some((a, b)),
                        _ => None,
                    }
                }
            };
            let Some((a, b)) = pair else {
                continue;
            };
            info!(game_id = %game.id, %matchmaker, first = %a, second = %b, "lovers matched");
            game.states.get_mut::<MatchmakerState>().pairs.push((a, b));
            game.tell(a, Notice::Lovers { lover: b });
            game.tell(b, Notice::Lovers { lover: a });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lover_of_looks_both_ways() {
        let state = MatchmakerState {
            pairs: vec![(PlayerId(1), PlayerId(2))],
        };
        assert_eq!(state.lover_of(PlayerId(1)), Some(PlayerId(2)));
        assert_eq!(state.lover_of(PlayerId(2)), Some(PlayerId(1)));
        assert_eq!(state.lover_of(PlayerId(3)), None);
    }
}
