//! Wolves and the alpha wolf.

use std::collections::BTreeMap;
use std::sync::Arc;

use duskfall_bus::{DEFAULT_PRIORITY, Event, EventBus};
use duskfall_protocol::{Notice, PlayerId, Role};
use rand::Rng;
use tracing::{debug, info};

use super::{Action, PhaseChange, RoleModule, not_self, outstanding};
use crate::command::{CommandSpec, RoleGate, Visibility};
use crate::event::{EventKind, GameEvent};
use crate::night::{ActionKind, KillIntent, KillSource};
use crate::{Game, GameError, Phase};

const WOLVES: &[Role] = &[Role::Wolf, Role::AlphaWolf];

const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "kill",
        phases: &[Phase::Night],
        gate: RoleGate::Roles(WOLVES),
        visibility: Visibility::Private,
        targets: 1,
    },
    CommandSpec {
        name: "bite",
        phases: &[Phase::Night],
        gate: RoleGate::Roles(&[Role::AlphaWolf]),
        visibility: Visibility::Private,
        targets: 0,
    },
];

#[derive(Debug, Default)]
pub struct WolfState {
    pub bite_used: bool,
    /// Bitten players waiting to turn at the next nightfall.
    pub bitten: Vec<PlayerId>,
}

/// Wolves vote on one kill a night. The alpha may once turn that kill
/// into a conversion.
#[derive(Debug, Default)]
pub struct WolfModule;

impl RoleModule for WolfModule {
    fn name(&self) -> &'static str {
        "wolf"
    }

    fn commands(&self) -> &'static [CommandSpec] {
        COMMANDS
    }

    fn install(self: Arc<Self>, bus: &mut EventBus<Game>) {
        bus.subscribe(EventKind::ChkNightDone, DEFAULT_PRIORITY, |game: &mut Game, ev: &mut Event<GameEvent>| {
            let (total, acted) = outstanding(game, WOLVES, ActionKind::Kill);
            if let GameEvent::ChkNightDone { outstanding } = ev.payload_mut() {
                outstanding.add(total, acted);
            }
            Ok(())
        });

        bus.subscribe(EventKind::NightKills, 10, |game: &mut Game, ev: &mut Event<GameEvent>| {
            let votes: Vec<(PlayerId, PlayerId)> = game
                .night
                .records
                .entries(ActionKind::Kill)
                .into_iter()
                .filter(|(wolf, _)| game.registry.main_role(*wolf).is_some_and(Role::is_wolf))
                .filter_map(|(wolf, targets)| targets.first().map(|t| (wolf, *t)))
                .filter(|(_, target)| game.registry.is_alive(*target))
                .collect();
            if let Some((target, actors)) = pick_target(&votes, &mut game.rng) {
                debug!(game_id = %game.id, %target, votes = actors.len(), "wolves chose");
                if let GameEvent::NightKills { intents } = ev.payload_mut() {
                    intents.push(KillIntent {
                        source: KillSource::Wolves,
                        actors,
                        target,
                    });
                }
            }
            Ok(())
        });

        bus.subscribe(EventKind::NightOverrides, 20, |game: &mut Game, ev: &mut Event<GameEvent>| {
            if game.states.get::<WolfState>().is_some_and(|s| s.bite_used) {
                return Ok(());
            }
            let Some(alpha) = game
                .night
                .records
                .entries(ActionKind::Bite)
                .into_iter()
                .map(|(alpha, _)| alpha)
                .find(|a| game.registry.main_role(*a) == Some(Role::AlphaWolf))
            else {
                return Ok(());
            };
            let GameEvent::NightOverrides { pending } = ev.payload_mut() else {
                return Ok(());
            };

            let Some(index) = pending
                .iter()
                .position(|p| p.attacks.iter().any(|a| a.source == KillSource::Wolves))
            else {
                return Ok(());
            };
            let target = pending[index].target;
            pending[index].attacks.retain(|a| a.source != KillSource::Wolves);
            if pending[index].attacks.is_empty() {
                pending.remove(index);
            }

            let state = game.states.get_mut::<WolfState>();
            state.bite_used = true;
            state.bitten.push(target);
            info!(game_id = %game.id, %alpha, %target, "bite landed");
            game.tell(alpha, Notice::BiteLanded { target });
            Ok(())
        });

        bus.subscribe(EventKind::TransitionNightBegin, DEFAULT_PRIORITY, |game: &mut Game, _ev: &mut Event<GameEvent>| {
            let bitten = std::mem::take(&mut game.states.get_mut::<WolfState>().bitten);
            for player in bitten {
                if !game.registry.is_alive(player) {
                    continue;
                }
                game.change_role(player, Role::Wolf)?;
                game.tell(player, Notice::Converted { role: Role::Wolf });
            }
            Ok(())
        });
    }

    fn on_night_action(&self, game: &mut Game, action: &Action) -> Result<(), GameError> {
        match action.command {
            "kill" => {
                let target = action.target()?;
                not_self(action, target)?;
                if game.registry.main_role(target).is_some_and(Role::is_wolf) {
                    return Err(GameError::rejected("you can't kill a fellow wolf"));
                }
                game.night
                    .records
                    .record(ActionKind::Kill, action.actor, vec![target]);
                let nick = game.nick(target);
                game.tell(action.actor, Notice::ActionRecorded {
                    action: format!("you voted to kill {nick}"),
                });
                for wolf in game.registry.wolves() {
                    if wolf != action.actor {
                        game.tell(wolf, Notice::WolfVote {
                            voter: action.actor,
                            target,
                        });
                    }
                }
                Ok(())
            }
            "bite" => {
                if game.states.get::<WolfState>().is_some_and(|s| s.bite_used) {
                    return Err(GameError::rejected("you have already bitten someone this game"));
                }
                if game.has_acted(ActionKind::Bite, action.actor) {
                    return Err(GameError::rejected("you are already biting tonight"));
                }
                game.night
                    .records
                    .record(ActionKind::Bite, action.actor, Vec::new());
                game.tell(action.actor, Notice::ActionRecorded {
                    action: "tonight's kill will be a bite".to_owned(),
                });
                Ok(())
            }
            other => Err(GameError::rejected(format!("wolves can't {other}"))),
        }
    }

    fn on_phase_change(&self, game: &mut Game, change: PhaseChange) -> Result<(), GameError> {
        if let PhaseChange::NightBegan(_) = change {
            let members = game.registry.wolves();
            for wolf in &members {
                game.tell(*wolf, Notice::WolfPack {
                    members: members.clone(),
                });
            }
        }
        Ok(())
    }
}

/// The most voted target and who voted for it. Ties are broken at random.
fn pick_target<R: Rng + ?Sized>(votes: &[(PlayerId, PlayerId)], rng: &mut R) -> Option<(PlayerId, Vec<PlayerId>)> {
    let mut tally: BTreeMap<PlayerId, Vec<PlayerId>> = BTreeMap::new();
    for (wolf, target) in votes {
        tally.entry(*target).or_default().push(*wolf);
    }
    let top = tally.values().map(Vec::len).max()?;
    let mut leaders: Vec<(PlayerId, Vec<PlayerId>)> =
        tally.into_iter().filter(|(_, v)| v.len() == top).collect();
    let pick = rng.random_range(0..leaders.len());
    Some(leaders.swap_remove(pick))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_pick_target_prefers_most_votes() {
        let mut rng = StdRng::seed_from_u64(1);
        let votes = [
            (PlayerId(1), PlayerId(7)),
            (PlayerId(2), PlayerId(8)),
            (PlayerId(3), PlayerId(8)),
        ];
        let (target, actors) = pick_target(&votes, &mut rng).unwrap();
        assert_eq!(target, PlayerId(8));
        assert_eq!(actors, vec![PlayerId(2), PlayerId(3)]);
    }

    #[test]
    fn test_pick_target_tie_picks_one_of_the_leaders() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let votes = [(PlayerId(1), PlayerId(7)), (PlayerId(2), PlayerId(8))];
            let (target, actors) = pick_target(&votes, &mut rng).unwrap();
            assert!(target == PlayerId(7) || target == PlayerId(8));
            assert_eq!(actors.len(), 1);
        }
    }

    #[test]
    fn test_pick_target_without_votes() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(pick_target(&[], &mut rng), None);
    }
}
