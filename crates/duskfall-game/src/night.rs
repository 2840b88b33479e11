//! Night actions and their resolution.
//!
//! During the night, role modules only *record* what players asked for.
//! Nothing happens to the world until the night ends and [`resolve`] runs
//! the five steps in order:
//!
//! 1. `NightKills`: modules turn records into [`KillIntent`]s.
//! 2. Redirection: misdirected actors and lucky targets shift to an
//!    adjacent living player (canonical order, coin flip for direction).
//! 3. `NightDefenses`: modules contribute [`Defense`]s; each one cancels one
//!    attack on its ward and fires `ProtectionConsumed`.
//! 4. `NightOverrides`: overrides drop or transform what is left.
//! 5. Whatever still has an attack dies, through the death queue.

use std::collections::{BTreeMap, BTreeSet};

use duskfall_protocol::{DeathCause, PlayerId};
use rand::Rng;
use tracing::{debug, info};

use crate::event::{EventKind, GameEvent};
use crate::registry::Death;
use crate::{Game, GameError};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// What a night action does. Records are grouped by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    Kill,
    Bite,
    See,
    Guard,
    Give,
    Match,
}

impl ActionKind {
    /// Whether misdirection and luck move this action's recorded targets.
    ///
    /// Kill votes are not moved one by one; the tallied [`KillIntent`] is.
    pub fn is_redirectable(self) -> bool {
        matches!(self, Self::See | Self::Guard)
    }

    /// A given totem has already taken effect and cannot be taken back.
    pub fn is_retractable(self) -> bool {
        !matches!(self, Self::Give)
    }
}

/// Actor → targets, per action kind. Cleared at every night boundary.
#[derive(Debug, Clone, Default)]
pub struct NightRecords {
    actions: BTreeMap<ActionKind, BTreeMap<PlayerId, Vec<PlayerId>>>,
}

impl NightRecords {
    /// Records an action, replacing the actor's earlier one of that kind.
    pub fn record(&mut self, kind: ActionKind, actor: PlayerId, targets: Vec<PlayerId>) -> Option<Vec<PlayerId>> {
        self.actions.entry(kind).or_default().insert(actor, targets)
    }

    pub fn get(&self, kind: ActionKind, actor: PlayerId) -> Option<&[PlayerId]> {
        self.actions
            .get(&kind)
            .and_then(|m| m.get(&actor))
            .map(Vec::as_slice)
    }

    pub fn has_acted(&self, kind: ActionKind, actor: PlayerId) -> bool {
        self.get(kind, actor).is_some()
    }

    /// Snapshot of every record of `kind`, ordered by actor id.
    pub fn entries(&self, kind: ActionKind) -> Vec<(PlayerId, Vec<PlayerId>)> {
        self.actions
            .get(&kind)
            .map(|m| m.iter().map(|(a, t)| (*a, t.clone())).collect())
            .unwrap_or_default()
    }

    /// Drops the actor's retractable records. Returns how many went.
    pub fn retract(&mut self, actor: PlayerId) -> usize {
        self.actions
            .iter_mut()
            .filter(|(kind, _)| kind.is_retractable())
            .filter_map(|(_, m)| m.remove(&actor))
            .count()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.actions.values().all(BTreeMap::is_empty)
    }
}

/// A per-night effect held by a player (usually from a totem).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Effect {
    Protected,
    Lucky,
    Misdirected,
    Doomed,
}

#[derive(Debug, Clone, Default)]
pub struct NightEffects {
    held: BTreeMap<PlayerId, Vec<Effect>>,
}

impl NightEffects {
    pub fn grant(&mut self, holder: PlayerId, effect: Effect) {
        self.held.entry(holder).or_default().push(effect);
    }

    pub fn has(&self, holder: PlayerId, effect: Effect) -> bool {
        self.held.get(&holder).is_some_and(|e| e.contains(&effect))
    }

    /// Removes one instance of `effect`. Returns `false` if none was held.
    pub fn consume(&mut self, holder: PlayerId, effect: Effect) -> bool {
        let Some(effects) = self.held.get_mut(&holder) else {
            return false;
        };
        let Some(pos) = effects.iter().position(|e| *e == effect) else {
            return false;
        };
        effects.remove(pos);
        true
    }

    /// Holders of `effect`, ordered by id.
    pub fn holders(&self, effect: Effect) -> Vec<PlayerId> {
        self.held
            .iter()
            .filter(|(_, e)| e.contains(&effect))
            .map(|(p, _)| *p)
            .collect()
    }

    pub fn clear(&mut self) {
        self.held.clear();
    }
}

/// Everything that lives for exactly one night.
#[derive(Debug, Clone, Default)]
pub struct NightState {
    pub records: NightRecords,
    pub effects: NightEffects,
}

impl NightState {
    pub fn clear(&mut self) {
        self.records.clear();
        self.effects.clear();
    }
}

/// Sum of actors who still owe a night action, built by `ChkNightDone`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outstanding {
    pub total: usize,
    pub acted: usize,
}

impl Outstanding {
    pub fn add(&mut self, total: usize, acted: usize) {
        self.total += total;
        self.acted += acted.min(total);
    }

    pub fn remaining(&self) -> usize {
        self.total - self.acted
    }

    pub fn is_done(&self) -> bool {
        self.acted >= self.total
    }
}

// ---------------------------------------------------------------------------
// Resolution data
// ---------------------------------------------------------------------------

/// Where an attack comes from. Declaration order is the order attacks on one
/// target are cancelled by defenses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KillSource {
    Wolves,
    DeathTotem,
}

impl KillSource {
    pub fn cause(self) -> DeathCause {
        match self {
            Self::Wolves => DeathCause::WolfKill,
            Self::DeathTotem => DeathCause::DeathTotem,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillIntent {
    pub source: KillSource,
    /// Who is attacking. Misdirection on any of them moves the attack.
    pub actors: Vec<PlayerId>,
    pub target: PlayerId,
}

/// Declaration order is the order defenses on one ward are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DefenseKind {
    Totem,
    Angel,
    Bodyguard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defense {
    pub defender: PlayerId,
    pub ward: PlayerId,
    pub kind: DefenseKind,
}

/// Attacks on one target that survived the defenses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingKill {
    pub target: PlayerId,
    pub attacks: Vec<KillIntent>,
}

/// Outcome of one night.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NightReport {
    /// Every death caused by the night, chained deaths included, in the
    /// order they were applied.
    pub deaths: Vec<Death>,
    /// Attacked players who are still alive, in canonical order.
    pub survivors: Vec<PlayerId>,
    /// Defenses that turned an attack away.
    pub consumed: Vec<Defense>,
}

// ---------------------------------------------------------------------------
// Redirection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    /// A fair coin.
    pub fn flip<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.random_bool(0.5) {
            Self::Left
        } else {
            Self::Right
        }
    }
}

/// The nearest player next to `from` in `order`, wrapping around, that is
/// not in `skip`. `None` if `from` is not in `order` or nobody qualifies.
pub fn adjacent(order: &[PlayerId], from: PlayerId, skip: &[PlayerId], dir: Direction) -> Option<PlayerId> {
    let pos = order.iter().position(|p| *p == from)?;
    let n = order.len();
    (1..n)
        .map(|step| match dir {
            Direction::Right => (pos + step) % n,
            Direction::Left => (pos + n - step) % n,
        })
        .map(|i| order[i])
        .find(|p| !skip.contains(p))
}

/// Follows a chain of lucky players from `start` in one direction.
///
/// Stops on the first player who is not lucky, or when the next step would
/// come back around to `start`. Every step lands on a member of `order`, so
/// a living `start` always yields a living player.
pub fn redirect_chain(
    order: &[PlayerId],
    start: PlayerId,
    skip: &[PlayerId],
    dir: Direction,
    is_lucky: impl Fn(PlayerId) -> bool,
) -> PlayerId {
    let mut current = start;
    for _ in 0..order.len() {
        if !is_lucky(current) {
            break;
        }
        match adjacent(order, current, skip, dir) {
            Some(next) if next != start => current = next,
            _ => break,
        }
    }
    current
}

/// Applies the actors' misdirection, then the target's luck.
fn redirect_target(game: &mut Game, living: &[PlayerId], actors: &[PlayerId], target: PlayerId) -> PlayerId {
    if !living.contains(&target) {
        return target;
    }
    let mut target = target;

    let misdirected = actors
        .iter()
        .copied()
        .find(|a| game.night.effects.has(*a, Effect::Misdirected));
    if let Some(actor) = misdirected {
        let dir = Direction::flip(&mut game.rng);
        if let Some(next) = adjacent(living, target, actors, dir) {
            debug!(game_id = %game.id, %actor, from = %target, to = %next, "misdirected");
            target = next;
        }
    }

    if game.night.effects.has(target, Effect::Lucky) {
        let dir = Direction::flip(&mut game.rng);
        let effects = &game.night.effects;
        let next = redirect_chain(living, target, actors, dir, |p| {
            effects.has(p, Effect::Lucky)
        });
        debug!(game_id = %game.id, from = %target, to = %next, "luck moved the target");
        target = next;
    }
    target
}

fn redirect_records(game: &mut Game, living: &[PlayerId]) {
    for kind in [ActionKind::See, ActionKind::Guard] {
        debug_assert!(kind.is_redirectable());
        for (actor, targets) in game.night.records.entries(kind) {
            let moved: Vec<PlayerId> = targets
                .iter()
                .map(|t| redirect_target(game, living, &[actor], *t))
                .collect();
            if moved != targets {
                game.night.records.record(kind, actor, moved);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Protection
// ---------------------------------------------------------------------------

/// Result of matching defenses against attacks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Protection {
    /// Targets with attacks left over, ordered by id.
    pub pending: Vec<PendingKill>,
    /// Targets whose defenses covered every attack, ordered by id.
    pub protected: Vec<PlayerId>,
    /// Each defense that was used, with the attack it cancelled.
    pub consumed: Vec<(Defense, KillIntent)>,
}

/// Cancels one attack per defense, per ward.
///
/// Attacks are cancelled in [`KillSource`] order and defenses are spent in
/// `(kind, defender)` order. Defenses beyond the number of attacks are not
/// spent.
pub fn apply_defenses(intents: Vec<KillIntent>, mut defenses: Vec<Defense>) -> Protection {
    let mut attacks: BTreeMap<PlayerId, Vec<KillIntent>> = BTreeMap::new();
    for intent in intents {
        attacks.entry(intent.target).or_default().push(intent);
    }

    defenses.sort_by_key(|d| (d.ward, d.kind, d.defender));
    let mut wards: BTreeMap<PlayerId, Vec<Defense>> = BTreeMap::new();
    for defense in defenses {
        wards.entry(defense.ward).or_default().push(defense);
    }

    let mut out = Protection::default();
    for (target, mut list) in attacks {
        list.sort_by_key(|a| a.source);
        let mut guards = wards.remove(&target).unwrap_or_default().into_iter();
        while !list.is_empty() {
            let Some(defense) = guards.next() else {
                break;
            };
            let attack = list.remove(0);
            out.consumed.push((defense, attack));
        }
        if list.is_empty() {
            out.protected.push(target);
        } else {
            out.pending.push(PendingKill {
                target,
                attacks: list,
            });
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

fn reshaped(kind: EventKind) -> GameError {
    GameError::Invariant(format!("{kind} handler replaced the event payload"))
}

/// Resolves the current night. Called once, by the phase scheduler.
pub(crate) fn resolve(game: &mut Game) -> Result<NightReport, GameError> {
    let living = game.registry.living();

    // 1. Kill intents.
    let ev = game.dispatch(GameEvent::NightKills { intents: Vec::new() })?;
    let GameEvent::NightKills { mut intents } = ev.into_payload() else {
        return Err(reshaped(EventKind::NightKills));
    };
    intents.retain(|i| game.registry.is_alive(i.target));

    // 2. Redirection.
    redirect_records(game, &living);
    for intent in &mut intents {
        intent.target = redirect_target(game, &living, &intent.actors, intent.target);
    }
    let targets: BTreeSet<PlayerId> = intents.iter().map(|i| i.target).collect();

    // 3. Defenses.
    let ev = game.dispatch(GameEvent::NightDefenses { defenses: Vec::new() })?;
    let GameEvent::NightDefenses { mut defenses } = ev.into_payload() else {
        return Err(reshaped(EventKind::NightDefenses));
    };
    defenses.retain(|d| {
        game.registry.is_alive(d.ward) && (d.kind == DefenseKind::Totem || game.registry.is_alive(d.defender))
    });
    let Protection {
        pending, consumed, ..
    } = apply_defenses(intents, defenses);

    let mut used = Vec::with_capacity(consumed.len());
    for (defense, attack) in consumed {
        debug!(
            game_id = %game.id,
            defender = %defense.defender,
            ward = %defense.ward,
            kind = ?defense.kind,
            "protection consumed"
        );
        game.dispatch(GameEvent::ProtectionConsumed {
            defense: defense.clone(),
            attack,
        })?;
        used.push(defense);
    }

    // 4. Overrides.
    let ev = game.dispatch(GameEvent::NightOverrides { pending })?;
    let GameEvent::NightOverrides { pending } = ev.into_payload() else {
        return Err(reshaped(EventKind::NightOverrides));
    };

    // 5. Deaths. Costs queued by defenders above are paid first.
    let mut victims: Vec<(PlayerId, DeathCause)> = pending
        .iter()
        .filter_map(|p| p.attacks.first().map(|a| (p.target, a.source.cause())))
        .collect();
    victims.sort_by_key(|(p, _)| game.registry.position(*p));
    for (player, cause) in victims {
        game.queue_death(player, cause);
    }
    let deaths = game.drain_deaths()?;

    let mut survivors: Vec<PlayerId> = targets
        .into_iter()
        .filter(|t| game.registry.is_alive(*t))
        .collect();
    survivors.sort_by_key(|p| game.registry.position(*p));

    let report = NightReport {
        deaths,
        survivors,
        consumed: used,
    };
    game.dispatch(GameEvent::NightResolved {
        report: report.clone(),
    })?;

    info!(
        game_id = %game.id,
        night = game.night_count,
        deaths = report.deaths.len(),
        survivors = report.survivors.len(),
        "night resolved"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: u64) -> Vec<PlayerId> {
        (1..=n).map(PlayerId).collect()
    }

    fn wolves_on(target: u64) -> KillIntent {
        KillIntent {
            source: KillSource::Wolves,
            actors: vec![PlayerId(100)],
            target: PlayerId(target),
        }
    }

    fn totem_on(target: u64) -> KillIntent {
        KillIntent {
            source: KillSource::DeathTotem,
            actors: vec![PlayerId(200)],
            target: PlayerId(target),
        }
    }

    fn guard(defender: u64, ward: u64, kind: DefenseKind) -> Defense {
        Defense {
            defender: PlayerId(defender),
            ward: PlayerId(ward),
            kind,
        }
    }

    #[test]
    fn test_adjacent_wraps_both_ways() {
        let order = ids(4);
        assert_eq!(adjacent(&order, PlayerId(4), &[], Direction::Right), Some(PlayerId(1)));
        assert_eq!(adjacent(&order, PlayerId(1), &[], Direction::Left), Some(PlayerId(4)));
        assert_eq!(adjacent(&order, PlayerId(2), &[], Direction::Right), Some(PlayerId(3)));
    }

    #[test]
    fn test_adjacent_skips_the_actor() {
        let order = ids(4);
        assert_eq!(
            adjacent(&order, PlayerId(2), &[PlayerId(3)], Direction::Right),
            Some(PlayerId(4))
        );
    }

    #[test]
    fn test_adjacent_skips_every_actor() {
        let order = ids(6);
        let wolves = [PlayerId(1), PlayerId(3), PlayerId(4)];
        assert_eq!(adjacent(&order, PlayerId(2), &wolves, Direction::Right), Some(PlayerId(5)));
        assert_eq!(adjacent(&order, PlayerId(2), &wolves, Direction::Left), Some(PlayerId(6)));
    }

    #[test]
    fn test_lucky_chain_never_lands_on_a_skipped_player() {
        let order = ids(5);
        let wolves = [PlayerId(1), PlayerId(3)];
        for dir in [Direction::Left, Direction::Right] {
            let end = redirect_chain(&order, PlayerId(2), &wolves, dir, |p| p == PlayerId(2));
            assert!(!wolves.contains(&end), "{dir:?} landed on {end}");
        }
    }

    #[test]
    fn test_adjacent_with_nobody_else() {
        assert_eq!(adjacent(&ids(1), PlayerId(1), &[], Direction::Left), None);
        assert_eq!(adjacent(&ids(2), PlayerId(1), &[PlayerId(2)], Direction::Left), None);
        assert_eq!(adjacent(&ids(3), PlayerId(9), &[], Direction::Left), None);
    }

    #[test]
    fn test_lucky_chain_stops_at_first_unlucky() {
        let order = ids(5);
        let lucky = [PlayerId(2), PlayerId(3)];
        let end = redirect_chain(&order, PlayerId(2), &[], Direction::Right, |p| lucky.contains(&p));
        assert_eq!(end, PlayerId(4));
    }

    #[test]
    fn test_lucky_chain_all_lucky_terminates() {
        let order = ids(4);
        let end = redirect_chain(&order, PlayerId(1), &[], Direction::Right, |_| true);
        assert!(order.contains(&end));
        assert_ne!(end, PlayerId(1));
    }

    #[test]
    fn test_unlucky_start_does_not_move() {
        let order = ids(3);
        let end = redirect_chain(&order, PlayerId(2), &[], Direction::Left, |_| false);
        assert_eq!(end, PlayerId(2));
    }

    #[test]
    fn test_one_defense_saves_single_attack() {
        let out = apply_defenses(vec![wolves_on(3)], vec![guard(5, 3, DefenseKind::Angel)]);
        assert!(out.pending.is_empty());
        assert_eq!(out.protected, vec![PlayerId(3)]);
        assert_eq!(out.consumed.len(), 1);
    }

    #[test]
    fn test_defense_short_of_attacks_still_consumed() {
        let out = apply_defenses(
            vec![wolves_on(3), totem_on(3)],
            vec![guard(5, 3, DefenseKind::Bodyguard)],
        );
        assert_eq!(out.consumed.len(), 1);
        assert_eq!(out.consumed[0].1.source, KillSource::Wolves);
        assert_eq!(out.pending.len(), 1);
        assert_eq!(out.pending[0].attacks, vec![totem_on(3)]);
    }

    #[test]
    fn test_defenses_are_spent_in_kind_order() {
        let out = apply_defenses(
            vec![wolves_on(3)],
            vec![
                guard(8, 3, DefenseKind::Bodyguard),
                guard(6, 3, DefenseKind::Angel),
                guard(7, 3, DefenseKind::Totem),
            ],
        );
        assert_eq!(out.consumed.len(), 1);
        assert_eq!(out.consumed[0].0.kind, DefenseKind::Totem);
    }

    #[test]
    fn test_defense_on_unattacked_ward_is_unused() {
        let out = apply_defenses(vec![wolves_on(3)], vec![guard(5, 4, DefenseKind::Angel)]);
        assert!(out.consumed.is_empty());
        assert_eq!(out.pending.len(), 1);
    }

    #[test]
    fn test_records_retract_keeps_given_totems() {
        let mut records = NightRecords::default();
        records.record(ActionKind::See, PlayerId(1), vec![PlayerId(2)]);
        records.record(ActionKind::Give, PlayerId(1), vec![PlayerId(3)]);
        assert_eq!(records.retract(PlayerId(1)), 1);
        assert!(!records.has_acted(ActionKind::See, PlayerId(1)));
        assert!(records.has_acted(ActionKind::Give, PlayerId(1)));
    }

    #[test]
    fn test_record_replaces_previous_target() {
        let mut records = NightRecords::default();
        records.record(ActionKind::Kill, PlayerId(1), vec![PlayerId(2)]);
        let old = records.record(ActionKind::Kill, PlayerId(1), vec![PlayerId(3)]);
        assert_eq!(old, Some(vec![PlayerId(2)]));
        assert_eq!(records.get(ActionKind::Kill, PlayerId(1)), Some(&[PlayerId(3)][..]));
    }

    #[test]
    fn test_effects_consume_one_instance() {
        let mut effects = NightEffects::default();
        effects.grant(PlayerId(1), Effect::Protected);
        effects.grant(PlayerId(1), Effect::Protected);
        assert!(effects.consume(PlayerId(1), Effect::Protected));
        assert!(effects.has(PlayerId(1), Effect::Protected));
        assert!(effects.consume(PlayerId(1), Effect::Protected));
        assert!(!effects.consume(PlayerId(1), Effect::Protected));
    }

    #[test]
    fn test_outstanding_sums_modules() {
        let mut out = Outstanding::default();
        out.add(2, 1);
        out.add(1, 1);
        assert_eq!(out.remaining(), 1);
        assert!(!out.is_done());
        out.add(0, 0);
        assert!(!out.is_done());
        assert!(Outstanding::default().is_done());
    }
}
