//! Property tests for the pure pieces of night resolution and the registry.

use std::collections::BTreeMap;

use duskfall_game::{
    Defense, DefenseKind, Direction, KillIntent, KillSource, Phase, Registry, apply_defenses,
    majority, redirect_chain,
};
use duskfall_protocol::{DeathCause, PlayerId, Role};
use proptest::prelude::*;

fn source() -> impl Strategy<Value = KillSource> {
    prop_oneof![Just(KillSource::Wolves), Just(KillSource::DeathTotem)]
}

fn defense_kind() -> impl Strategy<Value = DefenseKind> {
    prop_oneof![
        Just(DefenseKind::Totem),
        Just(DefenseKind::Angel),
        Just(DefenseKind::Bodyguard),
    ]
}

fn intents() -> impl Strategy<Value = Vec<KillIntent>> {
    prop::collection::vec((source(), 1u64..8, 1u64..8), 0..10).prop_map(|v| {
        v.into_iter()
            .map(|(source, actor, target)| KillIntent {
                source,
                actors: vec![PlayerId(actor)],
                target: PlayerId(target),
            })
            .collect()
    })
}

fn defenses() -> impl Strategy<Value = Vec<Defense>> {
    prop::collection::vec((defense_kind(), 1u64..8, 1u64..8), 0..10).prop_map(|v| {
        v.into_iter()
            .map(|(kind, defender, ward)| Defense {
                defender: PlayerId(defender),
                ward: PlayerId(ward),
                kind,
            })
            .collect()
    })
}

fn per_target<T>(items: &[T], key: impl Fn(&T) -> PlayerId) -> BTreeMap<PlayerId, usize> {
    let mut out = BTreeMap::new();
    for item in items {
        *out.entry(key(item)).or_default() += 1;
    }
    out
}

proptest! {
    /// Every attacked player ends up either pending or protected, never both.
    #[test]
    fn defenses_partition_the_targets(intents in intents(), defenses in defenses()) {
        let attacks = per_target(&intents, |i| i.target);
        let guards = per_target(&defenses, |d| d.ward);
        let protection = apply_defenses(intents, defenses);

        let pending: Vec<PlayerId> = protection.pending.iter().map(|p| p.target).collect();
        for target in attacks.keys() {
            let in_pending = pending.contains(target);
            let in_protected = protection.protected.contains(target);
            prop_assert!(in_pending != in_protected, "{target} must be in exactly one list");
        }
        prop_assert_eq!(pending.len() + protection.protected.len(), attacks.len());

        for (target, count) in &attacks {
            let guarded = guards.get(target).copied().unwrap_or(0);
            prop_assert_eq!(protection.protected.contains(target), guarded >= *count);
        }
    }

    /// A defense is spent only against an attack on its own ward.
    #[test]
    fn defenses_spent_match_attacks(intents in intents(), defenses in defenses()) {
        let attacks = per_target(&intents, |i| i.target);
        let guards = per_target(&defenses, |d| d.ward);
        let protection = apply_defenses(intents, defenses);

        let expected: usize = attacks
            .iter()
            .map(|(t, n)| (*n).min(guards.get(t).copied().unwrap_or(0)))
            .sum();
        prop_assert_eq!(protection.consumed.len(), expected);
        for (defense, attack) in &protection.consumed {
            prop_assert_eq!(defense.ward, attack.target);
        }
    }

    /// Luck always lands on someone in the circle, and never moves an
    /// unlucky start.
    #[test]
    fn redirect_chain_lands_in_the_circle(
        n in 1usize..9,
        start in 0usize..9,
        lucky in prop::collection::vec(any::<bool>(), 9),
        left in any::<bool>(),
    ) {
        let order: Vec<PlayerId> = (1..=n as u64).map(PlayerId).collect();
        let start = order[start % n];
        let dir = if left { Direction::Left } else { Direction::Right };
        let is_lucky = |p: PlayerId| lucky[(p.0 - 1) as usize];

        let end = redirect_chain(&order, start, &[], dir, is_lucky);
        prop_assert!(order.contains(&end));
        if !is_lucky(start) {
            prop_assert_eq!(end, start);
        }
    }

    /// A majority is more than half of the living, and no more than needed.
    #[test]
    fn majority_is_strict(living in 1usize..64) {
        let needed = majority(living);
        prop_assert!(needed * 2 > living);
        prop_assert!((needed - 1) * 2 <= living);
    }

    /// Removing the same player twice fails and leaves the counts alone.
    #[test]
    fn double_removal_is_rejected(
        wolves in prop::collection::vec(any::<bool>(), 2..10),
        victim in 0usize..10,
    ) {
        let mut registry = Registry::new();
        for (i, wolf) in wolves.iter().enumerate() {
            let id = PlayerId(i as u64 + 1);
            registry.join(id, format!("p{}", id.0));
            let role = if *wolf { Role::Wolf } else { Role::Villager };
            registry.assign_role(id, role).unwrap();
        }
        let victim = PlayerId((victim % wolves.len()) as u64 + 1);

        prop_assert!(registry.remove(victim, DeathCause::Quit, Phase::Night).is_ok());
        let after = registry.counts();
        prop_assert!(registry.remove(victim, DeathCause::Quit, Phase::Night).is_err());
        prop_assert_eq!(registry.counts(), after);
        prop_assert_eq!(after.living, wolves.len() - 1);
        prop_assert!(registry.check_consistency().is_ok());
    }
}
