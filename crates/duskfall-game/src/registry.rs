//! Authoritative player and role state.
//!
//! The registry keeps two indexes that must always agree: role → living
//! players, and living player → primary role. Every mutation checks both
//! before touching either, so a failed call leaves the registry unchanged.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use duskfall_protocol::{DeathCause, DeathReport, Faction, PlayerId, Role, Template};

use crate::{GameError, Phase};

/// One participant.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub nick: String,
    pub alive: bool,
    /// Template modifiers and their remaining charges.
    pub templates: BTreeMap<Template, u32>,
    pub joined_at: Instant,
    /// Last time the player issued a command.
    pub last_active: Instant,
}

/// A removal, as reported to `DelPlayer` subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Death {
    pub player: PlayerId,
    pub role: Role,
    pub cause: DeathCause,
}

impl Death {
    pub fn report(&self) -> DeathReport {
        DeathReport {
            player: self.player,
            role: self.role,
            cause: self.cause,
        }
    }
}

/// Ledger entry kept for every removed player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalRole {
    pub player: PlayerId,
    pub role: Role,
    pub cause: DeathCause,
    pub phase: Phase,
}

/// Living players per faction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LivingCounts {
    pub living: usize,
    pub wolves: usize,
    pub village: usize,
    pub neutral: usize,
}

#[derive(Debug, Default)]
pub struct Registry {
    players: BTreeMap<PlayerId, Player>,
    /// Join order. The canonical order for adjacency and death reports.
    order: Vec<PlayerId>,
    role_sets: BTreeMap<Role, BTreeSet<PlayerId>>,
    main_roles: BTreeMap<PlayerId, Role>,
    ledger: Vec<FinalRole>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a player. Returns `false` if the id is already registered.
    pub fn join(&mut self, id: PlayerId, nick: impl Into<String>) -> bool {
        if self.players.contains_key(&id) {
            return false;
        }
        let now = Instant::now();
        self.players.insert(
            id,
            Player {
                id,
                nick: nick.into(),
                alive: true,
                templates: BTreeMap::new(),
                joined_at: now,
                last_active: now,
            },
        );
        self.order.push(id);
        true
    }

    /// Drops a player who leaves before roles are dealt.
    pub fn forget(&mut self, id: PlayerId) -> Option<Player> {
        let player = self.players.remove(&id)?;
        self.order.retain(|p| *p != id);
        if let Some(role) = self.main_roles.remove(&id) {
            if let Some(set) = self.role_sets.get_mut(&role) {
                set.remove(&id);
            }
        }
        Some(player)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn nick(&self, id: PlayerId) -> Option<&str> {
        self.players.get(&id).map(|p| p.nick.as_str())
    }

    pub fn is_alive(&self, id: PlayerId) -> bool {
        self.players.get(&id).is_some_and(|p| p.alive)
    }

    /// Records activity for the idle reaper.
    pub fn touch(&mut self, id: PlayerId) {
        if let Some(player) = self.players.get_mut(&id) {
            player.last_active = Instant::now();
        }
    }

    /// Number of participants, living or dead.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Every participant in join order.
    pub fn all(&self) -> &[PlayerId] {
        &self.order
    }

    /// Living participants in join order.
    pub fn living(&self) -> Vec<PlayerId> {
        self.order
            .iter()
            .copied()
            .filter(|p| self.is_alive(*p))
            .collect()
    }

    /// Position in join order, used to sort deaths.
    pub fn position(&self, id: PlayerId) -> Option<usize> {
        self.order.iter().position(|p| *p == id)
    }

    // -- Roles -------------------------------------------------------------

    /// Gives a living player a primary role, replacing any previous one.
    ///
    /// Returns the previous role.
    pub fn assign_role(&mut self, id: PlayerId, role: Role) -> Result<Option<Role>, GameError> {
        let player = self
            .players
            .get(&id)
            .ok_or_else(|| GameError::Invariant(format!("role assigned to unknown player {id}")))?;
        if !player.alive {
            return Err(GameError::AlreadyDead(id));
        }
        let previous = self.main_roles.get(&id).copied();
        if let Some(old) = previous {
            if !self.role_sets.get(&old).is_some_and(|s| s.contains(&id)) {
                return Err(GameError::Invariant(format!(
                    "{id} holds {old} but is missing from its role set"
                )));
            }
        }

        if let Some(old) = previous {
            if let Some(set) = self.role_sets.get_mut(&old) {
                set.remove(&id);
            }
        }
        self.role_sets.entry(role).or_default().insert(id);
        self.main_roles.insert(id, role);
        Ok(previous)
    }

    /// The primary role of a living player, or the final role of a dead one.
    ///
    /// Asking about a player the registry never dealt a role to is an
    /// invariant violation.
    pub fn role_of(&self, id: PlayerId) -> Result<Role, GameError> {
        if let Some(role) = self.main_roles.get(&id) {
            return Ok(*role);
        }
        self.final_role(id)
            .ok_or_else(|| GameError::Invariant(format!("no role recorded for {id}")))
    }

    /// The primary role of a living player.
    pub fn main_role(&self, id: PlayerId) -> Option<Role> {
        self.main_roles.get(&id).copied()
    }

    /// Living holders of `role`, ordered by id.
    pub fn players_with_role(&self, role: Role) -> Vec<PlayerId> {
        self.role_sets
            .get(&role)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Living holders of any role in `roles`, in join order.
    pub fn players_with_any(&self, roles: &[Role]) -> Vec<PlayerId> {
        self.order
            .iter()
            .copied()
            .filter(|p| self.main_role(*p).is_some_and(|r| roles.contains(&r)))
            .collect()
    }

    /// Living wolves in join order.
    pub fn wolves(&self) -> Vec<PlayerId> {
        self.order
            .iter()
            .copied()
            .filter(|p| self.main_role(*p).is_some_and(Role::is_wolf))
            .collect()
    }

    pub fn counts(&self) -> LivingCounts {
        let mut counts = LivingCounts::default();
        for role in self.main_roles.values() {
            counts.living += 1;
            match role.faction() {
                Faction::Wolves => counts.wolves += 1,
                Faction::Village => counts.village += 1,
                Faction::Neutral => counts.neutral += 1,
            }
        }
        counts
    }

    // -- Removal -----------------------------------------------------------

    /// Removes a living player from every role index and records the final
    /// role in the ledger.
    ///
    /// Removing a dead player fails with [`GameError::AlreadyDead`] and
    /// changes nothing.
    pub fn remove(&mut self, id: PlayerId, cause: DeathCause, phase: Phase) -> Result<Death, GameError> {
        let player = self
            .players
            .get(&id)
            .ok_or_else(|| GameError::Invariant(format!("removal of unknown player {id}")))?;
        if !player.alive {
            return Err(GameError::AlreadyDead(id));
        }
        let role = self
            .main_roles
            .get(&id)
            .copied()
            .ok_or_else(|| GameError::Invariant(format!("living player {id} has no role")))?;
        if !self.role_sets.get(&role).is_some_and(|s| s.contains(&id)) {
            return Err(GameError::Invariant(format!(
                "{id} holds {role} but is missing from its role set"
            )));
        }

        if let Some(set) = self.role_sets.get_mut(&role) {
            set.remove(&id);
        }
        self.main_roles.remove(&id);
        if let Some(player) = self.players.get_mut(&id) {
            player.alive = false;
        }
        self.ledger.push(FinalRole {
            player: id,
            role,
            cause,
            phase,
        });
        Ok(Death {
            player: id,
            role,
            cause,
        })
    }

    pub fn ledger(&self) -> &[FinalRole] {
        &self.ledger
    }

    pub fn final_role(&self, id: PlayerId) -> Option<Role> {
        self.ledger.iter().find(|f| f.player == id).map(|f| f.role)
    }

    // -- Templates ---------------------------------------------------------

    pub fn grant_template(&mut self, id: PlayerId, template: Template, charges: u32) -> Result<(), GameError> {
        let player = self
            .players
            .get_mut(&id)
            .ok_or_else(|| GameError::Invariant(format!("template granted to unknown player {id}")))?;
        player.templates.insert(template, charges);
        Ok(())
    }

    pub fn has_template(&self, id: PlayerId, template: Template) -> bool {
        self.players
            .get(&id)
            .is_some_and(|p| p.templates.contains_key(&template))
    }

    pub fn charges(&self, id: PlayerId, template: Template) -> u32 {
        self.players
            .get(&id)
            .and_then(|p| p.templates.get(&template))
            .copied()
            .unwrap_or(0)
    }

    /// Spends one charge. Returns the charges left.
    pub fn use_charge(&mut self, id: PlayerId, template: Template) -> Result<u32, GameError> {
        let charges = self
            .players
            .get_mut(&id)
            .and_then(|p| p.templates.get_mut(&template))
            .filter(|c| **c > 0)
            .ok_or_else(|| GameError::rejected(format!("you have no {template} charges left")))?;
        *charges -= 1;
        Ok(*charges)
    }

    // -- Targets -----------------------------------------------------------

    /// Resolves a typed target to a living player.
    ///
    /// An exact nickname match (ignoring case) wins; otherwise the text must
    /// be an unambiguous prefix of exactly one living nickname.
    pub fn resolve_target(&self, text: &str) -> Result<PlayerId, GameError> {
        let wanted = text.trim().to_lowercase();
        if wanted.is_empty() {
            return Err(GameError::rejected("no target given"));
        }
        let living = self.living();

        if let Some(exact) = living
            .iter()
            .find(|p| self.nick(**p).is_some_and(|n| n.to_lowercase() == wanted))
        {
            return Ok(*exact);
        }

        let matches: Vec<PlayerId> = living
            .into_iter()
            .filter(|p| {
                self.nick(*p)
                    .is_some_and(|n| n.to_lowercase().starts_with(&wanted))
            })
            .collect();
        match matches.as_slice() {
            [one] => Ok(*one),
            [] => Err(GameError::rejected(format!("{text} is not playing"))),
            _ => Err(GameError::rejected(format!("{text} is ambiguous"))),
        }
    }

    /// Checks that both role indexes agree and every living player has a
    /// role. Only meaningful after roles are dealt.
    pub fn check_consistency(&self) -> Result<(), GameError> {
        for id in self.living() {
            let role = self
                .main_roles
                .get(&id)
                .ok_or_else(|| GameError::Invariant(format!("living player {id} has no role")))?;
            if !self.role_sets.get(role).is_some_and(|s| s.contains(&id)) {
                return Err(GameError::Invariant(format!("{id} missing from {role} set")));
            }
        }
        let indexed: usize = self.role_sets.values().map(BTreeSet::len).sum();
        if indexed != self.main_roles.len() {
            return Err(GameError::Invariant(format!(
                "role sets hold {indexed} players, index holds {}",
                self.main_roles.len()
            )));
        }
        Ok(())
    }
}
