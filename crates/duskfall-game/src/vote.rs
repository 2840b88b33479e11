//! Day voting.

use std::collections::BTreeMap;

use duskfall_protocol::{Notice, PlayerId};
use tracing::info;

use crate::phase::Advance;
use crate::{Game, GameError, Phase};

/// Votes needed to lynch among `living` players.
pub fn majority(living: usize) -> usize {
    living / 2 + 1
}

/// Voter → target for the current day.
#[derive(Debug, Clone, Default)]
pub struct DayVotes {
    votes: BTreeMap<PlayerId, PlayerId>,
}

impl DayVotes {
    /// Casts or moves a vote. Returns the previous target.
    pub fn cast(&mut self, voter: PlayerId, target: PlayerId) -> Option<PlayerId> {
        self.votes.insert(voter, target)
    }

    pub fn retract(&mut self, voter: PlayerId) -> Option<PlayerId> {
        self.votes.remove(&voter)
    }

    pub fn vote_of(&self, voter: PlayerId) -> Option<PlayerId> {
        self.votes.get(&voter).copied()
    }

    pub fn votes_for(&self, target: PlayerId) -> usize {
        self.votes.values().filter(|t| **t == target).count()
    }

    /// Target → votes.
    pub fn tally(&self) -> BTreeMap<PlayerId, usize> {
        let mut tally = BTreeMap::new();
        for target in self.votes.values() {
            *tally.entry(*target).or_insert(0) += 1;
        }
        tally
    }

    /// The target with strictly the most votes, if there is one.
    pub fn plurality(&self) -> Option<PlayerId> {
        let tally = self.tally();
        let top = *tally.values().max()?;
        let mut leaders = tally.iter().filter(|(_, n)| **n == top);
        let (leader, _) = leaders.next()?;
        leaders.next().is_none().then_some(*leader)
    }

    /// Drops every vote by or for `player`.
    pub fn forget(&mut self, player: PlayerId) {
        self.votes.retain(|voter, target| *voter != player && *target != player);
    }

    pub fn clear(&mut self) {
        self.votes.clear();
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }
}

impl Game {
    /// Records a lynch vote. Reaching a majority ends the day at once.
    pub(crate) fn cast_vote(&mut self, voter: PlayerId, target: PlayerId) -> Result<(), GameError> {
        if self.phase != Phase::Day {
            return Err(GameError::rejected("you can only vote during the day"));
        }
        if !self.registry.is_alive(target) {
            return Err(GameError::rejected("you can't vote for a dead player"));
        }

        self.votes.cast(voter, target);
        let votes = self.votes.votes_for(target);
        let needed = majority(self.registry.living().len());
        self.announce(Notice::VoteCast {
            voter,
            target,
            votes,
            needed,
        });

        if votes >= needed {
            info!(game_id = %self.id, target = %target, votes, "majority reached");
            self.advance(Advance::EndDay {
                lynched: Some(target),
            })?;
        }
        Ok(())
    }

    pub(crate) fn retract_vote(&mut self, voter: PlayerId) -> Result<(), GameError> {
        if self.votes.retract(voter).is_none() {
            return Err(GameError::rejected("you haven't voted"));
        }
        self.announce(Notice::VoteRetracted { voter });
        Ok(())
    }

    /// Current votes.
    pub fn votes(&self) -> &DayVotes {
        &self.votes
    }
}
