//! Win condition evaluation.

use std::collections::BTreeSet;

use duskfall_protocol::{PlayerId, Winner};
use tracing::info;

use crate::event::{EventKind, GameEvent};
use crate::registry::LivingCounts;
use crate::{Game, GameError};

/// How a game ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinResult {
    pub winner: Winner,
    pub message: String,
    /// Team members for winners that are not a faction (lovers, monsters).
    /// Empty for faction wins.
    pub members: BTreeSet<PlayerId>,
    /// Players who also won on their own terms (a lynched jester).
    pub extra_winners: BTreeSet<PlayerId>,
}

impl WinResult {
    pub fn new(winner: Winner, message: impl Into<String>) -> Self {
        Self {
            winner,
            message: message.into(),
            members: BTreeSet::new(),
            extra_winners: BTreeSet::new(),
        }
    }

    pub fn with_members(mut self, members: impl IntoIterator<Item = PlayerId>) -> Self {
        self.members.extend(members);
        self
    }
}

/// The majority-count rule used when no override claims the game.
pub fn default_outcome(counts: &LivingCounts) -> Option<WinResult> {
    if counts.living == 0 {
        return Some(WinResult::new(Winner::Nobody, "Everybody is dead."));
    }
    if counts.wolves == 0 {
        return Some(WinResult::new(
            Winner::Village,
            "All the wolves are dead! The village wins.",
        ));
    }
    if counts.wolves * 2 >= counts.living {
        return Some(WinResult::new(
            Winner::Wolves,
            "The wolves outnumber the village and devour the rest. The wolves win.",
        ));
    }
    None
}

impl Game {
    /// Checks whether the game is over.
    ///
    /// `ChkWin` subscribers may claim the game first. Once a result exists it
    /// is final: later calls return it and change nothing.
    pub fn evaluate_win(&mut self) -> Result<Option<&WinResult>, GameError> {
        if self.win.is_some() || !self.phase.is_active() {
            return Ok(self.win.as_ref());
        }

        let counts = self.registry.counts();
        let ev = self.dispatch(GameEvent::ChkWin {
            counts,
            result: None,
        })?;
        let prevented = ev.default_prevented();
        let GameEvent::ChkWin { result, .. } = ev.into_payload() else {
            return Err(GameError::Invariant(format!(
                "{} handler replaced the event payload",
                EventKind::ChkWin
            )));
        };

        let result = match result {
            Some(result) => Some(result),
            None if prevented => None,
            None => default_outcome(&counts),
        };

        if let Some(mut result) = result {
            result
                .extra_winners
                .extend(self.individual_winners.iter().copied());
            info!(
                game_id = %self.id,
                winner = %result.winner,
                living = counts.living,
                wolves = counts.wolves,
                "win condition met"
            );
            self.win = Some(result);
        }
        Ok(self.win.as_ref())
    }

    /// The result, if the game has been won.
    pub fn winner(&self) -> Option<&WinResult> {
        self.win.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(living: usize, wolves: usize) -> LivingCounts {
        LivingCounts {
            living,
            wolves,
            village: living - wolves,
            neutral: 0,
        }
    }

    #[test]
    fn test_no_wolves_is_village_win() {
        let result = default_outcome(&counts(3, 0)).unwrap();
        assert_eq!(result.winner, Winner::Village);
    }

    #[test]
    fn test_wolves_at_half_win() {
        assert_eq!(default_outcome(&counts(4, 2)).unwrap().winner, Winner::Wolves);
        assert_eq!(default_outcome(&counts(3, 2)).unwrap().winner, Winner::Wolves);
    }

    #[test]
    fn test_wolves_below_half_play_on() {
        assert!(default_outcome(&counts(5, 2)).is_none());
        assert!(default_outcome(&counts(3, 1)).is_none());
    }

    #[test]
    fn test_empty_village_is_nobodys_win() {
        assert_eq!(default_outcome(&counts(0, 0)).unwrap().winner, Winner::Nobody);
    }
}
