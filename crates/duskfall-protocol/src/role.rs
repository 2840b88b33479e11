//! Role vocabulary: roles, factions, totems, templates, causes of death,
//! and winners.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Faction
// ---------------------------------------------------------------------------

/// A team sharing one win condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    /// The benign majority.
    Village,
    /// The evil minority.
    Wolves,
    /// Independents with their own victory conditions.
    Neutral,
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Village => write!(f, "village"),
            Self::Wolves => write!(f, "wolves"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// A primary role. Every living player holds exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Villager,
    Seer,
    GuardianAngel,
    Bodyguard,
    Shaman,
    Matchmaker,
    Wolf,
    AlphaWolf,
    Jester,
    Monster,
}

impl Role {
    /// Every role, in a stable order.
    pub const ALL: [Role; 10] = [
        Role::Villager,
        Role::Seer,
        Role::GuardianAngel,
        Role::Bodyguard,
        Role::Shaman,
        Role::Matchmaker,
        Role::Wolf,
        Role::AlphaWolf,
        Role::Jester,
        Role::Monster,
    ];

    /// The faction this role plays for.
    pub const fn faction(self) -> Faction {
        match self {
            Self::Villager
            | Self::Seer
            | Self::GuardianAngel
            | Self::Bodyguard
            | Self::Shaman
            | Self::Matchmaker => Faction::Village,
            Self::Wolf | Self::AlphaWolf => Faction::Wolves,
            Self::Jester | Self::Monster => Faction::Neutral,
        }
    }

    /// Returns `true` for roles that vote on the nightly wolf kill.
    pub const fn is_wolf(self) -> bool {
        matches!(self, Self::Wolf | Self::AlphaWolf)
    }

    /// The display name used in notices.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Villager => "villager",
            Self::Seer => "seer",
            Self::GuardianAngel => "guardian angel",
            Self::Bodyguard => "bodyguard",
            Self::Shaman => "shaman",
            Self::Matchmaker => "matchmaker",
            Self::Wolf => "wolf",
            Self::AlphaWolf => "alpha wolf",
            Self::Jester => "jester",
            Self::Monster => "monster",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Totem
// ---------------------------------------------------------------------------

/// A one-night effect a shaman passes to another player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Totem {
    /// Cancels one attack on the holder.
    Protection,
    /// Attacks aimed at the holder slide to a neighbour.
    Luck,
    /// The holder's own actions slide to a neighbour of the intended target.
    Misdirection,
    /// The holder is attacked.
    Death,
}

impl Totem {
    /// Every totem, in a stable order.
    pub const ALL: [Totem; 4] = [Totem::Protection, Totem::Luck, Totem::Misdirection, Totem::Death];
}

impl fmt::Display for Totem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protection => write!(f, "protection totem"),
            Self::Luck => write!(f, "luck totem"),
            Self::Misdirection => write!(f, "misdirection totem"),
            Self::Death => write!(f, "death totem"),
        }
    }
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// A modifier layered on top of a primary role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    /// Carries a gun with a limited number of bullets.
    Gunner,
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gunner => write!(f, "gunner"),
        }
    }
}

// ---------------------------------------------------------------------------
// DeathCause
// ---------------------------------------------------------------------------

/// Why a player left the living.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    /// Killed by the wolves at night.
    WolfKill,
    /// Held a death totem.
    DeathTotem,
    /// A bodyguard who took a blow meant for their ward.
    Sacrifice,
    /// A lover who could not go on.
    Grief,
    /// Lynched by the village.
    Lynch,
    /// Shot by a gunner.
    Shot,
    /// Left the game.
    Quit,
}

impl DeathCause {
    /// Returns `true` for deaths that happen during night resolution.
    pub const fn is_night_death(self) -> bool {
        matches!(self, Self::WolfKill | Self::DeathTotem | Self::Sacrifice)
    }
}

// ---------------------------------------------------------------------------
// Winner
// ---------------------------------------------------------------------------

/// Who won a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    Village,
    Wolves,
    /// Surviving monsters take the win from whichever side would have won.
    Monsters,
    /// The last two players alive are lovers.
    Lovers,
    /// Everyone died, or the game was aborted.
    Nobody,
}

impl Winner {
    /// The faction that wins as a whole, if the winner is a faction.
    pub const fn faction(self) -> Option<Faction> {
        match self {
            Self::Village => Some(Faction::Village),
            Self::Wolves => Some(Faction::Wolves),
            Self::Monsters | Self::Lovers | Self::Nobody => None,
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Village => write!(f, "village"),
            Self::Wolves => write!(f, "wolves"),
            Self::Monsters => write!(f, "monsters"),
            Self::Lovers => write!(f, "lovers"),
            Self::Nobody => write!(f, "nobody"),
        }
    }
}
