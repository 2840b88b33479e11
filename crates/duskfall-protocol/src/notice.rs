//! Structured outbound notices.
//!
//! The engine describes *what happened*; the chat bridge decides how to word
//! it. Every notice is paired with a [`Recipient`](crate::Recipient) by the
//! producer.

use serde::{Deserialize, Serialize};

use crate::{DeathCause, PlayerId, Role, Template, Totem, Winner};

/// One death, as announced to the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathReport {
    pub player: PlayerId,
    pub role: Role,
    pub cause: DeathCause,
}

/// Result of a gunner firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotOutcome {
    Killed,
    Missed,
}

/// A message from the engine to players or the channel.
///
/// Internally tagged so the bridge sees `{ "type": "Vision", ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Notice {
    // -- Lobby --
    PlayerJoined {
        player: PlayerId,
        nick: String,
        count: usize,
    },
    PlayerLeft {
        player: PlayerId,
        nick: String,
        count: usize,
    },
    /// Roles have been dealt. `roles` lists how many of each role are in play.
    GameStarting {
        players: usize,
        roles: Vec<(Role, usize)>,
    },
    RoleAssigned {
        role: Role,
    },
    TemplateAssigned {
        template: Template,
        charges: u32,
    },

    // -- Night --
    NightBegins {
        night: u32,
        seconds: Option<u64>,
    },
    NightWarning {
        seconds_left: u64,
    },
    /// Sent privately to each wolf at nightfall.
    WolfPack {
        members: Vec<PlayerId>,
    },
    /// Relayed to the other wolves when one of them votes.
    WolfVote {
        voter: PlayerId,
        target: PlayerId,
    },
    ActionRecorded {
        action: String,
    },
    ActionRetracted,
    TotemReceived {
        totem: Totem,
    },
    /// Told to the holder of a totem the moment it is passed.
    TotemHeld {
        totem: Totem,
    },
    Vision {
        target: PlayerId,
        role: Role,
    },
    /// Told to a defender whose protection turned an attack away.
    Protected {
        ward: PlayerId,
    },
    BiteLanded {
        target: PlayerId,
    },
    Converted {
        role: Role,
    },
    Lovers {
        lover: PlayerId,
    },

    // -- Day --
    /// The night's outcome. An empty list means nobody died.
    Dawn {
        day: u32,
        deaths: Vec<DeathReport>,
        seconds: Option<u64>,
    },
    DayWarning {
        seconds_left: u64,
    },
    VoteCast {
        voter: PlayerId,
        target: PlayerId,
        votes: usize,
        needed: usize,
    },
    VoteRetracted {
        voter: PlayerId,
    },
    Lynched {
        player: PlayerId,
        role: Role,
    },
    NoLynch,
    JesterWins {
        player: PlayerId,
    },
    Shot {
        shooter: PlayerId,
        target: PlayerId,
        outcome: ShotOutcome,
    },
    /// Deaths outside night resolution (grief after a lynch, quits, shots).
    Deaths {
        deaths: Vec<DeathReport>,
    },

    // -- Any phase --
    Rejected {
        reason: String,
    },
    GameOver {
        winner: Winner,
        message: String,
        roles: Vec<(PlayerId, Role)>,
        winners: Vec<PlayerId>,
    },
    GameAborted {
        reason: String,
    },
}

impl Notice {
    /// Shorthand for a rejection notice.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}
