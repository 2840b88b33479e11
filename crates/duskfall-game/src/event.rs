//! The game's event vocabulary.
//!
//! One variant per event name. The variant's fields are the event's typed
//! data: handlers read them through [`Event::payload`] and contribute
//! through [`Event::payload_mut`] (kill intents, defenses, win overrides),
//! and the trigger reads the final values back after dispatch.
//!
//! [`Event::payload`]: duskfall_bus::Event::payload
//! [`Event::payload_mut`]: duskfall_bus::Event::payload_mut

use std::fmt;

use duskfall_bus::EventPayload;
use duskfall_protocol::{PlayerId, Role};

use crate::night::{Defense, KillIntent, NightReport, Outstanding, PendingKill};
use crate::registry::{Death, LivingCounts};
use crate::win::WinResult;

/// Subscription key for [`GameEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    GameStarted,
    TransitionNightBegin,
    BeginNight,
    ChkNightDone,
    NightKills,
    NightDefenses,
    ProtectionConsumed,
    NightOverrides,
    NightResolved,
    TransitionNightEnd,
    TransitionDayBegin,
    BeginDay,
    Lynch,
    TransitionDayEnd,
    DelPlayer,
    RoleChanged,
    ChkWin,
    GameEnded,
}

impl EventKind {
    /// The event's wire-style name, as used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::GameStarted => "game_started",
            Self::TransitionNightBegin => "transition_night_begin",
            Self::BeginNight => "begin_night",
            Self::ChkNightDone => "chk_nightdone",
            Self::NightKills => "night_kills",
            Self::NightDefenses => "night_defenses",
            Self::ProtectionConsumed => "protection_consumed",
            Self::NightOverrides => "night_overrides",
            Self::NightResolved => "night_resolved",
            Self::TransitionNightEnd => "transition_night_end",
            Self::TransitionDayBegin => "transition_day_begin",
            Self::BeginDay => "begin_day",
            Self::Lynch => "lynch",
            Self::TransitionDayEnd => "transition_day_end",
            Self::DelPlayer => "del_player",
            Self::RoleChanged => "role_changed",
            Self::ChkWin => "chk_win",
            Self::GameEnded => "game_ended",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub enum GameEvent {
    /// Roles are dealt; fired once before the first phase.
    GameStarted { players: Vec<PlayerId> },

    /// Night is about to begin. Delayed effects (bite conversions) land here.
    TransitionNightBegin { night: u32 },

    /// Night has begun; per-night setup (totems, wolf pack notices).
    BeginNight { night: u32 },

    /// Each module adds its outstanding actors.
    ChkNightDone { outstanding: Outstanding },

    /// Step 1 of resolution: modules contribute kill intents.
    NightKills { intents: Vec<KillIntent> },

    /// Step 3: modules contribute defenses.
    NightDefenses { defenses: Vec<Defense> },

    /// A defense cancelled `attack`. Fired once per consumed defense.
    ProtectionConsumed { defense: Defense, attack: KillIntent },

    /// Step 4: overrides may drop or transform pending kills.
    NightOverrides { pending: Vec<PendingKill> },

    /// Deaths are applied; the final report.
    NightResolved { report: NightReport },

    /// Night is ending; last chance to fill in defaulted actions.
    TransitionNightEnd { night: u32 },

    TransitionDayBegin { day: u32 },

    BeginDay { day: u32 },

    /// A lynch is about to happen. Preventing default spares the target.
    Lynch { target: PlayerId, votes: usize },

    TransitionDayEnd { day: u32 },

    /// A player was removed from the living.
    DelPlayer { death: Death },

    /// A living player's primary role changed.
    RoleChanged { player: PlayerId, from: Role, to: Role },

    /// Win evaluation. Overrides set `result` and stop.
    ChkWin {
        counts: LivingCounts,
        result: Option<WinResult>,
    },

    GameEnded { result: WinResult },
}

impl EventPayload for GameEvent {
    type Kind = EventKind;

    fn kind(&self) -> EventKind {
        match self {
            Self::GameStarted { .. } => EventKind::GameStarted,
            Self::TransitionNightBegin { .. } => EventKind::TransitionNightBegin,
            Self::BeginNight { .. } => EventKind::BeginNight,
            Self::ChkNightDone { .. } => EventKind::ChkNightDone,
            Self::NightKills { .. } => EventKind::NightKills,
            Self::NightDefenses { .. } => EventKind::NightDefenses,
            Self::ProtectionConsumed { .. } => EventKind::ProtectionConsumed,
            Self::NightOverrides { .. } => EventKind::NightOverrides,
            Self::NightResolved { .. } => EventKind::NightResolved,
            Self::TransitionNightEnd { .. } => EventKind::TransitionNightEnd,
            Self::TransitionDayBegin { .. } => EventKind::TransitionDayBegin,
            Self::BeginDay { .. } => EventKind::BeginDay,
            Self::Lynch { .. } => EventKind::Lynch,
            Self::TransitionDayEnd { .. } => EventKind::TransitionDayEnd,
            Self::DelPlayer { .. } => EventKind::DelPlayer,
            Self::RoleChanged { .. } => EventKind::RoleChanged,
            Self::ChkWin { .. } => EventKind::ChkWin,
            Self::GameEnded { .. } => EventKind::GameEnded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        let ev = GameEvent::Lynch {
            target: PlayerId(3),
            votes: 2,
        };
        assert_eq!(ev.kind(), EventKind::Lynch);
        assert_eq!(
            GameEvent::ChkNightDone {
                outstanding: Outstanding::default()
            }
            .kind(),
            EventKind::ChkNightDone
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(EventKind::DelPlayer.to_string(), "del_player");
        assert_eq!(EventKind::ChkNightDone.name(), "chk_nightdone");
    }
}
