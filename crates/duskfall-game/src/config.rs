//! Game configuration and the phase state machine.

use std::time::Duration;

use duskfall_protocol::{Role, Totem};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::GameError;

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

/// Configuration for one game instance.
///
/// Every field has a default, so a JSON document only needs the keys it
/// changes. Time limits are in seconds; `0` disables the timer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Minimum players required to start.
    pub min_players: usize,

    /// Maximum players allowed to join.
    pub max_players: usize,

    /// How long after the first join `start` is refused.
    pub start_delay_secs: u64,

    /// Skip the first night and open with a day.
    pub start_with_day: bool,

    pub night_time_limit_secs: u64,

    /// Seconds into the night when the warning is sent.
    pub night_warning_secs: u64,

    pub day_time_limit_secs: u64,

    /// Seconds into the day when the warning is sent.
    pub day_warning_secs: u64,

    /// When the day times out, lynch a unique plurality instead of nobody.
    pub lynch_on_timeout: bool,

    /// Whether guardian angels may guard themselves.
    pub guardian_can_self: bool,

    /// Bullets handed to each gunner.
    pub gunner_bullets: u32,

    /// Probability in `[0, 1]` that a shot misses.
    pub gunner_miss_chance: f64,

    /// Relative weights for the nightly shaman totem.
    pub totem_chances: TotemChances,

    /// How many of each role to deal by player count.
    pub role_table: RoleTable,

    /// Fixed RNG seed. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: 4,
            max_players: 24,
            start_delay_secs: 0,
            start_with_day: false,
            night_time_limit_secs: 120,
            night_warning_secs: 90,
            day_time_limit_secs: 600,
            day_warning_secs: 480,
            lynch_on_timeout: false,
            guardian_can_self: false,
            gunner_bullets: 2,
            gunner_miss_chance: 0.15,
            totem_chances: TotemChances::default(),
            role_table: RoleTable::default(),
            seed: None,
        }
    }
}

impl GameConfig {
    /// Parses a JSON document and validates it.
    pub fn from_json_str(json: &str) -> Result<Self, GameError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    /// Clamps out-of-range values, logging each adjustment.
    pub fn validated(mut self) -> Self {
        if self.min_players < 3 {
            warn!(min_players = self.min_players, "min_players raised to 3");
            self.min_players = 3;
        }
        if self.max_players < self.min_players {
            warn!(
                max_players = self.max_players,
                min_players = self.min_players,
                "max_players raised to min_players"
            );
            self.max_players = self.min_players;
        }
        if self.night_time_limit_secs > 0 && self.night_warning_secs >= self.night_time_limit_secs {
            warn!(
                night_warning_secs = self.night_warning_secs,
                "night warning at or after the limit, disabled"
            );
            self.night_warning_secs = 0;
        }
        if self.day_time_limit_secs > 0 && self.day_warning_secs >= self.day_time_limit_secs {
            warn!(
                day_warning_secs = self.day_warning_secs,
                "day warning at or after the limit, disabled"
            );
            self.day_warning_secs = 0;
        }
        if !(0.0..=1.0).contains(&self.gunner_miss_chance) {
            let clamped = if self.gunner_miss_chance.is_nan() {
                0.0
            } else {
                self.gunner_miss_chance.clamp(0.0, 1.0)
            };
            warn!(
                gunner_miss_chance = self.gunner_miss_chance,
                clamped, "gunner_miss_chance clamped"
            );
            self.gunner_miss_chance = clamped;
        }
        self
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_secs(self.start_delay_secs)
    }

    pub fn night_limit(&self) -> Option<Duration> {
        secs(self.night_time_limit_secs)
    }

    /// The night warning, only when a night limit exists.
    pub fn night_warning(&self) -> Option<Duration> {
        self.night_limit().and(secs(self.night_warning_secs))
    }

    pub fn day_limit(&self) -> Option<Duration> {
        secs(self.day_time_limit_secs)
    }

    /// The day warning, only when a day limit exists.
    pub fn day_warning(&self) -> Option<Duration> {
        self.day_limit().and(secs(self.day_warning_secs))
    }
}

fn secs(n: u64) -> Option<Duration> {
    (n > 0).then(|| Duration::from_secs(n))
}

// ---------------------------------------------------------------------------
// TotemChances
// ---------------------------------------------------------------------------

/// Relative weights of each totem. A zero weight removes it from the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TotemChances {
    pub protection: u32,
    pub luck: u32,
    pub misdirection: u32,
    pub death: u32,
}

impl Default for TotemChances {
    fn default() -> Self {
        Self {
            protection: 4,
            luck: 2,
            misdirection: 2,
            death: 1,
        }
    }
}

impl TotemChances {
    pub fn weight(&self, totem: Totem) -> u32 {
        match totem {
            Totem::Protection => self.protection,
            Totem::Luck => self.luck,
            Totem::Misdirection => self.misdirection,
            Totem::Death => self.death,
        }
    }

    /// Draws a totem. An all-zero table always yields protection.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Totem {
        // Summed wide so four u32::MAX weights cannot overflow.
        let total: u64 = Totem::ALL.iter().map(|t| u64::from(self.weight(*t))).sum();
        if total == 0 {
            return Totem::Protection;
        }
        let mut roll = rng.random_range(0..total);
        for totem in Totem::ALL {
            let weight = u64::from(self.weight(totem));
            if roll < weight {
                return totem;
            }
            roll -= weight;
        }
        Totem::Protection
    }
}

// ---------------------------------------------------------------------------
// RoleTable
// ---------------------------------------------------------------------------

/// One special role and the player counts at which another copy is dealt.
///
/// `thresholds: [4, 7, 11]` deals one copy from four players, two from
/// seven, three from eleven.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleQuota {
    pub role: Role,
    pub thresholds: Vec<usize>,
}

impl RoleQuota {
    pub fn new(role: Role, thresholds: &[usize]) -> Self {
        Self {
            role,
            thresholds: thresholds.to_vec(),
        }
    }

    pub fn count_for(&self, players: usize) -> usize {
        self.thresholds.iter().filter(|t| **t <= players).count()
    }
}

/// Role composition by player count. Seats not covered by a quota are
/// villagers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleTable {
    pub roles: Vec<RoleQuota>,
    /// Player counts at which another gunner template is handed out.
    pub gunner_at: Vec<usize>,
}

impl Default for RoleTable {
    fn default() -> Self {
        Self {
            roles: vec![
                RoleQuota::new(Role::Wolf, &[4, 7, 11]),
                RoleQuota::new(Role::Seer, &[4]),
                RoleQuota::new(Role::GuardianAngel, &[6]),
                RoleQuota::new(Role::Jester, &[7]),
                RoleQuota::new(Role::Shaman, &[8]),
                RoleQuota::new(Role::Matchmaker, &[9]),
                RoleQuota::new(Role::AlphaWolf, &[10]),
                RoleQuota::new(Role::Bodyguard, &[12]),
                RoleQuota::new(Role::Monster, &[13]),
            ],
            gunner_at: vec![8, 14],
        }
    }
}

impl RoleTable {
    /// The unshuffled deck for `players` seats.
    pub fn deal(&self, players: usize) -> Result<Vec<Role>, GameError> {
        let mut deck = Vec::with_capacity(players);
        for quota in &self.roles {
            for _ in 0..quota.count_for(players) {
                deck.push(quota.role);
            }
        }
        if deck.len() > players {
            return Err(GameError::InvalidState(format!(
                "role table deals {} special roles for {players} players",
                deck.len()
            )));
        }
        if !deck.iter().any(|r| r.is_wolf()) {
            return Err(GameError::InvalidState(format!(
                "role table deals no wolves for {players} players"
            )));
        }
        deck.resize(players, Role::Villager);
        Ok(deck)
    }

    pub fn gunners(&self, players: usize) -> usize {
        self.gunner_at.iter().filter(|t| **t <= players).count()
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The lifecycle phase of a game.
///
/// ```text
/// None → Join → Night ⇄ Day → Ended
///               (or Join → Day when starting with a day)
/// ```
///
/// Any running phase may end the game. Nothing leaves `Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    None,
    Join,
    Night,
    Day,
    Ended,
}

impl Phase {
    /// Returns `true` while players may still join.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::None | Self::Join)
    }

    /// Returns `true` while the game is being played.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Night | Self::Day)
    }

    /// Returns `true` if moving to `target` keeps phases moving forward.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::None, Self::Join)
                | (Self::Join, Self::Night | Self::Day | Self::Ended)
                | (Self::Night, Self::Day | Self::Ended)
                | (Self::Day, Self::Night | Self::Ended)
        )
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Join => write!(f, "join"),
            Self::Night => write!(f, "night"),
            Self::Day => write!(f, "day"),
            Self::Ended => write!(f, "ended"),
        }
    }
}
