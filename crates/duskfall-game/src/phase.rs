//! The phase scheduler: lobby, start, the night/day cycle, timers, and the
//! end of the game.
//!
//! Transitions run through [`Game::advance`], which loops until the game
//! rests in a phase that waits for players (or has ended). While it runs,
//! `in_transition` is set; a second trigger arriving from inside a handler
//! (a vote reaching majority during a lynch, say) is ignored.

use std::collections::BTreeMap;
use std::time::Duration;

use duskfall_protocol::{
    DeathCause, DeathReport, Faction, GameId, Notice, PlayerId, Role, Template, Winner,
};
use rand::seq::SliceRandom;
use tracing::{debug, error, info};

use crate::event::{EventKind, GameEvent};
use crate::night::{self, NightReport, Outstanding};
use crate::outbox::OutcomeRecord;
use crate::registry::Death;
use crate::win::WinResult;
use crate::{Game, GameError, Phase};

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    NightLimit,
    NightWarning,
    DayLimit,
    DayWarning,
}

/// Delivered by the timer service when a phase deadline passes.
///
/// Carries the game and phase it was scheduled for, so a fire that lost a
/// race with an early phase end can be recognized and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFire {
    pub game: GameId,
    pub phase_id: u64,
    pub kind: TimerKind,
}

/// What the game asks of its timer service. Flushed by the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerRequest {
    Schedule { delay: Duration, fire: TimerFire },
    CancelAll,
}

/// What set a transition off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Advance {
    Start,
    EndNight,
    EndDay { lynched: Option<PlayerId> },
}

impl Game {
    // -- Lobby -------------------------------------------------------------

    /// Adds a player. The first join opens the lobby.
    pub fn join(&mut self, player: PlayerId, nick: impl Into<String>) -> Result<(), GameError> {
        if !self.phase.is_joinable() {
            return Err(GameError::InvalidState(format!(
                "cannot join game {} during {}",
                self.id, self.phase
            )));
        }
        if self.registry.contains(player) {
            return Err(GameError::AlreadyJoined(player, self.id));
        }
        if self.registry.len() >= self.config.max_players {
            return Err(GameError::GameFull(self.id));
        }
        if self.phase == Phase::None {
            self.set_phase(Phase::Join)?;
            self.join_opened_at = Some(std::time::Instant::now());
        }

        let nick = nick.into();
        self.registry.join(player, nick.clone());
        info!(game_id = %self.id, player_id = %player, %nick, "player joined");
        self.announce(Notice::PlayerJoined {
            player,
            nick,
            count: self.registry.len(),
        });
        Ok(())
    }

    /// Takes a player out of the game.
    ///
    /// In the lobby they are simply forgotten. In a running game they die
    /// (`Quit`) like any other death.
    pub fn leave(&mut self, player: PlayerId) -> Result<(), GameError> {
        if !self.registry.contains(player) {
            return Err(GameError::NotInGame(player, self.id));
        }
        match self.phase {
            Phase::None | Phase::Join => {
                let nick = self.nick(player);
                self.registry.forget(player);
                info!(game_id = %self.id, player_id = %player, "player left the lobby");
                self.announce(Notice::PlayerLeft {
                    player,
                    nick,
                    count: self.registry.len(),
                });
                if self.registry.is_empty() {
                    self.set_phase(Phase::Ended)?;
                }
                Ok(())
            }
            Phase::Night | Phase::Day => {
                if !self.registry.is_alive(player) {
                    return Err(GameError::rejected("you are already dead"));
                }
                let deaths = self.remove_player(player, DeathCause::Quit)?;
                self.announce_deaths(&deaths);
                self.after_death()
            }
            Phase::Ended => Err(GameError::InvalidState(format!("game {} has ended", self.id))),
        }
    }

    /// Deals roles from the role table and starts the game.
    pub fn start(&mut self, actor: PlayerId) -> Result<(), GameError> {
        if self.phase != Phase::Join {
            return Err(GameError::InvalidState(format!(
                "cannot start game {} during {}",
                self.id, self.phase
            )));
        }
        if !self.registry.contains(actor) {
            return Err(GameError::NotInGame(actor, self.id));
        }
        let players = self.registry.len();
        if players < self.config.min_players {
            return Err(GameError::rejected(format!(
                "at least {} players are needed to start, {players} joined",
                self.config.min_players
            )));
        }
        let delay = self.config.start_delay();
        if let Some(opened) = self.join_opened_at {
            let waited = opened.elapsed();
            if waited < delay {
                return Err(GameError::rejected(format!(
                    "please wait {} more seconds",
                    (delay - waited).as_secs().max(1)
                )));
            }
        }

        let mut deck = self.config.role_table.deal(players)?;
        deck.shuffle(&mut self.rng);
        let assignment: BTreeMap<PlayerId, Role> =
            self.registry.all().iter().copied().zip(deck).collect();

        let mut village: Vec<PlayerId> = assignment
            .iter()
            .filter(|(_, r)| r.faction() == Faction::Village)
            .map(|(p, _)| *p)
            .collect();
        village.shuffle(&mut self.rng);
        village.truncate(self.config.role_table.gunners(players));

        self.begin(assignment, village)
    }

    /// Starts the game with a fixed role assignment. No templates are dealt.
    pub fn force_start(&mut self, assignment: BTreeMap<PlayerId, Role>) -> Result<(), GameError> {
        if self.phase != Phase::Join {
            return Err(GameError::InvalidState(format!(
                "cannot start game {} during {}",
                self.id, self.phase
            )));
        }
        if let Some(stranger) = assignment.keys().find(|p| !self.registry.contains(**p)) {
            return Err(GameError::NotInGame(*stranger, self.id));
        }
        if let Some(missing) = self
            .registry
            .all()
            .iter()
            .find(|p| !assignment.contains_key(*p))
        {
            return Err(GameError::rejected(format!("no role given to {missing}")));
        }
        if !assignment.values().any(|r| r.is_wolf()) {
            return Err(GameError::rejected("a game needs at least one wolf"));
        }
        self.begin(assignment, Vec::new())
    }

    /// Gives a player a template. Meant for setups built with `force_start`.
    pub fn grant_template(&mut self, player: PlayerId, template: Template) -> Result<(), GameError> {
        let charges = match template {
            Template::Gunner => self.config.gunner_bullets,
        };
        self.registry.grant_template(player, template, charges)?;
        self.tell(player, Notice::TemplateAssigned { template, charges });
        Ok(())
    }

    fn begin(&mut self, assignment: BTreeMap<PlayerId, Role>, gunners: Vec<PlayerId>) -> Result<(), GameError> {
        for (player, role) in &assignment {
            self.registry.assign_role(*player, *role)?;
        }

        let mut census: BTreeMap<Role, usize> = BTreeMap::new();
        for role in assignment.values() {
            *census.entry(*role).or_insert(0) += 1;
        }
        self.announce(Notice::GameStarting {
            players: assignment.len(),
            roles: census.into_iter().collect(),
        });
        for player in self.registry.all().to_vec() {
            let role = self.registry.role_of(player)?;
            self.tell(player, Notice::RoleAssigned { role });
        }
        for gunner in gunners {
            self.grant_template(gunner, Template::Gunner)?;
        }

        info!(game_id = %self.id, players = assignment.len(), "game started");
        self.dispatch(GameEvent::GameStarted {
            players: self.registry.all().to_vec(),
        })?;
        self.advance(Advance::Start)
    }

    // -- Transitions -------------------------------------------------------

    /// Runs transitions until the game waits for players again.
    pub(crate) fn advance(&mut self, trigger: Advance) -> Result<(), GameError> {
        if self.in_transition {
            debug!(game_id = %self.id, ?trigger, "transition already in flight, ignored");
            return Ok(());
        }
        self.in_transition = true;
        let result = self.run_transitions(trigger);
        self.in_transition = false;
        result?;
        self.settle()
    }

    fn run_transitions(&mut self, mut trigger: Advance) -> Result<(), GameError> {
        loop {
            let next = match trigger {
                Advance::Start if self.config.start_with_day => {
                    self.enter_day(Vec::new())?;
                    None
                }
                Advance::Start => self.enter_night()?,
                Advance::EndNight => {
                    let report = self.end_night()?;
                    if self.win.is_some() {
                        self.announce_deaths(&report.deaths);
                        None
                    } else {
                        self.enter_day(report.deaths)?;
                        None
                    }
                }
                Advance::EndDay { lynched } => {
                    self.end_day(lynched)?;
                    if self.win.is_some() {
                        None
                    } else {
                        self.enter_night()?
                    }
                }
            };
            match next {
                Some(again) if self.win.is_none() => trigger = again,
                _ => return Ok(()),
            }
        }
    }

    /// Ends the game if a winner is known.
    pub(crate) fn settle(&mut self) -> Result<(), GameError> {
        if !self.phase.is_active() || self.in_transition {
            return Ok(());
        }
        self.evaluate_win()?;
        if self.win.is_some() {
            self.end_game()?;
        }
        Ok(())
    }

    fn set_phase(&mut self, to: Phase) -> Result<(), GameError> {
        if !self.phase.can_transition_to(to) {
            return Err(GameError::Invariant(format!(
                "illegal phase change {} -> {to}",
                self.phase
            )));
        }
        let from = self.phase;
        self.phase = to;
        self.phase_id += 1;
        self.timer_requests.push(TimerRequest::CancelAll);
        info!(game_id = %self.id, %from, phase = %to, phase_id = self.phase_id, "phase changed");
        Ok(())
    }

    fn schedule(&mut self, delay: Option<Duration>, kind: TimerKind) {
        if let Some(delay) = delay {
            self.timer_requests.push(TimerRequest::Schedule {
                delay,
                fire: TimerFire {
                    game: self.id,
                    phase_id: self.phase_id,
                    kind,
                },
            });
        }
    }

    /// Returns `Some(EndNight)` when nobody has anything to do tonight.
    fn enter_night(&mut self) -> Result<Option<Advance>, GameError> {
        self.set_phase(Phase::Night)?;
        self.night_count += 1;
        self.night.clear();
        let night = self.night_count;

        self.dispatch(GameEvent::TransitionNightBegin { night })?;
        if self.evaluate_win()?.is_some() {
            return Ok(None);
        }
        self.dispatch(GameEvent::BeginNight { night })?;

        let limit = self.config.night_limit();
        self.announce(Notice::NightBegins {
            night,
            seconds: limit.map(|d| d.as_secs()),
        });
        self.schedule(limit, TimerKind::NightLimit);
        self.schedule(self.config.night_warning(), TimerKind::NightWarning);

        if self.night_outstanding()?.is_done() {
            debug!(game_id = %self.id, night, "no night actions outstanding");
            return Ok(Some(Advance::EndNight));
        }
        Ok(None)
    }

    fn end_night(&mut self) -> Result<NightReport, GameError> {
        let night = self.night_count;
        self.dispatch(GameEvent::TransitionNightEnd { night })?;
        let report = night::resolve(self)?;
        self.night.clear();
        self.evaluate_win()?;
        Ok(report)
    }

    fn enter_day(&mut self, night_deaths: Vec<Death>) -> Result<(), GameError> {
        self.set_phase(Phase::Day)?;
        self.day_count += 1;
        self.votes.clear();
        let day = self.day_count;

        self.dispatch(GameEvent::TransitionDayBegin { day })?;
        let limit = self.config.day_limit();
        self.announce(Notice::Dawn {
            day,
            deaths: reports(&night_deaths),
            seconds: limit.map(|d| d.as_secs()),
        });
        self.dispatch(GameEvent::BeginDay { day })?;

        self.schedule(limit, TimerKind::DayLimit);
        self.schedule(self.config.day_warning(), TimerKind::DayWarning);
        Ok(())
    }

    fn end_day(&mut self, lynched: Option<PlayerId>) -> Result<(), GameError> {
        let day = self.day_count;
        self.dispatch(GameEvent::TransitionDayEnd { day })?;

        match lynched.filter(|p| self.registry.is_alive(*p)) {
            Some(target) => {
                let votes = self.votes.votes_for(target);
                let ev = self.dispatch(GameEvent::Lynch { target, votes })?;
                if ev.default_prevented() {
                    info!(game_id = %self.id, player_id = %target, "lynch prevented");
                } else {
                    let role = self.registry.role_of(target)?;
                    self.announce(Notice::Lynched {
                        player: target,
                        role,
                    });
                    let deaths = self.kill_players(vec![(target, DeathCause::Lynch)])?;
                    let chained: Vec<Death> = deaths.into_iter().filter(|d| d.player != target).collect();
                    self.announce_deaths(&chained);
                }
            }
            None => self.announce(Notice::NoLynch),
        }
        self.votes.clear();
        Ok(())
    }

    /// Sums outstanding night actors over every module.
    pub(crate) fn night_outstanding(&mut self) -> Result<Outstanding, GameError> {
        let ev = self.dispatch(GameEvent::ChkNightDone {
            outstanding: Outstanding::default(),
        })?;
        match ev.into_payload() {
            GameEvent::ChkNightDone { outstanding } => Ok(outstanding),
            _ => Err(GameError::Invariant(format!(
                "{} handler replaced the event payload",
                EventKind::ChkNightDone
            ))),
        }
    }

    /// Ends the night early once every actor has acted.
    pub(crate) fn chk_nightdone(&mut self) -> Result<(), GameError> {
        if self.phase != Phase::Night || self.in_transition {
            return Ok(());
        }
        if self.night_outstanding()?.is_done() {
            self.advance(Advance::EndNight)?;
        }
        Ok(())
    }

    /// After a death outside resolution: end the game, or maybe the night.
    fn after_death(&mut self) -> Result<(), GameError> {
        self.settle()?;
        self.chk_nightdone()
    }

    fn announce_deaths(&mut self, deaths: &[Death]) {
        if !deaths.is_empty() {
            self.announce(Notice::Deaths {
                deaths: reports(deaths),
            });
        }
    }

    // -- Timers ------------------------------------------------------------

    /// Applies a timer fire. Returns `false` for a stale fire, which changes
    /// nothing.
    pub fn on_timer(&mut self, fire: TimerFire) -> Result<bool, GameError> {
        if fire.game != self.id || fire.phase_id != self.phase_id || self.in_transition {
            debug!(
                game_id = %self.id,
                fire_game = %fire.game,
                fire_phase_id = fire.phase_id,
                phase_id = self.phase_id,
                kind = ?fire.kind,
                "stale timer ignored"
            );
            return Ok(false);
        }

        match (fire.kind, self.phase) {
            (TimerKind::NightLimit, Phase::Night) => {
                info!(game_id = %self.id, night = self.night_count, "night timed out");
                self.advance(Advance::EndNight)?;
            }
            (TimerKind::NightWarning, Phase::Night) => {
                let seconds_left = self
                    .config
                    .night_time_limit_secs
                    .saturating_sub(self.config.night_warning_secs);
                self.announce(Notice::NightWarning { seconds_left });
            }
            (TimerKind::DayLimit, Phase::Day) => {
                let lynched = if self.config.lynch_on_timeout {
                    self.votes.plurality()
                } else {
                    None
                };
                info!(game_id = %self.id, day = self.day_count, ?lynched, "day timed out");
                self.advance(Advance::EndDay { lynched })?;
            }
            (TimerKind::DayWarning, Phase::Day) => {
                let seconds_left = self
                    .config
                    .day_time_limit_secs
                    .saturating_sub(self.config.day_warning_secs);
                self.announce(Notice::DayWarning { seconds_left });
            }
            (kind, phase) => {
                debug!(game_id = %self.id, ?kind, %phase, "timer for another phase ignored");
                return Ok(false);
            }
        }
        Ok(true)
    }

    // -- Ending ------------------------------------------------------------

    fn end_game(&mut self) -> Result<(), GameError> {
        let Some(result) = self.win.clone() else {
            return Ok(());
        };
        if self.phase == Phase::Ended {
            return Ok(());
        }
        self.set_phase(Phase::Ended)?;

        let mut roles = Vec::with_capacity(self.registry.len());
        let mut winners = Vec::new();
        for player in self.registry.all().to_vec() {
            let role = self.registry.role_of(player)?;
            let individually_won = result.extra_winners.contains(&player);
            let won = self.team_won(&result, player, role) || individually_won;
            if won {
                winners.push(player);
            }
            roles.push((player, role));
            self.outcomes.push(OutcomeRecord {
                game: self.id,
                player,
                role,
                won,
                individually_won,
            });
        }

        info!(
            game_id = %self.id,
            winner = %result.winner,
            winners = winners.len(),
            nights = self.night_count,
            days = self.day_count,
            "game over"
        );
        self.announce(Notice::GameOver {
            winner: result.winner,
            message: result.message.clone(),
            roles,
            winners,
        });
        self.dispatch(GameEvent::GameEnded { result })?;
        Ok(())
    }

    fn team_won(&self, result: &WinResult, player: PlayerId, role: Role) -> bool {
        match result.winner.faction() {
            Some(faction) => role.faction() == faction,
            None if result.winner == Winner::Nobody => false,
            None => result.members.contains(&player),
        }
    }

    /// Stops the game without a winner. Used when the engine itself failed.
    pub fn abort(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.phase == Phase::Ended {
            return;
        }
        error!(game_id = %self.id, phase = %self.phase, %reason, "game aborted");
        self.phase = Phase::Ended;
        self.phase_id += 1;
        self.in_transition = false;
        self.death_queue.clear();
        self.timer_requests.push(TimerRequest::CancelAll);
        self.announce(Notice::GameAborted { reason });
    }
}

fn reports(deaths: &[Death]) -> Vec<DeathReport> {
    deaths.iter().map(Death::report).collect()
}
