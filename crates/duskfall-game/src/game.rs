//! The per-game world.
//!
//! A [`Game`] owns everything one instance needs: the registry, the night's
//! records, the event bus and the role modules subscribed to it, and the
//! side effects produced while handling a command (notices, timer requests,
//! outcome records). It is plain synchronous state. The actor in
//! [`crate::actor`] owns it and serializes every call.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use duskfall_bus::{
    BusHost, DEFAULT_PRIORITY, Event, EventBus, HandlerFailure, SubscriptionId, dispatch,
};
use duskfall_protocol::{DeathCause, GameId, Notice, PlayerId, Recipient, Role};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::command::{CommandSpec, Route};
use crate::event::{EventKind, GameEvent};
use crate::night::NightState;
use crate::outbox::OutcomeRecord;
use crate::phase::TimerRequest;
use crate::registry::{Death, Registry};
use crate::roles::{self, PhaseChange, RoleModule};
use crate::state::RoleStates;
use crate::vote::DayVotes;
use crate::win::WinResult;
use crate::{GameConfig, GameError, Phase};

pub struct Game {
    pub(crate) id: GameId,
    pub(crate) config: GameConfig,
    pub(crate) phase: Phase,
    /// Bumped on every phase change. Timer fires carry it.
    pub(crate) phase_id: u64,
    pub(crate) night_count: u32,
    pub(crate) day_count: u32,
    pub(crate) registry: Registry,
    pub(crate) night: NightState,
    pub(crate) votes: DayVotes,
    pub(crate) states: RoleStates,
    pub(crate) bus: EventBus<Game>,
    pub(crate) modules: Vec<Arc<dyn RoleModule>>,
    pub(crate) commands: BTreeMap<&'static str, (CommandSpec, Route)>,
    pub(crate) rng: StdRng,
    pub(crate) join_opened_at: Option<Instant>,
    pub(crate) death_queue: VecDeque<(PlayerId, DeathCause)>,
    pub(crate) draining: bool,
    pub(crate) in_transition: bool,
    pub(crate) win: Option<WinResult>,
    /// Players who won on their own terms so far (lynched jesters).
    pub(crate) individual_winners: BTreeSet<PlayerId>,
    pub(crate) fatal: Option<String>,
    pub(crate) outbox: Vec<(Recipient, Notice)>,
    pub(crate) timer_requests: Vec<TimerRequest>,
    pub(crate) outcomes: Vec<OutcomeRecord>,
}

impl Game {
    /// Creates a game with the standard role modules.
    pub fn new(id: GameId, config: GameConfig) -> Self {
        Self::with_modules(id, config, roles::standard_modules())
    }

    /// Creates a game with a custom set of role modules.
    pub fn with_modules(id: GameId, config: GameConfig, modules: Vec<Arc<dyn RoleModule>>) -> Self {
        let config = config.validated();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut game = Self {
            id,
            config,
            phase: Phase::None,
            phase_id: 0,
            night_count: 0,
            day_count: 0,
            registry: Registry::new(),
            night: NightState::default(),
            votes: DayVotes::default(),
            states: RoleStates::new(),
            bus: EventBus::new(),
            modules: Vec::new(),
            commands: BTreeMap::new(),
            rng,
            join_opened_at: None,
            death_queue: VecDeque::new(),
            draining: false,
            in_transition: false,
            win: None,
            individual_winners: BTreeSet::new(),
            fatal: None,
            outbox: Vec::new(),
            timer_requests: Vec::new(),
            outcomes: Vec::new(),
        };
        game.install_core();
        for module in modules {
            game.install_module(module);
        }
        game
    }

    fn install_core(&mut self) {
        for (spec, route) in crate::command::core_commands() {
            self.commands.insert(spec.name, (spec, route));
        }
        // Votes by and for the dead are void.
        self.bus.subscribe(EventKind::DelPlayer, 0, |game: &mut Game, ev| {
            if let GameEvent::DelPlayer { death } = ev.payload() {
                game.votes.forget(death.player);
            }
            Ok(())
        });
    }

    fn install_module(&mut self, module: Arc<dyn RoleModule>) {
        let index = self.modules.len();
        for spec in module.commands() {
            if self
                .commands
                .insert(spec.name, (*spec, Route::Module(index)))
                .is_some()
            {
                warn!(command = spec.name, module = module.name(), "command registered twice");
            }
        }

        let on_death = Arc::clone(&module);
        self.bus
            .subscribe(EventKind::DelPlayer, DEFAULT_PRIORITY, move |game: &mut Game, ev| {
                match ev.payload() {
                    GameEvent::DelPlayer { death } => on_death.on_death(game, death),
                    _ => Ok(()),
                }
            });

        for kind in [
            EventKind::BeginNight,
            EventKind::TransitionNightEnd,
            EventKind::BeginDay,
            EventKind::TransitionDayEnd,
        ] {
            let on_phase = Arc::clone(&module);
            self.bus
                .subscribe(kind, DEFAULT_PRIORITY, move |game: &mut Game, ev| {
                    let change = match ev.payload() {
                        GameEvent::BeginNight { night } => PhaseChange::NightBegan(*night),
                        GameEvent::TransitionNightEnd { night } => PhaseChange::NightEnding(*night),
                        GameEvent::BeginDay { day } => PhaseChange::DayBegan(*day),
                        GameEvent::TransitionDayEnd { day } => PhaseChange::DayEnding(*day),
                        _ => return Ok(()),
                    };
                    on_phase.on_phase_change(game, change)
                });
        }

        Arc::clone(&module).install(&mut self.bus);
        debug!(game_id = %self.id, module = module.name(), "role module installed");
        self.modules.push(module);
    }

    // -- Accessors ---------------------------------------------------------

    pub fn id(&self) -> GameId {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn phase_id(&self) -> u64 {
        self.phase_id
    }

    pub fn night_count(&self) -> u32 {
        self.night_count
    }

    pub fn day_count(&self) -> u32 {
        self.day_count
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn night(&self) -> &NightState {
        &self.night
    }

    pub fn night_mut(&mut self) -> &mut NightState {
        &mut self.night
    }

    pub fn states(&self) -> &RoleStates {
        &self.states
    }

    pub fn states_mut(&mut self) -> &mut RoleStates {
        &mut self.states
    }

    /// The game's random source. Seeded from the config when one is set.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    // -- Bus ---------------------------------------------------------------

    /// Dispatches an event on this game's bus.
    pub fn dispatch(&mut self, event: GameEvent) -> Result<Event<GameEvent>, GameError> {
        Ok(dispatch(self, event)?)
    }

    /// Subscribes an extra handler. Lower priority runs earlier.
    pub fn on<F>(&mut self, kind: EventKind, priority: i32, handler: F) -> SubscriptionId
    where
        F: Fn(&mut Game, &mut Event<GameEvent>) -> Result<(), GameError> + Send + Sync + 'static,
    {
        self.bus.subscribe(kind, priority, handler)
    }

    pub fn off(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    // -- Messages ----------------------------------------------------------

    /// Queues a private notice.
    pub fn tell(&mut self, player: PlayerId, notice: Notice) {
        self.outbox.push((Recipient::Player(player), notice));
    }

    /// Queues a notice for the whole channel.
    pub fn announce(&mut self, notice: Notice) {
        self.outbox.push((Recipient::Channel, notice));
    }

    pub fn take_outbox(&mut self) -> Vec<(Recipient, Notice)> {
        std::mem::take(&mut self.outbox)
    }

    pub fn take_timer_requests(&mut self) -> Vec<TimerRequest> {
        std::mem::take(&mut self.timer_requests)
    }

    pub fn take_outcomes(&mut self) -> Vec<OutcomeRecord> {
        std::mem::take(&mut self.outcomes)
    }

    /// The first fatal handler failure since the last call, if any.
    pub fn take_fatal(&mut self) -> Option<String> {
        self.fatal.take()
    }

    // -- Deaths ------------------------------------------------------------

    /// Queues a death to be applied by the current drain.
    ///
    /// Handlers use this for chained deaths (grief, sacrifice) so removals
    /// never nest inside one another.
    pub fn queue_death(&mut self, player: PlayerId, cause: DeathCause) {
        self.death_queue.push_back((player, cause));
    }

    /// Removes one living player, then evaluates the win condition.
    ///
    /// Returns every death applied, chained deaths included. Removing a dead
    /// player is rejected with [`GameError::AlreadyDead`]. Called from a
    /// handler while a drain is running, the removal is only queued.
    pub fn remove_player(&mut self, player: PlayerId, cause: DeathCause) -> Result<Vec<Death>, GameError> {
        if !self.registry.is_alive(player) {
            return Err(if self.registry.contains(player) {
                GameError::AlreadyDead(player)
            } else {
                GameError::NotInGame(player, self.id)
            });
        }
        self.kill_players(vec![(player, cause)])
    }

    /// Removes several players in the given order. Players already dead are
    /// skipped.
    pub fn kill_players(&mut self, victims: Vec<(PlayerId, DeathCause)>) -> Result<Vec<Death>, GameError> {
        for (player, cause) in victims {
            self.queue_death(player, cause);
        }
        if self.draining {
            return Ok(Vec::new());
        }
        let deaths = self.drain_deaths()?;
        self.evaluate_win()?;
        Ok(deaths)
    }

    /// Applies queued deaths until the queue is empty.
    pub(crate) fn drain_deaths(&mut self) -> Result<Vec<Death>, GameError> {
        if self.draining {
            return Ok(Vec::new());
        }
        self.draining = true;
        let result = self.drain_queue();
        self.draining = false;
        if result.is_err() {
            self.death_queue.clear();
        }
        result
    }

    fn drain_queue(&mut self) -> Result<Vec<Death>, GameError> {
        let mut deaths = Vec::new();
        while let Some((player, cause)) = self.death_queue.pop_front() {
            if !self.registry.is_alive(player) {
                debug!(game_id = %self.id, player_id = %player, ?cause, "already dead, skipped");
                continue;
            }
            let death = self.registry.remove(player, cause, self.phase)?;
            info!(
                game_id = %self.id,
                player_id = %player,
                role = %death.role,
                ?cause,
                "player died"
            );
            self.dispatch(GameEvent::DelPlayer {
                death: death.clone(),
            })?;
            deaths.push(death);
        }
        Ok(deaths)
    }

    /// Changes a living player's primary role and re-evaluates the win.
    pub fn change_role(&mut self, player: PlayerId, role: Role) -> Result<(), GameError> {
        let from = self
            .registry
            .assign_role(player, role)?
            .ok_or_else(|| GameError::Invariant(format!("{player} changed role before having one")))?;
        info!(game_id = %self.id, player_id = %player, %from, to = %role, "role changed");
        self.dispatch(GameEvent::RoleChanged {
            player,
            from,
            to: role,
        })?;
        self.evaluate_win()?;
        Ok(())
    }

    /// Nickname for notices and logs, falling back to the id.
    pub fn nick(&self, player: PlayerId) -> String {
        self.registry
            .nick(player)
            .map_or_else(|| player.to_string(), str::to_owned)
    }
}

impl BusHost for Game {
    type Payload = GameEvent;
    type Error = GameError;

    fn bus(&self) -> &EventBus<Self> {
        &self.bus
    }

    fn bus_mut(&mut self) -> &mut EventBus<Self> {
        &mut self.bus
    }

    fn handler_failed(&mut self, kind: EventKind, failure: &HandlerFailure<GameError>) {
        if let HandlerFailure::Error(err) = failure {
            if err.is_fatal() && self.fatal.is_none() {
                self.fatal = Some(format!("{kind} handler failed: {err}"));
            }
        }
    }
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("phase_id", &self.phase_id)
            .field("players", &self.registry.len())
            .field("win", &self.win)
            .finish_non_exhaustive()
    }
}
