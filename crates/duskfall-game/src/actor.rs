//! Game actor: an isolated Tokio task that owns one [`Game`].
//!
//! All mutation of a game goes through its actor's command channel, one
//! command at a time. Phase timers deliver into a second channel that the
//! same loop reads, so a timer fire is just another serialized step.
//! After every step the actor flushes the game's buffered side effects:
//! timer requests to the [`TimerService`], notices to the [`Messenger`],
//! and outcome records to the [`StatsSink`]. The handle sees the phase
//! the last step left the game in, so an ended game can be released
//! without a round trip.

use std::collections::BTreeMap;
use std::sync::Arc;

use duskfall_protocol::{GameId, PlayerId, Role, Winner};
use duskfall_timer::TimerService;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{error, info};

use crate::command::CommandCall;
use crate::outbox::{Messenger, StatsSink};
use crate::phase::{TimerFire, TimerRequest};
use crate::{Game, GameError, Phase};

/// Commands sent to a game actor through its channel.
pub(crate) enum GameCommand {
    Join {
        player: PlayerId,
        nick: String,
        reply: oneshot::Sender<Result<(), GameError>>,
    },
    Leave {
        player: PlayerId,
        reply: oneshot::Sender<Result<(), GameError>>,
    },
    Command {
        call: CommandCall,
        reply: oneshot::Sender<Result<(), GameError>>,
    },
    ForceStart {
        assignment: BTreeMap<PlayerId, Role>,
        reply: oneshot::Sender<Result<(), GameError>>,
    },
    GetInfo {
        reply: oneshot::Sender<GameInfo>,
    },
    Shutdown,
}

/// A snapshot of game metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInfo {
    pub game_id: GameId,
    pub phase: Phase,
    pub player_count: usize,
    pub living: usize,
    pub max_players: usize,
    pub night: u32,
    pub day: u32,
    pub winner: Option<Winner>,
}

/// Handle to a running game actor. Cheap to clone.
#[derive(Debug, Clone)]
pub struct GameHandle {
    game_id: GameId,
    sender: mpsc::Sender<GameCommand>,
    phase: watch::Receiver<Phase>,
}

impl std::fmt::Debug for GameCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Join { .. } => "Join",
            Self::Leave { .. } => "Leave",
            Self::Command { .. } => "Command",
            Self::ForceStart { .. } => "ForceStart",
            Self::GetInfo { .. } => "GetInfo",
            Self::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

impl GameHandle {
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// The phase as of the actor's last completed step.
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn is_ended(&self) -> bool {
        self.phase() == Phase::Ended
    }

    /// Sends a request and waits for the actor's answer.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> GameCommand,
    ) -> Result<T, GameError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(build(reply_tx))
            .await
            .map_err(|_| GameError::Unavailable(self.game_id))?;
        reply_rx
            .await
            .map_err(|_| GameError::Unavailable(self.game_id))
    }

    pub async fn join(&self, player: PlayerId, nick: impl Into<String>) -> Result<(), GameError> {
        let nick = nick.into();
        self.request(|reply| GameCommand::Join { player, nick, reply })
            .await?
    }

    pub async fn leave(&self, player: PlayerId) -> Result<(), GameError> {
        self.request(|reply| GameCommand::Leave { player, reply })
            .await?
    }

    /// Runs a player command. A rejection has already been told to the
    /// player when this returns `Err`.
    pub async fn command(&self, call: CommandCall) -> Result<(), GameError> {
        self.request(|reply| GameCommand::Command { call, reply })
            .await?
    }

    pub async fn force_start(&self, assignment: BTreeMap<PlayerId, Role>) -> Result<(), GameError> {
        self.request(|reply| GameCommand::ForceStart { assignment, reply })
            .await?
    }

    pub async fn get_info(&self) -> Result<GameInfo, GameError> {
        self.request(|reply| GameCommand::GetInfo { reply }).await
    }

    /// Tells the actor to stop. Pending timers are cancelled.
    pub async fn shutdown(&self) -> Result<(), GameError> {
        self.sender
            .send(GameCommand::Shutdown)
            .await
            .map_err(|_| GameError::Unavailable(self.game_id))
    }
}

struct GameActor {
    game: Game,
    receiver: mpsc::Receiver<GameCommand>,
    timers: TimerService<TimerFire>,
    timer_rx: mpsc::UnboundedReceiver<TimerFire>,
    messenger: Arc<dyn Messenger>,
    stats: Arc<dyn StatsSink>,
    phase: watch::Sender<Phase>,
}

impl GameActor {
    async fn run(mut self) {
        let game_id = self.game.id();
        info!(%game_id, "game actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle(cmd) {
                        info!(%game_id, "game shutting down");
                        break;
                    }
                }
                Some(fire) = self.timer_rx.recv() => {
                    let result = self.game.on_timer(fire).map(|_| ());
                    self.after_step(&result);
                }
            }
        }

        self.timers.cancel_all();
        info!(%game_id, "game actor stopped");
    }

    /// Returns `false` when the actor should stop.
    fn handle(&mut self, cmd: GameCommand) -> bool {
        match cmd {
            GameCommand::Join {
                player,
                nick,
                reply,
            } => {
                let result = self.game.join(player, nick);
                self.after_step(&result);
                let _ = reply.send(result);
            }
            GameCommand::Leave { player, reply } => {
                let result = self.game.leave(player);
                self.after_step(&result);
                let _ = reply.send(result);
            }
            GameCommand::Command { call, reply } => {
                let result = self.game.command(call);
                self.after_step(&result);
                let _ = reply.send(result);
            }
            GameCommand::ForceStart { assignment, reply } => {
                let result = self.game.force_start(assignment);
                self.after_step(&result);
                let _ = reply.send(result);
            }
            GameCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            GameCommand::Shutdown => return false,
        }
        true
    }

    /// Aborts the game on a fatal failure, then flushes side effects.
    fn after_step(&mut self, result: &Result<(), GameError>) {
        let fatal = self.game.take_fatal().or_else(|| match result {
            Err(err) if err.is_fatal() => Some(err.to_string()),
            _ => None,
        });
        if let Some(reason) = fatal {
            error!(game_id = %self.game.id(), %reason, "fatal game error");
            self.game.abort(reason);
        }
        self.flush();
    }

    fn flush(&mut self) {
        let game_id = self.game.id();
        for request in self.game.take_timer_requests() {
            match request {
                TimerRequest::Schedule { delay, fire } => {
                    self.timers.schedule(delay, fire);
                }
                TimerRequest::CancelAll => {
                    self.timers.cancel_all();
                }
            }
        }
        for (recipient, notice) in self.game.take_outbox() {
            self.messenger.deliver(game_id, recipient, &notice);
        }
        for outcome in self.game.take_outcomes() {
            self.stats.record_outcome(&outcome);
        }
        let phase = self.game.phase();
        self.phase.send_if_modified(|current| {
            let changed = *current != phase;
            *current = phase;
            changed
        });
    }

    fn info(&self) -> GameInfo {
        GameInfo {
            game_id: self.game.id(),
            phase: self.game.phase(),
            player_count: self.game.registry().len(),
            living: self.game.registry().counts().living,
            max_players: self.game.config().max_players,
            night: self.game.night_count(),
            day: self.game.day_count(),
            winner: self.game.winner().map(|w| w.winner),
        }
    }
}

/// Spawns a game actor and returns a handle to it.
///
/// `channel_size` bounds the command channel. Senders wait when it is full.
pub fn spawn_game(
    game: Game,
    channel_size: usize,
    messenger: Arc<dyn Messenger>,
    stats: Arc<dyn StatsSink>,
) -> GameHandle {
    let game_id = game.id();
    let (tx, rx) = mpsc::channel(channel_size);
    let (timers, timer_rx) = TimerService::channel();
    let (phase_tx, phase_rx) = watch::channel(game.phase());

    let actor = GameActor {
        game,
        receiver: rx,
        timers,
        timer_rx,
        messenger,
        stats,
        phase: phase_tx,
    };
    tokio::spawn(actor.run());

    GameHandle {
        game_id,
        sender: tx,
        phase: phase_rx,
    }
}
