//! Game manager: creates, tracks, and routes players to games.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use duskfall_protocol::{GameId, PlayerId, Role};
use tracing::info;

use crate::actor::{GameHandle, GameInfo, spawn_game};
use crate::command::CommandCall;
use crate::outbox::{Messenger, StatsSink};
use crate::{Game, GameConfig, GameError, Phase};

/// Counter for generating unique game ids.
static NEXT_GAME_ID: AtomicU64 = AtomicU64::new(1);

/// Default command channel size for game actors.
pub const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Owns every running game and the player → game index.
///
/// A player is in at most one game at a time. Once a game ends its players
/// are released on the manager's next mutating call.
pub struct GameManager {
    games: HashMap<GameId, GameHandle>,
    player_games: HashMap<PlayerId, GameId>,
    messenger: Arc<dyn Messenger>,
    stats: Arc<dyn StatsSink>,
    default_config: GameConfig,
}

impl GameManager {
    pub fn new(messenger: Arc<dyn Messenger>, stats: Arc<dyn StatsSink>, default_config: GameConfig) -> Self {
        Self {
            games: HashMap::new(),
            player_games: HashMap::new(),
            messenger,
            stats,
            default_config,
        }
    }

    pub fn default_config(&self) -> &GameConfig {
        &self.default_config
    }

    /// Creates a game with the standard role modules and returns its id.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn create_game(&mut self, config: Option<GameConfig>) -> GameId {
        let game_id = GameId(NEXT_GAME_ID.fetch_add(1, Ordering::Relaxed));
        let config = config.unwrap_or_else(|| self.default_config.clone());
        self.spawn(Game::new(game_id, config))
    }

    /// Adopts a game built by the caller (custom modules, extra handlers).
    pub fn adopt_game(&mut self, game: Game) -> Result<GameId, GameError> {
        let game_id = game.id();
        if self.games.contains_key(&game_id) {
            return Err(GameError::InvalidState(format!("game {game_id} already exists")));
        }
        Ok(self.spawn(game))
    }

    fn spawn(&mut self, game: Game) -> GameId {
        let game_id = game.id();
        let handle = spawn_game(
            game,
            DEFAULT_CHANNEL_SIZE,
            Arc::clone(&self.messenger),
            Arc::clone(&self.stats),
        );
        self.games.insert(game_id, handle);
        info!(%game_id, "game created");
        game_id
    }

    fn handle(&self, game_id: GameId) -> Result<&GameHandle, GameError> {
        self.games.get(&game_id).ok_or(GameError::NotFound(game_id))
    }

    fn current_game(&self, player: PlayerId) -> Result<GameId, GameError> {
        self.player_games
            .get(&player)
            .copied()
            .ok_or_else(|| GameError::InvalidState(format!("player {player} is not in any game")))
    }

    /// Drops every ended game and the index entries pointing at it.
    pub async fn reap_ended(&mut self) {
        let ended: Vec<GameId> = self
            .games
            .iter()
            .filter(|(_, handle)| handle.is_ended())
            .map(|(game_id, _)| *game_id)
            .collect();
        for game_id in ended {
            if let Some(handle) = self.games.remove(&game_id) {
                let _ = handle.shutdown().await;
            }
            self.player_games.retain(|_, g| *g != game_id);
            info!(%game_id, "ended game released");
        }
    }

    /// Adds a player to a game. Enforces one game per player.
    pub async fn join_game(&mut self, player: PlayerId, nick: impl Into<String>, game_id: GameId) -> Result<(), GameError> {
        self.reap_ended().await;
        if let Some(current) = self.player_games.get(&player) {
            if *current == game_id {
                return Err(GameError::AlreadyJoined(player, game_id));
            }
            return Err(GameError::InvalidState(format!(
                "player {player} is already in game {current}"
            )));
        }
        self.handle(game_id)?.join(player, nick).await?;
        self.player_games.insert(player, game_id);
        Ok(())
    }

    /// Takes a player out of their current game.
    ///
    /// Leaving a game that has already ended only clears the index.
    pub async fn leave_game(&mut self, player: PlayerId) -> Result<(), GameError> {
        let game_id = self.current_game(player)?;
        if let Some(handle) = self.games.get(&game_id) {
            if let Err(err) = handle.leave(player).await {
                if handle.phase() != Phase::Ended {
                    return Err(err);
                }
            }
        }
        self.player_games.remove(&player);
        self.reap_ended().await;
        Ok(())
    }

    /// Routes a player command to the game the player is in.
    ///
    /// `join` goes through [`join_game`](Self::join_game) so the index stays
    /// in step.
    pub async fn route_command(&mut self, call: CommandCall, game_id: Option<GameId>) -> Result<(), GameError> {
        if call.name == "join" {
            let game_id = match game_id {
                Some(id) => id,
                None => return self.join_or_create(call.actor, nick_arg(&call)).await.map(|_| ()),
            };
            let nick = nick_arg(&call);
            return self.join_game(call.actor, nick, game_id).await;
        }

        self.reap_ended().await;
        let game_id = self.current_game(call.actor)?;
        let leaving = call.name == "leave";
        let actor = call.actor;
        self.handle(game_id)?.command(call).await?;
        if leaving {
            self.player_games.remove(&actor);
        }
        Ok(())
    }

    pub async fn force_start(&self, game_id: GameId, assignment: BTreeMap<PlayerId, Role>) -> Result<(), GameError> {
        self.handle(game_id)?.force_start(assignment).await
    }

    pub async fn get_game_info(&self, game_id: GameId) -> Result<GameInfo, GameError> {
        self.handle(game_id)?.get_info().await
    }

    /// Shuts a game down and forgets its players.
    pub async fn destroy_game(&mut self, game_id: GameId) -> Result<(), GameError> {
        let handle = self
            .games
            .remove(&game_id)
            .ok_or(GameError::NotFound(game_id))?;

        // The actor may already be gone.
        let _ = handle.shutdown().await;
        self.player_games.retain(|_, g| *g != game_id);

        info!(%game_id, "game destroyed");
        Ok(())
    }

    pub fn player_game(&self, player: PlayerId) -> Option<GameId> {
        self.player_games.get(&player).copied()
    }

    /// Info for every game still accepting players.
    ///
    /// Games that fail to answer (shutting down) are skipped.
    pub async fn list_games(&self) -> Vec<GameInfo> {
        let mut infos = Vec::with_capacity(self.games.len());
        for handle in self.games.values() {
            if let Ok(info) = handle.get_info().await {
                if info.phase.is_joinable() {
                    infos.push(info);
                }
            }
        }
        infos.sort_by_key(|i| i.game_id);
        infos
    }

    /// Joins the first open game with room, or creates one.
    pub async fn join_or_create(&mut self, player: PlayerId, nick: impl Into<String>) -> Result<GameId, GameError> {
        self.reap_ended().await;
        if let Some(existing) = self.player_games.get(&player) {
            return Err(GameError::InvalidState(format!(
                "player {player} is already in game {existing}"
            )));
        }
        let nick = nick.into();

        // A game can fill between get_info and join; keep looking then.
        for info in self.list_games().await {
            if info.player_count >= info.max_players {
                continue;
            }
            if let Some(handle) = self.games.get(&info.game_id) {
                if handle.join(player, nick.clone()).await.is_ok() {
                    self.player_games.insert(player, info.game_id);
                    return Ok(info.game_id);
                }
            }
        }

        let game_id = self.create_game(None);
        self.join_game(player, nick, game_id).await?;
        Ok(game_id)
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    pub fn game_ids(&self) -> Vec<GameId> {
        let mut ids: Vec<GameId> = self.games.keys().copied().collect();
        ids.sort();
        ids
    }
}

fn nick_arg(call: &CommandCall) -> String {
    call.args
        .first()
        .cloned()
        .unwrap_or_else(|| call.actor.to_string())
}
