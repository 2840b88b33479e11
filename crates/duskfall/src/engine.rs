//! `Engine` builder and facade.
//!
//! The engine is what a chat bridge holds: one [`GameManager`] behind a
//! mutex, plus the collaborators every game shares.

use std::path::Path;
use std::sync::Arc;

use duskfall_game::{
    CommandCall, GameConfig, GameInfo, GameManager, Messenger, NullMessenger, NullStats, StatsSink,
};
use duskfall_protocol::{GameId, PlayerId};
use tokio::sync::Mutex;
use tracing::info;

use crate::DuskfallError;

/// Builder for an [`Engine`].
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use duskfall::prelude::*;
///
/// # fn build() -> Result<Engine, DuskfallError> {
/// let (messenger, _deliveries) = ChannelMessenger::new();
/// let engine = Engine::builder()
///     .config_file("duskfall.json")?
///     .messenger(Arc::new(messenger))
///     .build();
/// # Ok(engine)
/// # }
/// ```
pub struct EngineBuilder {
    config: GameConfig,
    messenger: Arc<dyn Messenger>,
    stats: Arc<dyn StatsSink>,
}

impl EngineBuilder {
    /// Creates a builder with the default config and no-op collaborators.
    pub fn new() -> Self {
        Self {
            config: GameConfig::default(),
            messenger: Arc::new(NullMessenger),
            stats: Arc::new(NullStats),
        }
    }

    /// Sets the config new games start from.
    pub fn config(mut self, config: GameConfig) -> Self {
        self.config = config.validated();
        self
    }

    /// Loads the default config from a JSON file.
    ///
    /// # Errors
    /// Returns `DuskfallError::Io` if the file cannot be read and
    /// `DuskfallError::Game` if it is not a valid config.
    pub fn config_file(mut self, path: impl AsRef<Path>) -> Result<Self, DuskfallError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        self.config = GameConfig::from_json_str(&json)?;
        info!(path = %path.display(), "loaded game config");
        Ok(self)
    }

    pub fn messenger(mut self, messenger: Arc<dyn Messenger>) -> Self {
        self.messenger = messenger;
        self
    }

    pub fn stats(mut self, stats: Arc<dyn StatsSink>) -> Self {
        self.stats = stats;
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            manager: Arc::new(Mutex::new(GameManager::new(
                self.messenger,
                self.stats,
                self.config,
            ))),
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared entry point for every game. Cheap to clone.
///
/// The mutex only serializes the manager's index. Each game runs in its own
/// actor, so a command for one game never waits on another game's work.
#[derive(Clone)]
pub struct Engine {
    manager: Arc<Mutex<GameManager>>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Creates an empty game, optionally with its own config.
    pub async fn create_game(&self, config: Option<GameConfig>) -> GameId {
        self.manager.lock().await.create_game(config.map(GameConfig::validated))
    }

    /// Joins the first open game, creating one if none has room.
    pub async fn join(&self, player: PlayerId, nick: &str) -> Result<GameId, DuskfallError> {
        Ok(self.manager.lock().await.join_or_create(player, nick).await?)
    }

    /// Joins a specific game.
    pub async fn join_game(&self, player: PlayerId, nick: &str, game_id: GameId) -> Result<(), DuskfallError> {
        Ok(self.manager.lock().await.join_game(player, nick, game_id).await?)
    }

    pub async fn leave(&self, player: PlayerId) -> Result<(), DuskfallError> {
        Ok(self.manager.lock().await.leave_game(player).await?)
    }

    /// Routes a player command. `game_id` only matters for `join`.
    pub async fn command(&self, call: CommandCall, game_id: Option<GameId>) -> Result<(), DuskfallError> {
        Ok(self.manager.lock().await.route_command(call, game_id).await?)
    }

    pub async fn game_info(&self, game_id: GameId) -> Result<GameInfo, DuskfallError> {
        Ok(self.manager.lock().await.get_game_info(game_id).await?)
    }

    /// Games still accepting players.
    pub async fn open_games(&self) -> Vec<GameInfo> {
        self.manager.lock().await.list_games().await
    }

    pub async fn player_game(&self, player: PlayerId) -> Option<GameId> {
        self.manager.lock().await.player_game(player)
    }

    pub async fn destroy_game(&self, game_id: GameId) -> Result<(), DuskfallError> {
        Ok(self.manager.lock().await.destroy_game(game_id).await?)
    }

    /// Shuts every game down.
    pub async fn shutdown(&self) {
        let mut manager = self.manager.lock().await;
        for game_id in manager.game_ids() {
            // Already gone is fine.
            let _ = manager.destroy_game(game_id).await;
        }
        info!("engine shut down");
    }
}
