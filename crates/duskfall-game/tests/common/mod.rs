//! Shared helpers for the game integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;

use duskfall_game::{CommandCall, Game, GameConfig, GameError, TotemChances};
use duskfall_protocol::{GameId, Notice, PlayerId, Recipient, Role};

pub fn pid(id: u64) -> PlayerId {
    PlayerId(id)
}

/// Nick of the player with id `id` in games built here.
pub fn nick(id: u64) -> String {
    format!("p{id}")
}

/// Untimed, seeded, small enough for three-player games.
pub fn config() -> GameConfig {
    GameConfig {
        min_players: 3,
        night_time_limit_secs: 0,
        day_time_limit_secs: 0,
        seed: Some(7),
        ..GameConfig::default()
    }
}

pub fn only_totem(totem: duskfall_protocol::Totem) -> TotemChances {
    use duskfall_protocol::Totem;
    let weight = |t: Totem| u32::from(t == totem);
    TotemChances {
        protection: weight(Totem::Protection),
        luck: weight(Totem::Luck),
        misdirection: weight(Totem::Misdirection),
        death: weight(Totem::Death),
    }
}

/// A started game where player `i + 1` holds `roles[i]`.
pub fn game_with(config: GameConfig, roles: &[Role]) -> Game {
    let mut game = Game::new(GameId(1), config);
    let mut assignment = BTreeMap::new();
    for (i, role) in roles.iter().enumerate() {
        let id = i as u64 + 1;
        game.join(pid(id), nick(id)).unwrap();
        assignment.insert(pid(id), *role);
    }
    game.force_start(assignment).unwrap();
    game
}

/// A night action sent privately, targets given by player id.
pub fn act(game: &mut Game, actor: u64, command: &str, targets: &[u64]) -> Result<(), GameError> {
    let nicks: Vec<String> = targets.iter().map(|t| nick(*t)).collect();
    let args: Vec<&str> = nicks.iter().map(String::as_str).collect();
    game.command(CommandCall::private(pid(actor), command, &args))
}

/// A day command typed in the channel.
pub fn say(game: &mut Game, actor: u64, command: &str, targets: &[u64]) -> Result<(), GameError> {
    let nicks: Vec<String> = targets.iter().map(|t| nick(*t)).collect();
    let args: Vec<&str> = nicks.iter().map(String::as_str).collect();
    game.command(CommandCall::public(pid(actor), command, &args))
}

pub fn alive(game: &Game, id: u64) -> bool {
    game.registry().is_alive(pid(id))
}

/// Notices sent to the channel since the last drain.
pub fn public_notices(game: &mut Game) -> Vec<Notice> {
    game.take_outbox()
        .into_iter()
        .filter(|(r, _)| *r == Recipient::Channel)
        .map(|(_, n)| n)
        .collect()
}

/// Notices sent privately to `id` since the last drain.
pub fn private_notices(game: &mut Game, id: u64) -> Vec<Notice> {
    game.take_outbox()
        .into_iter()
        .filter(|(r, _)| *r == Recipient::Player(pid(id)))
        .map(|(_, n)| n)
        .collect()
}
