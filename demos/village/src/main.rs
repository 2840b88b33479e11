//! Six bots play one scripted game of Duskfall.
//!
//! Every notice the engine sends is printed as the JSON a chat bridge would
//! receive. `RUST_LOG=debug` adds the engine's own logs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use duskfall::prelude::*;
use tokio::sync::mpsc;

const NICKS: [&str; 6] = ["ada", "bram", "cleo", "dov", "esme", "finn"];

// ---------------------------------------------------------------------------
// What the bots know
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Village {
    roles: BTreeMap<PlayerId, Role>,
    living: BTreeSet<PlayerId>,
    suspects: BTreeSet<PlayerId>,
    over: bool,
}

impl Village {
    fn observe(&mut self, delivery: &Delivery) {
        match (&delivery.recipient, &delivery.notice) {
            (Recipient::Player(player), Notice::RoleAssigned { role })
            | (Recipient::Player(player), Notice::Converted { role }) => {
                self.roles.insert(*player, *role);
            }
            (_, Notice::PlayerJoined { player, .. }) => {
                self.living.insert(*player);
            }
            (_, Notice::Dawn { deaths, .. }) | (_, Notice::Deaths { deaths }) => {
                for death in deaths {
                    self.living.remove(&death.player);
                }
            }
            (_, Notice::Lynched { player, .. }) => {
                self.living.remove(player);
            }
            (_, Notice::Vision { target, role }) if role.is_wolf() => {
                self.suspects.insert(*target);
            }
            (_, Notice::GameOver { .. }) | (_, Notice::GameAborted { .. }) => {
                self.over = true;
            }
            _ => {}
        }
    }

    fn is_wolf(&self, player: PlayerId) -> bool {
        self.roles.get(&player).is_some_and(|r| r.is_wolf())
    }

    fn first_living(&self, pred: impl Fn(PlayerId) -> bool) -> Option<PlayerId> {
        self.living.iter().copied().find(|p| pred(*p))
    }

    /// Wolves go for the lowest seat, the seer reads the highest, and
    /// protectors watch over the seer.
    fn night_actions(&self) -> Vec<CommandCall> {
        let seer = self.first_living(|p| self.roles.get(&p) == Some(&Role::Seer));
        let mut calls = Vec::new();
        for (&actor, &role) in &self.roles {
            if !self.living.contains(&actor) {
                continue;
            }
            let (command, target) = match role {
                Role::Wolf | Role::AlphaWolf => ("kill", self.first_living(|p| !self.is_wolf(p))),
                Role::Seer => (
                    "see",
                    self.living.iter().rev().copied().find(|p| *p != actor),
                ),
                Role::GuardianAngel | Role::Bodyguard => {
                    ("guard", seer.filter(|s| *s != actor))
                }
                _ => continue,
            };
            if let Some(target) = target {
                calls.push(CommandCall::private(actor, command, &[nick(target).as_str()]));
            }
        }
        calls
    }

    /// Everyone piles onto a known wolf, or the lowest seat otherwise.
    fn day_votes(&self) -> Vec<CommandCall> {
        let target = self
            .suspects
            .iter()
            .copied()
            .find(|p| self.living.contains(p))
            .or_else(|| self.first_living(|_| true));
        let Some(target) = target else {
            return Vec::new();
        };
        self.living
            .iter()
            .copied()
            .filter(|voter| *voter != target)
            .map(|voter| CommandCall::public(voter, "vote", &[nick(target).as_str()]))
            .collect()
    }
}

fn nick(player: PlayerId) -> String {
    NICKS
        .get((player.0 as usize).saturating_sub(1))
        .map_or_else(|| player.to_string(), |n| (*n).to_string())
}

// ---------------------------------------------------------------------------
// Printing
// ---------------------------------------------------------------------------

fn print_delivery(codec: &JsonCodec, delivery: &Delivery) -> Result<(), DuskfallError> {
    let bytes = codec.encode(&delivery.notice)?;
    let to = match delivery.recipient {
        Recipient::Channel => "#village".to_string(),
        Recipient::Player(player) => nick(player),
    };
    println!("[{to}] {}", String::from_utf8_lossy(&bytes));
    Ok(())
}

fn drain(
    rx: &mut mpsc::UnboundedReceiver<Delivery>,
    codec: &JsonCodec,
    village: &mut Village,
) -> Result<(), DuskfallError> {
    while let Ok(delivery) = rx.try_recv() {
        print_delivery(codec, &delivery)?;
        village.observe(&delivery);
    }
    Ok(())
}

/// Sends each call, reporting rejections instead of stopping.
async fn send_all(engine: &Engine, calls: Vec<CommandCall>) -> Result<(), DuskfallError> {
    for call in calls {
        let actor = call.actor;
        match engine.command(call, None).await {
            Ok(()) => {}
            Err(err) if err.is_rejection() => {
                tracing::warn!(player_id = %actor, error = %err, "bot command rejected");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), DuskfallError> {
    duskfall::logging::init_with("warn");

    let config = GameConfig {
        min_players: 4,
        night_time_limit_secs: 3,
        day_time_limit_secs: 5,
        lynch_on_timeout: true,
        seed: Some(2026),
        ..GameConfig::default()
    };
    let (messenger, mut rx) = ChannelMessenger::new();
    let stats = Arc::new(MemoryStats::new());
    let engine = Engine::builder()
        .config(config)
        .messenger(Arc::new(messenger))
        .stats(stats.clone())
        .build();

    let codec = JsonCodec;
    let mut village = Village::default();

    let mut game_id = None;
    for (i, name) in NICKS.iter().enumerate() {
        game_id = Some(engine.join(PlayerId(i as u64 + 1), name).await?);
    }
    let Some(game_id) = game_id else {
        return Ok(());
    };
    engine
        .command(CommandCall::public(PlayerId(1), "start", &[]), None)
        .await?;

    let mut acted_night = 0;
    let mut voted_day = 0;
    loop {
        drain(&mut rx, &codec, &mut village)?;
        // The engine releases an ended game on its next command.
        if village.over {
            break;
        }
        let info = engine.game_info(game_id).await?;
        match info.phase {
            Phase::Night if info.night > acted_night => {
                acted_night = info.night;
                send_all(&engine, village.night_actions()).await?;
            }
            Phase::Day if info.day > voted_day => {
                voted_day = info.day;
                send_all(&engine, village.day_votes()).await?;
            }
            Phase::Ended => {
                drain(&mut rx, &codec, &mut village)?;
                break;
            }
            _ => {}
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    for outcome in stats.outcomes() {
        println!(
            "{:>5} {:<14} {}",
            nick(outcome.player),
            outcome.role.name(),
            if outcome.won { "won" } else { "lost" }
        );
    }
    engine.shutdown().await;
    Ok(())
}
