//! Lobby, phase transitions, voting, and timers.

mod common;

use std::time::Duration;

use duskfall_game::{
    CommandCall, Game, GameConfig, GameError, Phase, TimerFire, TimerKind, TimerRequest,
};
use duskfall_protocol::{GameId, Notice, Role, Template};

use common::{act, alive, config, game_with, nick, pid, public_notices, say};

const WOLF: Role = Role::Wolf;
const VIL: Role = Role::Villager;

fn timed() -> GameConfig {
    GameConfig {
        night_time_limit_secs: 120,
        night_warning_secs: 90,
        day_time_limit_secs: 300,
        day_warning_secs: 240,
        ..config()
    }
}

fn fire(game: &Game, kind: TimerKind) -> TimerFire {
    TimerFire {
        game: game.id(),
        phase_id: game.phase_id(),
        kind,
    }
}

fn scheduled(game: &mut Game) -> Vec<(Duration, TimerKind)> {
    game.take_timer_requests()
        .into_iter()
        .filter_map(|r| match r {
            TimerRequest::Schedule { delay, fire } => Some((delay, fire.kind)),
            TimerRequest::CancelAll => None,
        })
        .collect()
}

// =========================================================================
// Lobby
// =========================================================================

#[test]
fn test_first_join_opens_the_lobby() {
    let mut game = Game::new(GameId(1), config());
    assert_eq!(game.phase(), Phase::None);
    game.join(pid(1), "p1").unwrap();
    assert_eq!(game.phase(), Phase::Join);
    assert!(matches!(
        game.join(pid(1), "p1"),
        Err(GameError::AlreadyJoined(_, _))
    ));
}

#[test]
fn test_join_respects_max_players() {
    let cfg = GameConfig {
        max_players: 3,
        ..config()
    };
    let mut game = Game::new(GameId(1), cfg);
    for id in 1..=3 {
        game.join(pid(id), nick(id)).unwrap();
    }
    assert!(matches!(game.join(pid(4), "p4"), Err(GameError::GameFull(_))));
}

#[test]
fn test_start_needs_enough_players() {
    let cfg = GameConfig {
        min_players: 4,
        ..config()
    };
    let mut game = Game::new(GameId(1), cfg);
    for id in 1..=3 {
        game.join(pid(id), nick(id)).unwrap();
    }
    assert!(game.start(pid(1)).is_err());
    assert!(matches!(game.start(pid(9)), Err(GameError::NotInGame(_, _))));
    assert_eq!(game.phase(), Phase::Join);
}

#[test]
fn test_start_deals_the_role_table() {
    let mut game = Game::new(GameId(1), config());
    for id in 1..=8 {
        game.join(pid(id), nick(id)).unwrap();
    }
    game.command(CommandCall::public(pid(1), "start", &[])).unwrap();
    assert_eq!(game.phase(), Phase::Night);

    let registry = game.registry();
    // Eight seats: two wolves, a seer, an angel, a jester, a shaman.
    assert_eq!(registry.players_with_role(WOLF).len(), 2);
    assert_eq!(registry.players_with_role(Role::Seer).len(), 1);
    assert_eq!(registry.players_with_role(Role::Shaman).len(), 1);
    assert_eq!(registry.players_with_role(VIL).len(), 2);

    let gunners: Vec<_> = registry
        .all()
        .iter()
        .filter(|p| registry.has_template(**p, Template::Gunner))
        .collect();
    assert_eq!(gunners.len(), 1);
    let gunner_role = registry.main_role(*gunners[0]).unwrap();
    assert_eq!(gunner_role.faction(), duskfall_protocol::Faction::Village);
}

#[test]
fn test_force_start_must_cover_every_player() {
    let mut game = Game::new(GameId(1), config());
    for id in 1..=3 {
        game.join(pid(id), nick(id)).unwrap();
    }
    let partial = [(pid(1), WOLF), (pid(2), VIL)].into_iter().collect();
    assert!(game.force_start(partial).is_err());
    let no_wolf = [(pid(1), VIL), (pid(2), VIL), (pid(3), VIL)].into_iter().collect();
    assert!(game.force_start(no_wolf).is_err());
    assert_eq!(game.phase(), Phase::Join);
}

#[test]
fn test_last_player_leaving_closes_the_lobby() {
    let mut game = Game::new(GameId(1), config());
    game.join(pid(1), "p1").unwrap();
    game.join(pid(2), "p2").unwrap();
    game.leave(pid(1)).unwrap();
    assert_eq!(game.phase(), Phase::Join);
    game.leave(pid(2)).unwrap();
    assert_eq!(game.phase(), Phase::Ended);
}

// =========================================================================
// Command gate
// =========================================================================

#[test]
fn test_gate_rejects_wrong_phase_role_and_channel() {
    let mut game = game_with(config(), &[WOLF, Role::Seer, VIL, VIL]);
    game.take_outbox();

    // Voting is for the day.
    assert!(say(&mut game, 3, "vote", &[1]).is_err());
    // Villagers have no kill.
    assert!(act(&mut game, 3, "kill", &[4]).is_err());
    // Visions are private.
    assert!(say(&mut game, 2, "see", &[1]).is_err());
    // Strangers are not in the game.
    assert!(matches!(
        act(&mut game, 9, "see", &[1]),
        Err(GameError::NotInGame(_, _))
    ));
    // Unknown targets never reach the module.
    assert!(game.command(CommandCall::private(pid(2), "see", &["nobody"])).is_err());

    let rejections = game
        .take_outbox()
        .into_iter()
        .filter(|(_, n)| matches!(n, Notice::Rejected { .. }))
        .count();
    assert_eq!(rejections, 5);
    assert!(game.night().records.is_empty());
}

#[test]
fn test_targets_resolve_by_unique_prefix() {
    let mut game = Game::new(GameId(1), config());
    for (id, name) in [(1, "alice"), (2, "bob"), (3, "carol"), (4, "carl")] {
        game.join(pid(id), name).unwrap();
    }
    let assignment = [(pid(1), Role::Seer), (pid(2), WOLF), (pid(3), VIL), (pid(4), VIL)]
        .into_iter()
        .collect();
    game.force_start(assignment).unwrap();

    assert!(game.command(CommandCall::private(pid(1), "see", &["car"])).is_err());
    game.command(CommandCall::private(pid(1), "see", &["BO"])).unwrap();
    assert_eq!(
        game.night().records.get(duskfall_game::ActionKind::See, pid(1)),
        Some(&[pid(2)][..])
    );
}

// =========================================================================
// Transitions and voting
// =========================================================================

#[test]
fn test_majority_vote_lynches_at_once() {
    let mut game = game_with(config(), &[WOLF, VIL, VIL, VIL, VIL]);
    act(&mut game, 1, "kill", &[5]).unwrap();
    assert_eq!(game.phase(), Phase::Day);
    assert_eq!(game.day_count(), 1);
    game.take_outbox();

    // Four alive: three votes needed.
    say(&mut game, 2, "vote", &[3]).unwrap();
    say(&mut game, 4, "vote", &[3]).unwrap();
    say(&mut game, 2, "unvote", &[]).unwrap();
    assert!(say(&mut game, 2, "unvote", &[]).is_err());
    say(&mut game, 2, "vote", &[3]).unwrap();
    assert_eq!(game.phase(), Phase::Day);
    say(&mut game, 1, "vote", &[3]).unwrap();

    assert!(!alive(&game, 3));
    assert_eq!(game.phase(), Phase::Night);
    assert_eq!(game.night_count(), 2);
    let notices = public_notices(&mut game);
    assert!(notices.contains(&Notice::Lynched {
        player: pid(3),
        role: VIL,
    }));
}

#[test]
fn test_dead_players_cannot_vote_or_be_voted() {
    let mut game = game_with(config(), &[WOLF, VIL, VIL, VIL, VIL]);
    act(&mut game, 1, "kill", &[5]).unwrap();
    assert!(say(&mut game, 5, "vote", &[1]).is_err());
    assert!(say(&mut game, 2, "vote", &[5]).is_err());
}

#[test]
fn test_start_with_day_skips_night_one() {
    let cfg = GameConfig {
        start_with_day: true,
        ..config()
    };
    let game = game_with(cfg, &[WOLF, VIL, VIL, VIL]);
    assert_eq!(game.phase(), Phase::Day);
    assert_eq!(game.night_count(), 0);
}

#[test]
fn test_quitting_counts_as_a_death() {
    let mut game = game_with(config(), &[WOLF, WOLF, VIL, VIL, VIL, VIL, VIL]);
    act(&mut game, 1, "kill", &[3]).unwrap();
    game.command(CommandCall::private(pid(2), "leave", &[])).unwrap();
    // The remaining wolf already voted, so the night is over.
    assert_eq!(game.phase(), Phase::Day);
    assert!(!alive(&game, 2));
    assert!(!alive(&game, 3));
    assert!(game.leave(pid(2)).is_err());
}

// =========================================================================
// Timers
// =========================================================================

#[test]
fn test_phases_schedule_their_timers() {
    let mut game = game_with(timed(), &[WOLF, VIL, VIL, VIL]);
    let night = scheduled(&mut game);
    assert!(night.contains(&(Duration::from_secs(120), TimerKind::NightLimit)));
    assert!(night.contains(&(Duration::from_secs(90), TimerKind::NightWarning)));

    act(&mut game, 1, "kill", &[4]).unwrap();
    let day = scheduled(&mut game);
    assert!(day.contains(&(Duration::from_secs(300), TimerKind::DayLimit)));
    assert!(day.contains(&(Duration::from_secs(240), TimerKind::DayWarning)));
}

#[test]
fn test_night_limit_forces_resolution() {
    let mut game = game_with(timed(), &[WOLF, Role::Seer, VIL, VIL, VIL]);
    act(&mut game, 1, "kill", &[3]).unwrap();
    assert_eq!(game.phase(), Phase::Night);

    assert!(game.on_timer(fire(&game, TimerKind::NightLimit)).unwrap());
    assert_eq!(game.phase(), Phase::Day);
    assert!(!alive(&game, 3));
}

#[test]
fn test_warning_announces_time_left() {
    let mut game = game_with(timed(), &[WOLF, VIL, VIL, VIL]);
    game.take_outbox();
    assert!(game.on_timer(fire(&game, TimerKind::NightWarning)).unwrap());
    assert_eq!(public_notices(&mut game), vec![Notice::NightWarning { seconds_left: 30 }]);
    assert_eq!(game.phase(), Phase::Night);
}

#[test]
fn test_stale_timer_is_a_no_op() {
    let mut game = game_with(timed(), &[WOLF, VIL, VIL, VIL, VIL]);
    let night_fire = fire(&game, TimerKind::NightLimit);
    act(&mut game, 1, "kill", &[4]).unwrap();
    assert_eq!(game.phase(), Phase::Day);
    let phase_id = game.phase_id();
    game.take_outbox();

    // Arrives after the night already ended.
    assert!(!game.on_timer(night_fire).unwrap());
    // Right phase id, wrong game.
    let foreign = TimerFire {
        game: GameId(99),
        ..fire(&game, TimerKind::DayLimit)
    };
    assert!(!game.on_timer(foreign).unwrap());

    assert_eq!(game.phase(), Phase::Day);
    assert_eq!(game.phase_id(), phase_id);
    assert_eq!(game.day_count(), 1);
    assert!(game.take_outbox().is_empty());
}

#[test]
fn test_day_timeout_lynches_nobody_by_default() {
    let mut game = game_with(timed(), &[WOLF, VIL, VIL, VIL, VIL]);
    act(&mut game, 1, "kill", &[5]).unwrap();
    say(&mut game, 2, "vote", &[1]).unwrap();
    game.take_outbox();

    assert!(game.on_timer(fire(&game, TimerKind::DayLimit)).unwrap());
    assert!(alive(&game, 1));
    assert!(public_notices(&mut game).contains(&Notice::NoLynch));
    assert_eq!(game.phase(), Phase::Night);
}

#[test]
fn test_day_timeout_lynches_plurality_when_enabled() {
    let cfg = GameConfig {
        lynch_on_timeout: true,
        ..timed()
    };
    let mut game = game_with(cfg, &[WOLF, VIL, VIL, VIL, VIL, VIL]);
    act(&mut game, 1, "kill", &[6]).unwrap();
    say(&mut game, 2, "vote", &[1]).unwrap();
    say(&mut game, 3, "vote", &[1]).unwrap();
    say(&mut game, 1, "vote", &[4]).unwrap();

    assert!(game.on_timer(fire(&game, TimerKind::DayLimit)).unwrap());
    assert!(!alive(&game, 1));
    assert_eq!(game.phase(), Phase::Ended);
}
