// Integration tests for player and robot run loops
//
// Covers the terminal transitions: a player killed by a trap leaves the board
// and reports its death, a stopped player clears its cell, heal/poison robots
// give up once their target is met, and coin robots keep going until stopped.

use concurrent_board::config::{Config, IntervalMs, RobotsConfig};
use concurrent_board::grid::{BoosterTargets, Grid};
use concurrent_board::planner::PathPlanner;
use concurrent_board::player::{Player, PlayerState, PlayerTiming, StepResult, StopSignal};
use concurrent_board::robot::{Robot, RobotState};
use concurrent_board::types::{AgentEvent, AgentId, Booster, BoosterKind, Position};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

fn one_step_timing() -> PlayerTiming {
    PlayerTiming {
        min_steps: 1,
        max_steps: 1,
        ..PlayerTiming::instant()
    }
}

fn fast_robots() -> RobotsConfig {
    let mut robots = Config::default_hardcoded().robots;
    for interval in [
        &mut robots.coin.interval,
        &mut robots.heal.interval,
        &mut robots.poison.interval,
    ] {
        *interval = IntervalMs::new(0, 1);
    }
    robots.failure_backoff_ms = 1;
    robots.exhaust_after_failures = 3;
    robots
}

fn planner() -> PathPlanner {
    PathPlanner::new(Config::default_hardcoded().planner)
}

/// Test: a player on its last life steps onto poison via take_step
#[test]
fn test_poison_on_last_life_kills_and_clears_cell() {
    let grid = Grid::new(1, 2, BoosterTargets { coin: 0, heal: 0, poison: 1 });
    let player = Player::new(AgentId(1), "Ana", 1, PlayerTiming::instant());
    assert!(grid.place_agent_at(Position::new(0, 0), &player));
    assert!(grid.place_booster_at(Position::new(0, 1), Booster::Poison));

    assert_eq!(player.take_step(&grid, Position::new(0, 1)), StepResult::Died);
    assert_eq!(player.state(), PlayerState::Dead);
    assert!(!player.is_alive());
    assert_eq!(player.position(), None);
    assert!(!grid.is_occupied(Position::new(0, 0)));
    assert!(!grid.is_occupied(Position::new(0, 1)));
    assert_eq!(grid.booster_count(BoosterKind::Poison), 0);
}

/// Test: the run loop of a one-step player whose only move is a trap
/// Expected: Dead terminal state and exactly one PlayerDied event
#[test]
fn test_run_loop_reports_death() {
    let grid = Grid::new(1, 2, BoosterTargets { coin: 0, heal: 0, poison: 1 });
    let player = Player::new(AgentId(7), "Gus", 1, one_step_timing());
    assert!(grid.place_agent_at(Position::new(0, 0), &player));
    assert!(grid.place_booster_at(Position::new(0, 1), Booster::Poison));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut rng = StdRng::seed_from_u64(1);
    let state = player.run(&grid, &planner(), &StopSignal::new(), Some(&tx), &mut rng);

    assert_eq!(state, PlayerState::Dead);
    assert_eq!(
        rx.try_recv().ok(),
        Some(AgentEvent::PlayerDied { id: AgentId(7), name: "Gus".to_string(), coins: 0 })
    );
    assert!(rx.try_recv().is_err());
    assert!(grid.occupants().is_empty());
}

/// Test: stopping a thinking player ends its thread promptly and clears its cell
#[test]
fn test_stopped_player_leaves_board() {
    let grid = Arc::new(Grid::new(3, 3, BoosterTargets::default()));
    let timing = PlayerTiming {
        think: IntervalMs::new(10_000, 10_000),
        ..PlayerTiming::instant()
    };
    let player = Arc::new(Player::new(AgentId(1), "Ana", 3, timing));
    assert!(grid.place_agent_at(Position::new(1, 1), &player));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = {
        let grid = grid.clone();
        let player = player.clone();
        std::thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(2);
            player.run(&grid, &planner(), &StopSignal::new(), Some(&tx), &mut rng)
        })
    };

    std::thread::sleep(Duration::from_millis(50));
    let stopped_at = Instant::now();
    player.stop();
    player.stop();
    let state = handle.join().expect("player thread panicked");

    assert!(stopped_at.elapsed() < Duration::from_secs(1));
    assert_eq!(state, PlayerState::Stopped);
    assert!(player.is_alive());
    assert!(!grid.is_occupied(Position::new(1, 1)));
    assert!(matches!(rx.try_recv(), Ok(AgentEvent::PlayerStopped { life: 3, .. })));

    // Stopping after the fact is harmless
    player.stop();
    assert_eq!(player.state(), PlayerState::Stopped);
}

/// Test: a session-wide stop reaches every player sharing it
#[test]
fn test_session_stop_reaches_all_players() {
    let grid = Arc::new(Grid::new(4, 4, BoosterTargets::default()));
    let session_stop = StopSignal::new();
    let mut rng = StdRng::seed_from_u64(3);

    let players: Vec<Arc<Player>> = (1..=3)
        .map(|id| {
            let timing = PlayerTiming { think: IntervalMs::new(5, 20), ..PlayerTiming::instant() };
            let player = Arc::new(Player::new(AgentId(id), format!("p{}", id), 3, timing));
            grid.place_agent_at_random(&player, &mut rng);
            player
        })
        .collect();

    let handles: Vec<_> = players
        .iter()
        .enumerate()
        .map(|(i, player)| {
            let grid = grid.clone();
            let player = player.clone();
            let stop = session_stop.clone();
            std::thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(10 + i as u64);
                player.run(&grid, &planner(), &stop, None, &mut rng)
            })
        })
        .collect();

    std::thread::sleep(Duration::from_millis(150));
    session_stop.stop();
    for handle in handles {
        assert_eq!(handle.join().expect("player thread panicked"), PlayerState::Stopped);
    }
    assert!(grid.occupants().is_empty());
}

/// Test: heal robot with target 1 on a board with room to spare
/// Expected: one placement, then Exhausted after repeated failures at target
#[test]
fn test_heal_robot_exhausts_at_target() {
    let grid = Grid::new(3, 3, BoosterTargets { coin: 0, heal: 1, poison: 0 });
    let robot = Robot::new(BoosterKind::Heal, 0, &fast_robots());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut rng = StdRng::seed_from_u64(4);

    let state = robot.run(&grid, &StopSignal::new(), Some(&tx), &mut rng);

    assert_eq!(state, RobotState::Exhausted);
    assert_eq!(robot.state(), RobotState::Exhausted);
    assert_eq!(robot.placed(), 1);
    assert_eq!(grid.census().heal, 1);
    assert_eq!(
        rx.try_recv().ok(),
        Some(AgentEvent::RobotExhausted { kind: BoosterKind::Heal, index: 0, placed: 1 })
    );
}

/// Test: coin robot at target keeps waiting for consumption until stopped
#[test]
fn test_coin_robot_runs_until_stopped() {
    let grid = Arc::new(Grid::new(3, 3, BoosterTargets { coin: 1, heal: 0, poison: 0 }));
    let robot = Arc::new(Robot::new(BoosterKind::Coin, 2, &fast_robots()));

    let handle = {
        let grid = grid.clone();
        let robot = robot.clone();
        std::thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(5);
            robot.run(&grid, &StopSignal::new(), None, &mut rng)
        })
    };

    std::thread::sleep(Duration::from_millis(150));
    assert!(!handle.is_finished(), "coin robot gave up at target");
    robot.stop();
    assert_eq!(handle.join().expect("robot thread panicked"), RobotState::Stopped);
    assert_eq!(robot.placed(), 1);
    assert_eq!(robot.label(), "robot-coin-2");
    assert_eq!(grid.counters().coin, 1);
}
