// Integration tests for the grid under real thread contention
//
// Validates that:
// 1. No two agents ever end up sharing a cell, and every agent's cached
//    position matches the board
// 2. Agents moving in opposite directions through a tiny board never deadlock
// 3. Booster counters equal a full board census once everything has stopped

use concurrent_board::grid::{BoosterTargets, Grid, MoveOutcome};
use concurrent_board::player::{Player, PlayerTiming, StopSignal};
use concurrent_board::types::{AgentId, Booster, BoosterKind, Direction, Position};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

fn spawn_hammer(
    grid: Arc<Grid>,
    player: Arc<Player>,
    stop: StopSignal,
    completed: Arc<AtomicU64>,
    seed: u64,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut rng = StdRng::seed_from_u64(seed);
        while !stop.is_stopped() {
            let from = player.position().expect("hammering agent left the board");
            let dir = *Direction::all().choose(&mut rng).expect("four directions");
            let to = dir.apply(&from);
            if !grid.in_bounds(to) {
                continue;
            }
            if let MoveOutcome::Moved { .. } = grid.move_agent(from, to, &player) {
                completed.fetch_add(1, Ordering::Relaxed);
            }
        }
    })
}

/// Joins every handle, failing the test if any is still running after `timeout`
fn join_within(handles: Vec<JoinHandle<()>>, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while handles.iter().any(|h| !h.is_finished()) {
        assert!(Instant::now() < deadline, "agents did not stop in time: suspected deadlock");
        std::thread::sleep(Duration::from_millis(5));
    }
    for handle in handles {
        handle.join().expect("agent thread panicked");
    }
}

fn place_players(grid: &Grid, count: usize) -> Vec<Arc<Player>> {
    let mut rng = StdRng::seed_from_u64(99);
    (0..count)
        .map(|i| {
            let player = Arc::new(Player::new(
                AgentId(i as u32 + 1),
                format!("p{}", i + 1),
                3,
                PlayerTiming::instant(),
            ));
            grid.place_agent_at_random(&player, &mut rng);
            player
        })
        .collect()
}

fn assert_one_cell_per_agent(grid: &Grid, players: &[Arc<Player>]) {
    let occupants = grid.occupants();
    assert_eq!(occupants.len(), players.len(), "occupied cells != agents");

    let ids: HashSet<AgentId> = occupants.iter().map(|(_, id)| *id).collect();
    assert_eq!(ids.len(), players.len(), "an agent occupies two cells");

    for player in players {
        let pos = player.position().expect("player lost its position");
        assert_eq!(grid.occupant(pos), Some(player.id()), "{} cache is stale", player.name());
    }
}

/// Test: 8 agents on a 3x3 board (one free cell) for half a second
#[test]
fn test_mutual_exclusion_on_crowded_board() {
    let grid = Arc::new(Grid::new(3, 3, BoosterTargets::default()));
    let players = place_players(&grid, 8);
    let stop = StopSignal::new();
    let completed = Arc::new(AtomicU64::new(0));

    let handles = players
        .iter()
        .enumerate()
        .map(|(i, p)| spawn_hammer(grid.clone(), p.clone(), stop.clone(), completed.clone(), i as u64))
        .collect();

    std::thread::sleep(Duration::from_millis(500));
    stop.stop();
    join_within(handles, Duration::from_secs(5));

    assert_one_cell_per_agent(&grid, &players);
    assert!(completed.load(Ordering::Relaxed) > 0, "nobody ever moved");
}

/// Test: two agents swapping back and forth across a 1x3 corridor lock
/// the same pair of cells from opposite ends
#[test]
fn test_opposite_moves_do_not_deadlock() {
    let grid = Arc::new(Grid::new(1, 3, BoosterTargets::default()));
    let left = Arc::new(Player::new(AgentId(1), "left", 3, PlayerTiming::instant()));
    let right = Arc::new(Player::new(AgentId(2), "right", 3, PlayerTiming::instant()));
    assert!(grid.place_agent_at(Position::new(0, 0), &left));
    assert!(grid.place_agent_at(Position::new(0, 2), &right));

    let stop = StopSignal::new();
    let completed = Arc::new(AtomicU64::new(0));
    let handles = vec![
        spawn_hammer(grid.clone(), left.clone(), stop.clone(), completed.clone(), 1),
        spawn_hammer(grid.clone(), right.clone(), stop.clone(), completed.clone(), 2),
    ];

    std::thread::sleep(Duration::from_millis(300));
    stop.stop();
    join_within(handles, Duration::from_secs(5));

    assert!(completed.load(Ordering::Relaxed) > 0);
    assert_one_cell_per_agent(&grid, &[left, right]);
}

/// Test: placers and consumers racing; the census must match the counters
/// afterwards and no kind may exceed its target
#[test]
fn test_counters_match_census_after_contention() {
    let targets = BoosterTargets { coin: 4, heal: 2, poison: 2 };
    let grid = Arc::new(Grid::new(5, 5, targets));
    let players = place_players(&grid, 6);
    let stop = StopSignal::new();
    let completed = Arc::new(AtomicU64::new(0));

    let mut handles: Vec<JoinHandle<()>> = players
        .iter()
        .enumerate()
        .map(|(i, p)| spawn_hammer(grid.clone(), p.clone(), stop.clone(), completed.clone(), i as u64))
        .collect();

    for (i, booster) in [Booster::Coin(1), Booster::Heal, Booster::Poison, Booster::Coin(10)]
        .into_iter()
        .enumerate()
    {
        let grid = grid.clone();
        let stop = stop.clone();
        handles.push(std::thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(1000 + i as u64);
            while !stop.is_stopped() {
                grid.place_booster(booster, &mut rng);
            }
        }));
    }

    std::thread::sleep(Duration::from_millis(400));
    stop.stop();
    join_within(handles, Duration::from_secs(5));

    let census = grid.census();
    assert_eq!(census, grid.counters());
    for kind in BoosterKind::all() {
        assert!(census.get(kind) <= targets.get(kind), "{} over target", kind.as_str());
    }
    assert_one_cell_per_agent(&grid, &players);
}
