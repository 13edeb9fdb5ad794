//! Deadlock and Mutual Exclusion Stress Tool
//!
//! Packs a board with agents that hammer `Grid::move_agent` with random
//! single-step moves, with no thinking time, then checks the board.
//!
//! Usage:
//!   cargo run --release --bin stress -- [rows] [cols] [agents] [millis]
//!
//! Output:
//!   - Completed and blocked move totals per agent and overall
//!   - Exit code 1 if any agent fails to stop within the join timeout
//!     (suspected deadlock), no move ever completed, or two agents share a
//!     cell / an agent's cached position disagrees with the board

use log::{error, info};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use concurrent_board::grid::{BoosterTargets, Grid, MoveOutcome};
use concurrent_board::player::{Player, PlayerTiming, StopSignal};
use concurrent_board::types::{AgentId, Direction};

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Tally {
    completed: AtomicU64,
    blocked: AtomicU64,
}

fn parse_arg<T: std::str::FromStr>(args: &[String], index: usize, default: T, name: &str) -> T {
    match args.get(index) {
        Some(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                eprintln!("Invalid {} value: {}", name, raw);
                std::process::exit(1);
            }
        },
        None => default,
    }
}

fn hammer(grid: &Grid, player: &Player, stop: &StopSignal, tally: &Tally, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let directions = Direction::all();

    while !stop.is_stopped() {
        let Some(from) = player.position() else {
            break;
        };
        let Some(dir) = directions.choose(&mut rng) else {
            break;
        };
        let to = dir.apply(&from);
        if !grid.in_bounds(to) {
            continue;
        }
        match grid.move_agent(from, to, player) {
            MoveOutcome::Moved { .. } => tally.completed.fetch_add(1, Ordering::Relaxed),
            MoveOutcome::Blocked => tally.blocked.fetch_add(1, Ordering::Relaxed),
        };
        if rng.random_bool(0.01) {
            std::thread::yield_now();
        }
    }
}

/// Polls until every handle is finished or the timeout passes; returns the stragglers
fn join_with_timeout(handles: Vec<(String, JoinHandle<()>)>, timeout: Duration) -> Vec<String> {
    let deadline = Instant::now() + timeout;
    let mut pending = handles;
    loop {
        let (finished, running): (Vec<_>, Vec<_>) =
            pending.into_iter().partition(|(_, h)| h.is_finished());
        for (label, handle) in finished {
            if handle.join().is_err() {
                error!("{} panicked", label);
            }
        }
        pending = running;
        if pending.is_empty() || Instant::now() >= deadline {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    pending.into_iter().map(|(label, _)| label).collect()
}

fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let rows: i32 = parse_arg(&args, 1, 4, "rows");
    let cols: i32 = parse_arg(&args, 2, 4, "cols");
    let agents: usize = parse_arg(&args, 3, 12, "agents");
    let millis: u64 = parse_arg(&args, 4, 2000, "millis");

    if rows <= 0 || cols <= 0 || agents == 0 || agents > (rows * cols) as usize {
        eprintln!("Usage: {} [rows] [cols] [agents] [millis]", args[0]);
        eprintln!("Need a positive board with room for every agent (1 <= agents <= rows*cols)");
        std::process::exit(1);
    }

    println!("============================================================");
    println!("Stress: {} agents on {}x{} for {}ms", agents, rows, cols, millis);
    println!("============================================================");

    let grid = Arc::new(Grid::new(rows, cols, BoosterTargets::default()));
    let stop = StopSignal::new();
    let mut setup_rng = StdRng::seed_from_u64(0x5eed);

    let players: Vec<Arc<Player>> = (0..agents)
        .map(|i| {
            let player = Arc::new(Player::new(
                AgentId(i as u32 + 1),
                format!("agent{}", i + 1),
                1,
                PlayerTiming::instant(),
            ));
            grid.place_agent_at_random(&player, &mut setup_rng);
            player
        })
        .collect();
    let tallies: Vec<Arc<Tally>> = (0..agents).map(|_| Arc::new(Tally::default())).collect();

    let mut handles = Vec::with_capacity(agents);
    for (i, player) in players.iter().enumerate() {
        let grid = grid.clone();
        let player = player.clone();
        let stop = stop.clone();
        let tally = tallies[i].clone();
        let label = format!("stress-{}", player.name());
        let spawned = std::thread::Builder::new()
            .name(label.clone())
            .spawn(move || hammer(&grid, &player, &stop, &tally, i as u64 + 1));
        match spawned {
            Ok(handle) => handles.push((label, handle)),
            Err(e) => {
                eprintln!("Failed to spawn {}: {}", label, e);
                std::process::exit(1);
            }
        }
    }

    std::thread::sleep(Duration::from_millis(millis));
    stop.stop();

    let stragglers = join_with_timeout(handles, JOIN_TIMEOUT);
    if !stragglers.is_empty() {
        error!(
            "{} agents still running {:?} after stop, suspected deadlock: {}",
            stragglers.len(),
            JOIN_TIMEOUT,
            stragglers.join(", ")
        );
        std::process::exit(1);
    }

    println!();
    println!("{:<10} {:>10} {:>10}", "agent", "completed", "blocked");
    let mut total_completed = 0;
    let mut total_blocked = 0;
    for (player, tally) in players.iter().zip(&tallies) {
        let completed = tally.completed.load(Ordering::Relaxed);
        let blocked = tally.blocked.load(Ordering::Relaxed);
        total_completed += completed;
        total_blocked += blocked;
        println!("{:<10} {:>10} {:>10}", player.name(), completed, blocked);
    }
    println!("{:<10} {:>10} {:>10}", "total", total_completed, total_blocked);

    let mut failed = false;

    let occupants = grid.occupants();
    let mut seen = HashSet::new();
    for (pos, id) in &occupants {
        if !seen.insert(*id) {
            error!("agent {} occupies more than one cell (again at {})", id, pos);
            failed = true;
        }
    }
    for player in &players {
        let on_board: Vec<_> = occupants.iter().filter(|(_, id)| *id == player.id()).collect();
        if on_board.len() != 1 || Some(on_board[0].0) != player.position() {
            error!(
                "{} cached at {:?} but found on {:?}",
                player.name(),
                player.position(),
                on_board
            );
            failed = true;
        }
    }
    if occupants.len() != agents {
        error!("{} occupied cells for {} agents", occupants.len(), agents);
        failed = true;
    }
    if total_completed == 0 {
        error!("No move completed; agents are starved or stuck");
        failed = true;
    }

    if failed {
        std::process::exit(1);
    }
    info!("Mutual exclusion held and no agent hung");
}
