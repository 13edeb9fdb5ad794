// Session: starts every agent, watches the game, stops and reaps them
//
// Each agent runs on its own named OS thread with a private random source.
// The controller itself is async: it polls on a timer, drains agent events,
// renders the board, and after the stop signal joins threads against a finite
// deadline. A thread that misses the deadline is abandoned, not waited on.

use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::config::{Config, Placement};
use crate::grid::{BoosterCensus, Grid};
use crate::planner::PathPlanner;
use crate::player::{Player, PlayerTiming, StopSignal};
use crate::profiler;
use crate::render::render_board;
use crate::results_logger::ResultsLogger;
use crate::robot::Robot;
use crate::types::{AgentEvent, AgentId, BoosterKind, EventReceiver, EventSender, Position};

/// Final line of the results table
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub rank: usize,
    pub id: AgentId,
    pub name: String,
    pub coins: u64,
    pub life: i32,
    pub alive: bool,
    pub moves: u64,
}

/// Everything the outer layers need once the game is over
#[derive(Debug, Clone)]
pub struct GameReport {
    pub standings: Vec<Standing>,
    pub final_board: String,
    pub census: BoosterCensus,
    pub counters: BoosterCensus,
    pub elapsed: Duration,
    /// Threads that ended in a panic
    pub failed: Vec<String>,
    /// Threads still running when the join deadline passed
    pub abandoned: Vec<String>,
}

/// Ranks players: alive first, then coins, then life, then name (case-insensitive)
pub fn rank_players(players: &[Arc<Player>]) -> Vec<Standing> {
    let mut standings: Vec<Standing> = players
        .iter()
        .map(|p| Standing {
            rank: 0,
            id: p.id(),
            name: p.name().to_string(),
            coins: p.coins(),
            life: p.life(),
            alive: p.is_alive(),
            moves: p.moves(),
        })
        .collect();

    standings.sort_by(|a, b| {
        b.alive
            .cmp(&a.alive)
            .then(b.coins.cmp(&a.coins))
            .then(b.life.cmp(&a.life))
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    for (i, standing) in standings.iter_mut().enumerate() {
        standing.rank = i + 1;
    }
    standings
}

type AgentJob = Box<dyn FnOnce() + Send + 'static>;

fn spawn_named(label: String, job: AgentJob) -> io::Result<JoinHandle<()>> {
    std::thread::Builder::new().name(label).spawn(job)
}

/// Plain-text results table, one ranked player per line
pub fn format_standings(standings: &[Standing]) -> String {
    standings
        .iter()
        .map(|s| {
            format!(
                "{:>2}. {:<12} coins: {:>4}  life: {:>2}  moves: {:>4}  {}\n",
                s.rank,
                s.name,
                s.coins,
                s.life,
                s.moves,
                if s.alive { "alive" } else { "dead" }
            )
        })
        .collect()
}

struct AgentThread {
    label: String,
    handle: JoinHandle<()>,
}

pub struct Session {
    config: Config,
    grid: Arc<Grid>,
    planner: Arc<PathPlanner>,
    players: Vec<Arc<Player>>,
    robots: Vec<Arc<Robot>>,
    stop: StopSignal,
    logger: ResultsLogger,
}

impl Session {
    /// Validates `config` and builds the board and every agent, none running yet
    pub fn new(config: Config) -> Result<Self, String> {
        config.validate()?;

        let grid = Arc::new(Grid::from_config(&config));
        let planner = Arc::new(PathPlanner::new(config.planner.clone()));
        let timing = PlayerTiming::from(&config.players);

        let players = config
            .players
            .names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                Arc::new(Player::new(
                    AgentId(i as u32 + 1),
                    name.clone(),
                    config.players.initial_life,
                    timing,
                ))
            })
            .collect();

        let robots = BoosterKind::all()
            .iter()
            .flat_map(|&kind| {
                let robots_config = &config.robots;
                (0..robots_config.for_kind(kind).count)
                    .map(move |i| Arc::new(Robot::new(kind, i, robots_config)))
            })
            .collect();

        Ok(Session {
            config,
            grid,
            planner,
            players,
            robots,
            stop: StopSignal::new(),
            logger: ResultsLogger::disabled(),
        })
    }

    pub fn with_logger(mut self, logger: ResultsLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn grid(&self) -> &Arc<Grid> {
        &self.grid
    }

    pub fn players(&self) -> &[Arc<Player>] {
        &self.players
    }

    pub fn robots(&self) -> &[Arc<Robot>] {
        &self.robots
    }

    /// Raising this signal ends the game at the next poll
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn labels(&self) -> HashMap<AgentId, char> {
        self.players.iter().map(|p| (p.id(), p.initial())).collect()
    }

    pub fn render(&self) -> String {
        render_board(&self.grid.snapshot(), &self.labels(), self.config.debug.reveal_traps)
    }

    fn place_players(&self, rng: &mut StdRng) {
        let (rows, cols) = (self.grid.rows(), self.grid.cols());
        let mut corners = vec![
            Position::new(0, 0),
            Position::new(0, cols - 1),
            Position::new(rows - 1, 0),
            Position::new(rows - 1, cols - 1),
        ];
        corners.dedup();

        for (i, player) in self.players.iter().enumerate() {
            if self.config.players.placement == Placement::Corners {
                if let Some(&corner) = corners.get(i) {
                    if self.grid.place_agent_at(corner, player) {
                        continue;
                    }
                }
            }
            self.grid.place_agent_at_random(player, rng);
        }
    }

    /// Starts one thread per robot, then per player. Stops at the first
    /// failure and returns what was started so far alongside the error.
    fn spawn_agents<S>(&self, events: &EventSender, mut spawn: S) -> (Vec<AgentThread>, Option<String>)
    where
        S: FnMut(String, AgentJob) -> io::Result<JoinHandle<()>>,
    {
        let mut jobs: Vec<(String, AgentJob)> = Vec::with_capacity(self.robots.len() + self.players.len());

        // Robots first so boosters are already appearing when players wake up
        for robot in &self.robots {
            let robot = robot.clone();
            let grid = self.grid.clone();
            let stop = self.stop.clone();
            let tx = events.clone();
            jobs.push((
                robot.label(),
                Box::new(move || {
                    let mut rng = StdRng::from_rng(&mut rand::rng());
                    robot.run(&grid, &stop, Some(&tx), &mut rng);
                }),
            ));
        }

        for player in &self.players {
            let player = player.clone();
            let grid = self.grid.clone();
            let planner = self.planner.clone();
            let stop = self.stop.clone();
            let tx = events.clone();
            jobs.push((
                format!("player-{}", player.name()),
                Box::new(move || {
                    let mut rng = StdRng::from_rng(&mut rand::rng());
                    player.run(&grid, &planner, &stop, Some(&tx), &mut rng);
                }),
            ));
        }

        let mut threads = Vec::with_capacity(jobs.len());
        for (label, job) in jobs {
            match spawn(label.clone(), job) {
                Ok(handle) => threads.push(AgentThread { label, handle }),
                Err(e) => return (threads, Some(format!("Failed to spawn {}: {}", label, e))),
            }
        }
        (threads, None)
    }

    /// Raises every stop signal
    fn halt(&self) {
        self.stop.stop();
        self.players.iter().for_each(|p| p.stop());
        self.robots.iter().for_each(|r| r.stop());
    }

    fn drain_events(&self, rx: &mut EventReceiver) {
        while let Ok(event) = rx.try_recv() {
            match &event {
                AgentEvent::PlayerDied { name, coins, .. } => {
                    info!("[DEAD] {} is out with {} coins", name, coins)
                }
                AgentEvent::PlayerStopped { name, coins, life, .. } => {
                    info!("{} finished with {} coins and {} lives", name, coins, life)
                }
                AgentEvent::RobotExhausted { kind, index, placed } => {
                    info!("{} robot {} is done after {} placements", kind.as_str(), index, placed)
                }
                AgentEvent::RobotStopped { kind, index, placed } => {
                    info!("{} robot {} stopped after {} placements", kind.as_str(), index, placed)
                }
            }
            self.logger.log_event(event);
        }
    }

    fn game_over(&self) -> bool {
        if self.stop.is_stopped() {
            return true;
        }
        if !self.config.session.stop_when_one_alive {
            return false;
        }
        let alive = self.players.iter().filter(|p| p.is_alive()).count();
        alive == 0 || (self.players.len() > 1 && alive <= 1)
    }

    /// Joins finished threads until all are done or `timeout` elapses.
    /// Returns `(failed, abandoned)` thread labels.
    async fn join_all(threads: Vec<AgentThread>, timeout: Duration) -> (Vec<String>, Vec<String>) {
        let deadline = Instant::now() + timeout;
        let mut pending = threads;
        let mut failed = Vec::new();

        loop {
            let (finished, running): (Vec<_>, Vec<_>) =
                pending.into_iter().partition(|t| t.handle.is_finished());

            for thread in finished {
                if thread.handle.join().is_err() {
                    error!("{} terminated on a contract violation", thread.label);
                    failed.push(thread.label);
                }
            }

            pending = running;
            if pending.is_empty() || Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let abandoned = pending
            .into_iter()
            .map(|thread| {
                warn!("{} did not stop within {:?}, abandoning it", thread.label, timeout);
                thread.label
            })
            .collect();

        (failed, abandoned)
    }

    /// Plays one game to completion
    ///
    /// Places players, starts every agent, polls until the time limit or the
    /// last player standing, then stops and reaps all agents and ranks players.
    pub async fn run(&self) -> Result<GameReport, String> {
        self.run_with(spawn_named).await
    }

    async fn run_with<S>(&self, spawn: S) -> Result<GameReport, String>
    where
        S: FnMut(String, AgentJob) -> io::Result<JoinHandle<()>>,
    {
        let start = Instant::now();
        let session = &self.config.session;
        profiler::reset();

        let mut rng = StdRng::from_rng(&mut rand::rng());
        self.place_players(&mut rng);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (threads, spawn_error) = self.spawn_agents(&tx, spawn);
        drop(tx);
        let join_timeout = Duration::from_millis(session.join_timeout_ms);

        if let Some(e) = spawn_error {
            error!("{}; stopping the agents already started", e);
            self.halt();
            Self::join_all(threads, join_timeout).await;
            // Players that never got a thread are still on the board
            for player in &self.players {
                player.leave_board(&self.grid);
            }
            self.drain_events(&mut rx);
            return Err(e);
        }

        info!(
            "Game starts: {} players, {} robots on a {}x{} board ({}s)",
            self.players.len(),
            self.robots.len(),
            self.grid.rows(),
            self.grid.cols(),
            session.duration_secs
        );

        let deadline = start + Duration::from_secs(session.duration_secs);
        let poll_interval = Duration::from_millis(session.poll_interval_ms.max(1));
        let render_interval = Duration::from_millis(session.render_interval_ms);
        let mut last_render = Instant::now();

        loop {
            tokio::time::sleep(poll_interval).await;
            self.drain_events(&mut rx);

            if !render_interval.is_zero() && last_render.elapsed() >= render_interval {
                info!("Board:\n{}", self.render());
                last_render = Instant::now();
            }

            if Instant::now() >= deadline {
                info!("Time is up");
                break;
            }
            if self.game_over() {
                info!("Game over");
                break;
            }
        }

        self.halt();
        let (failed, abandoned) = Self::join_all(threads, join_timeout).await;
        self.drain_events(&mut rx);

        let standings = rank_players(&self.players);
        self.logger.write_standings(&standings).await;

        let elapsed = start.elapsed();
        profiler::print_report(elapsed.as_millis() as u64);

        Ok(GameReport {
            standings,
            final_board: self.render(),
            census: self.grid.census(),
            counters: self.grid.counters(),
            elapsed,
            failed,
            abandoned,
        })
    }
}
