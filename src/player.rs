// Player agent: plans a short path, walks it through the grid, repeats
//
// State machine: Waiting -> Moving -> Waiting ... until life runs out (Dead)
// or a stop signal arrives (Stopped). Both terminal states clear the player's
// cell exactly once. A drop guard does the clearing, so a player thread that
// dies on a contract violation still leaves the board consistent.

use log::{debug, info};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{IntervalMs, PlayersConfig};
use crate::grid::{Grid, MoveOutcome};
use crate::planner::PathPlanner;
use crate::profiler;
use crate::types::{AgentEvent, AgentId, Booster, EventSender, Position};

/// Longest uninterrupted sleep; bounds how late a stop is noticed
const NAP_SLICE: Duration = Duration::from_millis(10);

/// Shared, idempotent cancellation flag
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        StopSignal::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Sleeps for `duration` in short slices. Returns `false` as soon as any of
/// `signals` is raised.
pub(crate) fn nap(duration: Duration, signals: &[&StopSignal]) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if signals.iter().any(|s| s.is_stopped()) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep((deadline - now).min(NAP_SLICE));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlayerState {
    Waiting = 0,
    Moving = 1,
    Dead = 2,
    Stopped = 3,
}

impl PlayerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PlayerState::Waiting,
            1 => PlayerState::Moving,
            2 => PlayerState::Dead,
            _ => PlayerState::Stopped,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PlayerState::Dead | PlayerState::Stopped)
    }
}

/// Pacing of a player's loop
#[derive(Debug, Clone, Copy)]
pub struct PlayerTiming {
    pub think: IntervalMs,
    pub min_steps: usize,
    pub max_steps: usize,
    pub step_pause: Duration,
}

impl PlayerTiming {
    /// No waiting at all; for tests and the stress harness
    pub fn instant() -> Self {
        PlayerTiming {
            think: IntervalMs::new(0, 0),
            min_steps: 1,
            max_steps: 6,
            step_pause: Duration::ZERO,
        }
    }
}

impl From<&PlayersConfig> for PlayerTiming {
    fn from(config: &PlayersConfig) -> Self {
        PlayerTiming {
            think: config.think,
            min_steps: config.min_steps,
            max_steps: config.max_steps,
            step_pause: Duration::from_millis(config.step_pause_ms),
        }
    }
}

/// Outcome of a single step along a planned path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Moved { consumed: Booster },
    Blocked,
    Died,
}

#[derive(Debug)]
pub struct Player {
    id: AgentId,
    name: String,
    life: AtomicI32,
    coins: AtomicU64,
    moves: AtomicU64,
    position: Mutex<Option<Position>>,
    state: AtomicU8,
    stop: StopSignal,
    removed: AtomicBool,
    timing: PlayerTiming,
}

impl Player {
    pub fn new(id: AgentId, name: impl Into<String>, initial_life: i32, timing: PlayerTiming) -> Self {
        assert_ne!(id.0, 0, "agent id 0 is reserved");
        Player {
            id,
            name: name.into(),
            life: AtomicI32::new(initial_life),
            coins: AtomicU64::new(0),
            moves: AtomicU64::new(0),
            position: Mutex::new(None),
            state: AtomicU8::new(PlayerState::Waiting as u8),
            stop: StopSignal::new(),
            removed: AtomicBool::new(false),
            timing,
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Board label: uppercase first letter of the name, else the id's last digit
    pub fn initial(&self) -> char {
        self.name
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or_else(|| char::from_digit(self.id.0 % 10, 10).unwrap_or('?'))
    }

    pub fn life(&self) -> i32 {
        self.life.load(Ordering::Acquire)
    }

    pub fn coins(&self) -> u64 {
        self.coins.load(Ordering::Acquire)
    }

    /// Completed moves so far
    pub fn moves(&self) -> u64 {
        self.moves.load(Ordering::Relaxed)
    }

    /// Cached position; the cell's occupant field is authoritative
    pub fn position(&self) -> Option<Position> {
        *self.position.lock()
    }

    pub(crate) fn set_position(&self, pos: Position) {
        *self.position.lock() = Some(pos);
    }

    pub(crate) fn clear_position(&self) {
        *self.position.lock() = None;
    }

    pub fn state(&self) -> PlayerState {
        PlayerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: PlayerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_alive(&self) -> bool {
        self.life() > 0 && self.state() != PlayerState::Dead
    }

    pub fn is_running(&self) -> bool {
        !self.state().is_terminal()
    }

    /// Asks the player to stop at its next safe point. Safe to call any
    /// number of times, including after death.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Applies a picked-up booster and returns the resulting life
    pub fn apply_booster(&self, booster: Booster) -> i32 {
        match booster {
            Booster::Coin(amount) => {
                self.coins.fetch_add(amount as u64, Ordering::AcqRel);
                self.life()
            }
            Booster::Heal => self.life.fetch_add(1, Ordering::AcqRel) + 1,
            Booster::Poison => self.life.fetch_sub(1, Ordering::AcqRel) - 1,
            Booster::None => self.life(),
        }
    }

    /// Clears the player's cell unless that already happened
    pub fn leave_board(&self, grid: &Grid) -> bool {
        if self.removed.swap(true, Ordering::AcqRel) {
            return false;
        }
        grid.remove_agent(self)
    }

    /// Moves one cell along a planned path, applies the pickup and handles death.
    pub fn take_step(&self, grid: &Grid, to: Position) -> StepResult {
        let from = match self.position() {
            Some(pos) => pos,
            None => panic!("player {} tried to move while off the board", self.id),
        };

        match grid.move_agent(from, to, self) {
            MoveOutcome::Blocked => {
                debug!("{} blocked moving {} -> {}, will replan", self.name, from, to);
                StepResult::Blocked
            }
            MoveOutcome::Moved { consumed } => {
                self.moves.fetch_add(1, Ordering::Relaxed);
                let life = self.apply_booster(consumed);
                if !consumed.is_none() {
                    debug!(
                        "{} picked up {:?} at {} (life: {}, coins: {})",
                        self.name,
                        consumed,
                        to,
                        life,
                        self.coins()
                    );
                }
                if life <= 0 {
                    self.set_state(PlayerState::Dead);
                    self.leave_board(grid);
                    info!("{} died at {} with {} coins", self.name, to, self.coins());
                    return StepResult::Died;
                }
                StepResult::Moved { consumed }
            }
        }
    }

    /// Contract check on a planner result
    fn check_path(&self, origin: Position, path: &[Position], steps: usize, grid: &Grid) {
        assert!(
            !path.is_empty() && path[0] == origin,
            "planner returned a path for {} that does not start at {}",
            self.name,
            origin
        );
        assert!(
            path.len() <= steps + 1,
            "planner returned {} positions for a {}-step budget",
            path.len(),
            steps
        );
        for hop in path.windows(2) {
            assert!(
                grid.in_bounds(hop[1]) && hop[0].is_adjacent(&hop[1]),
                "planner returned a non-adjacent hop {} -> {}",
                hop[0],
                hop[1]
            );
        }
    }

    /// Runs the player until it dies or is stopped and returns its terminal state.
    ///
    /// # Arguments
    /// * `grid` - Shared board; the player must already be placed on it
    /// * `planner` - Read-only path search
    /// * `session_stop` - Stop signal shared by every agent of the game
    /// * `events` - Where the terminal event is published, if anyone listens
    /// * `rng` - This thread's private random source
    pub fn run<R: Rng + ?Sized>(
        &self,
        grid: &Grid,
        planner: &PathPlanner,
        session_stop: &StopSignal,
        events: Option<&EventSender>,
        rng: &mut R,
    ) -> PlayerState {
        let presence = BoardPresence { player: self, grid };
        let signals = [&self.stop, session_stop];
        let stopping = || signals.iter().any(|s| s.is_stopped());

        info!("{} ({}) starts at {:?}", self.name, self.id, self.position());

        let final_state = 'life: loop {
            if self.state() == PlayerState::Dead {
                break PlayerState::Dead;
            }
            if stopping() {
                break PlayerState::Stopped;
            }

            self.set_state(PlayerState::Waiting);
            if !nap(self.timing.think.sample(rng), &signals) {
                break PlayerState::Stopped;
            }

            let steps = rng.random_range(self.timing.min_steps..=self.timing.max_steps);
            self.set_state(PlayerState::Moving);

            let origin = match self.position() {
                Some(pos) => pos,
                None => panic!("player {} is running without a position", self.id),
            };
            let path = planner.plan(origin, grid, steps, rng);
            self.check_path(origin, &path, steps, grid);

            for next in path.iter().skip(1) {
                if stopping() {
                    break 'life PlayerState::Stopped;
                }
                match self.take_step(grid, *next) {
                    StepResult::Died => break 'life PlayerState::Dead,
                    StepResult::Blocked => break,
                    StepResult::Moved { .. } => {}
                }
                if !self.timing.step_pause.is_zero() && !nap(self.timing.step_pause, &signals) {
                    break 'life PlayerState::Stopped;
                }
            }
        };

        if final_state == PlayerState::Stopped {
            self.set_state(PlayerState::Stopped);
            info!(
                "{} stopped with {} coins and {} lives",
                self.name,
                self.coins(),
                self.life()
            );
        }
        drop(presence);
        profiler::merge_thread_local();

        let event = match final_state {
            PlayerState::Dead => AgentEvent::PlayerDied {
                id: self.id,
                name: self.name.clone(),
                coins: self.coins(),
            },
            _ => AgentEvent::PlayerStopped {
                id: self.id,
                name: self.name.clone(),
                coins: self.coins(),
                life: self.life(),
            },
        };
        if let Some(tx) = events {
            // Nobody listening is fine
            let _ = tx.send(event);
        }

        final_state
    }
}

/// Clears the player's cell when the run loop ends, however it ends
struct BoardPresence<'a> {
    player: &'a Player,
    grid: &'a Grid,
}

impl Drop for BoardPresence<'_> {
    fn drop(&mut self) {
        self.player.leave_board(self.grid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::BoosterTargets;

    #[test]
    fn test_apply_booster_effects() {
        let player = Player::new(AgentId(1), "Ana", 2, PlayerTiming::instant());
        assert_eq!(player.apply_booster(Booster::Coin(5)), 2);
        assert_eq!(player.coins(), 5);
        assert_eq!(player.apply_booster(Booster::Heal), 3);
        assert_eq!(player.apply_booster(Booster::Poison), 2);
        assert_eq!(player.apply_booster(Booster::None), 2);
    }

    #[test]
    fn test_initial_falls_back_to_id_digit() {
        let named = Player::new(AgentId(1), "carla", 1, PlayerTiming::instant());
        let unnamed = Player::new(AgentId(12), "", 1, PlayerTiming::instant());
        assert_eq!(named.initial(), 'C');
        assert_eq!(unnamed.initial(), '2');
    }

    #[test]
    fn test_nap_returns_early_on_stop() {
        let signal = StopSignal::new();
        signal.stop();
        let start = Instant::now();
        assert!(!nap(Duration::from_secs(5), &[&signal]));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_leave_board_happens_once() {
        let grid = Grid::new(2, 2, BoosterTargets::default());
        let player = Player::new(AgentId(1), "Ana", 1, PlayerTiming::instant());
        assert!(grid.place_agent_at(Position::new(1, 1), &player));
        assert!(player.leave_board(&grid));
        assert!(!player.leave_board(&grid));
        assert!(!grid.is_occupied(Position::new(1, 1)));
    }
}
