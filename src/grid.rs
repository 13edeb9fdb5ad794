// Grid: the shared board every agent thread mutates
//
// The grid exclusively owns an arena of cells. Every multi-cell transaction
// locks its cells in ascending linear index order, a total order over the
// whole board, so no two transactions can wait on each other in a cycle.
//
// Per-kind booster counters are lock-free atomics used as a fast-path hint.
// They only change while the lock of the cell whose content changes is held,
// so a quiescent board always satisfies counter == cells holding that kind.

use log::debug;
use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::cell::{Cell, CellGuard};
use crate::config::Config;
use crate::player::Player;
use crate::profiler::ProfileGuard;
use crate::types::{AgentId, Booster, BoosterKind, DisplayToken, Position};

/// Maximum number of simultaneously present boosters per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoosterTargets {
    pub coin: usize,
    pub heal: usize,
    pub poison: usize,
}

impl BoosterTargets {
    pub fn get(&self, kind: BoosterKind) -> usize {
        match kind {
            BoosterKind::Coin => self.coin,
            BoosterKind::Heal => self.heal,
            BoosterKind::Poison => self.poison,
        }
    }
}

/// Booster cells counted by a full board scan
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoosterCensus {
    pub coin: usize,
    pub heal: usize,
    pub poison: usize,
}

impl BoosterCensus {
    pub fn get(&self, kind: BoosterKind) -> usize {
        match kind {
            BoosterKind::Coin => self.coin,
            BoosterKind::Heal => self.heal,
            BoosterKind::Poison => self.poison,
        }
    }

    fn record(mut self, booster: Booster) -> Self {
        match booster.kind() {
            Some(BoosterKind::Coin) => self.coin += 1,
            Some(BoosterKind::Heal) => self.heal += 1,
            Some(BoosterKind::Poison) => self.poison += 1,
            None => {}
        }
        self
    }

    fn merge(self, other: Self) -> Self {
        BoosterCensus {
            coin: self.coin + other.coin,
            heal: self.heal + other.heal,
            poison: self.poison + other.poison,
        }
    }
}

/// Result of a move attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The agent now occupies the destination and picked up `consumed`
    Moved { consumed: Booster },
    /// Destination taken or source stale; the agent should replan
    Blocked,
}

pub struct Grid {
    rows: i32,
    cols: i32,
    cells: Vec<Cell>,
    counts: [AtomicUsize; 3],
    targets: [AtomicUsize; 3],
}

impl Grid {
    /// Creates an empty `rows x cols` board
    ///
    /// # Panics
    /// If either dimension is not positive
    pub fn new(rows: i32, cols: i32, targets: BoosterTargets) -> Self {
        assert!(
            rows > 0 && cols > 0,
            "board dimensions must be positive, got {}x{}",
            rows,
            cols
        );

        let total = (rows * cols) as usize;
        let cells = (0..total)
            .map(|idx| Cell::new(Position::from_index(idx, cols)))
            .collect();

        Grid {
            rows,
            cols,
            cells,
            counts: Default::default(),
            targets: [
                AtomicUsize::new(targets.coin),
                AtomicUsize::new(targets.heal),
                AtomicUsize::new(targets.poison),
            ],
        }
    }

    /// Builds the board described by `[board]` with `[targets]` resolved against its size
    pub fn from_config(config: &Config) -> Self {
        let targets = config.targets.resolve(config.board.total());
        Self::new(config.board.rows, config.board.cols, targets)
    }

    pub fn rows(&self) -> i32 {
        self.rows
    }

    pub fn cols(&self) -> i32 {
        self.cols
    }

    pub fn total(&self) -> usize {
        self.cells.len()
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.row >= 0 && pos.row < self.rows && pos.col >= 0 && pos.col < self.cols
    }

    /// Canonical linear index of an in-bounds position
    ///
    /// # Panics
    /// If `pos` is off the board; callers must never ask for one
    pub fn index_of(&self, pos: Position) -> usize {
        assert!(
            self.in_bounds(pos),
            "position {} is outside the {}x{} board",
            pos,
            self.rows,
            self.cols
        );
        pos.to_index(self.cols)
    }

    fn cell(&self, pos: Position) -> &Cell {
        &self.cells[self.index_of(pos)]
    }

    /// Unlocked occupancy snapshot
    pub fn is_occupied(&self, pos: Position) -> bool {
        self.cell(pos).occupant().is_some()
    }

    /// Unlocked occupant snapshot
    pub fn occupant(&self, pos: Position) -> Option<AgentId> {
        self.cell(pos).occupant()
    }

    /// Unlocked content snapshot
    pub fn cell_content(&self, pos: Position) -> Booster {
        self.cell(pos).content()
    }

    pub fn booster_count(&self, kind: BoosterKind) -> usize {
        self.counts[kind.index()].load(Ordering::Acquire)
    }

    pub fn target(&self, kind: BoosterKind) -> usize {
        self.targets[kind.index()].load(Ordering::Acquire)
    }

    /// External reconfiguration. Lowering a target below the current count
    /// leaves the surplus on the board until it is consumed.
    pub fn set_target(&self, kind: BoosterKind, target: usize) {
        self.targets[kind.index()].store(target, Ordering::Release);
    }

    /// Current counter values, without scanning the board
    pub fn counters(&self) -> BoosterCensus {
        BoosterCensus {
            coin: self.booster_count(BoosterKind::Coin),
            heal: self.booster_count(BoosterKind::Heal),
            poison: self.booster_count(BoosterKind::Poison),
        }
    }

    /// Locks both cells in ascending index order and returns the guards as `(a, b)`
    fn lock_pair(&self, a: usize, b: usize) -> (CellGuard<'_>, CellGuard<'_>) {
        debug_assert_ne!(a, b, "a cell cannot be paired with itself");
        if a < b {
            let first = self.cells[a].lock();
            let second = self.cells[b].lock();
            (first, second)
        } else {
            let first = self.cells[b].lock();
            let second = self.cells[a].lock();
            (second, first)
        }
    }

    /// Atomically moves `player` from `from` to `to` and consumes the
    /// destination's booster.
    ///
    /// Returns `Blocked` without touching anything when the destination is
    /// occupied or the player is no longer at `from`. The booster's effect on
    /// the player is applied by the caller, outside the locks.
    pub fn move_agent(&self, from: Position, to: Position, player: &Player) -> MoveOutcome {
        let _profile = ProfileGuard::new("move");

        let from_idx = self.index_of(from);
        let to_idx = self.index_of(to);
        if from_idx == to_idx {
            return MoveOutcome::Blocked;
        }

        let (mut source, mut dest) = self.lock_pair(from_idx, to_idx);

        if dest.occupant().is_some() || source.occupant() != Some(player.id()) {
            return MoveOutcome::Blocked;
        }

        source.clear_occupant();
        dest.set_occupant(player.id());
        player.set_position(to);

        let consumed = dest.clear_content();
        if let Some(kind) = consumed.kind() {
            self.counts[kind.index()].fetch_sub(1, Ordering::AcqRel);
        }

        MoveOutcome::Moved { consumed }
    }

    /// Increments the counter for `kind` unless it has reached its target.
    /// Called with the destination cell's lock held.
    fn reserve(&self, kind: BoosterKind) -> bool {
        let target = self.target(kind);
        self.counts[kind.index()]
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < target).then_some(n + 1)
            })
            .is_ok()
    }

    /// Sampling attempts scale with the capacity left for boosters
    fn sampling_budget(&self) -> usize {
        let used: usize = BoosterKind::all()
            .iter()
            .map(|kind| self.booster_count(*kind))
            .sum();
        let remaining = self.total().saturating_sub(used);
        (remaining * 3).max(self.rows.max(self.cols) as usize)
    }

    /// Puts `booster` on a random empty, unoccupied cell.
    ///
    /// Returns `false` when the kind is at its target or no free cell turned
    /// up within the sampling budget. Both are normal under load.
    ///
    /// # Panics
    /// If `booster` is `Booster::None`
    pub fn place_booster<R: Rng + ?Sized>(&self, booster: Booster, rng: &mut R) -> bool {
        let kind = match booster.kind() {
            Some(kind) => kind,
            None => panic!("cannot place an empty booster"),
        };
        let _profile = ProfileGuard::new("place");

        if self.booster_count(kind) >= self.target(kind) {
            return false;
        }

        for _ in 0..self.sampling_budget() {
            let cell = &self.cells[rng.random_range(0..self.cells.len())];
            if cell.occupant().is_some() || !cell.content().is_none() {
                continue;
            }
            let Some(mut guard) = cell.try_lock() else {
                continue;
            };
            if !guard.is_free() {
                continue;
            }
            if !self.reserve(kind) {
                return false;
            }
            guard.set_content(booster);
            debug!("Placed {:?} at {}", booster, guard.pos());
            return true;
        }

        false
    }

    /// Puts `booster` on `pos` if the cell is free and the kind is under target
    ///
    /// # Panics
    /// If `booster` is `Booster::None` or `pos` is off the board
    pub fn place_booster_at(&self, pos: Position, booster: Booster) -> bool {
        let kind = match booster.kind() {
            Some(kind) => kind,
            None => panic!("cannot place an empty booster"),
        };
        let mut guard = self.cell(pos).lock();
        if !guard.is_free() || !self.reserve(kind) {
            return false;
        }
        guard.set_content(booster);
        true
    }

    /// Claims a random unoccupied cell for `player` and returns it.
    /// Spins until one is found; the board must have free capacity.
    pub fn place_agent_at_random<R: Rng + ?Sized>(&self, player: &Player, rng: &mut R) -> Position {
        loop {
            let cell = &self.cells[rng.random_range(0..self.cells.len())];
            let Some(mut guard) = cell.try_lock() else {
                continue;
            };
            if guard.occupant().is_none() {
                guard.set_occupant(player.id());
                player.set_position(guard.pos());
                return guard.pos();
            }
        }
    }

    /// Claims `pos` for `player` if nobody stands there
    pub fn place_agent_at(&self, pos: Position, player: &Player) -> bool {
        let mut guard = self.cell(pos).lock();
        if guard.occupant().is_some() {
            return false;
        }
        guard.set_occupant(player.id());
        player.set_position(pos);
        true
    }

    /// Clears `player` off the board. Tries the cached position first and
    /// falls back to scanning every cell, one lock at a time.
    pub fn remove_agent(&self, player: &Player) -> bool {
        let id = player.id();

        if let Some(pos) = player.position() {
            let mut guard = self.cell(pos).lock();
            if guard.occupant() == Some(id) {
                guard.clear_occupant();
                drop(guard);
                player.clear_position();
                return true;
            }
        }

        let mut cleared = false;
        for cell in &self.cells {
            let mut guard = cell.lock();
            if guard.occupant() == Some(id) {
                guard.clear_occupant();
                cleared = true;
            }
        }
        player.clear_position();
        cleared
    }

    /// Every occupied cell, each read under its own lock
    pub fn occupants(&self) -> Vec<(Position, AgentId)> {
        self.cells
            .iter()
            .filter_map(|cell| {
                let guard = cell.lock();
                guard.occupant().map(|id| (guard.pos(), id))
            })
            .collect()
    }

    /// Counts booster cells by kind. Each cell is read under its lock, but the
    /// scan as a whole is not atomic; only exact on a quiescent board.
    pub fn census(&self) -> BoosterCensus {
        self.cells
            .par_iter()
            .map(|cell| cell.lock().content())
            .fold(BoosterCensus::default, BoosterCensus::record)
            .reduce(BoosterCensus::default, BoosterCensus::merge)
    }

    /// Racy view of the board for rendering
    pub fn snapshot(&self) -> Vec<Vec<DisplayToken>> {
        self.cells
            .chunks(self.cols as usize)
            .map(|row| {
                row.iter()
                    .map(|cell| match (cell.occupant(), cell.content()) {
                        (Some(id), _) => DisplayToken::Player(id),
                        (None, Booster::Coin(amount)) => DisplayToken::Coin(amount),
                        (None, Booster::Heal) => DisplayToken::Heal,
                        (None, Booster::Poison) => DisplayToken::Trap,
                        (None, Booster::None) => DisplayToken::Empty,
                    })
                    .collect()
            })
            .collect()
    }
}
