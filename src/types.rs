// Core board types
// Positions, directions, boosters and the events agents publish

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a player on the board. Ids start at 1; 0 is reserved for "no occupant".
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 2D cell coordinate on the board
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Position {
    pub row: i32,
    pub col: i32,
}

impl Position {
    pub fn new(row: i32, col: i32) -> Self {
        Position { row, col }
    }

    /// Linear index `row * cols + col`, the canonical lock order
    pub fn to_index(&self, cols: i32) -> usize {
        (self.row * cols + self.col) as usize
    }

    pub fn from_index(index: usize, cols: i32) -> Self {
        let index = index as i32;
        Position {
            row: index / cols,
            col: index % cols,
        }
    }

    pub fn manhattan(&self, other: &Position) -> i32 {
        (self.row - other.row).abs() + (self.col - other.col).abs()
    }

    /// True when `other` is exactly one orthogonal step away
    pub fn is_adjacent(&self, other: &Position) -> bool {
        self.manhattan(other) == 1
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// The four orthogonal moves an agent can make in one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    /// Returns all directions in exploration order
    pub fn all() -> [Direction; 4] {
        [Direction::Up, Direction::Right, Direction::Down, Direction::Left]
    }

    /// Calculates the neighbouring position in this direction (may be off-board)
    pub fn apply(&self, pos: &Position) -> Position {
        match self {
            Direction::Up => Position::new(pos.row - 1, pos.col),
            Direction::Right => Position::new(pos.row, pos.col + 1),
            Direction::Down => Position::new(pos.row + 1, pos.col),
            Direction::Left => Position::new(pos.row, pos.col - 1),
        }
    }
}

/// Booster category, used for counters, targets and robot types
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BoosterKind {
    Coin,
    Heal,
    Poison,
}

impl BoosterKind {
    pub fn all() -> [BoosterKind; 3] {
        [BoosterKind::Coin, BoosterKind::Heal, BoosterKind::Poison]
    }

    /// Slot in per-kind counter arrays
    pub fn index(&self) -> usize {
        match self {
            BoosterKind::Coin => 0,
            BoosterKind::Heal => 1,
            BoosterKind::Poison => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BoosterKind::Coin => "coin",
            BoosterKind::Heal => "heal",
            BoosterKind::Poison => "poison",
        }
    }

    /// Coins are consumed continuously and must be replenished forever;
    /// heals and poison are laid down once up to their target.
    pub fn replenishes(&self) -> bool {
        matches!(self, BoosterKind::Coin)
    }
}

/// Cell-local pickup content
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Booster {
    #[default]
    None,
    Coin(u32),
    Heal,
    Poison,
}

impl Booster {
    pub fn kind(&self) -> Option<BoosterKind> {
        match self {
            Booster::None => None,
            Booster::Coin(_) => Some(BoosterKind::Coin),
            Booster::Heal => Some(BoosterKind::Heal),
            Booster::Poison => Some(BoosterKind::Poison),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Booster::None)
    }

    /// Packs the booster into a word for the lock-free snapshot hint.
    /// Low two bits carry the tag, bits 2..34 the full coin amount.
    pub fn to_bits(&self) -> u64 {
        match self {
            Booster::None => 0,
            Booster::Heal => 1,
            Booster::Poison => 2,
            Booster::Coin(amount) => 3 | ((*amount as u64) << 2),
        }
    }

    pub fn from_bits(bits: u64) -> Self {
        match bits & 0b11 {
            0 => Booster::None,
            1 => Booster::Heal,
            2 => Booster::Poison,
            _ => Booster::Coin((bits >> 2) as u32),
        }
    }
}

/// Non-authoritative view of one cell, for rendering only
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayToken {
    Empty,
    Player(AgentId),
    Coin(u32),
    Heal,
    Trap,
}

/// Terminal transitions published by agent run loops
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    PlayerDied { id: AgentId, name: String, coins: u64 },
    PlayerStopped { id: AgentId, name: String, coins: u64, life: i32 },
    RobotExhausted { kind: BoosterKind, index: usize, placed: u64 },
    RobotStopped { kind: BoosterKind, index: usize, placed: u64 },
}

/// Agents publish from plain threads; `send` on an unbounded channel never blocks
pub type EventSender = tokio::sync::mpsc::UnboundedSender<AgentEvent>;
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<AgentEvent>;
