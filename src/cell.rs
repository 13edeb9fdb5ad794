// Cell: a single grid slot guarded by its own lock
//
// A cell never locks itself on behalf of a caller. The grid acquires the
// lock (or several, in canonical order) and mutates through the returned
// `CellGuard`, which is the only type that can write the slot. That makes the
// "mutate only while holding the lock" rule a compile-time property.
//
// Alongside the authoritative slot each cell mirrors its state into two
// atomics. They are written only by a guard holder and read without any lock
// by the planner and the renderer, which must tolerate staleness.

use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::types::{AgentId, Booster, Position};

const NO_OCCUPANT: u32 = 0;

#[derive(Debug, Default)]
struct Slot {
    content: Booster,
    occupant: Option<AgentId>,
}

#[derive(Debug)]
pub struct Cell {
    pos: Position,
    slot: Mutex<Slot>,
    occupant_hint: AtomicU32,
    content_hint: AtomicU64,
}

impl Cell {
    pub fn new(pos: Position) -> Self {
        Cell {
            pos,
            slot: Mutex::new(Slot::default()),
            occupant_hint: AtomicU32::new(NO_OCCUPANT),
            content_hint: AtomicU64::new(Booster::None.to_bits()),
        }
    }

    pub fn pos(&self) -> Position {
        self.pos
    }

    /// Blocks until this cell's lock is held
    pub fn lock(&self) -> CellGuard<'_> {
        CellGuard {
            cell: self,
            slot: self.slot.lock(),
        }
    }

    /// Returns `None` instead of waiting when another agent holds the lock
    pub fn try_lock(&self) -> Option<CellGuard<'_>> {
        self.slot.try_lock().map(|slot| CellGuard { cell: self, slot })
    }

    /// Unlocked snapshot of the content; may be stale
    pub fn content(&self) -> Booster {
        Booster::from_bits(self.content_hint.load(Ordering::Acquire))
    }

    /// Unlocked snapshot of the occupant; may be stale
    pub fn occupant(&self) -> Option<AgentId> {
        match self.occupant_hint.load(Ordering::Acquire) {
            NO_OCCUPANT => None,
            id => Some(AgentId(id)),
        }
    }
}

/// Exclusive access to one cell. Dropping the guard releases the lock.
pub struct CellGuard<'a> {
    cell: &'a Cell,
    slot: MutexGuard<'a, Slot>,
}

impl<'a> CellGuard<'a> {
    pub fn pos(&self) -> Position {
        self.cell.pos
    }

    pub fn content(&self) -> Booster {
        self.slot.content
    }

    pub fn occupant(&self) -> Option<AgentId> {
        self.slot.occupant
    }

    pub fn is_free(&self) -> bool {
        self.slot.occupant.is_none() && self.slot.content.is_none()
    }

    pub fn set_content(&mut self, booster: Booster) {
        self.slot.content = booster;
        self.cell.content_hint.store(booster.to_bits(), Ordering::Release);
    }

    /// Empties the cell and hands back what was there
    pub fn clear_content(&mut self) -> Booster {
        let previous = std::mem::take(&mut self.slot.content);
        self.cell
            .content_hint
            .store(Booster::None.to_bits(), Ordering::Release);
        previous
    }

    pub fn set_occupant(&mut self, id: AgentId) {
        debug_assert_ne!(id.0, NO_OCCUPANT, "agent id 0 is reserved");
        self.slot.occupant = Some(id);
        self.cell.occupant_hint.store(id.0, Ordering::Release);
    }

    pub fn clear_occupant(&mut self) {
        self.slot.occupant = None;
        self.cell.occupant_hint.store(NO_OCCUPANT, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_writes_are_visible_to_snapshot_reads() {
        let cell = Cell::new(Position::new(0, 0));
        {
            let mut guard = cell.lock();
            guard.set_content(Booster::Coin(5));
            guard.set_occupant(AgentId(3));
        }
        assert_eq!(cell.content(), Booster::Coin(5));
        assert_eq!(cell.occupant(), Some(AgentId(3)));

        let mut guard = cell.lock();
        assert_eq!(guard.clear_content(), Booster::Coin(5));
        guard.clear_occupant();
        assert!(guard.is_free());
        drop(guard);
        assert_eq!(cell.content(), Booster::None);
        assert_eq!(cell.occupant(), None);
    }

    #[test]
    fn test_try_lock_fails_while_held() {
        let cell = Cell::new(Position::new(1, 1));
        let held = cell.lock();
        assert!(cell.try_lock().is_none());
        drop(held);
        assert!(cell.try_lock().is_some());
    }
}
