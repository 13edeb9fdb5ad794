// Path planner: scores every reachable path of a given length and keeps the best
//
// Breadth-first over (cell, steps taken), each state visited once, so the work
// is bounded by cells * (steps + 1). All board reads are unlocked snapshots;
// the move protocol re-validates every hop, so stale reads only cost a replan.

use rand::Rng;
use std::collections::VecDeque;

use crate::config::PlannerConfig;
use crate::grid::Grid;
use crate::profiler::ProfileGuard;
use crate::types::{AgentId, Booster, Direction, Position};

#[derive(Debug, Clone, Copy)]
struct Node {
    pos: Position,
    depth: usize,
    parent: Option<usize>,
    score: i32,
}

#[derive(Debug, Clone)]
pub struct PathPlanner {
    config: PlannerConfig,
}

impl PathPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        PathPlanner { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plans up to `steps` moves from `origin`.
    ///
    /// Returns `steps + 1` positions starting at `origin` when a full-length
    /// path exists, otherwise the best of the longest paths found, or just
    /// `[origin]` when boxed in. Ties keep the path discovered first.
    ///
    /// # Panics
    /// If `origin` is off the board
    pub fn plan<R: Rng + ?Sized>(
        &self,
        origin: Position,
        grid: &Grid,
        steps: usize,
        rng: &mut R,
    ) -> Vec<Position> {
        let _profile = ProfileGuard::new("plan");

        let origin_idx = grid.index_of(origin);
        let me = grid.occupant(origin);
        let total = grid.total();

        let mut nodes = vec![Node {
            pos: origin,
            depth: 0,
            parent: None,
            score: 0,
        }];
        let mut visited = vec![false; total * (steps + 1)];
        visited[origin_idx] = true;

        let mut queue = VecDeque::from([0usize]);
        let mut best_complete: Option<usize> = None;
        let mut best_partial = 0usize;

        while let Some(current) = queue.pop_front() {
            let node = nodes[current];

            if node.depth == steps {
                if best_complete.map_or(true, |best| node.score > nodes[best].score) {
                    best_complete = Some(current);
                }
                continue;
            }

            let partial = nodes[best_partial];
            if node.depth > partial.depth || (node.depth == partial.depth && node.score > partial.score) {
                best_partial = current;
            }

            for dir in Direction::all() {
                let next = dir.apply(&node.pos);
                if !grid.in_bounds(next) {
                    continue;
                }
                let depth = node.depth + 1;
                let slot = depth * total + grid.index_of(next);
                if visited[slot] {
                    continue;
                }
                if let Some(occupant) = grid.occupant(next) {
                    if Some(occupant) != me {
                        continue;
                    }
                }

                let score = node.score + self.score_step(origin, next, grid, me, rng);
                visited[slot] = true;
                nodes.push(Node {
                    pos: next,
                    depth,
                    parent: Some(current),
                    score,
                });
                queue.push_back(nodes.len() - 1);
            }
        }

        let chosen = best_complete.unwrap_or(best_partial);
        Self::unwind(&nodes, chosen)
    }

    fn unwind(nodes: &[Node], mut idx: usize) -> Vec<Position> {
        let mut path = vec![nodes[idx].pos];
        while let Some(parent) = nodes[idx].parent {
            path.push(nodes[parent].pos);
            idx = parent;
        }
        path.reverse();
        path
    }

    /// Incremental value of stepping onto `next` on a path that began at `origin`
    pub fn score_step<R: Rng + ?Sized>(
        &self,
        origin: Position,
        next: Position,
        grid: &Grid,
        me: Option<AgentId>,
        rng: &mut R,
    ) -> i32 {
        let cfg = &self.config;

        // Traps are invisible to players
        let mut add = match grid.cell_content(next) {
            Booster::Coin(amount) => (amount.min(i32::MAX as u32) as i32).min(cfg.coin_value_cap).max(1),
            Booster::Heal => cfg.heal_bonus,
            Booster::Poison | Booster::None => 0,
        };

        let crowd = self.congestion(grid, next, me);
        if crowd > cfg.crowd_threshold {
            add -= crowd * cfg.crowd_penalty;
        } else if crowd == 0 {
            add += cfg.open_area_bonus;
        }

        let distance = origin.manhattan(&next);
        add += (distance / cfg.exploration_divisor).min(cfg.exploration_cap);
        if distance > cfg.far_distance {
            add -= distance / cfg.far_penalty_divisor;
        }

        if cfg.jitter_max > 0 {
            add += rng.random_range(0..cfg.jitter_max);
        }

        add
    }

    /// Other agents within `congestion_radius` (square neighbourhood) of `center`
    fn congestion(&self, grid: &Grid, center: Position, me: Option<AgentId>) -> i32 {
        let radius = self.config.congestion_radius;
        let mut count = 0;
        for dr in -radius..=radius {
            for dc in -radius..=radius {
                let pos = Position::new(center.row + dr, center.col + dc);
                if !grid.in_bounds(pos) {
                    continue;
                }
                if let Some(occupant) = grid.occupant(pos) {
                    if Some(occupant) != me {
                        count += 1;
                    }
                }
            }
        }
        count
    }
}
