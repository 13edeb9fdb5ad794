// Robot agent: keeps the board stocked with one kind of booster
//
// Robots hold no position. Each cycle sleeps a random interval and tries one
// placement. A failed placement is transient (board momentarily full or target
// momentarily met) and is followed by a short backoff. Heal and poison robots
// are never needed again once their target is met, so repeated failures at
// target end them as Exhausted; coin robots run until stopped.

use log::{debug, info};
use rand::seq::IndexedRandom;
use rand::Rng;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

use crate::config::{IntervalMs, RobotsConfig};
use crate::grid::Grid;
use crate::player::{nap, StopSignal};
use crate::profiler;
use crate::types::{AgentEvent, Booster, BoosterKind, EventSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RobotState {
    Running = 0,
    Exhausted = 1,
    Stopped = 2,
}

impl RobotState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RobotState::Running,
            1 => RobotState::Exhausted,
            _ => RobotState::Stopped,
        }
    }
}

#[derive(Debug)]
pub struct Robot {
    kind: BoosterKind,
    index: usize,
    interval: IntervalMs,
    coin_amounts: Vec<u32>,
    backoff: Duration,
    exhaust_after: u32,
    state: AtomicU8,
    placed: AtomicU64,
    stop: StopSignal,
}

impl Robot {
    /// Creates the `index`-th robot of `kind` with the pacing from `[robots]`
    pub fn new(kind: BoosterKind, index: usize, config: &RobotsConfig) -> Self {
        Robot {
            kind,
            index,
            interval: config.for_kind(kind).interval,
            coin_amounts: config.coin_amounts.clone(),
            backoff: Duration::from_millis(config.failure_backoff_ms),
            exhaust_after: config.exhaust_after_failures.max(1),
            state: AtomicU8::new(RobotState::Running as u8),
            placed: AtomicU64::new(0),
            stop: StopSignal::new(),
        }
    }

    pub fn kind(&self) -> BoosterKind {
        self.kind
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn label(&self) -> String {
        format!("robot-{}-{}", self.kind.as_str(), self.index)
    }

    pub fn state(&self) -> RobotState {
        RobotState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Boosters this robot has put on the board
    pub fn placed(&self) -> u64 {
        self.placed.load(Ordering::Relaxed)
    }

    /// Idempotent
    pub fn stop(&self) {
        self.stop.stop();
    }

    fn next_booster<R: Rng + ?Sized>(&self, rng: &mut R) -> Booster {
        match self.kind {
            BoosterKind::Coin => Booster::Coin(*self.coin_amounts.choose(rng).unwrap_or(&1)),
            BoosterKind::Heal => Booster::Heal,
            BoosterKind::Poison => Booster::Poison,
        }
    }

    /// Runs the robot until it is stopped or exhausted and returns its terminal state
    pub fn run<R: Rng + ?Sized>(
        &self,
        grid: &Grid,
        session_stop: &StopSignal,
        events: Option<&EventSender>,
        rng: &mut R,
    ) -> RobotState {
        let signals = [&self.stop, session_stop];
        let mut failures_at_target = 0u32;

        info!("{} starts (target {})", self.label(), grid.target(self.kind));

        let final_state = loop {
            if signals.iter().any(|s| s.is_stopped()) {
                break RobotState::Stopped;
            }
            if !nap(self.interval.sample(rng), &signals) {
                break RobotState::Stopped;
            }

            let booster = self.next_booster(rng);
            if grid.place_booster(booster, rng) {
                self.placed.fetch_add(1, Ordering::Relaxed);
                failures_at_target = 0;
                continue;
            }

            let at_target = grid.booster_count(self.kind) >= grid.target(self.kind);
            if at_target && !self.kind.replenishes() {
                failures_at_target += 1;
                if failures_at_target >= self.exhaust_after {
                    break RobotState::Exhausted;
                }
            } else {
                failures_at_target = 0;
            }
            debug!("{} could not place {:?}, backing off", self.label(), booster);

            if !nap(self.backoff, &signals) {
                break RobotState::Stopped;
            }
        };

        self.state.store(final_state as u8, Ordering::Release);
        profiler::merge_thread_local();

        let event = match final_state {
            RobotState::Exhausted => {
                info!("{} exhausted after placing {}", self.label(), self.placed());
                AgentEvent::RobotExhausted {
                    kind: self.kind,
                    index: self.index,
                    placed: self.placed(),
                }
            }
            _ => AgentEvent::RobotStopped {
                kind: self.kind,
                index: self.index,
                placed: self.placed(),
            },
        };
        if let Some(tx) = events {
            let _ = tx.send(event);
        }

        final_state
    }
}
