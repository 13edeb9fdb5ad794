//! Lightweight timing of planner and grid operations
//!
//! Thread-local accumulators keep the hot path free of shared writes; each
//! agent thread merges into the global totals when it exits.
//! Enable with environment variable: BOARD_PROFILE=1

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    time_ns: u64,
    calls: usize,
}

thread_local! {
    static PLAN: RefCell<Tally> = RefCell::new(Tally::default());
    static MOVE: RefCell<Tally> = RefCell::new(Tally::default());
    static PLACE: RefCell<Tally> = RefCell::new(Tally::default());
}

struct GlobalTally {
    time_ns: AtomicU64,
    calls: AtomicUsize,
}

impl GlobalTally {
    const fn new() -> Self {
        GlobalTally {
            time_ns: AtomicU64::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    fn absorb(&self, local: &RefCell<Tally>) {
        let tally = local.replace(Tally::default());
        self.time_ns.fetch_add(tally.time_ns, Ordering::Relaxed);
        self.calls.fetch_add(tally.calls, Ordering::Relaxed);
    }

    fn load(&self) -> (u64, usize) {
        (
            self.time_ns.load(Ordering::Relaxed),
            self.calls.load(Ordering::Relaxed),
        )
    }

    fn reset(&self) {
        self.time_ns.store(0, Ordering::Relaxed);
        self.calls.store(0, Ordering::Relaxed);
    }
}

static GLOBAL_PLAN: GlobalTally = GlobalTally::new();
static GLOBAL_MOVE: GlobalTally = GlobalTally::new();
static GLOBAL_PLACE: GlobalTally = GlobalTally::new();

static ENABLED: OnceLock<bool> = OnceLock::new();

#[inline]
pub fn is_profiling_enabled() -> bool {
    *ENABLED.get_or_init(|| std::env::var("BOARD_PROFILE").is_ok())
}

pub struct ProfileGuard {
    start: Instant,
    category: &'static str,
}

impl ProfileGuard {
    pub fn new(category: &'static str) -> Option<Self> {
        if is_profiling_enabled() {
            Some(ProfileGuard {
                start: Instant::now(),
                category,
            })
        } else {
            None
        }
    }
}

impl Drop for ProfileGuard {
    fn drop(&mut self) {
        let elapsed_ns = self.start.elapsed().as_nanos() as u64;
        let bump = |t: &RefCell<Tally>| {
            let mut tally = t.borrow_mut();
            tally.time_ns += elapsed_ns;
            tally.calls += 1;
        };

        match self.category {
            "plan" => PLAN.with(bump),
            "move" => MOVE.with(bump),
            "place" => PLACE.with(bump),
            _ => {}
        }
    }
}

/// Folds this thread's tallies into the global totals
pub fn merge_thread_local() {
    if !is_profiling_enabled() {
        return;
    }

    PLAN.with(|t| GLOBAL_PLAN.absorb(t));
    MOVE.with(|t| GLOBAL_MOVE.absorb(t));
    PLACE.with(|t| GLOBAL_PLACE.absorb(t));
}

pub fn print_report(total_time_ms: u64) {
    if !is_profiling_enabled() {
        return;
    }

    let total_ns = total_time_ms * 1_000_000;

    eprintln!("\n═══════════════════════════════════════════════════════════");
    eprintln!("                 PERFORMANCE PROFILE");
    eprintln!("═══════════════════════════════════════════════════════════");
    eprintln!("Total Time: {}ms\n", total_time_ms);

    for (label, global) in [
        ("Path Planning", &GLOBAL_PLAN),
        ("Moves", &GLOBAL_MOVE),
        ("Booster Placement", &GLOBAL_PLACE),
    ] {
        let (time_ns, calls) = global.load();
        let ms = time_ns as f64 / 1_000_000.0;
        let pct = if total_ns > 0 { 100.0 * time_ns as f64 / total_ns as f64 } else { 0.0 };
        let avg_us = if calls > 0 { time_ns as f64 / (calls * 1000) as f64 } else { 0.0 };

        eprintln!("{}:", label);
        eprintln!("  Time:     {:.2}ms ({:.1}% of wall time, summed over threads)", ms, pct);
        eprintln!("  Calls:    {}", calls);
        eprintln!("  Avg:      {:.2}µs/call\n", avg_us);
    }

    eprintln!("═══════════════════════════════════════════════════════════\n");
}

pub fn reset() {
    GLOBAL_PLAN.reset();
    GLOBAL_MOVE.reset();
    GLOBAL_PLACE.reset();
}
