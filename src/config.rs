// Configuration module for reading Game.toml
// Board size, agent timing, booster targets, planner weights and session limits

use rand::Rng;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::grid::BoosterTargets;
use crate::types::BoosterKind;

/// Main configuration structure containing all tunable parameters
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    pub board: BoardConfig,
    pub players: PlayersConfig,
    pub robots: RobotsConfig,
    pub targets: TargetsConfig,
    pub planner: PlannerConfig,
    pub session: SessionConfig,
    pub results: ResultsConfig,
    pub debug: DebugConfig,
}

/// Board dimensions, fixed for the whole game
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BoardConfig {
    pub rows: i32,
    pub cols: i32,
}

impl BoardConfig {
    pub fn total(&self) -> usize {
        (self.rows.max(0) as usize) * (self.cols.max(0) as usize)
    }
}

/// Inclusive millisecond range an agent sleeps between actions
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct IntervalMs {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl IntervalMs {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        IntervalMs { min_ms, max_ms }
    }

    /// Draws a uniformly random duration in `[min_ms, max_ms]`
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_millis(rng.random_range(self.min_ms..=self.max_ms))
    }

    fn validate(&self, name: &str) -> Result<(), String> {
        if self.min_ms > self.max_ms {
            return Err(format!(
                "{}: min_ms ({}) is greater than max_ms ({})",
                name, self.min_ms, self.max_ms
            ));
        }
        Ok(())
    }
}

/// How players are first put on the board
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Random,
    /// Corners first, random for the rest or when a corner is taken
    Corners,
}

/// Player roster and behaviour
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PlayersConfig {
    pub names: Vec<String>,
    pub initial_life: i32,
    pub think: IntervalMs,
    pub min_steps: usize,
    pub max_steps: usize,
    pub step_pause_ms: u64,
    pub placement: Placement,
}

/// Per-kind robot pool
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RobotConfig {
    pub count: usize,
    pub interval: IntervalMs,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RobotsConfig {
    pub coin: RobotConfig,
    pub heal: RobotConfig,
    pub poison: RobotConfig,
    pub coin_amounts: Vec<u32>,
    pub failure_backoff_ms: u64,
    pub exhaust_after_failures: u32,
}

impl RobotsConfig {
    pub fn for_kind(&self, kind: BoosterKind) -> &RobotConfig {
        match kind {
            BoosterKind::Coin => &self.coin,
            BoosterKind::Heal => &self.heal,
            BoosterKind::Poison => &self.poison,
        }
    }
}

/// A booster target, either relative to the board size or absolute
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TargetSpec {
    Fraction(f64),
    Count(usize),
}

impl TargetSpec {
    /// Fractions resolve to `max(1, floor(total * f))`
    pub fn resolve(&self, total: usize) -> usize {
        match *self {
            TargetSpec::Fraction(f) => ((total as f64 * f).floor() as usize).max(1),
            TargetSpec::Count(n) => n,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TargetsConfig {
    pub coin: TargetSpec,
    pub heal: TargetSpec,
    pub poison: TargetSpec,
}

impl TargetsConfig {
    pub fn resolve(&self, total: usize) -> BoosterTargets {
        BoosterTargets {
            coin: self.coin.resolve(total),
            heal: self.heal.resolve(total),
            poison: self.poison.resolve(total),
        }
    }
}

/// Path scoring weights
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PlannerConfig {
    pub coin_value_cap: i32,
    pub heal_bonus: i32,
    pub congestion_radius: i32,
    pub crowd_threshold: i32,
    pub crowd_penalty: i32,
    pub open_area_bonus: i32,
    pub exploration_divisor: i32,
    pub exploration_cap: i32,
    pub far_distance: i32,
    pub far_penalty_divisor: i32,
    pub jitter_max: i32,
}

/// Lifecycle controller limits
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SessionConfig {
    pub duration_secs: u64,
    pub poll_interval_ms: u64,
    pub render_interval_ms: u64,
    pub join_timeout_ms: u64,
    pub stop_when_one_alive: bool,
}

/// Ranked standings file written after every game
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ResultsConfig {
    pub enabled: bool,
    pub directory: String,
}

/// Debug configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DebugConfig {
    pub enabled: bool,
    pub log_file_path: String,
    pub reveal_traps: bool,
}

impl Config {
    /// Loads configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the Game.toml configuration file
    ///
    /// # Returns
    /// * `Result<Config, String>` - Parsed configuration or error message
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        toml::from_str(&contents).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Loads default configuration from Game.toml in the project root
    pub fn load_default() -> Result<Self, String> {
        Self::from_file("Game.toml")
    }

    /// Creates a configuration with hardcoded default values as fallback
    /// This should match the values shipped in Game.toml
    pub fn default_hardcoded() -> Self {
        Config {
            board: BoardConfig { rows: 10, cols: 10 },
            players: PlayersConfig {
                names: vec!["Ana".to_string(), "Bruno".to_string(), "Carla".to_string()],
                initial_life: 3,
                think: IntervalMs::new(350, 550),
                min_steps: 1,
                max_steps: 6,
                step_pause_ms: 80,
                placement: Placement::Random,
            },
            robots: RobotsConfig {
                coin: RobotConfig {
                    count: 1,
                    interval: IntervalMs::new(200, 400),
                },
                heal: RobotConfig {
                    count: 1,
                    interval: IntervalMs::new(200, 400),
                },
                poison: RobotConfig {
                    count: 1,
                    interval: IntervalMs::new(800, 1500),
                },
                coin_amounts: vec![1, 2, 5, 10],
                failure_backoff_ms: 200,
                exhaust_after_failures: 3,
            },
            targets: TargetsConfig {
                coin: TargetSpec::Fraction(0.10),
                heal: TargetSpec::Count(8),
                poison: TargetSpec::Fraction(0.10),
            },
            planner: PlannerConfig {
                coin_value_cap: 10,
                heal_bonus: 3,
                congestion_radius: 2,
                crowd_threshold: 1,
                crowd_penalty: 6,
                open_area_bonus: 12,
                exploration_divisor: 3,
                exploration_cap: 4,
                far_distance: 4,
                far_penalty_divisor: 2,
                jitter_max: 12,
            },
            session: SessionConfig {
                duration_secs: 60,
                poll_interval_ms: 200,
                render_interval_ms: 300,
                join_timeout_ms: 2000,
                stop_when_one_alive: true,
            },
            results: ResultsConfig {
                enabled: true,
                directory: "results".to_string(),
            },
            debug: DebugConfig {
                enabled: false,
                log_file_path: "board_results.jsonl".to_string(),
                reveal_traps: false,
            },
        }
    }

    /// Attempts to load from file, falls back to hardcoded defaults on error
    pub fn load_or_default() -> Self {
        Self::load_default().unwrap_or_else(|e| {
            log::warn!("Could not load Game.toml ({}), using hardcoded defaults", e);
            Self::default_hardcoded()
        })
    }

    /// Rejects values that would break the grid or agent contracts
    pub fn validate(&self) -> Result<(), String> {
        if self.board.rows < 1 || self.board.cols < 1 {
            return Err(format!(
                "board must be at least 1x1, got {}x{}",
                self.board.rows, self.board.cols
            ));
        }
        if self.players.names.len() > self.board.total() {
            return Err(format!(
                "{} players do not fit on a board of {} cells",
                self.players.names.len(),
                self.board.total()
            ));
        }
        if self.players.min_steps == 0 || self.players.min_steps > self.players.max_steps {
            return Err(format!(
                "invalid step range {}..={}",
                self.players.min_steps, self.players.max_steps
            ));
        }
        if self.players.initial_life <= 0 {
            return Err("players.initial_life must be positive".to_string());
        }
        self.players.think.validate("players.think")?;
        for kind in BoosterKind::all() {
            self.robots
                .for_kind(kind)
                .interval
                .validate(&format!("robots.{}.interval", kind.as_str()))?;
        }
        if self.robots.coin_amounts.is_empty() || self.robots.coin_amounts.contains(&0) {
            return Err("robots.coin_amounts must be a non-empty list of positive amounts".to_string());
        }
        for (name, spec) in [
            ("coin", self.targets.coin),
            ("heal", self.targets.heal),
            ("poison", self.targets.poison),
        ] {
            if let TargetSpec::Fraction(f) = spec {
                if !(0.0..=1.0).contains(&f) {
                    return Err(format!("targets.{} fraction {} is outside [0, 1]", name, f));
                }
            }
        }
        if self.results.enabled && self.results.directory.trim().is_empty() {
            return Err("results.directory must be set when results are enabled".to_string());
        }
        if self.planner.exploration_divisor <= 0 || self.planner.far_penalty_divisor <= 0 {
            return Err("planner divisors must be positive".to_string());
        }
        if self.planner.jitter_max < 0 || self.planner.congestion_radius < 0 {
            return Err("planner jitter_max and congestion_radius must not be negative".to_string());
        }
        Ok(())
    }
}
