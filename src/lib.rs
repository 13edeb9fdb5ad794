// Library exports for the concurrent board game
// The runner binary, the stress harness and the integration tests all build on these

pub mod cell;
pub mod config;
pub mod grid;
pub mod planner;
pub mod player;
pub mod profiler;
pub mod render;
pub mod results_logger;
pub mod robot;
pub mod session;
pub mod types;
