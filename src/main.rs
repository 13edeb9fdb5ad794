use log::{error, info};
use std::env;

use concurrent_board::config::Config;
use concurrent_board::results_logger::{save_standings, ResultsLogger};
use concurrent_board::session::{format_standings, Session};

/// Reads `--config <path>`, or falls back to Game.toml / the hardcoded defaults
fn load_config(args: &[String]) -> Result<Config, String> {
    match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = args
                .get(i + 1)
                .ok_or_else(|| "--config needs a file path".to_string())?;
            Config::from_file(path)
        }
        None => Ok(Config::load_or_default()),
    }
}

#[tokio::main]
async fn main() {
    // We default to 'info' level logging. But if the `RUST_LOG` environment variable is set,
    // we keep that value instead.
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }

    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let results = config.results.clone();
    let logger = ResultsLogger::new(config.debug.enabled, &config.debug.log_file_path).await;
    let session = match Session::new(config) {
        Ok(session) => session.with_logger(logger),
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting concurrent board...");

    let report = match session.run().await {
        Ok(report) => report,
        Err(e) => {
            error!("Game aborted: {}", e);
            std::process::exit(1);
        }
    };

    println!();
    println!("{}", report.final_board);
    println!("============================================================");
    println!("Final standings ({:.1}s)", report.elapsed.as_secs_f64());
    println!("============================================================");
    print!("{}", format_standings(&report.standings));
    println!(
        "Boosters left: {} coin, {} heal, {} poison",
        report.census.coin, report.census.heal, report.census.poison
    );

    if results.enabled {
        if let Err(e) = save_standings(&results.directory, &report.standings).await {
            error!("{}", e);
        }
    }

    if !report.abandoned.is_empty() {
        eprintln!("Agents that never stopped: {}", report.abandoned.join(", "));
        std::process::exit(2);
    }
}
