//! SHARPEDGE: quantitative sports betting decision engine.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! reads a JSON file of analysis requests, evaluates them concurrently and
//! prints a JSON report on stdout. Logs go to stderr.
//!
//! Usage: `sharpedge <requests.json> [history.json]`

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use sharpedge::config::{self, AppConfig};
use sharpedge::engine::{AnalysisRequest, BatchRunner};
use sharpedge::history::{GradedPick, TrackRecord};

const USAGE: &str = "usage: sharpedge <requests.json> [history.json]";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = AppConfig::default_path();
    let config_found = Path::new(&config_path).exists();
    let cfg = if config_found {
        AppConfig::load(&config_path)?
    } else {
        AppConfig::default()
    };

    init_logging(&cfg);
    if !config_found {
        warn!(config = %config_path, "Config file not found, using built-in defaults");
    }

    let mut args = std::env::args().skip(1);
    let requests_path = args.next().context(USAGE)?;
    let history_path = args.next();

    let requests: Vec<AnalysisRequest> = read_json(&requests_path)?;
    info!(
        config = %config_path,
        requests = requests.len(),
        bankroll = cfg.engine.bankroll,
        kelly_fraction = cfg.engine.kelly_fraction,
        "SHARPEDGE starting up"
    );

    let mut runner = BatchRunner::new(&cfg);
    if let Some(path) = history_path {
        let picks: Vec<GradedPick> = read_json(&path)?;
        let record = TrackRecord::from_picks(picks);
        let calibration = record.calibration();
        info!(
            graded = record.len(),
            streak = record.current_streak(),
            brier = format!("{:.3}", calibration.overall_brier),
            diagnosis = ?calibration.diagnosis,
            "Track record loaded"
        );
        runner = runner.with_history(record);
    }

    let report = runner.run(requests).await;
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    println!("{json}");
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {path}"))
}

fn init_logging(cfg: &config::AppConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.filter));

    let json_logging = cfg.logging.json || std::env::var("SHARPEDGE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .init();
    }
}
