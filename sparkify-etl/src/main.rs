//! sparkify-etl - batch star-schema ETL
//!
//! Reads song metadata and activity logs from the input base, writes the
//! `songs`, `artists`, `users`, `time` and `songplays` tables to the output
//! base, then releases the session. Runs with no arguments; every flag only
//! overrides configuration.

use anyhow::{Context, Result};
use clap::Parser;
use sparkify_common::config::{resolve_credentials, TomlConfig};
use sparkify_etl::EtlSession;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "sparkify-etl")]
#[command(about = "Build the Sparkify star schema from raw song and log data")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Base location holding song_data/ and log_data/
    #[arg(long, value_name = "PATH")]
    input_base: Option<PathBuf>,

    /// Base location receiving the output tables
    #[arg(long, value_name = "PATH")]
    output_base: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Bootstrap filter; replaced by the configured level unless RUST_LOG is set
    let env_filter = EnvFilter::try_from_default_env().ok();
    let has_env_filter = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    info!("Starting sparkify-etl v{}", env!("CARGO_PKG_VERSION"));

    let (mut config, source) = TomlConfig::load_with_source(args.config.as_deref())
        .context("Failed to load configuration")?;
    if !has_env_filter {
        filter_handle
            .reload(EnvFilter::new(&config.logging.level))
            .context("Failed to apply configured log level")?;
    }
    match source {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    if let Some(input_base) = args.input_base {
        config.input_base = input_base;
    }
    if let Some(output_base) = args.output_base {
        config.output_base = output_base;
    }

    let credentials = resolve_credentials(&config);
    let session = EtlSession::open_local(config, credentials)
        .context("Failed to open ETL session")?;

    let summary = match sparkify_etl::run(&session) {
        Ok(summary) => summary,
        Err(e) => {
            error!("ETL run {} failed: {}", session.run_id(), e);
            session.stop();
            return Err(e.into());
        }
    };

    info!(
        "Run summary: {} song records, {} log records, {} plays ({} matched to songs)",
        summary.song_records, summary.log_records, summary.play_events, summary.songplays_matched
    );
    session.stop();
    info!("ETL completed successfully");
    Ok(())
}
