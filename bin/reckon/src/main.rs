//! Keyspace sampler.
//!
//! Samples the keyspace of one or more store instances, either by drawing random keys or by scanning every key that
//! matches a glob, and reports the distribution of value types, sizes, and example values per bucket.
#![deny(missing_docs)]

use std::time::Instant;

use anyhow::Context as _;
use clap::Parser as _;
use reckon_engine::Fleet;
use reckon_store::RedisConnector;
use tracing::{error, info, warn};
use tracing_subscriber::{filter::LevelFilter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

mod cli;
use self::cli::Cli;

mod config;
use self::config::AppConfig;

mod report;

#[tokio::main]
async fn main() {
    let started = Instant::now();
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            // Logging is not set up yet, since whether to log as JSON is itself configurable.
            eprintln!("{:?}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = initialize_logging(config.log_format_json) {
        eprintln!("failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    match run(config).await {
        Ok(()) => info!(elapsed = ?started.elapsed(), "Sampling complete."),
        Err(e) => {
            error!("{:?}", e);
            std::process::exit(1);
        }
    }
}

fn initialize_logging(json: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let level_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("RECKON_LOG_LEVEL")
        .from_env_lossy();

    // Reports go to stdout, so logs always go to stderr.
    if json {
        tracing_subscriber::registry()
            .with(fmt::Layer::new().json().with_writer(std::io::stderr))
            .with(level_filter)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(fmt::Layer::new().compact().with_writer(std::io::stderr))
            .with(level_filter)
            .try_init()?;
    }

    Ok(())
}

async fn run(config: AppConfig) -> Result<(), anyhow::Error> {
    let run_configs = config.run_configs().context("Invalid configuration.")?;

    let mut fleet = Fleet::new(config.aggregator.build()).with_failure_policy(config.failure_policy());
    for run_config in run_configs {
        let connector = RedisConnector::new(run_config.address.clone())
            .with_context(|| format!("Failed to create client for '{}'.", run_config.address))?;
        fleet = fleet.with_instance(run_config, connector);
    }

    info!(
        instances = config.instances.len(),
        aggregator = ?config.aggregator,
        "Starting sampling."
    );

    let output = fleet.execute().await.context("Sampling failed.")?;
    for failure in &output.failures {
        warn!(address = %failure.address, error = %failure.error, "Instance failed and was left out of the totals.");
    }

    info!(
        instances = output.instances_merged,
        total_key_count = output.total_key_count,
        buckets = output.totals.len(),
        "Merged results."
    );

    if output.instances_merged == 0 {
        anyhow::bail!("Every instance failed; nothing to report.");
    }

    report::write_all(&output.totals, config.output_dir.as_deref())
}
