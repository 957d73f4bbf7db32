use std::path::PathBuf;

use clap::Parser;
use reckon_core::StoreAddress;

use crate::config::AggregatorKind;

/// Samples the keyspace of one or more Redis-protocol stores and reports on the shape of the data they hold.
#[derive(Clone, Debug, Default, Parser)]
#[command(version)]
pub struct Cli {
    /// Path to a YAML configuration file.
    ///
    /// Settings from the file are overridden by `RECKON_`-prefixed environment variables, which are in turn overridden
    /// by command-line flags.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Address of a store instance to sample. May be given multiple times.
    #[arg(long = "redis", value_name = "HOST:PORT")]
    pub instances: Vec<StoreAddress>,

    /// Scan every key matching this glob instead of sampling randomly.
    #[arg(long = "scan", value_name = "GLOB")]
    pub glob: Option<String>,

    /// Minimum number of keys to sample from each instance.
    #[arg(long)]
    pub min_samples: Option<u64>,

    /// Fraction of each instance's keyspace to sample, between 0.0 and 1.0.
    #[arg(long)]
    pub sample_rate: Option<f64>,

    /// How keys are grouped into buckets.
    #[arg(long, value_enum)]
    pub aggregator: Option<AggregatorKind>,

    /// Keep merging results from healthy instances when others fail.
    #[arg(long)]
    pub isolate_failures: bool,

    /// Write one report file per bucket into this directory, instead of printing to standard output.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long)]
    pub log_format_json: bool,
}
