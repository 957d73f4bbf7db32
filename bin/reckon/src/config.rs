use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::ValueEnum;
use figment::{
    providers::{Env, Format as _, Serialized, Yaml},
    Figment,
};
use reckon_core::{
    Aggregator, AnyKey, ByFirstLetter, ByNamespace, ByValueType, ConfigurationError, RunConfig, SamplingMode,
    StoreAddress,
};
use reckon_engine::FailurePolicy;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

const ENV_PREFIX: &str = "RECKON_";

const fn default_min_samples() -> u64 {
    100
}

const fn default_sample_rate() -> f64 {
    0.1
}

fn default_instances() -> Vec<StoreAddress> {
    vec![StoreAddress::default()]
}

/// Bucketing policy selectable from configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AggregatorKind {
    /// Every key goes into a single `any-key` bucket.
    #[default]
    AnyKey,

    /// One bucket per value type.
    ByType,

    /// One bucket per key prefix, up to the first `:`.
    ByNamespace,

    /// One bucket per first character of the key.
    ByFirstLetter,
}

impl AggregatorKind {
    /// Builds the aggregator.
    pub fn build(self) -> Arc<dyn Aggregator> {
        match self {
            Self::AnyKey => Arc::new(AnyKey),
            Self::ByType => Arc::new(ByValueType),
            Self::ByNamespace => Arc::new(ByNamespace::default()),
            Self::ByFirstLetter => Arc::new(ByFirstLetter),
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AppConfig {
    /// Store instances to sample.
    #[serde(default = "default_instances")]
    pub instances: Vec<StoreAddress>,

    /// Minimum number of keys to sample from each instance.
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,

    /// Fraction of each instance's keyspace to sample.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,

    /// When set, every key matching this glob is scanned instead of sampling randomly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glob: Option<String>,

    /// Bucketing policy.
    #[serde(default)]
    pub aggregator: AggregatorKind,

    /// Whether a failed instance is reported and skipped instead of failing the whole run.
    #[serde(default)]
    pub isolate_failures: bool,

    /// Directory to write per-bucket reports into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// Whether logs are emitted as JSON.
    #[serde(default)]
    pub log_format_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            instances: default_instances(),
            min_samples: default_min_samples(),
            sample_rate: default_sample_rate(),
            glob: None,
            aggregator: AggregatorKind::default(),
            isolate_failures: false,
            output_dir: None,
            log_format_json: false,
        }
    }
}

/// Settings given explicitly on the command line.
#[derive(Default, Serialize)]
struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    instances: Option<Vec<StoreAddress>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    min_samples: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    sample_rate: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    glob: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    aggregator: Option<AggregatorKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    isolate_failures: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    output_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    log_format_json: Option<bool>,
}

impl From<&Cli> for CliOverrides {
    fn from(cli: &Cli) -> Self {
        Self {
            instances: (!cli.instances.is_empty()).then(|| cli.instances.clone()),
            min_samples: cli.min_samples,
            sample_rate: cli.sample_rate,
            glob: cli.glob.clone(),
            aggregator: cli.aggregator,
            isolate_failures: cli.isolate_failures.then_some(true),
            output_dir: cli.output_dir.clone(),
            log_format_json: cli.log_format_json.then_some(true),
        }
    }
}

impl AppConfig {
    /// Loads the configuration.
    ///
    /// Built-in defaults are layered under the configuration file given by `--config` (if any), then environment
    /// variables prefixed with `RECKON_`, and finally any flags given on the command line.
    ///
    /// # Errors
    ///
    /// If the configuration file cannot be read, or the merged configuration cannot be deserialized, an error is
    /// returned.
    pub fn load(cli: &Cli) -> Result<Self, anyhow::Error> {
        Self::load_with_env_prefix(cli, ENV_PREFIX)
    }

    fn load_with_env_prefix(cli: &Cli, env_prefix: &str) -> Result<Self, anyhow::Error> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

        if let Some(path) = &cli.config {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read configuration file '{}'.", path.display()))?;
            figment = figment.merge(Yaml::string(&contents));
        }

        figment
            .merge(Env::prefixed(env_prefix))
            .merge(Serialized::defaults(CliOverrides::from(cli)))
            .extract()
            .context("Failed to load configuration.")
    }

    /// Returns the sampling mode described by this configuration.
    pub fn sampling_mode(&self) -> SamplingMode {
        match &self.glob {
            Some(glob) => SamplingMode::PatternScan { glob: glob.clone() },
            None => SamplingMode::RandomSample {
                min_samples: self.min_samples,
                sample_rate: self.sample_rate,
            },
        }
    }

    /// Returns a validated run configuration for every instance.
    ///
    /// # Errors
    ///
    /// If the sampling settings are invalid, an error is returned.
    pub fn run_configs(&self) -> Result<Vec<RunConfig>, ConfigurationError> {
        let mode = self.sampling_mode();
        mode.validate()?;

        Ok(self
            .instances
            .iter()
            .map(|address| RunConfig {
                address: address.clone(),
                mode: mode.clone(),
            })
            .collect())
    }

    /// Returns the failure policy for multi-instance runs.
    pub fn failure_policy(&self) -> FailurePolicy {
        if self.isolate_failures {
            FailurePolicy::Isolate
        } else {
            FailurePolicy::FailFast
        }
    }
}
