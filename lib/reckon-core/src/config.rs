use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use snafu::{ensure, Snafu};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 6379;

/// A configuration error.
#[derive(Debug, PartialEq, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ConfigurationError {
    /// The store host was empty.
    #[snafu(display("Store host must not be empty."))]
    EmptyHost,

    /// The store address could not be parsed.
    #[snafu(display("Invalid store address '{}': {}", address, reason))]
    InvalidAddress {
        /// The address as given.
        address: String,

        /// Why the address was rejected.
        reason: String,
    },

    /// The sample rate was outside of `[0.0, 1.0]`.
    #[snafu(display("Sample rate must be between 0.0 and 1.0, got {}.", rate))]
    SampleRateOutOfRange {
        /// The rejected sample rate.
        rate: f64,
    },

    /// Random sampling was configured to take no samples at all.
    #[snafu(display("Random sampling requires either a non-zero minimum sample count or a non-zero sample rate."))]
    NoSamplesRequested,

    /// The scan glob was empty, which would match no keys.
    #[snafu(display("Glob expression is empty; no keys will ever match."))]
    EmptyGlob,
}

/// Network address of a single store instance.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreAddress {
    host: String,
    port: u16,
}

impl StoreAddress {
    /// Creates a new `StoreAddress`.
    ///
    /// # Errors
    ///
    /// If `host` is empty, an error is returned.
    pub fn new<H: Into<String>>(host: H, port: u16) -> Result<Self, ConfigurationError> {
        let host = host.into();
        ensure!(!host.is_empty(), EmptyHost);
        Ok(Self { host, port })
    }

    /// Returns the host portion of the address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port portion of the address.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Default for StoreAddress {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl fmt::Display for StoreAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for StoreAddress {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigurationError::InvalidAddress {
            address: s.to_string(),
            reason: reason.to_string(),
        };

        let (host, port) = s.rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
        let host = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host);
        let port = port.parse::<u16>().map_err(|e| invalid(&e.to_string()))?;

        Self::new(host, port)
    }
}

impl TryFrom<String> for StoreAddress {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StoreAddress> for String {
    fn from(value: StoreAddress) -> Self {
        value.to_string()
    }
}

/// How keys are selected for examination.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "mode")]
pub enum SamplingMode {
    /// Repeatedly draw random keys.
    ///
    /// Draws are made with replacement, so the same key may be examined more than once. The number of draws is the
    /// greater of `min_samples` and `sample_rate` multiplied by the instance's key count, and never less than one.
    #[serde(rename = "random")]
    RandomSample {
        /// Minimum number of random draws.
        #[serde(default)]
        min_samples: u64,

        /// Fraction of the keyspace to draw, between 0.0 and 1.0.
        #[serde(default)]
        sample_rate: f64,
    },

    /// Enumerate every key matching a glob with a cursor-based scan.
    ///
    /// Keys added or removed while the scan is running may be observed zero, one, or several times.
    #[serde(rename = "scan")]
    PatternScan {
        /// Glob-style pattern that keys must match.
        glob: String,
    },
}

impl SamplingMode {
    /// Validates the mode-specific constraints.
    ///
    /// # Errors
    ///
    /// If the sample rate is outside of `[0.0, 1.0]`, if random sampling would take no samples, or if the scan glob is
    /// empty, an error is returned.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self {
            Self::RandomSample {
                min_samples,
                sample_rate,
            } => {
                let rate = *sample_rate;
                ensure!((0.0..=1.0).contains(&rate), SampleRateOutOfRange { rate });
                ensure!(*min_samples > 0 || rate > 0.0, NoSamplesRequested);
                Ok(())
            }
            Self::PatternScan { glob } => {
                ensure!(!glob.is_empty(), EmptyGlob);
                Ok(())
            }
        }
    }

    /// Returns the number of observations a random sampling run should make for a keyspace of `key_count` keys.
    ///
    /// Returns `None` for pattern scans, which run until the scan completes rather than to a fixed count.
    pub fn sample_target(&self, key_count: u64) -> Option<u64> {
        match self {
            Self::RandomSample {
                min_samples,
                sample_rate,
            } => {
                let by_rate = (key_count as f64 * sample_rate).floor() as u64;
                Some((*min_samples).max(by_rate).max(1))
            }
            Self::PatternScan { .. } => None,
        }
    }

    /// Returns `true` if this mode is a pattern scan.
    pub fn is_scan(&self) -> bool {
        matches!(self, Self::PatternScan { .. })
    }
}

/// Configuration for a single sampling run against one store instance.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RunConfig {
    /// Address of the store instance.
    #[serde(default)]
    pub address: StoreAddress,

    /// How keys are selected.
    #[serde(flatten)]
    pub mode: SamplingMode,
}

impl RunConfig {
    /// Creates a validated configuration for random sampling.
    ///
    /// # Errors
    ///
    /// If the sampling parameters are invalid, an error is returned.
    pub fn random_sample(
        address: StoreAddress, min_samples: u64, sample_rate: f64,
    ) -> Result<Self, ConfigurationError> {
        Self::new(
            address,
            SamplingMode::RandomSample {
                min_samples,
                sample_rate,
            },
        )
    }

    /// Creates a validated configuration for a pattern scan.
    ///
    /// # Errors
    ///
    /// If `glob` is empty, an error is returned.
    pub fn pattern_scan<G: Into<String>>(address: StoreAddress, glob: G) -> Result<Self, ConfigurationError> {
        Self::new(address, SamplingMode::PatternScan { glob: glob.into() })
    }

    fn new(address: StoreAddress, mode: SamplingMode) -> Result<Self, ConfigurationError> {
        let config = Self { address, mode };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// If the host is empty or the sampling mode is invalid, an error is returned.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        ensure!(!self.address.host.is_empty(), EmptyHost);
        self.mode.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localhost() -> StoreAddress {
        StoreAddress::default()
    }

    #[test]
    fn random_sample_requires_some_samples() {
        let err = RunConfig::random_sample(localhost(), 0, 0.0).unwrap_err();
        assert_eq!(err, ConfigurationError::NoSamplesRequested);

        assert!(RunConfig::random_sample(localhost(), 1, 0.0).is_ok());
        assert!(RunConfig::random_sample(localhost(), 0, 0.25).is_ok());
    }

    #[test]
    fn random_sample_rate_bounds() {
        for rate in [-0.1, 1.01, f64::NAN, f64::INFINITY] {
            let err = RunConfig::random_sample(localhost(), 10, rate).unwrap_err();
            assert!(matches!(err, ConfigurationError::SampleRateOutOfRange { .. }));
        }

        assert!(RunConfig::random_sample(localhost(), 10, 1.0).is_ok());
    }

    #[test]
    fn pattern_scan_rejects_empty_glob() {
        let err = RunConfig::pattern_scan(localhost(), "").unwrap_err();
        assert_eq!(err, ConfigurationError::EmptyGlob);

        assert!(RunConfig::pattern_scan(localhost(), "user:*").is_ok());
    }

    #[test]
    fn sample_target() {
        let mode = SamplingMode::RandomSample {
            min_samples: 50,
            sample_rate: 0.1,
        };
        assert_eq!(mode.sample_target(100), Some(50));
        assert_eq!(mode.sample_target(10_000), Some(1_000));

        let mode = SamplingMode::RandomSample {
            min_samples: 0,
            sample_rate: 0.01,
        };
        assert_eq!(mode.sample_target(10), Some(1));

        let mode = SamplingMode::PatternScan { glob: "*".into() };
        assert_eq!(mode.sample_target(10), None);
    }

    #[test]
    fn address_parsing() {
        let addr: StoreAddress = "cache-1.internal:6380".parse().unwrap();
        assert_eq!(addr.host(), "cache-1.internal");
        assert_eq!(addr.port(), 6380);
        assert_eq!(addr.to_string(), "cache-1.internal:6380");

        let addr: StoreAddress = "[::1]:6379".parse().unwrap();
        assert_eq!(addr.host(), "::1");
        assert_eq!(addr.to_string(), "[::1]:6379");

        assert!(matches!(
            "localhost".parse::<StoreAddress>(),
            Err(ConfigurationError::InvalidAddress { .. })
        ));
        assert!(matches!(
            "localhost:redis".parse::<StoreAddress>(),
            Err(ConfigurationError::InvalidAddress { .. })
        ));
        assert_eq!(":6379".parse::<StoreAddress>(), Err(ConfigurationError::EmptyHost));
    }

    #[test]
    fn deserialize_run_config() {
        let config: RunConfig = serde_yaml::from_str(
            r#"
address: "10.0.0.7:6379"
mode: random
min_samples: 200
sample_rate: 0.05
"#,
        )
        .unwrap();
        assert_eq!(config.address.to_string(), "10.0.0.7:6379");
        assert_eq!(
            config.mode,
            SamplingMode::RandomSample {
                min_samples: 200,
                sample_rate: 0.05
            }
        );
        assert!(config.validate().is_ok());

        let config: RunConfig = serde_yaml::from_str(
            r#"
mode: scan
glob: ""
"#,
        )
        .unwrap();
        assert_eq!(config.address, StoreAddress::default());
        assert_eq!(config.validate(), Err(ConfigurationError::EmptyGlob));
    }
}
