//! Data model for sampling the keyspace of a key-value store.
//!
//! This crate holds everything about a sampling run that does not touch the network: run configuration and its
//! validation, the value types a store can report, the pluggable bucketing policies, and the per-bucket results
//! (frequency tables, bounded example sets) along with the descriptive statistics computed over them.
#![deny(missing_docs)]

mod aggregator;
pub use self::aggregator::{Aggregator, AnyKey, ByFirstLetter, ByNamespace, ByValueType, Fanout, ANY_KEY_BUCKET};

mod bounded;
pub use self::bounded::BoundedSet;

mod config;
pub use self::config::{ConfigurationError, RunConfig, SamplingMode, StoreAddress};

mod histogram;
pub use self::histogram::FrequencyTable;

mod results;
pub use self::results::{
    merge_results_map, CollectionResults, HashResults, KeySample, Results, ResultsMap, StringResults,
    MAX_EXAMPLE_ELEMENTS, MAX_EXAMPLE_KEYS, MAX_EXAMPLE_VALUES,
};

mod stats;
pub use self::stats::Statistics;

mod value_type;
pub use self::value_type::ValueType;
