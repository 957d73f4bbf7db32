//! Keyspace sampling engine.
//!
//! A [`Run`] samples a single store instance: it discovers the size of the keyspace, starts a [`KeyStream`] that
//! draws (or scans) keys in a background task, characterizes each key with the minimal follow-up requests for its
//! type, and folds the result into per-bucket [`Results`][reckon_core::Results] chosen by an
//! [`Aggregator`][reckon_core::Aggregator]. A [`Fleet`] runs many of these concurrently and merges their output.
#![deny(missing_docs)]

mod error;
pub use self::error::{FleetError, RunError};

mod fleet;
pub use self::fleet::{FailurePolicy, Fleet, FleetOutput, InstanceFailure};

mod runner;
pub use self::runner::{Run, RunOutput};

mod sampler;

mod source;
pub use self::source::{KeyStream, Observation};
