use reckon_core::{ConfigurationError, StoreAddress};
use reckon_store::StoreError;
use snafu::Snafu;

/// A run error.
///
/// Every run error is fatal to the run that produced it. No partial results are returned alongside an error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum RunError {
    /// The run configuration was invalid.
    #[snafu(display("Invalid run configuration: {}", source))]
    Configuration {
        /// Source of the error.
        source: ConfigurationError,
    },

    /// The store could not be reached.
    #[snafu(display("Store at {} is unreachable: {}", address, source))]
    Connection {
        /// Address of the store.
        address: StoreAddress,

        /// Source of the error.
        source: StoreError,
    },

    /// The store replied with something the sampler does not understand.
    #[snafu(display("Protocol error: {}", reason))]
    Protocol {
        /// Description of the violation.
        reason: String,
    },

    /// A store command failed while sampling.
    #[snafu(display("Store operation failed: {}", source))]
    StoreOperation {
        /// Source of the error.
        source: StoreError,
    },

    /// The store holds no keys.
    #[snafu(display("Store at {} has no keys to sample.", address))]
    EmptyKeyspace {
        /// Address of the store.
        address: StoreAddress,
    },

    /// The key source stopped before enough keys were sampled.
    #[snafu(display("Key source stopped before the sample target was reached."))]
    SourceExited,

    /// The run was cancelled from the outside.
    #[snafu(display("Run was cancelled."))]
    Cancelled,
}

impl From<StoreError> for RunError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::UnexpectedReply { .. } => RunError::Protocol {
                reason: error.to_string(),
            },
            source => RunError::StoreOperation { source },
        }
    }
}

/// A fleet error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum FleetError {
    /// A run against one of the instances failed.
    #[snafu(display("Run against {} failed: {}", address, source))]
    InstanceFailed {
        /// Address of the failed instance.
        address: StoreAddress,

        /// Source of the error.
        source: RunError,
    },

    /// A run task panicked.
    #[snafu(display("Run task panicked: {}", reason))]
    TaskPanicked {
        /// Panic details.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_reply_is_a_protocol_error() {
        let error = RunError::from(StoreError::UnexpectedReply {
            command: "PING",
            reason: "expected PONG".to_string(),
        });
        assert!(matches!(error, RunError::Protocol { reason } if reason.contains("PING")));
    }

    #[test]
    fn command_failure_is_a_store_operation_error() {
        let error = RunError::from(StoreError::Command {
            command: "GET",
            source: reckon_store::GenericError::msg("broken pipe"),
        });
        assert!(matches!(error, RunError::StoreOperation { .. }));
    }
}
