use reckon_core::StoreAddress;
use snafu::Snafu;

/// A generic error.
pub type GenericError = anyhow::Error;

/// A store error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub))]
pub enum StoreError {
    /// A connection to the store could not be established.
    #[snafu(display("Failed to connect to store at {}: {}", address, source))]
    Connect {
        /// Address of the store.
        address: StoreAddress,

        /// Source of the error.
        source: GenericError,
    },

    /// A command sent to the store failed.
    #[snafu(display("Store command {} failed: {}", command, source))]
    Command {
        /// Name of the command.
        command: &'static str,

        /// Source of the error.
        source: GenericError,
    },

    /// The store answered a command with a reply of an unexpected shape.
    #[snafu(display("Unexpected reply to store command {}: {}", command, reason))]
    UnexpectedReply {
        /// Name of the command.
        command: &'static str,

        /// What was wrong with the reply.
        reason: String,
    },
}
