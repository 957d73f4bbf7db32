use std::{fmt, sync::Arc};

use reckon_core::{Aggregator, ResultsMap, RunConfig, StoreAddress};
use reckon_store::{ConnectionPool, Connector, PooledConnection, StoreConnection as _};
use snafu::{ensure, ResultExt as _};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument as _};

use crate::{
    error::{Cancelled, Configuration, Connection, EmptyKeyspace, SourceExited},
    sampler::Sampler,
    KeyStream, RunError,
};

const PROGRESS_INTERVAL: u64 = 100;

#[derive(Clone, Copy, Debug)]
enum RunState {
    Configuring,
    Connecting,
    Streaming,
    Completing,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuring => "configuring",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Completing => "completing",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

fn enter(state: RunState) {
    debug!(%state, "Run state changed.");
}

/// Output of a successful run.
#[derive(Debug)]
pub struct RunOutput {
    /// Results for every bucket that received at least one key.
    pub results: ResultsMap,

    /// Number of keys in the store when the run started.
    pub key_count: u64,

    /// Number of keys examined, including ones that were discarded by the aggregator or had vanished.
    pub examined: u64,
}

/// A sampling run against a single store instance.
///
/// A run validates its configuration, connects to the store, discovers the size of the keyspace, and then consumes a
/// [`KeyStream`], sampling each key and folding it into per-bucket results. In random sampling mode, the run ends once
/// `max(min_samples, sample_rate * key_count, 1)` keys have been examined. In pattern scan mode, it ends when the scan
/// completes.
///
/// Any error aborts the run, and no partial results are returned.
pub struct Run<C: Connector> {
    config: RunConfig,
    pool: ConnectionPool<C>,
    aggregator: Arc<dyn Aggregator>,
    token: CancellationToken,
}

impl<C: Connector> Run<C> {
    /// Creates a new `Run`.
    pub fn new(config: RunConfig, pool: ConnectionPool<C>, aggregator: Arc<dyn Aggregator>) -> Self {
        Self {
            config,
            pool,
            aggregator,
            token: CancellationToken::new(),
        }
    }

    /// Sets the token used to cancel this run from the outside.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Executes the run.
    ///
    /// # Errors
    ///
    /// If the configuration is invalid, the store cannot be reached or holds no keys, or any store request fails, an
    /// error is returned.
    pub async fn execute(self) -> Result<RunOutput, RunError> {
        let span = info_span!("run", address = %self.pool.address());
        async move {
            let result = self.execute_inner().await;
            if result.is_err() {
                enter(RunState::Aborted);
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute_inner(self) -> Result<RunOutput, RunError> {
        enter(RunState::Configuring);
        self.config.validate().context(Configuration)?;

        enter(RunState::Connecting);
        let address = self.pool.address().clone();
        let mut connection = self.acquire(&address).await?;

        let key_count = match connection.key_count().await {
            Ok(key_count) => key_count,
            Err(e) => {
                connection.discard();
                return Err(e.into());
            }
        };
        ensure!(key_count > 0, EmptyKeyspace { address });
        info!(key_count, "Discovered keyspace size.");

        let source_connection = self.acquire(&address).await?;
        let target = self.config.mode.sample_target(key_count);
        if let Some(target) = target {
            debug!(target, "Sampling randomly drawn keys.");
        }

        enter(RunState::Streaming);
        let mut stream = KeyStream::spawn(source_connection, self.config.mode.clone(), self.token.child_token());
        let mut sampler = Sampler::new(self.aggregator.as_ref());
        let streamed = self.stream(&mut stream, &mut sampler, &mut connection, target).await;

        let drained = stream.shutdown().await;
        if drained > 0 {
            debug!(drained, "Drained buffered observations from key source.");
        }

        if let Err(e) = streamed {
            connection.discard();
            return Err(e);
        }

        enter(RunState::Completing);
        let examined = sampler.examined();
        let vanished = sampler.vanished();
        let results = sampler.into_results();
        info!(examined, vanished, buckets = results.len(), "Run complete.");

        Ok(RunOutput {
            results,
            key_count,
            examined,
        })
    }

    async fn acquire(&self, address: &StoreAddress) -> Result<PooledConnection<C>, RunError> {
        self.pool.acquire().await.context(Connection {
            address: address.clone(),
        })
    }

    async fn stream(
        &self, stream: &mut KeyStream, sampler: &mut Sampler<'_>, connection: &mut PooledConnection<C>,
        target: Option<u64>,
    ) -> Result<(), RunError> {
        loop {
            if target.is_some_and(|target| sampler.examined() >= target) {
                return Ok(());
            }

            let next = tokio::select! {
                biased;
                _ = self.token.cancelled() => return Cancelled.fail(),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(observation)) => sampler.observe(&mut **connection, observation).await?,
                Some(Err(e)) => return Err(e.into()),
                None => {
                    ensure!(!self.token.is_cancelled(), Cancelled);
                    ensure!(target.is_none(), SourceExited);
                    return Ok(());
                }
            }

            let examined = sampler.examined();
            if examined > 0 && examined % PROGRESS_INTERVAL == 0 {
                info!(examined, "Sampling in progress.");
            }
        }
    }
}
