use std::time::Duration;

use reckon_core::{SamplingMode, ValueType};
use reckon_store::{Connector, PooledConnection, StoreConnection, StoreError};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument as _};

const CHANNEL_DEPTH: usize = 2;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// A key drawn from the store, along with the type the store reported for it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Observation {
    /// The key.
    pub key: Vec<u8>,

    /// The key's type, as reported by the store.
    pub value_type: ValueType,
}

/// A cancellable stream of observations produced by a background task.
///
/// In random sampling mode, keys are drawn one at a time, with replacement, until the stream is cancelled. In pattern
/// scan mode, keys matching the glob are enumerated page by page until the scan cursor comes back around to zero.
/// Keys added or removed during a scan may be seen zero, one, or several times.
///
/// The producing task checks for cancellation before every store request. If a store request fails, the error is
/// delivered as the final item of the stream.
pub struct KeyStream {
    observations: mpsc::Receiver<Result<Observation, StoreError>>,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl KeyStream {
    /// Spawns the producing task over `connection`, using the key selection of `mode`.
    ///
    /// The connection is held by the producing task until it stops, at which point it is returned to its pool (or
    /// discarded, if the task stopped because of a store error).
    pub fn spawn<C: Connector>(connection: PooledConnection<C>, mode: SamplingMode, token: CancellationToken) -> Self {
        let (tx, observations) = mpsc::channel(CHANNEL_DEPTH);
        let producer = Producer {
            tx,
            token: token.clone(),
        };
        let handle = tokio::spawn(producer.run(connection, mode).in_current_span());

        Self {
            observations,
            token,
            handle,
        }
    }

    /// Receives the next observation.
    ///
    /// Returns `None` once the producing task has stopped and every observation it produced has been received.
    pub async fn next(&mut self) -> Option<Result<Observation, StoreError>> {
        self.observations.recv().await
    }

    /// Signals the producing task to stop.
    ///
    /// The task stops before its next store request. Observations already buffered can still be received.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Stops the producing task and drains any observations it had already buffered.
    ///
    /// Waits briefly for the task to release its connection, but does not require it to. Returns the number of
    /// drained observations, none of which are processed.
    pub async fn shutdown(mut self) -> usize {
        self.token.cancel();
        self.observations.close();

        let mut drained = 0;
        while self.observations.recv().await.is_some() {
            drained += 1;
        }

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut self.handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Key source task failed."),
            Err(_) => debug!("Key source task still finishing its last request; not waiting further."),
        }

        drained
    }
}

struct Producer {
    tx: mpsc::Sender<Result<Observation, StoreError>>,
    token: CancellationToken,
}

impl Producer {
    async fn run<C: Connector>(self, mut connection: PooledConnection<C>, mode: SamplingMode) {
        let result = match &mode {
            SamplingMode::RandomSample { .. } => self.draw_random(&mut *connection).await,
            SamplingMode::PatternScan { glob } => self.scan(&mut *connection, glob).await,
        };

        match result {
            Ok(()) => debug!("Key source stopped."),
            Err(e) => {
                debug!(error = %e, "Key source stopped after store error.");
                connection.discard();
                self.deliver(Err(e)).await;
            }
        }
    }

    async fn draw_random<S: StoreConnection>(&self, connection: &mut S) -> Result<(), StoreError> {
        loop {
            if self.token.is_cancelled() {
                return Ok(());
            }
            let Some(key) = connection.random_key().await? else {
                return Err(StoreError::UnexpectedReply {
                    command: "RANDOMKEY",
                    reason: "store has no keys".to_string(),
                });
            };

            if !self.observe(connection, key).await? {
                return Ok(());
            }
        }
    }

    async fn scan<S: StoreConnection>(&self, connection: &mut S, glob: &str) -> Result<(), StoreError> {
        let mut cursor = 0;
        loop {
            if self.token.is_cancelled() {
                return Ok(());
            }
            let (next_cursor, keys) = connection.scan(cursor, glob).await?;

            for key in keys {
                if !self.observe(connection, key).await? {
                    return Ok(());
                }
            }

            if next_cursor == 0 {
                return Ok(());
            }
            cursor = next_cursor;
        }
    }

    /// Reads the type of `key` and delivers the observation. Returns `false` if the stream should stop.
    async fn observe<S: StoreConnection>(&self, connection: &mut S, key: Vec<u8>) -> Result<bool, StoreError> {
        if self.token.is_cancelled() {
            return Ok(false);
        }
        let value_type = ValueType::from_type_reply(&connection.key_type(&key).await?);

        Ok(self.deliver(Ok(Observation { key, value_type })).await)
    }

    async fn deliver(&self, item: Result<Observation, StoreError>) -> bool {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            sent = self.tx.send(item) => sent.is_ok(),
        }
    }
}
