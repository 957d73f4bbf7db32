use std::sync::Arc;

use reckon_core::{merge_results_map, Aggregator, ResultsMap, RunConfig, StoreAddress};
use reckon_store::{ConnectionPool, Connector};
use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{FleetError, Run, RunError, RunOutput};

/// How a [`Fleet`] reacts to a failed run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FailurePolicy {
    /// Cancel every other run and return the first error.
    #[default]
    FailFast,

    /// Record the failure and keep merging the output of the remaining runs.
    Isolate,
}

/// A run that failed under [`FailurePolicy::Isolate`].
#[derive(Debug)]
pub struct InstanceFailure {
    /// Address of the instance.
    pub address: StoreAddress,

    /// Why the run failed.
    pub error: RunError,
}

/// Merged output of every successful run in a fleet.
#[derive(Debug, Default)]
pub struct FleetOutput {
    /// Results merged across every instance, per bucket.
    ///
    /// Example sets are not trimmed after merging, and may hold more examples than their capacity.
    pub totals: ResultsMap,

    /// Sum of the key counts of every merged instance.
    pub total_key_count: u64,

    /// Number of instances whose output was merged.
    pub instances_merged: usize,

    /// Runs that failed, if failures were isolated.
    pub failures: Vec<InstanceFailure>,
}

/// Samples several store instances concurrently and merges their results.
///
/// Every instance is sampled by its own [`Run`], on its own task. Completed outputs are handed off to a folding task,
/// which merges them in whatever order they arrive.
pub struct Fleet<C: Connector> {
    aggregator: Arc<dyn Aggregator>,
    policy: FailurePolicy,
    instances: Vec<(RunConfig, C)>,
}

impl<C: Connector> Fleet<C> {
    /// Creates an empty `Fleet` that buckets keys with `aggregator`.
    pub fn new(aggregator: Arc<dyn Aggregator>) -> Self {
        Self {
            aggregator,
            policy: FailurePolicy::default(),
            instances: Vec::new(),
        }
    }

    /// Sets the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Adds an instance to sample, using `connector` to reach it.
    pub fn with_instance(mut self, config: RunConfig, connector: C) -> Self {
        self.instances.push((config, connector));
        self
    }

    /// Runs every instance and merges their output.
    ///
    /// # Errors
    ///
    /// Under [`FailurePolicy::FailFast`], the first failed run cancels the others and its error is returned. Under
    /// [`FailurePolicy::Isolate`], failed runs are reported in [`FleetOutput::failures`] instead. A panicked run is
    /// always returned as an error.
    pub async fn execute(self) -> Result<FleetOutput, FleetError> {
        let token = CancellationToken::new();
        let (outputs_tx, outputs_rx) = mpsc::channel(self.instances.len().max(1));
        let folder = tokio::spawn(fold_outputs(outputs_rx));

        let mut runs = JoinSet::new();
        for (config, connector) in self.instances {
            let address = config.address.clone();
            let run = Run::new(config, ConnectionPool::new(connector), Arc::clone(&self.aggregator))
                .with_cancellation(token.child_token());
            let outputs_tx = outputs_tx.clone();

            runs.spawn(async move {
                let result = match run.execute().await {
                    Ok(output) => {
                        if outputs_tx.send(output).await.is_err() {
                            debug!(%address, "Folding task stopped before run output could be handed off.");
                        }
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                (address, result)
            });
        }
        drop(outputs_tx);

        let mut failures = Vec::new();
        while let Some(joined) = runs.join_next().await {
            let (address, result) = match joined {
                Ok(completed) => completed,
                Err(e) => {
                    token.cancel();
                    drain(&mut runs).await;
                    return Err(FleetError::TaskPanicked { reason: e.to_string() });
                }
            };

            let Err(error) = result else {
                continue;
            };

            match self.policy {
                FailurePolicy::FailFast => {
                    error!(%address, %error, "Run failed. Cancelling remaining runs.");
                    token.cancel();
                    drain(&mut runs).await;
                    return Err(FleetError::InstanceFailed { address, source: error });
                }
                FailurePolicy::Isolate => {
                    warn!(%address, %error, "Run failed. Continuing with remaining instances.");
                    failures.push(InstanceFailure { address, error });
                }
            }
        }

        let mut output = folder.await.map_err(|e| FleetError::TaskPanicked { reason: e.to_string() })?;
        output.failures = failures;
        info!(
            instances_merged = output.instances_merged,
            failed = output.failures.len(),
            total_key_count = output.total_key_count,
            "Fleet complete."
        );

        Ok(output)
    }
}

async fn drain<T: 'static>(runs: &mut JoinSet<T>) {
    while runs.join_next().await.is_some() {}
}

async fn fold_outputs(mut outputs: mpsc::Receiver<RunOutput>) -> FleetOutput {
    let mut fleet_output = FleetOutput::default();
    while let Some(output) = outputs.recv().await {
        merge_results_map(&mut fleet_output.totals, output.results);
        fleet_output.total_key_count += output.key_count;
        fleet_output.instances_merged += 1;
        debug!(instances_merged = fleet_output.instances_merged, "Merged run output.");
    }
    fleet_output
}
