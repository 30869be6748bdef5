use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::dispatch::{InFlightTracker, WorkQueue};
use crate::error::DispatchError;
use crate::registry::HostRegistry;
use crate::wire::{HostProbe, WorkHandoff};

/// Everything a dispatcher-side worker task needs, shared across the pool.
pub(crate) struct WorkerDeps {
    pub registry: Arc<HostRegistry>,
    pub tracker: Arc<InFlightTracker>,
    pub queue: Arc<WorkQueue>,
    pub probe: Arc<dyn HostProbe>,
    pub handoff: WorkHandoff,
    /// Sleep between host-selection attempts; zero means busy retry.
    pub retry_step: Duration,
}

/// Start one worker task per unit of fleet capacity. Each task drains the
/// work queue independently; a fatal queue error terminates only that task.
pub(crate) fn spawn_workers(count: usize, deps: Arc<WorkerDeps>) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|worker_id| {
            let deps = deps.clone();
            tokio::spawn(worker_loop(worker_id, deps))
        })
        .collect()
}

async fn worker_loop(worker_id: usize, deps: Arc<WorkerDeps>) {
    tracing::info!(worker_id, "worker started");

    loop {
        let job = match deps.queue.take().await {
            Ok(job) => job,
            Err(DispatchError::QueueClosed) => {
                tracing::info!(worker_id, "work queue closed, worker exiting");
                return;
            }
            Err(e) => {
                // This worker is gone; its siblings and the discovery loop
                // keep running with reduced concurrency.
                tracing::error!(
                    worker_id,
                    error = %e,
                    "unable to read work queue, worker exiting"
                );
                return;
            }
        };
        tracing::info!(worker_id, job_id = %job.id, "took job from work queue");

        // Retry selection until some host has free capacity and answers
        // its probe. Unbounded on purpose: the job stays owned by this
        // worker until a host accepts it.
        let mut attempts: u64 = 0;
        let selection = loop {
            if let Some(selection) = deps.registry.select(deps.probe.as_ref()).await {
                break selection;
            }
            attempts += 1;
            if !deps.retry_step.is_zero() {
                tracing::warn!(
                    worker_id,
                    job_id = %job.id,
                    attempts,
                    wait_ms = deps.retry_step.as_millis() as u64,
                    "no eligible host found, waiting"
                );
                tokio::time::sleep(deps.retry_step).await;
            }
        };

        let host = format!("{}:{}", selection.address, selection.port);
        let started = Instant::now();
        let outcome = deps
            .handoff
            .run(&selection.address, selection.port, &job)
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(()) => {
                tracing::info!(worker_id, job_id = %job.id, %host, elapsed_ms, "job COMPLETED");
            }
            Err(e) => {
                tracing::warn!(
                    worker_id,
                    job_id = %job.id,
                    %host,
                    elapsed_ms,
                    error = %e,
                    "job FAILED"
                );
            }
        }

        // Capacity and the in-flight slot are returned on every outcome.
        // If the host actually finished the job despite a failed dialogue,
        // the next discovery cycle may hand it out again; the dispatcher
        // keeps no remote completion state.
        deps.registry.release(selection.index).await;
        deps.tracker.remove(&job.id);
    }
}
