use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::DispatcherConfig;
use crate::dispatch::{InFlightTracker, Job, WorkQueue};
use crate::error::{DispatchError, Result};
use crate::registry::{HostRegistry, WorkerHost};
use crate::wire::{HostProbe, WireProbe, WorkHandoff};
use crate::worker::{spawn_workers, WorkerDeps};

/// External source of pending jobs, polled by the discovery loop.
///
/// May fail; failures are logged and retried after the refresh delay. The
/// source is expected to stop listing a job once a host has completed it.
#[async_trait]
pub trait JobProvider: Send + Sync {
    async fn pending_jobs(&self) -> anyhow::Result<Vec<Job>>;
}

/// Application root tying the fleet registry, the bounded work queue, the
/// in-flight tracker and the worker pool together.
///
/// `run` drives the whole system: it starts one worker task per unit of
/// fleet capacity, then polls the provider and feeds the queue without
/// duplicating work, blocking on the queue when the fleet is saturated.
pub struct Dispatcher {
    config: DispatcherConfig,
    registry: Arc<HostRegistry>,
    tracker: Arc<InFlightTracker>,
    queue: Arc<WorkQueue>,
    probe: Arc<dyn HostProbe>,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig) -> Result<Self> {
        let config = config.validate()?;
        let probe = Arc::new(WireProbe::new(&config)?);
        Self::assemble(config, probe)
    }

    /// Construction seam for tests: same wiring, caller-supplied probe.
    pub fn with_probe(config: DispatcherConfig, probe: Arc<dyn HostProbe>) -> Result<Self> {
        Self::assemble(config.validate()?, probe)
    }

    fn assemble(config: DispatcherConfig, probe: Arc<dyn HostProbe>) -> Result<Self> {
        let registry = Arc::new(HostRegistry::new(&config.hosts, config.policy));
        let queue = Arc::new(WorkQueue::with_capacity(registry.total_capacity()));
        Ok(Self {
            config,
            registry,
            tracker: Arc::new(InFlightTracker::new()),
            queue,
            probe,
            shutdown: CancellationToken::new(),
        })
    }

    /// Token cancelling the discovery loop; workers drain and exit once
    /// the loop closes the queue.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Ids currently queued or being processed on a host.
    pub fn in_flight_jobs(&self) -> Vec<String> {
        self.tracker.snapshot()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Current fleet view with live load counters.
    pub async fn fleet(&self) -> Vec<WorkerHost> {
        self.registry.hosts().await
    }

    pub async fn run(&self, provider: Arc<dyn JobProvider>) -> Result<()> {
        let pool_size = self.registry.total_capacity();
        tracing::info!(
            hosts = self.config.hosts.len(),
            pool_size,
            queue_size = self.queue.capacity(),
            policy = ?self.config.policy,
            "dispatcher starting"
        );

        let deps = Arc::new(WorkerDeps {
            registry: self.registry.clone(),
            tracker: self.tracker.clone(),
            queue: self.queue.clone(),
            probe: self.probe.clone(),
            handoff: WorkHandoff::new(&self.config),
            retry_step: Duration::from_millis(self.config.retry_step_ms),
        });
        let workers = spawn_workers(pool_size, deps);

        let refresh_delay = Duration::from_millis(self.config.refresh_delay_ms);
        'discovery: while !self.shutdown.is_cancelled() {
            match provider.pending_jobs().await {
                Ok(jobs) if !jobs.is_empty() => {
                    tracing::info!(count = jobs.len(), "found pending jobs");
                    let mut enqueued = 0usize;
                    for job in jobs {
                        let job = job.normalized();
                        if self.tracker.contains(&job.id) {
                            tracing::info!(
                                job_id = %job.id,
                                "job already in progress (queued or on a host), skipping"
                            );
                            continue;
                        }
                        // Blocks when every fleet slot is spoken for; this
                        // is the system's backpressure point.
                        let inserted = tokio::select! {
                            res = self.queue.insert(job.clone()) => res,
                            _ = self.shutdown.cancelled() => break 'discovery,
                        };
                        if inserted.is_err() {
                            break 'discovery;
                        }
                        tracing::info!(job_id = %job.id, "job put on work queue");
                        self.tracker.insert(&job.id);
                        enqueued += 1;
                    }
                    // Every listed job was already in flight: pace the next
                    // poll instead of hammering the provider.
                    if enqueued == 0 && !self.idle(refresh_delay).await {
                        break 'discovery;
                    }
                }
                Ok(_) => {
                    tracing::debug!(
                        delay_ms = self.config.refresh_delay_ms,
                        "no pending jobs, sleeping"
                    );
                    if !self.idle(refresh_delay).await {
                        break 'discovery;
                    }
                }
                Err(e) => {
                    let e = DispatchError::Provider(e);
                    tracing::error!(
                        error = %e,
                        delay_ms = self.config.refresh_delay_ms,
                        "job discovery failed, retrying after delay"
                    );
                    if !self.idle(refresh_delay).await {
                        break 'discovery;
                    }
                }
            }
        }

        tracing::info!("discovery loop stopped, closing work queue");
        self.queue.close();
        for worker in workers {
            let _ = worker.await;
        }
        tracing::info!("dispatcher stopped");
        Ok(())
    }

    /// Sleep the refresh delay; false when shutdown interrupted it.
    async fn idle(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.shutdown.cancelled() => false,
        }
    }
}
