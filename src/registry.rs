use tokio::sync::Mutex;

use crate::config::{HostConfig, SelectionPolicy};
use crate::wire::probe::HostProbe;

/// One conversion host with its live load counter.
///
/// `in_progress` moves only under the registry lock: incremented when the
/// host is selected, decremented at release. `0 <= in_progress <= capacity`
/// holds at all times.
#[derive(Debug, Clone)]
pub struct WorkerHost {
    pub address: String,
    pub port: u16,
    pub capacity: u32,
    in_progress: u32,
}

impl WorkerHost {
    fn new(config: &HostConfig) -> Self {
        Self {
            address: config.address.clone(),
            port: config.port,
            capacity: config.capacity,
            in_progress: 0,
        }
    }

    pub fn in_progress(&self) -> u32 {
        self.in_progress
    }

    fn is_full(&self) -> bool {
        self.in_progress == self.capacity
    }

    fn decrement(&mut self) {
        if self.in_progress > 0 {
            self.in_progress -= 1;
        }
    }
}

impl std::fmt::Display for WorkerHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} [{}/{}]",
            self.address, self.port, self.in_progress, self.capacity
        )
    }
}

/// A successful selection: the chosen host's coordinates plus its index
/// for the matching `release` call.
#[derive(Debug, Clone)]
pub struct Selection {
    pub index: usize,
    pub address: String,
    pub port: u16,
}

#[derive(Debug)]
struct PoolState {
    hosts: Vec<WorkerHost>,
    /// Round-robin cursor: index of the last selected host.
    cursor: usize,
}

/// In-memory registry of the conversion fleet.
///
/// Selection requires a host to be below capacity and to pass a fresh
/// liveness probe; probe results are never cached. The eligibility read
/// and the `in_progress` increment happen under one lock acquisition, so
/// two concurrent workers can never oversubscribe a host.
#[derive(Debug)]
pub struct HostRegistry {
    state: Mutex<PoolState>,
    policy: SelectionPolicy,
    total_capacity: usize,
}

impl HostRegistry {
    pub fn new(hosts: &[HostConfig], policy: SelectionPolicy) -> Self {
        let hosts: Vec<WorkerHost> = hosts.iter().map(WorkerHost::new).collect();
        let total_capacity = hosts.iter().map(|h| h.capacity as usize).sum();
        Self {
            state: Mutex::new(PoolState {
                cursor: hosts.len().saturating_sub(1),
                hosts,
            }),
            policy,
            total_capacity,
        }
    }

    pub fn total_capacity(&self) -> usize {
        self.total_capacity
    }

    /// Pick an eligible host per the configured policy, incrementing its
    /// load in the same critical section. Returns None when no host is
    /// below capacity and alive; the caller retries after a sleep.
    pub async fn select(&self, probe: &dyn HostProbe) -> Option<Selection> {
        let mut state = self.state.lock().await;
        let index = match self.policy {
            SelectionPolicy::RoundRobin => Self::pick_round_robin(&state, probe).await,
            SelectionPolicy::LeastLoaded => Self::pick_least_loaded(&state, probe).await,
        }?;

        state.hosts[index].in_progress += 1;
        if self.policy == SelectionPolicy::RoundRobin {
            state.cursor = index;
        }
        tracing::debug!(host = %state.hosts[index], "host selected");
        Some(Selection {
            index,
            address: state.hosts[index].address.clone(),
            port: state.hosts[index].port,
        })
    }

    /// One full cycle starting just after the cursor; first eligible host
    /// wins.
    async fn pick_round_robin(state: &PoolState, probe: &dyn HostProbe) -> Option<usize> {
        let len = state.hosts.len();
        let mut index = state.cursor;
        for _ in 0..len {
            index = (index + 1) % len;
            let host = &state.hosts[index];
            if !host.is_full() && probe.is_alive(&host.address, host.port).await {
                return Some(index);
            }
        }
        None
    }

    /// Full scan; smallest `in_progress` among eligible hosts, ties broken
    /// by list order.
    async fn pick_least_loaded(state: &PoolState, probe: &dyn HostProbe) -> Option<usize> {
        let mut min: Option<usize> = None;
        for (index, host) in state.hosts.iter().enumerate() {
            if host.is_full() {
                continue;
            }
            if !probe.is_alive(&host.address, host.port).await {
                continue;
            }
            match min {
                Some(m) if state.hosts[m].in_progress <= host.in_progress => {}
                _ => min = Some(index),
            }
        }
        min
    }

    /// Return a unit of capacity after a dialogue completed, successfully
    /// or not. Floored at zero.
    pub async fn release(&self, index: usize) {
        let mut state = self.state.lock().await;
        if let Some(host) = state.hosts.get_mut(index) {
            host.decrement();
            tracing::debug!(host = %host, "host released");
        }
    }

    /// Current per-host view, for tests and observability.
    pub async fn hosts(&self) -> Vec<WorkerHost> {
        self.state.lock().await.hosts.clone()
    }
}
