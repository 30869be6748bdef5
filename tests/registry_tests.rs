use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use doc_dispatch::config::{DispatcherConfig, SelectionPolicy};
use doc_dispatch::registry::HostRegistry;
use doc_dispatch::wire::HostProbe;

/// Probe stub answering from a fixed predicate, recording every call.
struct StubProbe {
    alive: Box<dyn Fn(u16) -> bool + Send + Sync>,
    calls: Mutex<Vec<u16>>,
}

impl StubProbe {
    fn all_alive() -> Self {
        Self::with(|_| true)
    }

    fn with(alive: impl Fn(u16) -> bool + Send + Sync + 'static) -> Self {
        Self {
            alive: Box::new(alive),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<u16> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostProbe for StubProbe {
    async fn is_alive(&self, _address: &str, port: u16) -> bool {
        self.calls.lock().unwrap().push(port);
        (self.alive)(port)
    }
}

fn registry(pool: &str, policy: SelectionPolicy) -> HostRegistry {
    HostRegistry::new(&DispatcherConfig::parse_pool(pool).unwrap(), policy)
}

async fn selected_ports(registry: &HostRegistry, probe: &StubProbe, n: usize) -> Vec<u16> {
    let mut ports = Vec::new();
    for _ in 0..n {
        let selection = registry.select(probe).await.expect("selection failed");
        ports.push(selection.port);
    }
    ports
}

#[tokio::test]
async fn round_robin_visits_hosts_in_cyclic_order() {
    let registry = registry("a:1:9,b:2:9,c:3:9", SelectionPolicy::RoundRobin);
    let probe = StubProbe::all_alive();
    let ports = selected_ports(&registry, &probe, 6).await;
    assert_eq!(ports, vec![1, 2, 3, 1, 2, 3]);
}

#[tokio::test]
async fn round_robin_skips_dead_hosts() {
    let registry = registry("a:1:9,b:2:9,c:3:9", SelectionPolicy::RoundRobin);
    let probe = StubProbe::with(|port| port != 2);
    let ports = selected_ports(&registry, &probe, 4).await;
    assert_eq!(ports, vec![1, 3, 1, 3]);
}

#[tokio::test]
async fn round_robin_never_selects_a_full_host() {
    let registry = registry("a:1:1,b:2:9", SelectionPolicy::RoundRobin);
    let probe = StubProbe::all_alive();
    let ports = selected_ports(&registry, &probe, 3).await;
    // Host a is at capacity after its first selection.
    assert_eq!(ports, vec![1, 2, 2]);
}

#[tokio::test]
async fn round_robin_full_host_is_not_probed() {
    let registry = registry("a:1:1,b:2:9", SelectionPolicy::RoundRobin);
    let probe = StubProbe::all_alive();
    selected_ports(&registry, &probe, 3).await;
    // Eligibility is checked before the probe, so the full host gets none.
    assert_eq!(probe.calls(), vec![1, 2, 2]);
}

#[tokio::test]
async fn least_loaded_picks_minimum_with_list_order_ties() {
    let registry = registry("a:1:2,b:2:2", SelectionPolicy::LeastLoaded);
    let probe = StubProbe::all_alive();
    let ports = selected_ports(&registry, &probe, 4).await;
    // Tie at 0/0 goes to a; then b at 0 beats a at 1; and so on.
    assert_eq!(ports, vec![1, 2, 1, 2]);
    assert!(registry.select(&probe).await.is_none());
}

#[tokio::test]
async fn least_loaded_skips_dead_hosts_even_when_less_loaded() {
    let registry = registry("a:1:5,b:2:5", SelectionPolicy::LeastLoaded);
    let probe = StubProbe::with(|port| port != 1);
    let ports = selected_ports(&registry, &probe, 3).await;
    assert_eq!(ports, vec![2, 2, 2]);
}

#[tokio::test]
async fn probes_are_fresh_on_every_selection() {
    let registry = registry("a:1:9,b:2:9", SelectionPolicy::LeastLoaded);
    let probe = StubProbe::all_alive();
    selected_ports(&registry, &probe, 2).await;
    // Least-loaded scans the whole list each time; nothing is cached.
    assert_eq!(probe.calls(), vec![1, 2, 1, 2]);
}

#[tokio::test]
async fn selection_returns_none_when_all_hosts_dead() {
    let registry = registry("a:1:9,b:2:9", SelectionPolicy::LeastLoaded);
    let probe = StubProbe::with(|_| false);
    assert!(registry.select(&probe).await.is_none());
    let hosts = registry.hosts().await;
    assert!(hosts.iter().all(|h| h.in_progress() == 0));
}

#[tokio::test]
async fn concurrent_selection_never_oversubscribes() {
    let registry = Arc::new(registry("a:1:2,b:2:3", SelectionPolicy::LeastLoaded));
    let probe = Arc::new(StubProbe::all_alive());
    let granted = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let registry = registry.clone();
        let probe = probe.clone();
        let granted = granted.clone();
        tasks.push(tokio::spawn(async move {
            if registry.select(probe.as_ref()).await.is_some() {
                granted.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(granted.load(Ordering::SeqCst), 5);
    for host in registry.hosts().await {
        assert!(host.in_progress() <= host.capacity);
        assert_eq!(host.in_progress(), host.capacity);
    }
}

#[tokio::test]
async fn release_restores_eligibility() {
    let registry = registry("a:1:1", SelectionPolicy::LeastLoaded);
    let probe = StubProbe::all_alive();

    let selection = registry.select(&probe).await.unwrap();
    assert!(registry.select(&probe).await.is_none());

    registry.release(selection.index).await;
    assert!(registry.select(&probe).await.is_some());
}
