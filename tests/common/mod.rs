//! Test harness: a mock conversion host speaking the real wire protocol
//! over an ephemeral-port listener.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::BufStream;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use doc_dispatch::config::HostConfig;
use doc_dispatch::wire::protocol::{self, Header};

/// Job parameters received by the mock host during a work dialogue.
#[derive(Debug, Clone)]
pub struct ReceivedJob {
    pub id: String,
    pub target: String,
    pub extra: String,
}

/// How the mock host responds at each protocol step.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Answer ALIVE with TO_CONFIG until a config payload arrives.
    pub needs_config: bool,
    /// Answer ALIVE with an unknown header.
    pub probe_garbage: bool,
    /// Never answer a probe.
    pub probe_silent: bool,
    /// Answer the config push with an unknown header instead of ACK.
    pub config_reject: bool,
    /// Answer INIT with an unknown header.
    pub work_reject_init: bool,
    /// Never send the terminal work response.
    pub work_silent_result: bool,
    /// Send an unknown header as the terminal work response.
    pub work_garbage_result: bool,
    /// Hold the terminal DONE until `release_one` is called.
    pub hold_work: bool,
}

pub struct MockHost {
    pub port: u16,
    pub probes: Arc<AtomicUsize>,
    pub configs: Arc<Mutex<Vec<String>>>,
    pub jobs: Arc<Mutex<Vec<ReceivedJob>>>,
    gate: Arc<Semaphore>,
}

impl MockHost {
    pub async fn spawn(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let probes = Arc::new(AtomicUsize::new(0));
        let configs = Arc::new(Mutex::new(Vec::new()));
        let jobs = Arc::new(Mutex::new(Vec::new()));
        let gate = Arc::new(Semaphore::new(0));
        let configured = Arc::new(AtomicBool::new(false));

        {
            let behavior = behavior.clone();
            let probes = probes.clone();
            let configs = configs.clone();
            let jobs = jobs.clone();
            let gate = gate.clone();
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        return;
                    };
                    let behavior = behavior.clone();
                    let probes = probes.clone();
                    let configs = configs.clone();
                    let jobs = jobs.clone();
                    let gate = gate.clone();
                    let configured = configured.clone();
                    tokio::spawn(async move {
                        let _ = serve_connection(
                            stream, behavior, probes, configs, jobs, gate, configured,
                        )
                        .await;
                    });
                }
            });
        }

        Self {
            port,
            probes,
            configs,
            jobs,
            gate,
        }
    }

    pub fn host_config(&self, capacity: u32) -> HostConfig {
        HostConfig {
            address: "127.0.0.1".to_string(),
            port: self.port,
            capacity,
        }
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn job_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn received_jobs(&self) -> Vec<ReceivedJob> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn received_configs(&self) -> Vec<String> {
        self.configs.lock().unwrap().clone()
    }

    /// Allow one held work dialogue to send its DONE.
    pub fn release_one(&self) {
        self.gate.add_permits(1);
    }
}

async fn serve_connection(
    stream: TcpStream,
    behavior: MockBehavior,
    probes: Arc<AtomicUsize>,
    configs: Arc<Mutex<Vec<String>>>,
    jobs: Arc<Mutex<Vec<ReceivedJob>>>,
    gate: Arc<Semaphore>,
    configured: Arc<AtomicBool>,
) -> doc_dispatch::Result<()> {
    let mut stream = BufStream::new(stream);

    match protocol::recv_header(&mut stream).await? {
        Header::Alive => {
            probes.fetch_add(1, Ordering::SeqCst);
            if behavior.probe_silent {
                std::future::pending::<()>().await;
            }
            if behavior.probe_garbage {
                return send_garbage(&mut stream).await;
            }
            if behavior.needs_config && !configured.load(Ordering::SeqCst) {
                protocol::send_header(&mut stream, Header::ToConfig).await?;
                let payload = protocol::recv_string(&mut stream).await?;
                let marker = protocol::recv_header(&mut stream).await?;
                assert_eq!(marker, Header::ConfigApplied);
                configs.lock().unwrap().push(payload);
                if behavior.config_reject {
                    return send_garbage(&mut stream).await;
                }
                configured.store(true, Ordering::SeqCst);
            }
            protocol::send_header(&mut stream, Header::Ack).await
        }
        Header::Init => {
            if behavior.work_reject_init {
                return send_garbage(&mut stream).await;
            }
            protocol::send_header(&mut stream, Header::Ack).await?;

            let command = protocol::recv_header(&mut stream).await?;
            assert_eq!(command, Header::Convert);
            protocol::send_header(&mut stream, Header::Ack).await?;

            let id = protocol::recv_string(&mut stream).await?;
            let target = protocol::recv_string(&mut stream).await?;
            let extra = protocol::recv_string(&mut stream).await?;
            jobs.lock().unwrap().push(ReceivedJob { id, target, extra });

            if behavior.work_silent_result {
                std::future::pending::<()>().await;
            }
            if behavior.work_garbage_result {
                return send_garbage(&mut stream).await;
            }
            if behavior.hold_work {
                let permit = gate.acquire().await.unwrap();
                permit.forget();
            }
            protocol::send_header(&mut stream, Header::Done).await
        }
        other => panic!("mock host got unexpected opening header {other}"),
    }
}

async fn send_garbage(
    stream: &mut (impl tokio::io::AsyncWrite + Unpin),
) -> doc_dispatch::Result<()> {
    use tokio::io::AsyncWriteExt;
    stream.write_all(b"????").await?;
    stream.flush().await?;
    Ok(())
}

/// Poll `check` every 10ms until it holds or `deadline` passes.
pub async fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Bind and immediately drop a listener, yielding a port where connects
/// are refused.
pub async fn refused_port() -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}
