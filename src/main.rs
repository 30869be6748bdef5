use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use doc_dispatch::config::{
    ActivationConfig, DispatcherConfig, SelectionPolicy, ALIVE_TIMEOUT_DEFAULT_MS,
    REFRESH_DELAY_DEFAULT_MS, RETRY_STEP_DEFAULT_MS, WORK_TIMEOUT_DEFAULT_MS,
};
use doc_dispatch::dispatch::Job;
use doc_dispatch::presence::PresenceGuard;
use doc_dispatch::{shutdown, Dispatcher, JobProvider};

#[derive(Parser, Debug)]
#[command(name = "doc-dispatch")]
#[command(version)]
#[command(about = "Dispatches document indexing/conversion jobs across a fleet of conversion hosts")]
struct Args {
    /// Conversion host pool (comma-separated, format: "address:port:capacity")
    /// Example: "10.0.0.5:4859:2,10.0.0.6:4859:3"
    #[arg(long)]
    pool: String,

    /// Host selection policy: "least-loaded" or "round-robin"
    #[arg(long, default_value = "least-loaded")]
    policy: String,

    /// Spool file listing pending jobs as a JSON array; re-read every
    /// discovery cycle. A missing file means no pending work.
    #[arg(long)]
    spool: PathBuf,

    /// Localhost port held as a single-instance guard (0 disables)
    #[arg(long, default_value = "0")]
    presence_port: u16,

    /// Pause between discovery cycles when no work is pending (ms)
    #[arg(long, default_value_t = REFRESH_DELAY_DEFAULT_MS)]
    refresh_delay_ms: u64,

    /// Sleep between host-selection attempts when the fleet is busy (ms)
    #[arg(long, default_value_t = RETRY_STEP_DEFAULT_MS)]
    retry_step_ms: u64,

    /// Per-read deadline for liveness probes (ms)
    #[arg(long, default_value_t = ALIVE_TIMEOUT_DEFAULT_MS)]
    alive_timeout_ms: u64,

    /// Per-job work deadline before the safety margin (ms, 0 disables)
    #[arg(long, default_value_t = WORK_TIMEOUT_DEFAULT_MS)]
    work_timeout_ms: u64,

    // === Activation parameters pushed to unconfigured hosts ===
    /// Disable text indexing on the hosts
    #[arg(long)]
    no_index: bool,

    /// Disable OCR on the hosts
    #[arg(long)]
    no_ocr: bool,

    /// Disable file conversion on the hosts
    #[arg(long)]
    no_convert: bool,

    /// File types excluded from OCR (comma-separated)
    #[arg(long, default_value = "")]
    ocr_exclude: String,

    /// Max file size considered for indexing (bytes, 0 = unlimited)
    #[arg(long, default_value = "0")]
    index_max_file_size: u64,

    /// File types included in indexing (comma-separated, empty = all)
    #[arg(long, default_value = "")]
    index_include: String,

    /// File types excluded from indexing (comma-separated)
    #[arg(long, default_value = "")]
    index_exclude: String,

    /// Max characters extracted per document (-1 = unlimited)
    #[arg(long, default_value = "-1")]
    index_max_chars: i64,

    /// Max file size considered for conversion (bytes, 0 = unlimited)
    #[arg(long, default_value = "0")]
    convert_max_file_size: u64,

    /// File types considered for conversion (comma-separated, empty = all)
    #[arg(long, default_value = "")]
    convert_types: String,
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_ascii_lowercase())
        .collect()
}

impl Args {
    fn into_config(self) -> anyhow::Result<(DispatcherConfig, PathBuf)> {
        let activation = ActivationConfig {
            work_timeout: self.work_timeout_ms,
            index_enabled: !self.no_index,
            ocr_enabled: !self.no_ocr,
            ocr_file_types_exclude: split_csv(&self.ocr_exclude),
            index_max_file_size: self.index_max_file_size,
            index_file_types_include: split_csv(&self.index_include),
            index_file_types_exclude: split_csv(&self.index_exclude),
            index_max_chars: self.index_max_chars,
            convert_enabled: !self.no_convert,
            convert_max_file_size: self.convert_max_file_size,
            convert_file_types: split_csv(&self.convert_types),
        };
        let config = DispatcherConfig {
            presence_port: self.presence_port,
            refresh_delay_ms: self.refresh_delay_ms,
            retry_step_ms: self.retry_step_ms,
            alive_timeout_ms: self.alive_timeout_ms,
            work_timeout_ms: self.work_timeout_ms,
            policy: self.policy.parse::<SelectionPolicy>()?,
            hosts: DispatcherConfig::parse_pool(&self.pool)?,
            activation,
        };
        Ok((config, self.spool))
    }
}

/// Pending-job source backed by a JSON spool file maintained by the
/// document store. The store is expected to drop an entry once a host has
/// completed it.
struct SpoolProvider {
    path: PathBuf,
}

#[async_trait]
impl JobProvider for SpoolProvider {
    async fn pending_jobs(&self) -> anyhow::Result<Vec<Job>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let jobs: Vec<Job> = serde_json::from_slice(&bytes)?;
        Ok(jobs)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (config, spool) = Args::parse().into_config()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        spool = %spool.display(),
        "doc-dispatch starting"
    );

    // Held for the process lifetime; a second instance fails here.
    let _presence = PresenceGuard::acquire(config.presence_port).await?;

    let dispatcher = Dispatcher::new(config)?;
    shutdown::cancel_on_signal(dispatcher.shutdown_token());

    let provider = Arc::new(SpoolProvider { path: spool });
    dispatcher.run(provider).await?;
    Ok(())
}
