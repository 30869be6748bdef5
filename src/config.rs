use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};

pub const REFRESH_DELAY_DEFAULT_MS: u64 = 20_000;
pub const RETRY_STEP_DEFAULT_MS: u64 = 200;
pub const ALIVE_TIMEOUT_DEFAULT_MS: u64 = 2_000;
pub const WORK_TIMEOUT_DEFAULT_MS: u64 = 0;

/// How the registry picks the next conversion host for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// Cyclic scan starting just after the last selected host.
    RoundRobin,
    /// Host with the fewest in-progress jobs; ties go to list order.
    #[default]
    LeastLoaded,
}

impl std::str::FromStr for SelectionPolicy {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "round-robin" | "roundrobin" => Ok(SelectionPolicy::RoundRobin),
            "least-loaded" | "leastloaded" => Ok(SelectionPolicy::LeastLoaded),
            other => Err(DispatchError::Config(format!(
                "unknown selection policy '{other}' (expected round-robin or least-loaded)"
            ))),
        }
    }
}

/// One conversion host entry: where it listens and how many jobs it can
/// run concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub address: String,
    pub port: u16,
    pub capacity: u32,
}

impl HostConfig {
    /// Parse an `address:port:capacity` pool entry.
    pub fn parse(entry: &str) -> Result<Self> {
        let parts: Vec<&str> = entry.trim().split(':').collect();
        if parts.len() != 3 {
            return Err(DispatchError::Config(format!(
                "invalid host entry '{entry}', expected address:port:capacity"
            )));
        }
        let port: u16 = parts[1]
            .parse()
            .map_err(|_| DispatchError::Config(format!("invalid port in host entry '{entry}'")))?;
        let capacity: u32 = parts[2].parse().map_err(|_| {
            DispatchError::Config(format!("invalid capacity in host entry '{entry}'"))
        })?;
        if parts[0].is_empty() {
            return Err(DispatchError::Config(format!(
                "empty address in host entry '{entry}'"
            )));
        }
        if capacity == 0 {
            return Err(DispatchError::Config(format!(
                "capacity must be > 0 in host entry '{entry}'"
            )));
        }
        Ok(HostConfig {
            address: parts[0].to_string(),
            port,
            capacity,
        })
    }
}

/// Tuning payload pushed to a host that answers a liveness probe with
/// TO_CONFIG. Sent verbatim as JSON; the dispatcher never mutates it after
/// startup. Field names match what the hosts expect on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationConfig {
    pub work_timeout: u64,
    pub index_enabled: bool,
    pub ocr_enabled: bool,
    pub ocr_file_types_exclude: Vec<String>,
    pub index_max_file_size: u64,
    pub index_file_types_include: Vec<String>,
    pub index_file_types_exclude: Vec<String>,
    pub index_max_chars: i64,
    pub convert_enabled: bool,
    pub convert_max_file_size: u64,
    pub convert_file_types: Vec<String>,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            work_timeout: WORK_TIMEOUT_DEFAULT_MS,
            index_enabled: true,
            ocr_enabled: true,
            ocr_file_types_exclude: Vec::new(),
            index_max_file_size: 0,
            index_file_types_include: Vec::new(),
            index_file_types_exclude: Vec::new(),
            index_max_chars: -1,
            convert_enabled: true,
            convert_max_file_size: 0,
            convert_file_types: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Localhost port held for the process lifetime as a single-instance
    /// guard. 0 disables the check.
    pub presence_port: u16,
    /// Pause between discovery cycles when the provider has no work
    /// (and after a provider failure).
    pub refresh_delay_ms: u64,
    /// Sleep between host-selection attempts when no host is eligible.
    pub retry_step_ms: u64,
    /// Per-read deadline during a liveness probe.
    pub alive_timeout_ms: u64,
    /// Per-read deadline during a work dialogue, before the safety margin.
    /// 0 disables the dialogue timeout.
    pub work_timeout_ms: u64,
    pub policy: SelectionPolicy,
    pub hosts: Vec<HostConfig>,
    pub activation: ActivationConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            presence_port: 0,
            refresh_delay_ms: REFRESH_DELAY_DEFAULT_MS,
            retry_step_ms: RETRY_STEP_DEFAULT_MS,
            alive_timeout_ms: ALIVE_TIMEOUT_DEFAULT_MS,
            work_timeout_ms: WORK_TIMEOUT_DEFAULT_MS,
            policy: SelectionPolicy::default(),
            hosts: Vec::new(),
            activation: ActivationConfig::default(),
        }
    }
}

impl DispatcherConfig {
    /// Parse a comma-separated `address:port:capacity` pool definition.
    pub fn parse_pool(pool: &str) -> Result<Vec<HostConfig>> {
        pool.split(',')
            .filter(|e| !e.trim().is_empty())
            .map(HostConfig::parse)
            .collect()
    }

    /// Total concurrent capacity of the fleet. Sizes both the work queue
    /// and the dispatcher-side worker pool.
    pub fn total_capacity(&self) -> usize {
        self.hosts.iter().map(|h| h.capacity as usize).sum()
    }

    /// Fatal-at-startup checks plus out-of-range fallbacks.
    pub fn validate(mut self) -> Result<Self> {
        if self.hosts.is_empty() {
            return Err(DispatchError::Config(
                "no conversion hosts defined".to_string(),
            ));
        }
        if self.alive_timeout_ms == 0 {
            tracing::warn!(
                default_ms = ALIVE_TIMEOUT_DEFAULT_MS,
                "alive timeout must be > 0, falling back to default"
            );
            self.alive_timeout_ms = ALIVE_TIMEOUT_DEFAULT_MS;
        }
        // The activation payload always carries the effective work timeout.
        self.activation.work_timeout = self.work_timeout_ms;
        Ok(self)
    }
}
