use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::config::{ActivationConfig, DispatcherConfig};
use crate::error::Result;
use crate::wire::protocol::{Connection, Header};

/// Liveness check consulted on every host-selection attempt. Probing is a
/// trait so the registry can be exercised without real sockets.
#[async_trait]
pub trait HostProbe: Send + Sync {
    /// True only if the host answered the full handshake. Transport errors
    /// and unexpected responses are swallowed here: a host that cannot be
    /// probed is simply not alive.
    async fn is_alive(&self, address: &str, port: u16) -> bool;
}

/// The real probe: ALIVE over a short-lived connection, pushing the
/// activation config when the host reports it is unconfigured.
#[derive(Debug)]
pub struct WireProbe {
    alive_timeout: Duration,
    /// Serialized once at startup, sent verbatim on every TO_CONFIG.
    activation_json: String,
}

impl WireProbe {
    pub fn new(config: &DispatcherConfig) -> Result<Self> {
        Self::with_params(
            Duration::from_millis(config.alive_timeout_ms),
            &config.activation,
        )
    }

    pub fn with_params(alive_timeout: Duration, activation: &ActivationConfig) -> Result<Self> {
        Ok(Self {
            alive_timeout,
            activation_json: serde_json::to_string_pretty(activation)?,
        })
    }

    async fn exchange(&self, address: &str, port: u16) -> Result<bool> {
        let mut conn = Connection::open(address, port, Some(self.alive_timeout)).await?;
        conn.send_header(Header::Alive).await?;

        match conn.recv_header().await? {
            Header::Ack => Ok(true),
            Header::ToConfig => {
                // Alive but unconfigured: push the activation parameters
                // and wait for the host to confirm.
                conn.send_string(&self.activation_json).await?;
                conn.send_header(Header::ConfigApplied).await?;
                match conn.recv_header().await? {
                    Header::Ack => Ok(true),
                    other => {
                        let host = format!("{address}:{port}");
                        tracing::error!(
                            host = %host,
                            response = %other,
                            "unexpected configuration response from host"
                        );
                        Ok(false)
                    }
                }
            }
            other => {
                let host = format!("{address}:{port}");
                tracing::error!(
                    host = %host,
                    response = %other,
                    "unrecognized probe response from host"
                );
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl HostProbe for WireProbe {
    async fn is_alive(&self, address: &str, port: u16) -> bool {
        let started = Instant::now();
        let host = format!("{address}:{port}");
        let alive = match self.exchange(address, port).await {
            Ok(alive) => alive,
            Err(e) => {
                tracing::error!(host = %host, error = %e, "liveness probe failed");
                false
            }
        };
        tracing::debug!(
            host = %host,
            alive,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "liveness probe finished"
        );
        alive
    }
}
