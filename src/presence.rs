use tokio::net::TcpListener;

use crate::error::{DispatchError, Result};

/// Single-instance guard: a localhost port bound at startup and held for
/// the process lifetime. A second dispatcher instance fails the bind and
/// refuses to start. Port 0 disables the check.
#[derive(Debug)]
pub struct PresenceGuard {
    _listener: Option<TcpListener>,
    port: u16,
}

impl PresenceGuard {
    pub async fn acquire(port: u16) -> Result<Self> {
        if port == 0 {
            tracing::debug!("presence check disabled");
            return Ok(Self {
                _listener: None,
                port,
            });
        }
        match TcpListener::bind(("127.0.0.1", port)).await {
            Ok(listener) => {
                tracing::info!(port, "presence port acquired");
                Ok(Self {
                    _listener: Some(listener),
                    port,
                })
            }
            Err(e) => {
                tracing::info!(port, error = %e, "presence port already bound");
                Err(DispatchError::PresencePortBusy(port))
            }
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}
