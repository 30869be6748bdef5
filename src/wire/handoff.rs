use std::time::Duration;

use crate::config::DispatcherConfig;
use crate::dispatch::job::Job;
use crate::error::{DispatchError, Result};
use crate::wire::protocol::{Connection, Header};

/// Safety margin added to the configured work timeout so the socket
/// deadline expires after the host's own deadline, not before it.
pub const WORK_TIMEOUT_MARGIN: Duration = Duration::from_millis(5_000);

/// The per-job dialogue transferring a job to a selected host and waiting
/// for its completion status.
///
/// States are strictly sequential: INIT, CONVERT, the three job strings,
/// then the terminal response. Any answer other than the expected ACK/DONE
/// and any transport error aborts the dialogue as a failure; there is no
/// protocol-level retry.
#[derive(Debug, Clone)]
pub struct WorkHandoff {
    work_timeout: Option<Duration>,
}

impl WorkHandoff {
    pub fn new(config: &DispatcherConfig) -> Self {
        Self::with_timeout(config.work_timeout_ms)
    }

    /// `work_timeout_ms == 0` disables the dialogue read deadline.
    pub fn with_timeout(work_timeout_ms: u64) -> Self {
        let work_timeout =
            (work_timeout_ms > 0).then(|| Duration::from_millis(work_timeout_ms) + WORK_TIMEOUT_MARGIN);
        Self { work_timeout }
    }

    /// Run one complete dialogue for `job` against `address:port`.
    pub async fn run(&self, address: &str, port: u16, job: &Job) -> Result<()> {
        let mut conn = Connection::open(address, port, self.work_timeout).await?;

        conn.send_header(Header::Init).await?;
        expect(conn.recv_header().await?, Header::Ack)?;

        conn.send_header(Header::Convert).await?;
        expect(conn.recv_header().await?, Header::Ack)?;

        conn.send_string(&job.id).await?;
        conn.send_string(&job.conversion_target).await?;
        conn.send_string(&job.extra_parameters).await?;

        expect(conn.recv_header().await?, Header::Done)
    }
}

fn expect(got: Header, want: Header) -> Result<()> {
    if got == want {
        Ok(())
    } else {
        Err(DispatchError::UnexpectedHeader(format!(
            "{got} (expected {want})"
        )))
    }
}
