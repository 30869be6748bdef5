use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Unexpected response header: {0}")]
    UnexpectedHeader(String),

    #[error("Job provider error: {0}")]
    Provider(#[source] anyhow::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Work queue closed")]
    QueueClosed,

    #[error("Another instance already running on presence port {0}")]
    PresencePortBusy(u16),
}

impl DispatchError {
    /// A short-lived connect/read/write deadline expired.
    pub fn timed_out(what: &str) -> Self {
        DispatchError::Transport(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            what.to_string(),
        ))
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
