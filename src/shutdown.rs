use tokio_util::sync::CancellationToken;

/// Cancel `token` when the process receives SIGTERM or SIGINT.
///
/// The discovery loop watches the token, closes the work queue on
/// cancellation, and lets busy workers finish their current dialogue.
pub fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        let interrupted = wait_for_signal().await;
        tracing::info!(signal = interrupted, "shutdown signal received");
        token.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return "SIGINT";
        }
    };
    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = tokio::signal::ctrl_c() => "SIGINT",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT"
}
