//! # OS termination signals.
//!
//! One helper that resolves when the process is asked to stop.
//!
//! Unix: `SIGINT`, `SIGTERM` (systemd/Kubernetes default), `SIGQUIT`.
//! Elsewhere: ctrl-c only.

/// Completes when any termination signal arrives. Registration failures
/// surface as an error so the caller can decide how to proceed.
#[cfg(unix)]
pub async fn wait_for_termination() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Completes when any termination signal arrives.
#[cfg(not(unix))]
pub async fn wait_for_termination() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
