use tokio::select;
use tokio_util::sync::CancellationToken;

/// Detects signals asking the process to stop and cancels the token. The
/// `stop` cli command sends SIGTERM, so the daemon listens for it alongside
/// an interactive ctrl-c.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                select! {
                    _ = tokio::signal::ctrl_c() => (),
                    _ = terminate.recv() => (),
                };
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    cancelation.cancel();
}
