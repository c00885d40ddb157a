use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

/// Create a `CancellationToken` and spawn a task that cancels it on
/// SIGINT, SIGTERM or SIGQUIT. Returns the token so callers can pass
/// clones to every spawned task.
pub fn create_shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        shutdown_signal().await;
        token_clone.cancel();
    });

    token
}

/// Wait for the first termination signal.
///
/// A handler that cannot be installed never fires; the others still do.
async fn shutdown_signal() {
    tokio::select! {
        () = wait_for(SignalKind::interrupt(), "SIGINT") => {},
        () = wait_for(SignalKind::terminate(), "SIGTERM") => {},
        () = wait_for(SignalKind::quit(), "SIGQUIT") => {},
    }
}

async fn wait_for(kind: SignalKind, name: &'static str) {
    match signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
            tracing::info!(signal = name, "shutdown signal received");
        }
        Err(e) => {
            tracing::error!(signal = name, error = %e, "failed to install signal handler");
            std::future::pending::<()>().await;
        }
    }
}
