use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::UnixListener;

use super::router::build_router;
use super::state::AppState;

/// Serve the control API on a bound socket until `shutdown` resolves,
/// draining in-flight requests before returning.
pub async fn serve_unix(
    listener: UnixListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("control API server failed")?;
    Ok(())
}

/// Bind the control socket. A stale socket file from a previous run is
/// replaced.
pub fn bind_unix_socket(socket_path: &Path) -> anyhow::Result<UnixListener> {
    match std::fs::remove_file(socket_path) {
        Ok(()) => tracing::debug!(socket = %socket_path.display(), "removed stale socket"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("cannot remove {}", socket_path.display()));
        }
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("cannot bind {}", socket_path.display()))?;
    tracing::info!(socket = %socket_path.display(), "control API listening");
    Ok(listener)
}

#[cfg(test)]
mod tests {
    use infrastructure::metrics::AgentMetrics;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixStream;
    use tokio::sync::oneshot;

    use super::*;
    use crate::http::state::BuildInfo;

    const BUILD: BuildInfo = BuildInfo {
        version: "0.3.0",
        git_commit: "unknown",
        build_date: "unknown",
    };

    async fn get(socket: &Path, uri: &str) -> String {
        let mut stream = UnixStream::connect(socket).await.unwrap();
        let req = format!("GET {uri} HTTP/1.1\r\nHost: xnet\r\nConnection: close\r\n\r\n");
        stream.write_all(req.as_bytes()).await.unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn serves_version_over_socket_and_replaces_stale_file() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("run").join("xnet-cni.sock");
        std::fs::create_dir_all(socket.parent().unwrap()).unwrap();
        std::fs::write(&socket, b"stale").unwrap();

        let state = Arc::new(AppState::new(Arc::new(AgentMetrics::new()), BUILD));
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let listener = bind_unix_socket(&socket).unwrap();
        let server = tokio::spawn(serve_unix(listener, state, async {
            let _ = stop_rx.await;
        }));

        let response = get(&socket, "/version").await;
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.contains("\"version\":\"0.3.0\""));

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn bind_fails_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("run");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let err = bind_unix_socket(&blocker.join("xnet-cni.sock")).unwrap_err();
        assert!(err.to_string().contains("cannot"), "{err:#}");
    }
}
