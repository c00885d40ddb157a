use std::sync::Arc;

use application::pod_network_service::PodNetworkService;
use infrastructure::metrics::AgentMetrics;

/// Build identity reported by `GET /version`.
#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_commit: &'static str,
    pub build_date: &'static str,
}

/// Shared state for the control-socket handlers.
///
/// `pod_network` is only present when the mesh is enabled; the pod
/// callback routes are not mounted otherwise.
pub struct AppState {
    pub metrics: Arc<AgentMetrics>,
    pub build: BuildInfo,
    pub pod_network: Option<Arc<PodNetworkService>>,
}

impl AppState {
    pub fn new(metrics: Arc<AgentMetrics>, build: BuildInfo) -> Self {
        Self {
            metrics,
            build,
            pod_network: None,
        }
    }

    #[must_use]
    pub fn with_pod_network(mut self, pod_network: Arc<PodNetworkService>) -> Self {
        self.pod_network = Some(pod_network);
        self
    }
}
