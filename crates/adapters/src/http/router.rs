use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use infrastructure::constants::{
    CREATE_POD_URI, DELETE_POD_URI, HTTP_TIMEOUT, METRICS_URI, VERSION_URI,
};

use super::cni_handler::{pod_created, pod_deleted};
use super::error::ApiError;
use super::metrics_handler::metrics;
use super::state::AppState;
use super::version_handler::version;

/// Maximum callback body size (16 KiB).
const MAX_BODY_SIZE: usize = 16 * 1024;

/// Control-socket routes. Pod callbacks are mounted only when the state
/// carries a pod network service.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route(VERSION_URI, get(version))
        .route(METRICS_URI, get(metrics));

    if state.pod_network.is_some() {
        router = router
            .route(CREATE_POD_URI, post(pod_created))
            .route(DELETE_POD_URI, post(pod_deleted));
    }

    router
        .layer(middleware::from_fn(bounded))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

async fn bounded(req: Request, next: Next) -> Response {
    match tokio::time::timeout(HTTP_TIMEOUT, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!("control API request timed out");
            ApiError::Timeout.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use application::pod_network_service::PodNetworkService;
    use application::pod_view_service::PodViewService;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use domain::pod::policy::MonitorPolicy;
    use http_body_util::BodyExt;
    use infrastructure::metrics::AgentMetrics;
    use ports::test_utils::{
        FakeClusterState, InMemoryOptMap, NoopMetrics, RecordingPodNetwork, TEST_SIDECAR_LABEL,
        running_pod,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::http::cni_handler::PodCreatedResponse;
    use crate::http::state::BuildInfo;
    use crate::http::version_handler::VersionResponse;

    const BUILD: BuildInfo = BuildInfo {
        version: "0.3.0",
        git_commit: "abc1234",
        build_date: "2026-01-01",
    };

    struct Fixture {
        cluster: Arc<FakeClusterState>,
        network: Arc<RecordingPodNetwork>,
        metrics: Arc<AgentMetrics>,
        router: Router,
    }

    fn mesh_router() -> Fixture {
        let cluster = Arc::new(FakeClusterState::default());
        let network = Arc::new(RecordingPodNetwork::default());
        let metrics = Arc::new(AgentMetrics::new());
        let view = Arc::new(PodViewService::new(
            cluster.clone(),
            MonitorPolicy::new(Vec::new(), TEST_SIDECAR_LABEL),
        ));
        let pod_network = Arc::new(PodNetworkService::new(
            view,
            network.clone(),
            Arc::new(InMemoryOptMap::default()),
            Arc::new(NoopMetrics),
        ));
        let state = AppState::new(metrics.clone(), BUILD).with_pod_network(pod_network);
        Fixture {
            cluster,
            network,
            metrics,
            router: build_router(Arc::new(state)),
        }
    }

    fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn pod_body(name: &str) -> serde_json::Value {
        serde_json::json!({
            "pod_name": name,
            "pod_namespace": "bookstore",
            "netns": "/var/run/netns/cni-1",
            "if_name": "eth0",
        })
    }

    #[tokio::test]
    async fn version_reports_build_info() {
        let f = mesh_router();
        let resp = f
            .router
            .oneshot(Request::get(VERSION_URI).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let parsed: VersionResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.version, "0.3.0");
        assert_eq!(parsed.git_commit, "abc1234");
    }

    #[tokio::test]
    async fn create_attaches_monitored_pod() {
        let f = mesh_router();
        f.cluster
            .pods
            .lock()
            .unwrap()
            .push(running_pod("bookstore", "web", "10.0.1.7"));

        let resp = f
            .router
            .oneshot(post_json(CREATE_POD_URI, &pod_body("web")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let parsed: PodCreatedResponse = serde_json::from_slice(&body).unwrap();
        assert!(parsed.attached);
        assert_eq!(f.network.attach_calls.load(Ordering::SeqCst), 1);
        assert!(f.metrics.encode().contains("op=\"create\""));
    }

    #[tokio::test]
    async fn create_skips_unknown_pod() {
        let f = mesh_router();
        let resp = f
            .router
            .oneshot(post_json(CREATE_POD_URI, &pod_body("ghost")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let parsed: PodCreatedResponse = serde_json::from_slice(&body).unwrap();
        assert!(!parsed.attached);
    }

    #[tokio::test]
    async fn attach_failure_is_internal_error() {
        let f = mesh_router();
        f.cluster
            .pods
            .lock()
            .unwrap()
            .push(running_pod("bookstore", "web", "10.0.1.7"));
        f.network.fail_attach.store(true, Ordering::SeqCst);
        let resp = f
            .router
            .oneshot(post_json(CREATE_POD_URI, &pod_body("web")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn delete_of_unknown_pod_succeeds() {
        let f = mesh_router();
        let resp = f
            .router
            .oneshot(post_json(DELETE_POD_URI, &pod_body("ghost")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn empty_fields_are_rejected() {
        let f = mesh_router();
        let mut body = pod_body("web");
        body["netns"] = serde_json::Value::String(String::new());
        let resp = f
            .router
            .oneshot(post_json(CREATE_POD_URI, &body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn pod_routes_absent_without_mesh() {
        let router = build_router(Arc::new(AppState::new(Arc::new(AgentMetrics::new()), BUILD)));
        let resp = router
            .oneshot(post_json(CREATE_POD_URI, &pod_body("web")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_served_as_openmetrics() {
        let f = mesh_router();
        let resp = f
            .router
            .oneshot(Request::get(METRICS_URI).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let ct = resp.headers()["content-type"].to_str().unwrap().to_string();
        assert!(ct.starts_with("application/openmetrics-text"));
    }
}
