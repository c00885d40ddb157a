use std::sync::Arc;

use application::pod_network_service::{PodAttachRequest, PodNetworkService};
use axum::Json;
use axum::extract::State;
use ports::secondary::metrics_port::PodMetrics;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::state::AppState;

/// Body posted by the chained plugin on container network setup/teardown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodRequest {
    pub pod_name: String,
    pub pod_namespace: String,
    pub netns: String,
    pub if_name: String,
}

impl PodRequest {
    fn validate(self) -> Result<PodAttachRequest, ApiError> {
        for (field, value) in [
            ("pod_name", &self.pod_name),
            ("pod_namespace", &self.pod_namespace),
            ("netns", &self.netns),
            ("if_name", &self.if_name),
        ] {
            if value.trim().is_empty() {
                return Err(ApiError::BadRequest {
                    code: "MISSING_FIELD",
                    message: format!("{field} must not be empty"),
                });
            }
        }
        Ok(PodAttachRequest {
            pod_name: self.pod_name,
            pod_namespace: self.pod_namespace,
            netns: self.netns,
            if_name: self.if_name,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PodCreatedResponse {
    pub attached: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PodDeletedResponse {
    pub deleted: bool,
}

fn pod_network(state: &AppState) -> Result<&Arc<PodNetworkService>, ApiError> {
    state
        .pod_network
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable {
            message: "mesh is disabled on this node".to_string(),
        })
}

pub async fn pod_created(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PodRequest>,
) -> Result<Json<PodCreatedResponse>, ApiError> {
    state.metrics.record_cni_request("create");
    let req = body.validate()?;
    let attached = pod_network(&state)?.pod_created(&req).await?;
    Ok(Json(PodCreatedResponse { attached }))
}

pub async fn pod_deleted(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PodRequest>,
) -> Result<Json<PodDeletedResponse>, ApiError> {
    state.metrics.record_cni_request("delete");
    let req = body.validate()?;
    pod_network(&state)?.pod_deleted(&req).await?;
    Ok(Json(PodDeletedResponse { deleted: true }))
}
