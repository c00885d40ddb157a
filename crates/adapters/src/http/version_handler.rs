use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use super::state::AppState;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionResponse {
    pub version: String,
    pub git_commit: String,
    pub build_date: String,
}

pub async fn version(State(state): State<Arc<AppState>>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: state.build.version.to_string(),
        git_commit: state.build.git_commit.to_string(),
        build_date: state.build.build_date.to_string(),
    })
}
