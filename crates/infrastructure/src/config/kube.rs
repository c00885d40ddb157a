use serde::{Deserialize, Serialize};

/// Cluster watcher selectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KubeConfig {
    /// Namespace label whose value must equal the mesh name.
    #[serde(default = "default_namespace_monitor_label")]
    pub namespace_monitor_label: String,

    /// Pod label marking a pod as managed by a sidecar.
    #[serde(default = "default_sidecar_uid_label")]
    pub sidecar_uid_label: String,

    /// Label selector of sidecar pods, evaluated in the mesh namespace.
    #[serde(default = "default_sidecar_pod_selector")]
    pub sidecar_pod_selector: String,

    /// Restrict the pod watch to this node (`spec.nodeName`). Falls back to
    /// the `NODE_NAME` environment variable; empty watches all pods.
    #[serde(default)]
    pub node_name: Option<String>,
}

impl Default for KubeConfig {
    fn default() -> Self {
        Self {
            namespace_monitor_label: default_namespace_monitor_label(),
            sidecar_uid_label: default_sidecar_uid_label(),
            sidecar_pod_selector: default_sidecar_pod_selector(),
            node_name: None,
        }
    }
}

fn default_namespace_monitor_label() -> String {
    "flomesh.io/monitored-by".to_string()
}

fn default_sidecar_uid_label() -> String {
    "fsm-proxy-uuid".to_string()
}

fn default_sidecar_pod_selector() -> String {
    "app=fsm-sidecar".to_string()
}
