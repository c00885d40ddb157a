use serde::{Deserialize, Serialize};

use super::common::default_true;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeshConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Mesh instance name; namespaces join the mesh by carrying it as
    /// the value of `kube.namespace_monitor_label`.
    #[serde(default = "default_mesh_name")]
    pub name: String,

    /// Namespace of the mesh control plane.
    #[serde(default = "default_mesh_namespace")]
    pub namespace: String,

    /// Full IPv4 register image to start from (decimal or 0x hex).
    #[serde(default)]
    pub cfg_ipv4_magic: String,

    #[serde(default)]
    pub cfg_ipv6_magic: String,

    /// Sidecar container port name receiving inbound redirects.
    #[serde(default = "default_filter_port_inbound")]
    pub filter_port_inbound: String,

    /// Sidecar container port name receiving outbound redirects.
    #[serde(default = "default_filter_port_outbound")]
    pub filter_port_outbound: String,

    /// When non-empty, every namespace not listed is monitored.
    #[serde(default)]
    pub exclude_namespaces: Vec<String>,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: default_mesh_name(),
            namespace: default_mesh_namespace(),
            cfg_ipv4_magic: String::new(),
            cfg_ipv6_magic: String::new(),
            filter_port_inbound: default_filter_port_inbound(),
            filter_port_outbound: default_filter_port_outbound(),
            exclude_namespaces: Vec::new(),
        }
    }
}

fn default_mesh_name() -> String {
    "fsm".to_string()
}

fn default_mesh_namespace() -> String {
    "fsm-system".to_string()
}

fn default_filter_port_inbound() -> String {
    "inbound".to_string()
}

fn default_filter_port_outbound() -> String {
    "outbound".to_string()
}
