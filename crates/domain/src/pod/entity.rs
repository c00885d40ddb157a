use std::collections::BTreeMap;

use serde::Serialize;

/// Pod lifecycle phase as reported by the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    pub fn parse(phase: Option<&str>) -> Self {
        match phase {
            Some("Pending") => Self::Pending,
            Some("Running") => Self::Running,
            Some("Succeeded") => Self::Succeeded,
            Some("Failed") => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

/// A named container port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedPort {
    pub name: String,
    pub port: u16,
}

/// Read-only projection of a cluster pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodInfo {
    pub namespace: String,
    pub name: String,
    pub ip: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub phase: PodPhase,
    pub ports: Vec<NamedPort>,
}

impl PodInfo {
    /// `namespace/name` cache key.
    pub fn key(&self) -> String {
        pod_key(&self.namespace, &self.name)
    }

    pub fn is_running(&self) -> bool {
        self.phase == PodPhase::Running
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains_key(label)
    }

    pub fn port_named(&self, name: &str) -> Option<u16> {
        self.ports.iter().find(|p| p.name == name).map(|p| p.port)
    }
}

pub fn pod_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

/// Read-only projection of a cluster namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceInfo {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

/// Cache object categories fed by the cluster watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchCategory {
    Namespace,
    Pod,
    SidecarPod,
}

impl WatchCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Namespace => "namespace",
            Self::Pod => "pod",
            Self::SidecarPod => "sidecar-pod",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PodEventKind {
    Added,
    Updated,
    Deleted,
}

impl PodEventKind {
    /// Broker topic for sidecar-pod events of this kind.
    pub fn sidecar_topic(self) -> &'static str {
        match self {
            Self::Added => "sidecar-pod-added",
            Self::Updated => "sidecar-pod-updated",
            Self::Deleted => "sidecar-pod-deleted",
        }
    }
}

/// Change notification for a watched pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodEvent {
    pub kind: PodEventKind,
    pub pod: PodInfo,
}
