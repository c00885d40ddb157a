//! Mesh membership rules over the watcher's cache.

use super::entity::PodInfo;
use crate::common::entity::ipv4_to_u32;

/// Namespace membership policy.
///
/// A non-empty exclude list is the only source of truth; otherwise the
/// watcher's namespace-selector membership decides. The two never merge.
#[derive(Debug, Clone, Default)]
pub struct MonitorPolicy {
    exclude_namespaces: Vec<String>,
    sidecar_label: String,
}

impl MonitorPolicy {
    pub fn new(exclude_namespaces: Vec<String>, sidecar_label: impl Into<String>) -> Self {
        Self {
            exclude_namespaces,
            sidecar_label: sidecar_label.into(),
        }
    }

    pub fn has_exclude_list(&self) -> bool {
        !self.exclude_namespaces.is_empty()
    }

    pub fn sidecar_label(&self) -> &str {
        &self.sidecar_label
    }

    /// `watcher_membership` is only consulted without an exclude list.
    pub fn is_monitored_namespace(
        &self,
        namespace: &str,
        watcher_membership: impl FnOnce() -> bool,
    ) -> bool {
        if self.has_exclude_list() {
            return !self.exclude_namespaces.iter().any(|ns| ns == namespace);
        }
        watcher_membership()
    }

    /// Pod rule: with an exclude list the namespace alone decides; otherwise
    /// the pod must be cached and carry the sidecar label or live in a
    /// watcher-monitored namespace.
    pub fn is_monitored_pod(
        &self,
        namespace: &str,
        pod: Option<&PodInfo>,
        watcher_membership: impl FnOnce() -> bool,
    ) -> bool {
        if self.has_exclude_list() {
            return self.is_monitored_namespace(namespace, || false);
        }
        match pod {
            Some(p) => p.has_label(&self.sidecar_label) || watcher_membership(),
            None => false,
        }
    }

    /// Listing rule: without an exclude list a pod needs both a monitored
    /// namespace and the sidecar label; with one, namespace alone decides.
    pub fn admits_listed_pod(&self, pod: &PodInfo, namespace_monitored: bool) -> bool {
        if !namespace_monitored {
            return false;
        }
        self.has_exclude_list() || pod.has_label(&self.sidecar_label)
    }
}

/// Running pods only, ascending by numeric IPv4 address.
pub fn running_sorted_by_ipv4(pods: Vec<PodInfo>) -> Vec<PodInfo> {
    let mut running: Vec<PodInfo> = pods.into_iter().filter(PodInfo::is_running).collect();
    running.sort_by_key(|p| ipv4_to_u32(p.ip.as_deref().unwrap_or_default()));
    running
}
