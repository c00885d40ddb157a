use domain::pod::entity::{NamespaceInfo, PodEvent, PodInfo, WatchCategory};

/// Per-object predicate; `false` suppresses publication.
pub type ObjectFilter = Box<dyn Fn(&PodInfo) -> bool + Send + Sync>;

/// Receives accepted change notifications.
pub type PodEventSink = Box<dyn Fn(PodEvent) + Send + Sync>;

/// Secondary port over the cluster watcher's local cache.
///
/// The cache is populated and mutated only by the watcher; everything here
/// is a read. Namespace entries exist only for namespaces matching the
/// watcher's namespace selector.
pub trait ClusterStatePort: Send + Sync {
    /// Pods of `WatchCategory::Pod` or `WatchCategory::SidecarPod`.
    fn list_pods(&self, category: WatchCategory) -> Vec<PodInfo>;

    fn get_pod(&self, namespace: &str, name: &str) -> Option<PodInfo>;

    fn list_namespaces(&self) -> Vec<NamespaceInfo>;

    fn get_namespace(&self, name: &str) -> Option<NamespaceInfo>;

    /// Register for Added/Updated/Deleted notifications on `category`.
    fn add_event_handler(&self, category: WatchCategory, filter: ObjectFilter, sink: PodEventSink);
}
