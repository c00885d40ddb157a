use std::sync::Arc;

use domain::pod::entity::{NamespaceInfo, PodInfo, WatchCategory};
use domain::pod::policy::{MonitorPolicy, running_sorted_by_ipv4};
use ports::secondary::cluster_state_port::ClusterStatePort;

use crate::broker::MessageBroker;

/// Read-side view over the cluster watcher's cache, plus the sidecar event
/// bridge onto the in-process broker.
///
/// The namespace category is watched with the mesh's monitor-label selector,
/// so a cached namespace is a watcher-monitored one.
pub struct PodViewService {
    cluster: Arc<dyn ClusterStatePort>,
    policy: MonitorPolicy,
}

impl PodViewService {
    pub fn new(cluster: Arc<dyn ClusterStatePort>, policy: MonitorPolicy) -> Self {
        Self { cluster, policy }
    }

    fn watcher_monitors(&self, namespace: &str) -> bool {
        self.cluster.get_namespace(namespace).is_some()
    }

    pub fn is_monitored_namespace(&self, namespace: &str) -> bool {
        self.policy
            .is_monitored_namespace(namespace, || self.watcher_monitors(namespace))
    }

    pub fn is_monitored_pod(&self, namespace: &str, name: &str) -> bool {
        let pod = self.cluster.get_pod(namespace, name);
        self.policy
            .is_monitored_pod(namespace, pod.as_ref(), || self.watcher_monitors(namespace))
    }

    pub fn list_monitored_pods(&self) -> Vec<PodInfo> {
        self.cluster
            .list_pods(WatchCategory::Pod)
            .into_iter()
            .filter(|pod| {
                let monitored = self.is_monitored_namespace(&pod.namespace);
                self.policy.admits_listed_pod(pod, monitored)
            })
            .collect()
    }

    /// Running sidecars, ascending by numeric IPv4.
    pub fn list_sidecar_pods(&self) -> Vec<PodInfo> {
        running_sorted_by_ipv4(self.cluster.list_pods(WatchCategory::SidecarPod))
    }

    pub fn list_all_pods(&self) -> Vec<PodInfo> {
        self.cluster.list_pods(WatchCategory::Pod)
    }

    pub fn get_pod(&self, namespace: &str, name: &str) -> Option<PodInfo> {
        self.cluster.get_pod(namespace, name)
    }

    pub fn get_namespace(&self, name: &str) -> Option<NamespaceInfo> {
        self.cluster.get_namespace(name)
    }

    /// Republish every accepted sidecar-pod change onto `broker`.
    pub fn register_sidecar_handler(&self, broker: MessageBroker) {
        self.cluster.add_event_handler(
            WatchCategory::SidecarPod,
            Box::new(|_| true),
            Box::new(move |event| broker.publish_sidecar_update(event)),
        );
        tracing::debug!("sidecar pod event handler registered");
    }
}

#[cfg(test)]
mod tests {
    use domain::pod::entity::{PodEvent, PodEventKind, PodPhase};
    use ports::test_utils::{FakeClusterState, TEST_SIDECAR_LABEL, running_pod, sidecar_pod};

    use super::*;

    fn view(exclude: &[&str]) -> (Arc<FakeClusterState>, PodViewService) {
        let cluster = Arc::new(FakeClusterState::default());
        let policy = MonitorPolicy::new(
            exclude.iter().map(|s| s.to_string()).collect(),
            TEST_SIDECAR_LABEL,
        );
        (cluster.clone(), PodViewService::new(cluster, policy))
    }

    #[test]
    fn exclude_list_overrides_watcher_membership() {
        let (cluster, svc) = view(&["kube-system"]);
        cluster.add_namespace("kube-system");
        assert!(!svc.is_monitored_namespace("kube-system"));
        // Not in the watcher cache, still monitored.
        assert!(svc.is_monitored_namespace("bookstore"));
    }

    #[test]
    fn watcher_decides_without_exclude_list() {
        let (cluster, svc) = view(&[]);
        cluster.add_namespace("bookstore");
        assert!(svc.is_monitored_namespace("bookstore"));
        assert!(!svc.is_monitored_namespace("default"));
    }

    #[test]
    fn pod_membership_requires_cache_entry_without_exclude_list() {
        let (cluster, svc) = view(&[]);
        let mut unlabeled = running_pod("default", "web", "10.0.0.7");
        unlabeled.labels.clear();
        cluster.pods.lock().unwrap().push(unlabeled);
        cluster.pods.lock().unwrap().push(running_pod("default", "api", "10.0.0.8"));

        assert!(!svc.is_monitored_pod("default", "ghost"));
        assert!(!svc.is_monitored_pod("default", "web"));
        assert!(svc.is_monitored_pod("default", "api"));
    }

    #[test]
    fn listing_needs_label_and_namespace_without_exclude_list() {
        let (cluster, svc) = view(&[]);
        cluster.add_namespace("bookstore");
        let mut unlabeled = running_pod("bookstore", "web", "10.0.0.7");
        unlabeled.labels.clear();
        {
            let mut pods = cluster.pods.lock().unwrap();
            pods.push(unlabeled);
            pods.push(running_pod("bookstore", "api", "10.0.0.8"));
            pods.push(running_pod("default", "db", "10.0.0.9"));
        }
        let names: Vec<_> = svc.list_monitored_pods().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["api"]);
        assert_eq!(svc.list_all_pods().len(), 3);
    }

    #[test]
    fn listing_with_exclude_list_ignores_labels() {
        let (cluster, svc) = view(&["kube-system"]);
        let mut unlabeled = running_pod("bookstore", "web", "10.0.0.7");
        unlabeled.labels.clear();
        {
            let mut pods = cluster.pods.lock().unwrap();
            pods.push(unlabeled);
            pods.push(running_pod("kube-system", "dns", "10.0.0.3"));
        }
        let names: Vec<_> = svc.list_monitored_pods().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["web"]);
    }

    #[test]
    fn sidecars_are_running_and_sorted_by_ipv4() {
        let (cluster, svc) = view(&[]);
        let mut pending = sidecar_pod("s3", "10.0.0.1");
        pending.phase = PodPhase::Pending;
        {
            let mut sidecars = cluster.sidecars.lock().unwrap();
            sidecars.push(sidecar_pod("s5", "10.0.0.5"));
            sidecars.push(sidecar_pod("s2", "10.0.0.2"));
            sidecars.push(sidecar_pod("s9", "10.0.0.9"));
            sidecars.push(pending);
        }
        let ips: Vec<_> = svc
            .list_sidecar_pods()
            .into_iter()
            .map(|p| p.ip.unwrap())
            .collect();
        assert_eq!(ips, vec!["10.0.0.2", "10.0.0.5", "10.0.0.9"]);
    }

    #[tokio::test]
    async fn sidecar_events_reach_the_broker() {
        let (cluster, svc) = view(&[]);
        let broker = MessageBroker::new(16);
        let mut rx = broker.subscribe_sidecar_updates();
        svc.register_sidecar_handler(broker);
        assert_eq!(cluster.handler_count(), 1);

        for kind in [PodEventKind::Added, PodEventKind::Updated, PodEventKind::Deleted] {
            cluster.emit(
                WatchCategory::SidecarPod,
                PodEvent {
                    kind,
                    pod: sidecar_pod("s0", "10.0.0.2"),
                },
            );
            assert_eq!(rx.recv().await.unwrap().kind, kind);
        }

        // Plain pod events are not sidecar updates.
        cluster.emit(
            WatchCategory::Pod,
            PodEvent {
                kind: PodEventKind::Added,
                pod: running_pod("default", "web", "10.0.0.7"),
            },
        );
        assert!(rx.try_recv().is_err());
    }
}
