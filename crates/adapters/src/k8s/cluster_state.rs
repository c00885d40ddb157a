use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use domain::pod::entity::{NamespaceInfo, PodEvent, PodEventKind, PodInfo, WatchCategory};
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Namespace, Pod};
use kube::runtime::WatchStreamExt;
use kube::runtime::watcher::{self, Event};
use kube::{Api, Client};
use ports::secondary::cluster_state_port::{ClusterStatePort, ObjectFilter, PodEventSink};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::convert::{map_event, namespace_info, pod_info};

/// Label and field selectors for the three watches.
#[derive(Debug, Clone)]
pub struct WatchSelectors {
    /// Namespaces carrying `<label>=<mesh name>` are monitored.
    pub namespace_monitor_label: String,
    pub mesh_name: String,
    /// Control plane namespace holding the sidecar pods.
    pub mesh_namespace: String,
    pub sidecar_pod_selector: String,
    /// Restricts the pod watch to pods scheduled on this node.
    pub node_name: Option<String>,
}

/// Keyed cache with relist bookkeeping.
struct Cache<T> {
    entries: RwLock<BTreeMap<String, T>>,
    /// Keys seen since the last `Init`; `None` outside a relist.
    relist: Mutex<Option<BTreeSet<String>>>,
}

impl<T: Clone> Cache<T> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            relist: Mutex::new(None),
        }
    }

    fn values(&self) -> Vec<T> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn get(&self, key: &str) -> Option<T> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Returns whether the key was already present.
    fn upsert(&self, key: String, value: T) -> bool {
        if let Some(seen) = self
            .relist
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            seen.insert(key.clone());
        }
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value)
            .is_some()
    }

    fn remove(&self, key: &str) -> Option<T> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    fn begin_relist(&self) {
        *self.relist.lock().unwrap_or_else(PoisonError::into_inner) = Some(BTreeSet::new());
    }

    /// Drop entries not re-announced since `begin_relist`, returning them.
    fn finish_relist(&self) -> Vec<T> {
        let Some(seen) = self
            .relist
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return Vec::new();
        };
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let stale: Vec<String> = entries
            .keys()
            .filter(|k| !seen.contains(*k))
            .cloned()
            .collect();
        stale.iter().filter_map(|k| entries.remove(k)).collect()
    }
}

type Handler = (WatchCategory, ObjectFilter, PodEventSink);

/// Watch-fed cache of namespaces, node pods, and sidecar pods.
pub struct KubeClusterState {
    namespaces: Cache<NamespaceInfo>,
    pods: Cache<PodInfo>,
    sidecars: Cache<PodInfo>,
    handlers: RwLock<Vec<Handler>>,
    /// Bitmask of caches that completed their first list.
    synced: watch::Sender<u8>,
}

const ALL_SYNCED: u8 = 0b111;

fn sync_bit(category: WatchCategory) -> u8 {
    match category {
        WatchCategory::Namespace => 0b001,
        WatchCategory::Pod => 0b010,
        WatchCategory::SidecarPod => 0b100,
    }
}

impl Default for KubeClusterState {
    fn default() -> Self {
        Self::new()
    }
}

impl KubeClusterState {
    pub fn new() -> Self {
        Self {
            namespaces: Cache::new(),
            pods: Cache::new(),
            sidecars: Cache::new(),
            handlers: RwLock::new(Vec::new()),
            synced: watch::channel(0).0,
        }
    }

    fn mark_synced(&self, category: WatchCategory) {
        self.synced.send_modify(|mask| *mask |= sync_bit(category));
    }

    pub fn is_synced(&self) -> bool {
        *self.synced.borrow() == ALL_SYNCED
    }

    /// Wait until every watch has delivered its initial list. Returns
    /// `false` when `timeout` elapses first.
    pub async fn wait_synced(&self, timeout: Duration) -> bool {
        let mut rx = self.synced.subscribe();
        tokio::time::timeout(timeout, rx.wait_for(|mask| *mask == ALL_SYNCED))
            .await
            .is_ok_and(|r| r.is_ok())
    }

    fn pod_cache(&self, category: WatchCategory) -> Option<&Cache<PodInfo>> {
        match category {
            WatchCategory::Pod => Some(&self.pods),
            WatchCategory::SidecarPod => Some(&self.sidecars),
            WatchCategory::Namespace => None,
        }
    }

    fn notify(&self, category: WatchCategory, kind: PodEventKind, pod: &PodInfo) {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        for (cat, filter, sink) in handlers.iter() {
            if *cat == category && filter(pod) {
                sink(PodEvent {
                    kind,
                    pod: pod.clone(),
                });
            }
        }
    }

    /// Apply one watcher event to a pod cache and fan it out to handlers.
    pub fn apply_pod_event(&self, category: WatchCategory, event: Event<PodInfo>) {
        let Some(cache) = self.pod_cache(category) else {
            return;
        };
        match event {
            Event::Apply(pod) | Event::InitApply(pod) => {
                let existed = cache.upsert(pod.key(), pod.clone());
                let kind = if existed {
                    PodEventKind::Updated
                } else {
                    PodEventKind::Added
                };
                self.notify(category, kind, &pod);
            }
            Event::Delete(pod) => {
                cache.remove(&pod.key());
                self.notify(category, PodEventKind::Deleted, &pod);
            }
            Event::Init => cache.begin_relist(),
            Event::InitDone => {
                for pod in cache.finish_relist() {
                    self.notify(category, PodEventKind::Deleted, &pod);
                }
                self.mark_synced(category);
                debug!(category = category.as_str(), "watch cache synced");
            }
        }
    }

    pub fn apply_namespace_event(&self, event: Event<NamespaceInfo>) {
        match event {
            Event::Apply(ns) | Event::InitApply(ns) => {
                self.namespaces.upsert(ns.name.clone(), ns);
            }
            Event::Delete(ns) => {
                self.namespaces.remove(&ns.name);
            }
            Event::Init => self.namespaces.begin_relist(),
            Event::InitDone => {
                self.namespaces.finish_relist();
                self.mark_synced(WatchCategory::Namespace);
            }
        }
    }

    /// Start the namespace, pod and sidecar watches; each runs until
    /// `cancel` fires.
    pub fn spawn_watches(
        self: &Arc<Self>,
        client: Client,
        selectors: &WatchSelectors,
        cancel: CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        let ns_config = watcher::Config::default().labels(&format!(
            "{}={}",
            selectors.namespace_monitor_label, selectors.mesh_name
        ));
        let mut pod_config = watcher::Config::default();
        if let Some(node) = selectors.node_name.as_deref().filter(|n| !n.is_empty()) {
            pod_config = pod_config.fields(&format!("spec.nodeName={node}"));
        }
        let sidecar_config = watcher::Config::default().labels(&selectors.sidecar_pod_selector);

        let namespaces = {
            let state = Arc::clone(self);
            let api: Api<Namespace> = Api::all(client.clone());
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let stream = watcher::watcher(api, ns_config).default_backoff();
                run_watch(stream, cancel, "namespace", |ev| {
                    state.apply_namespace_event(map_event(ev, namespace_info));
                })
                .await;
            })
        };

        let pods = {
            let state = Arc::clone(self);
            let api: Api<Pod> = Api::all(client.clone());
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let stream = watcher::watcher(api, pod_config).default_backoff();
                run_watch(stream, cancel, "pod", |ev| {
                    state.apply_pod_event(WatchCategory::Pod, map_event(ev, pod_info));
                })
                .await;
            })
        };

        let sidecars = {
            let state = Arc::clone(self);
            let api: Api<Pod> = Api::namespaced(client, &selectors.mesh_namespace);
            tokio::spawn(async move {
                let stream = watcher::watcher(api, sidecar_config).default_backoff();
                run_watch(stream, cancel, "sidecar-pod", |ev| {
                    state.apply_pod_event(WatchCategory::SidecarPod, map_event(ev, pod_info));
                })
                .await;
            })
        };

        vec![namespaces, pods, sidecars]
    }
}

async fn run_watch<K, S>(
    stream: S,
    cancel: CancellationToken,
    category: &'static str,
    mut apply: impl FnMut(Event<K>),
) where
    S: futures::Stream<Item = Result<Event<K>, watcher::Error>>,
{
    let mut stream = std::pin::pin!(stream);
    info!(category, "cluster watch started");
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            next = stream.next() => match next {
                Some(Ok(event)) => apply(event),
                Some(Err(e)) => {
                    warn!(category, error = %e, "watch error, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                None => break,
            },
        }
    }
    info!(category, "cluster watch stopped");
}

impl ClusterStatePort for KubeClusterState {
    fn list_pods(&self, category: WatchCategory) -> Vec<PodInfo> {
        self.pod_cache(category)
            .map(Cache::values)
            .unwrap_or_default()
    }

    fn get_pod(&self, namespace: &str, name: &str) -> Option<PodInfo> {
        let key = domain::pod::entity::pod_key(namespace, name);
        self.pods.get(&key).or_else(|| self.sidecars.get(&key))
    }

    fn list_namespaces(&self) -> Vec<NamespaceInfo> {
        self.namespaces.values()
    }

    fn get_namespace(&self, name: &str) -> Option<NamespaceInfo> {
        self.namespaces.get(name)
    }

    fn add_event_handler(&self, category: WatchCategory, filter: ObjectFilter, sink: PodEventSink) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((category, filter, sink));
    }
}
