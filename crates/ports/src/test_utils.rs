//! In-memory doubles of every secondary port, for application-layer tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use domain::common::entity::{IpProto, SysId};
use domain::common::error::DomainError;
use domain::config::entity::ConfigValue;
use domain::flow::entity::{FlowRecord, FlowTuple, OptKey, OptValue, TracePortKey, TracePortValue};
use domain::pod::entity::{NamedPort, NamespaceInfo, PodEvent, PodInfo, PodPhase, WatchCategory};

use crate::secondary::PortFuture;
use crate::secondary::cluster_state_port::{ClusterStatePort, ObjectFilter, PodEventSink};
use crate::secondary::config_register_port::ConfigRegisterPort;
use crate::secondary::device_port::{DevicePort, SysctlPort};
use crate::secondary::flow_table_port::{FlowTablePort, MonotonicClock};
use crate::secondary::metrics_port::{ConnTrackMetrics, PodMetrics, ProgramMetrics, ReconcileMetrics};
use crate::secondary::opt_map_port::OptMapPort;
use crate::secondary::plugin_chain_port::PluginChainPort;
use crate::secondary::pod_network_port::PodNetworkPort;
use crate::secondary::program_loader_port::{LoadOutcome, ProgramLoaderPort};
use crate::secondary::trace_port_map_port::TracePortMapPort;

fn engine(msg: &str) -> DomainError {
    DomainError::EngineError(msg.to_string())
}

// ── Metrics ─────────────────────────────────────────────────────────

/// No-op implementation of all metrics sub-traits for use in tests.
pub struct NoopMetrics;

impl ProgramMetrics for NoopMetrics {}
impl ReconcileMetrics for NoopMetrics {}
impl ConnTrackMetrics for NoopMetrics {}
impl PodMetrics for NoopMetrics {}

// ── Config register ─────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryConfigRegister {
    pub slots: Mutex<HashMap<SysId, ConfigValue>>,
    pub fail_get: AtomicBool,
    pub fail_set: AtomicBool,
    pub writes: AtomicUsize,
}

impl InMemoryConfigRegister {
    pub fn value(&self, sys: SysId) -> ConfigValue {
        self.slots.lock().unwrap().get(&sys).copied().unwrap_or_default()
    }
}

impl ConfigRegisterPort for InMemoryConfigRegister {
    fn get(&self, sys: SysId) -> Result<ConfigValue, DomainError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(engine("register read failed"));
        }
        Ok(self.value(sys))
    }

    fn set(&self, sys: SysId, value: &ConfigValue) -> Result<(), DomainError> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(engine("register write failed"));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.slots.lock().unwrap().insert(sys, *value);
        Ok(())
    }
}

// ── Opt map ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryOptMap {
    pub tcp: Mutex<BTreeMap<OptKey, OptValue>>,
    pub udp: Mutex<BTreeMap<OptKey, OptValue>>,
    /// Keys whose upsert fails.
    pub poisoned: Mutex<HashSet<OptKey>>,
    pub fail_list: AtomicBool,
}

impl InMemoryOptMap {
    fn table(&self, proto: IpProto) -> Result<&Mutex<BTreeMap<OptKey, OptValue>>, DomainError> {
        match proto {
            IpProto::Tcp => Ok(&self.tcp),
            IpProto::Udp => Ok(&self.udp),
            IpProto::Other(n) => Err(DomainError::InvalidConfig(format!("no opt map for proto {n}"))),
        }
    }

    pub fn entries(&self, proto: IpProto) -> BTreeMap<OptKey, OptValue> {
        self.table(proto).map(|t| t.lock().unwrap().clone()).unwrap_or_default()
    }
}

impl OptMapPort for InMemoryOptMap {
    fn add_opt(&self, sys: SysId, key: &OptKey, value: &OptValue) -> Result<(), DomainError> {
        let mut key = *key;
        key.sys = sys;
        if self.poisoned.lock().unwrap().contains(&key) {
            return Err(engine("opt update failed"));
        }
        self.table(key.proto)?.lock().unwrap().insert(key, *value);
        Ok(())
    }

    fn del_opt(&self, sys: SysId, key: &OptKey) -> Result<(), DomainError> {
        let mut key = *key;
        key.sys = sys;
        self.table(key.proto)?.lock().unwrap().remove(&key);
        Ok(())
    }

    fn list_opts(&self, proto: IpProto) -> Result<Vec<(OptKey, OptValue)>, DomainError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(engine("opt map not pinned"));
        }
        Ok(self.entries(proto).into_iter().collect())
    }
}

// ── Trace port map ──────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryTracePortMap {
    pub entries: Mutex<HashMap<TracePortKey, TracePortValue>>,
}

impl TracePortMapPort for InMemoryTracePortMap {
    fn add_trace_port(
        &self,
        sys: SysId,
        key: &TracePortKey,
        value: &TracePortValue,
    ) -> Result<(), DomainError> {
        let mut key = *key;
        key.sys = sys;
        self.entries.lock().unwrap().insert(key, *value);
        Ok(())
    }

    fn del_trace_port(&self, sys: SysId, key: &TracePortKey) -> Result<(), DomainError> {
        let mut key = *key;
        key.sys = sys;
        self.entries.lock().unwrap().remove(&key);
        Ok(())
    }

    fn list_trace_ports(&self) -> Result<Vec<(TracePortKey, TracePortValue)>, DomainError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (*k, *v))
            .collect())
    }
}

// ── Flow tables + clock ─────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryFlowTable {
    pub tcp: Mutex<Vec<FlowRecord>>,
    pub udp: Mutex<Vec<FlowRecord>>,
    pub scans: AtomicUsize,
}

impl InMemoryFlowTable {
    fn table(&self, proto: IpProto) -> Result<&Mutex<Vec<FlowRecord>>, DomainError> {
        match proto {
            IpProto::Tcp => Ok(&self.tcp),
            IpProto::Udp => Ok(&self.udp),
            IpProto::Other(n) => Err(DomainError::InvalidConfig(format!("no flow table for proto {n}"))),
        }
    }

    pub fn len(&self, proto: IpProto) -> usize {
        self.table(proto).map(|t| t.lock().unwrap().len()).unwrap_or(0)
    }
}

impl FlowTablePort for InMemoryFlowTable {
    fn scan(&self, proto: IpProto) -> Result<Vec<FlowRecord>, DomainError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        Ok(self.table(proto)?.lock().unwrap().clone())
    }

    fn evict(&self, proto: IpProto, tuple: &FlowTuple) -> Result<(), DomainError> {
        self.table(proto)?
            .lock()
            .unwrap()
            .retain(|r| r.tuple != *tuple);
        Ok(())
    }
}

#[derive(Default)]
pub struct FixedClock(pub AtomicU64);

impl MonotonicClock for FixedClock {
    fn now_ns(&self) -> Result<u64, DomainError> {
        Ok(self.0.load(Ordering::SeqCst))
    }
}

// ── Program loader ──────────────────────────────────────────────────

pub struct FakeProgramLoader {
    pub toolchain_missing: AtomicBool,
    pub outcome: Mutex<LoadOutcome>,
    pub loads: AtomicUsize,
    pub unloads: AtomicUsize,
}

impl Default for FakeProgramLoader {
    fn default() -> Self {
        Self {
            toolchain_missing: AtomicBool::new(false),
            outcome: Mutex::new(LoadOutcome::Loaded),
            loads: AtomicUsize::new(0),
            unloads: AtomicUsize::new(0),
        }
    }
}

impl ProgramLoaderPort for FakeProgramLoader {
    fn load(&self) -> PortFuture<'_, LoadOutcome> {
        Box::pin(async move {
            if self.toolchain_missing.load(Ordering::SeqCst) {
                return Err(DomainError::ToolchainMissing("bpftool".to_string()));
            }
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.outcome.lock().unwrap().clone())
        })
    }

    fn unload(&self) -> PortFuture<'_, ()> {
        Box::pin(async move {
            self.unloads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

// ── Devices + sysctl ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingDevices {
    pub links: Mutex<HashSet<String>>,
    pub attached: Mutex<Vec<(SysId, String)>>,
    pub fail_tap: AtomicBool,
    pub fail_attach: AtomicBool,
}

impl RecordingDevices {
    pub fn has_link(&self, dev: &str) -> bool {
        self.links.lock().unwrap().contains(dev)
    }
}

impl DevicePort for RecordingDevices {
    fn add_tap<'a>(&'a self, dev: &'a str) -> PortFuture<'a, ()> {
        Box::pin(async move {
            if self.fail_tap.load(Ordering::SeqCst) {
                return Err(engine("ip tuntap failed"));
            }
            self.links.lock().unwrap().insert(dev.to_string());
            Ok(())
        })
    }

    fn remove_link<'a>(&'a self, dev: &'a str) -> PortFuture<'a, ()> {
        Box::pin(async move {
            self.links.lock().unwrap().remove(dev);
            Ok(())
        })
    }

    fn ifindex(&self, dev: &str) -> Result<u32, DomainError> {
        let links = self.links.lock().unwrap();
        if links.contains(dev) {
            Ok(10 + links.len() as u32)
        } else {
            Err(DomainError::NotFound(format!("link {dev}")))
        }
    }

    fn attach<'a>(&'a self, sys: SysId, dev: &'a str) -> PortFuture<'a, ()> {
        Box::pin(async move {
            if self.fail_attach.load(Ordering::SeqCst) {
                return Err(engine("tc attach failed"));
            }
            self.attached.lock().unwrap().push((sys, dev.to_string()));
            Ok(())
        })
    }
}

#[derive(Default)]
pub struct RecordingSysctl {
    pub values: Mutex<HashMap<String, String>>,
}

impl SysctlPort for RecordingSysctl {
    fn set(&self, key: &str, value: &str) -> Result<(), DomainError> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ── Pod network ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingPodNetwork {
    pub attached: Mutex<HashSet<(String, String)>>,
    pub attach_calls: AtomicUsize,
    pub netns: Mutex<Vec<String>>,
    pub fail_attach: AtomicBool,
}

impl PodNetworkPort for RecordingPodNetwork {
    fn attach<'a>(&'a self, _sys: SysId, netns: &'a str, if_name: &'a str) -> PortFuture<'a, ()> {
        Box::pin(async move {
            self.attach_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_attach.load(Ordering::SeqCst) {
                return Err(engine("nsenter failed"));
            }
            self.attached
                .lock()
                .unwrap()
                .insert((netns.to_string(), if_name.to_string()));
            Ok(())
        })
    }

    fn detach<'a>(&'a self, netns: &'a str, if_name: &'a str) -> PortFuture<'a, ()> {
        Box::pin(async move {
            self.attached
                .lock()
                .unwrap()
                .remove(&(netns.to_string(), if_name.to_string()));
            Ok(())
        })
    }

    fn list_netns(&self) -> PortFuture<'_, Vec<String>> {
        Box::pin(async move { Ok(self.netns.lock().unwrap().clone()) })
    }
}

// ── Plugin chain ────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakePluginChain {
    pub installed: AtomicBool,
    pub installs: AtomicUsize,
    pub cleanups: AtomicUsize,
    pub fail_install: AtomicBool,
}

impl PluginChainPort for FakePluginChain {
    fn install(&self) -> PortFuture<'_, ()> {
        Box::pin(async move {
            if self.fail_install.load(Ordering::SeqCst) {
                return Err(engine("net.d not writable"));
            }
            self.installs.fetch_add(1, Ordering::SeqCst);
            self.installed.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn is_installed(&self) -> Result<bool, DomainError> {
        Ok(self.installed.load(Ordering::SeqCst))
    }

    fn cleanup(&self) -> PortFuture<'_, ()> {
        Box::pin(async move {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
            self.installed.store(false, Ordering::SeqCst);
            Ok(())
        })
    }
}

// ── Cluster state ───────────────────────────────────────────────────

type Handler = (WatchCategory, ObjectFilter, PodEventSink);

#[derive(Default)]
pub struct FakeClusterState {
    pub pods: Mutex<Vec<PodInfo>>,
    pub sidecars: Mutex<Vec<PodInfo>>,
    pub namespaces: Mutex<Vec<NamespaceInfo>>,
    handlers: Mutex<Vec<Handler>>,
}

impl FakeClusterState {
    pub fn add_namespace(&self, name: &str) {
        self.namespaces.lock().unwrap().push(NamespaceInfo {
            name: name.to_string(),
            labels: BTreeMap::new(),
        });
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.lock().unwrap().len()
    }

    /// Deliver an event the way the watcher would.
    pub fn emit(&self, category: WatchCategory, event: PodEvent) {
        for (cat, filter, sink) in self.handlers.lock().unwrap().iter() {
            if *cat == category && filter(&event.pod) {
                sink(event.clone());
            }
        }
    }
}

impl ClusterStatePort for FakeClusterState {
    fn list_pods(&self, category: WatchCategory) -> Vec<PodInfo> {
        match category {
            WatchCategory::SidecarPod => self.sidecars.lock().unwrap().clone(),
            _ => self.pods.lock().unwrap().clone(),
        }
    }

    fn get_pod(&self, namespace: &str, name: &str) -> Option<PodInfo> {
        self.pods
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.namespace == namespace && p.name == name)
            .cloned()
    }

    fn list_namespaces(&self) -> Vec<NamespaceInfo> {
        self.namespaces.lock().unwrap().clone()
    }

    fn get_namespace(&self, name: &str) -> Option<NamespaceInfo> {
        self.namespaces
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.name == name)
            .cloned()
    }

    fn add_event_handler(&self, category: WatchCategory, filter: ObjectFilter, sink: PodEventSink) {
        self.handlers.lock().unwrap().push((category, filter, sink));
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

pub const TEST_SIDECAR_LABEL: &str = "fsm-proxy-uuid";

/// Running pod carrying the sidecar-uid label.
pub fn running_pod(namespace: &str, name: &str, ip: &str) -> PodInfo {
    let mut labels = BTreeMap::new();
    labels.insert(TEST_SIDECAR_LABEL.to_string(), format!("{name}-uid"));
    PodInfo {
        namespace: namespace.to_string(),
        name: name.to_string(),
        ip: Some(ip.to_string()),
        labels,
        phase: PodPhase::Running,
        ports: Vec::new(),
    }
}

/// Running sidecar with `inbound`/`outbound` named ports.
pub fn sidecar_pod(name: &str, ip: &str) -> PodInfo {
    PodInfo {
        namespace: "fsm-system".to_string(),
        name: name.to_string(),
        ip: Some(ip.to_string()),
        labels: BTreeMap::new(),
        phase: PodPhase::Running,
        ports: vec![
            NamedPort {
                name: "inbound".to_string(),
                port: 15003,
            },
            NamedPort {
                name: "outbound".to_string(),
                port: 15001,
            },
        ],
    }
}
