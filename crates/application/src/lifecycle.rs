//! Node startup sequence and ordered teardown.

use std::sync::Arc;
use std::time::Duration;

use domain::common::entity::{IpProto, SysId};
use domain::common::error::DomainError;
use domain::config::policy::MagicOverride;
use domain::conntrack::entity::{FlushParams, FlushTarget};
use ports::secondary::flow_table_port::{FlowTablePort, MonotonicClock};
use ports::secondary::metrics_port::MetricsPort;
use ports::secondary::plugin_chain_port::PluginChainPort;
use ports::secondary::program_loader_port::{LoadOutcome, ProgramLoaderPort};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::broker::MessageBroker;
use crate::config_register_service::ConfigRegisterService;
use crate::conntrack_flush::ConnTrackFlushJob;
use crate::device_service::{BridgeDevice, DeviceService};
use crate::mesh_policy_service::MeshPolicyService;
use crate::plugin_chain_service::PluginChainService;
use crate::pod_network_service::PodNetworkService;
use crate::pod_view_service::PodViewService;
use crate::reconciler::BroadcastListener;

/// Name under which the program bundle's status is reported.
const PROGRAM_BUNDLE: &str = "xnet";

/// Feature switches and tunables for one agent run.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub upgrade: bool,
    pub uninstall: bool,
    pub mesh_enabled: bool,
    pub mesh_magic: MagicOverride,
    pub e4lb_enabled: bool,
    pub e4lb_ipv4: bool,
    pub e4lb_ipv6: bool,
    pub e4lb_magic: MagicOverride,
    pub bridges: Vec<BridgeDevice>,
    pub tcp_flush: FlushParams,
    pub udp_flush: FlushParams,
    pub reconcile_debounce: Duration,
    pub pod_repair_interval: Duration,
    pub chain_recheck_interval: Duration,
}

/// Everything the orchestrator drives.
pub struct NodeServices {
    pub loader: Arc<dyn ProgramLoaderPort>,
    pub registers: Arc<ConfigRegisterService>,
    pub devices: Arc<DeviceService>,
    pub view: Arc<PodViewService>,
    pub broker: MessageBroker,
    pub mesh_policy: Arc<MeshPolicyService>,
    pub pod_network: Arc<PodNetworkService>,
    pub chain: Arc<dyn PluginChainPort>,
    pub flow_table: Arc<dyn FlowTablePort>,
    pub clock: Arc<dyn MonotonicClock>,
    pub metrics: Arc<dyn MetricsPort>,
}

/// Which callback routes the transport must expose after `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartOutcome {
    pub serve_pod_callbacks: bool,
}

pub struct NodeLifecycle {
    settings: LifecycleSettings,
    services: NodeServices,
    cancel_token: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl NodeLifecycle {
    pub fn new(
        settings: LifecycleSettings,
        services: NodeServices,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            settings,
            services,
            cancel_token,
            tasks: Vec::new(),
        }
    }

    pub fn running_tasks(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|(name, _)| *name).collect()
    }

    /// Run the startup sequence. Returns `Err` only for conditions that
    /// leave the dataplane in an unknown state.
    pub async fn start(&mut self) -> Result<StartOutcome, DomainError> {
        if self.settings.upgrade || self.settings.uninstall {
            self.teardown_previous().await;
        }

        if self.settings.uninstall {
            info!("uninstall complete, serving version only");
            return Ok(StartOutcome {
                serve_pod_callbacks: false,
            });
        }

        self.load_programs().await?;
        self.services
            .devices
            .attach_bridges(&self.settings.bridges)
            .await;

        if self.settings.e4lb_enabled {
            self.services.registers.init_e4lb(
                &self.settings.e4lb_magic,
                self.settings.e4lb_ipv4,
                self.settings.e4lb_ipv6,
            )?;
            self.services.devices.repair_e4lb().await;
        } else if let Err(e) = self.services.devices.e4lb_off().await {
            warn!(error = %e, "e4lb off failed");
        }

        if !self.settings.mesh_enabled {
            if let Err(e) = self.services.chain.cleanup().await {
                warn!(error = %e, "plugin chain cleanup failed");
            }
            let pod_network = Arc::clone(&self.services.pod_network);
            self.spawn("pod-reset", async move {
                if let Err(e) = pod_network.reset().await {
                    warn!(error = %e, "pod reset failed");
                }
            });
            return Ok(StartOutcome {
                serve_pod_callbacks: false,
            });
        }

        self.services
            .registers
            .init_mesh(&self.settings.mesh_magic)?;
        self.services
            .view
            .register_sidecar_handler(self.services.broker.clone());

        let (ready_tx, ready_rx) = oneshot::channel();
        let installer = PluginChainService::new(
            Arc::clone(&self.services.chain),
            self.settings.chain_recheck_interval,
        );
        self.spawn("plugin-chain", installer.run(ready_tx, self.cancel_token.clone()));

        tokio::select! {
            ready = ready_rx => {
                if ready.is_err() {
                    info!("stopped before plugin chain became ready");
                    return Ok(StartOutcome { serve_pod_callbacks: true });
                }
            }
            () = self.cancel_token.cancelled() => {
                return Ok(StartOutcome { serve_pod_callbacks: true });
            }
        }
        info!("plugin chain ready, starting mesh tasks");

        self.start_mesh_tasks()?;
        Ok(StartOutcome {
            serve_pod_callbacks: true,
        })
    }

    async fn teardown_previous(&self) {
        info!(
            upgrade = self.settings.upgrade,
            uninstall = self.settings.uninstall,
            "tearing down previous installation"
        );
        if let Err(e) = self.services.devices.e4lb_off().await {
            warn!(error = %e, "e4lb off failed");
        }
        if let Err(e) = self.services.chain.cleanup().await {
            warn!(error = %e, "plugin chain cleanup failed");
        }
        if let Err(e) = self.services.pod_network.reset().await {
            warn!(error = %e, "pod reset failed");
        }
        match self.services.loader.unload().await {
            Ok(()) => self
                .services
                .metrics
                .set_ebpf_program_status(PROGRAM_BUNDLE, false),
            Err(e) => warn!(error = %e, "program unload failed"),
        }
    }

    async fn load_programs(&self) -> Result<(), DomainError> {
        let outcome = match self.services.loader.load().await {
            Ok(outcome) => outcome,
            Err(e @ DomainError::ToolchainMissing(_)) => return Err(e),
            Err(e) => {
                error!(error = %e, "program load failed");
                self.services
                    .metrics
                    .set_ebpf_program_status(PROGRAM_BUNDLE, false);
                return Ok(());
            }
        };
        match outcome {
            LoadOutcome::AlreadyPinned => info!("programs already pinned"),
            LoadOutcome::Loaded => {
                info!("programs loaded and pinned");
                if let Err(e) = self.services.registers.init_bookkeeping() {
                    warn!(error = %e, "register bookkeeping init failed");
                }
            }
            LoadOutcome::Failed(stderr) => {
                error!(stderr = %stderr, "program load failed");
                self.services
                    .metrics
                    .set_ebpf_program_status(PROGRAM_BUNDLE, false);
                return Ok(());
            }
        }
        self.services
            .metrics
            .set_ebpf_program_status(PROGRAM_BUNDLE, true);
        Ok(())
    }

    fn start_mesh_tasks(&mut self) -> Result<(), DomainError> {
        let listener = BroadcastListener::new(
            Arc::clone(&self.services.mesh_policy),
            self.settings.reconcile_debounce,
        );
        let updates = self.services.broker.subscribe_sidecar_updates();
        self.spawn("reconciler", listener.run(updates, self.cancel_token.clone()));

        let repair = Arc::clone(&self.services.pod_network).run_repair(
            self.settings.pod_repair_interval,
            self.cancel_token.clone(),
        );
        self.spawn("pod-repair", repair);

        let jobs = [
            (IpProto::Tcp, self.settings.tcp_flush.clone(), "tcp-flush"),
            (IpProto::Udp, self.settings.udp_flush.clone(), "udp-flush"),
        ];
        for (proto, params, name) in jobs {
            let job = ConnTrackFlushJob::new(
                FlushTarget {
                    proto,
                    sys: SysId::Mesh,
                },
                &params,
                Arc::clone(&self.services.flow_table),
                Arc::clone(&self.services.clock),
                Arc::clone(&self.services.metrics),
            )?;
            if let Some(job) = job {
                self.spawn(name, job.run(self.cancel_token.clone()));
            }
        }
        Ok(())
    }

    fn spawn<F>(&mut self, name: &'static str, fut: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.tasks.push((name, tokio::spawn(fut)));
    }

    /// Cancel every task and wait for them, plugin chain cleanup included,
    /// up to `grace`.
    pub async fn shutdown(self, grace: Duration) {
        self.cancel_token.cancel();
        for (name, handle) in self.tasks {
            match tokio::time::timeout(grace, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(task = name, error = %e, "task panicked"),
                Err(_) => warn!(task = name, "task did not stop in time"),
            }
        }
        info!("node lifecycle stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use domain::config::entity::CfgFlag;
    use domain::mesh::planner::FilterPorts;
    use domain::pod::policy::MonitorPolicy;
    use ports::test_utils::{
        FakeClusterState, FakePluginChain, FakeProgramLoader, FixedClock, InMemoryConfigRegister,
        InMemoryFlowTable, InMemoryOptMap, NoopMetrics, RecordingDevices, RecordingPodNetwork,
        RecordingSysctl, TEST_SIDECAR_LABEL,
    };

    use super::*;

    struct Harness {
        loader: Arc<FakeProgramLoader>,
        registers: Arc<InMemoryConfigRegister>,
        devices: Arc<RecordingDevices>,
        chain: Arc<FakePluginChain>,
        cluster: Arc<FakeClusterState>,
        broker: MessageBroker,
    }

    fn settings() -> LifecycleSettings {
        LifecycleSettings {
            upgrade: false,
            uninstall: false,
            mesh_enabled: true,
            mesh_magic: MagicOverride::default(),
            e4lb_enabled: false,
            e4lb_ipv4: true,
            e4lb_ipv6: true,
            e4lb_magic: MagicOverride::default(),
            bridges: Vec::new(),
            tcp_flush: FlushParams::tcp_default(),
            udp_flush: FlushParams::udp_default(),
            reconcile_debounce: Duration::from_secs(4),
            pod_repair_interval: Duration::from_secs(30),
            chain_recheck_interval: Duration::from_secs(5),
        }
    }

    fn lifecycle(settings: LifecycleSettings) -> (Harness, NodeLifecycle) {
        let loader = Arc::new(FakeProgramLoader::default());
        let registers = Arc::new(InMemoryConfigRegister::default());
        let devices = Arc::new(RecordingDevices::default());
        let chain = Arc::new(FakePluginChain::default());
        let cluster = Arc::new(FakeClusterState::default());
        let opt = Arc::new(InMemoryOptMap::default());
        let metrics: Arc<dyn MetricsPort> = Arc::new(NoopMetrics);
        let broker = MessageBroker::new(64);

        let register_service = Arc::new(ConfigRegisterService::new(registers.clone()));
        let view = Arc::new(PodViewService::new(
            cluster.clone(),
            MonitorPolicy::new(Vec::new(), TEST_SIDECAR_LABEL),
        ));
        let services = NodeServices {
            loader: loader.clone(),
            registers: register_service.clone(),
            devices: Arc::new(DeviceService::new(
                devices.clone(),
                Arc::new(RecordingSysctl::default()),
                register_service.clone(),
                "flb0",
            )),
            view: view.clone(),
            broker: broker.clone(),
            mesh_policy: Arc::new(MeshPolicyService::new(
                view.clone(),
                opt.clone(),
                register_service,
                FilterPorts {
                    inbound: "inbound".to_string(),
                    outbound: "outbound".to_string(),
                },
                metrics.clone(),
            )),
            pod_network: Arc::new(PodNetworkService::new(
                view,
                Arc::new(RecordingPodNetwork::default()),
                opt,
                metrics.clone(),
            )),
            chain: chain.clone(),
            flow_table: Arc::new(InMemoryFlowTable::default()),
            clock: Arc::new(FixedClock::default()),
            metrics,
        };
        let harness = Harness {
            loader,
            registers,
            devices,
            chain,
            cluster,
            broker,
        };
        (
            harness,
            NodeLifecycle::new(settings, services, CancellationToken::new()),
        )
    }

    #[tokio::test]
    async fn mesh_on_e4lb_off_installs_chain_and_sets_acl() {
        let (h, mut node) = lifecycle(settings());
        let outcome = node.start().await.unwrap();

        assert!(outcome.serve_pod_callbacks);
        assert!(h.chain.installed.load(Ordering::SeqCst));
        assert!(h.registers.value(SysId::Mesh).ipv4.is_set(CfgFlag::AclCheckOn));
        assert!(!h.devices.has_link("flb0"));
        assert!(h.devices.attached.lock().unwrap().is_empty());
        assert_eq!(h.cluster.handler_count(), 1);
        assert_eq!(
            node.running_tasks(),
            vec!["plugin-chain", "reconciler", "pod-repair", "tcp-flush", "udp-flush"]
        );
        assert_eq!(h.broker.subscriber_count(), 1);

        node.shutdown(Duration::from_secs(5)).await;
        assert_eq!(h.chain.cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dependent_tasks_wait_for_chain_readiness() {
        let (h, mut node) = lifecycle(settings());
        h.chain.fail_install.store(true, Ordering::SeqCst);
        let cancel = node.cancel_token.clone();
        let starter = tokio::spawn(async move {
            let outcome = node.start().await;
            (outcome, node)
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.broker.subscriber_count(), 0);

        cancel.cancel();
        let (outcome, node) = starter.await.unwrap();
        assert!(outcome.is_ok());
        assert_eq!(node.running_tasks(), vec!["plugin-chain"]);
        assert_eq!(h.broker.subscriber_count(), 0);
        node.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn missing_toolchain_is_fatal() {
        let (h, mut node) = lifecycle(settings());
        h.loader.toolchain_missing.store(true, Ordering::SeqCst);
        let err = node.start().await.unwrap_err();
        assert!(matches!(err, DomainError::ToolchainMissing(_)));
        assert!(!h.chain.installed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failed_load_is_not_fatal() {
        let (h, mut node) = lifecycle(settings());
        *h.loader.outcome.lock().unwrap() = LoadOutcome::Failed("verifier".to_string());
        assert!(node.start().await.is_ok());
        node.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn register_failure_during_init_is_fatal() {
        let (h, mut node) = lifecycle(settings());
        h.registers.fail_set.store(true, Ordering::SeqCst);
        assert!(node.start().await.is_err());
    }

    #[tokio::test]
    async fn e4lb_enabled_brings_device_up() {
        let mut s = settings();
        s.e4lb_enabled = true;
        s.mesh_enabled = false;
        let (h, mut node) = lifecycle(s);
        let outcome = node.start().await.unwrap();

        assert!(!outcome.serve_pod_callbacks);
        assert!(h.devices.has_link("flb0"));
        assert!(
            h.registers
                .value(SysId::E4lb)
                .ipv4
                .is_set(CfgFlag::TcpNatByIpPortOn)
        );
        assert_eq!(h.chain.cleanups.load(Ordering::SeqCst), 1);
        assert_eq!(node.running_tasks(), vec!["pod-reset"]);
        node.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn uninstall_tears_down_and_loads_nothing() {
        let mut s = settings();
        s.uninstall = true;
        let (h, mut node) = lifecycle(s);
        let outcome = node.start().await.unwrap();

        assert!(!outcome.serve_pod_callbacks);
        assert_eq!(h.loader.unloads.load(Ordering::SeqCst), 1);
        assert_eq!(h.loader.loads.load(Ordering::SeqCst), 0);
        assert_eq!(h.chain.cleanups.load(Ordering::SeqCst), 1);
        assert!(node.running_tasks().is_empty());
    }

    #[tokio::test]
    async fn upgrade_unloads_then_reloads() {
        let mut s = settings();
        s.upgrade = true;
        let (h, mut node) = lifecycle(s);
        node.start().await.unwrap();
        assert_eq!(h.loader.unloads.load(Ordering::SeqCst), 1);
        assert_eq!(h.loader.loads.load(Ordering::SeqCst), 1);
        node.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn bridges_are_attached_to_mesh() {
        let mut s = settings();
        s.bridges = vec![BridgeDevice {
            name: "cni0".to_string(),
            mac: None,
        }];
        let (h, mut node) = lifecycle(s);
        node.start().await.unwrap();
        assert_eq!(
            *h.devices.attached.lock().unwrap(),
            vec![(SysId::Mesh, "cni0".to_string())]
        );
        node.shutdown(Duration::from_secs(5)).await;
    }
}
