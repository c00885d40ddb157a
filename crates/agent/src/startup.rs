use std::path::{Path, PathBuf};
use std::sync::Arc;

use adapters::cni::chain::{ChainLayout, CniChainInstaller};
use adapters::ebpf::clock::UptimeClock;
use adapters::ebpf::config_register::PinnedConfigRegister;
use adapters::ebpf::flow_table::PinnedFlowTable;
use adapters::ebpf::loader::BpftoolLoader;
use adapters::ebpf::opt_map::PinnedOptMap;
use adapters::ebpf::pinned::PinnedMaps;
use adapters::http::server::{bind_unix_socket, serve_unix};
use adapters::http::state::{AppState, BuildInfo};
use adapters::k8s::cluster_state::{KubeClusterState, WatchSelectors};
use adapters::net::command::{CommandRunner, ProcessRunner};
use adapters::net::device::HostDeviceManager;
use adapters::net::pod_network::NsenterPodNetwork;
use adapters::net::sysctl::ProcSysctl;
use anyhow::Context;
use application::broker::MessageBroker;
use application::config_register_service::ConfigRegisterService;
use application::device_service::{BridgeDevice, DeviceService};
use application::lifecycle::{LifecycleSettings, NodeLifecycle, NodeServices};
use application::mesh_policy_service::MeshPolicyService;
use application::pod_network_service::PodNetworkService;
use application::pod_view_service::PodViewService;
use domain::mesh::planner::FilterPorts;
use domain::pod::policy::MonitorPolicy;
use infrastructure::config::AgentConfig;
use infrastructure::constants::{
    CNI_PLUGIN_NAME, CNI_RECHECK_INTERVAL, EVENT_BROADCAST_CAPACITY, GRACEFUL_SHUTDOWN_TIMEOUT,
    HTTP_TIMEOUT, KUBE_SYNC_TIMEOUT, POD_REPAIR_INTERVAL, RECONCILE_DEBOUNCE, TOOLCHAIN_TIMEOUT,
};
use infrastructure::logging::init_logging;
use infrastructure::metrics::AgentMetrics;
use ports::secondary::metrics_port::MetricsPort;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::Cli;

pub const BUILD: BuildInfo = BuildInfo {
    version: env!("CARGO_PKG_VERSION"),
    git_commit: match option_env!("XNET_GIT_COMMIT") {
        Some(v) => v,
        None => "unknown",
    },
    build_date: match option_env!("XNET_BUILD_DATE") {
        Some(v) => v,
        None => "unknown",
    },
};

/// Load the configuration file and fold the command-line overrides in.
pub fn load_config(cli: &Cli) -> anyhow::Result<AgentConfig> {
    let mut config = AgentConfig::load_or_default(Path::new(&cli.config))?;
    cli.features.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn lifecycle_settings(config: &AgentConfig) -> anyhow::Result<LifecycleSettings> {
    Ok(LifecycleSettings {
        upgrade: config.lifecycle.upgrade,
        uninstall: config.lifecycle.uninstall,
        mesh_enabled: config.mesh.enabled,
        mesh_magic: config.mesh_magic()?,
        e4lb_enabled: config.e4lb.enabled,
        e4lb_ipv4: config.e4lb.ipv4,
        e4lb_ipv6: config.e4lb.ipv6,
        e4lb_magic: config.e4lb_magic()?,
        bridges: config
            .bridges
            .iter()
            .map(|b| BridgeDevice {
                name: b.name.clone(),
                mac: b.mac.clone(),
            })
            .collect(),
        tcp_flush: config.conntrack.tcp.clone(),
        udp_flush: config.conntrack.udp.clone(),
        reconcile_debounce: RECONCILE_DEBOUNCE,
        pod_repair_interval: POD_REPAIR_INTERVAL,
        chain_recheck_interval: CNI_RECHECK_INTERVAL,
    })
}

fn watch_selectors(config: &AgentConfig) -> WatchSelectors {
    WatchSelectors {
        namespace_monitor_label: config.kube.namespace_monitor_label.clone(),
        mesh_name: config.mesh.name.clone(),
        mesh_namespace: config.mesh.namespace.clone(),
        sidecar_pod_selector: config.kube.sidecar_pod_selector.clone(),
        node_name: config.kube.node_name.clone(),
    }
}

/// Run the agent startup sequence and block until shutdown.
#[allow(clippy::too_many_lines)] // startup is inherently sequential and long
pub async fn run(cli: &Cli) -> anyhow::Result<()> {
    // ── 1. Load config ──────────────────────────────────────────────
    let config = load_config(cli)?;

    // ── 2. Initialize logging ───────────────────────────────────────
    // CLI flags take precedence over config file
    let log_level = cli.log_level.unwrap_or(config.agent.log_level);
    let log_format = cli.log_format.unwrap_or(config.agent.log_format);
    init_logging(log_level, log_format)?;

    let _root_span = tracing::span!(
        tracing::Level::INFO,
        "service",
        service.name = "xnet",
        service.version = BUILD.version,
    )
    .entered();

    info!(
        config_path = %cli.config,
        log_level = log_level.as_str(),
        log_format = log_format.as_str(),
        mesh = config.mesh.enabled,
        e4lb = config.e4lb.enabled,
        upgrade = config.lifecycle.upgrade,
        uninstall = config.lifecycle.uninstall,
        "xnet agent starting"
    );

    let settings = lifecycle_settings(&config)?;
    let metrics = Arc::new(AgentMetrics::new());
    let metrics_port: Arc<dyn MetricsPort> = Arc::clone(&metrics) as Arc<dyn MetricsPort>;
    let cancel_token = crate::shutdown::create_shutdown_token();

    // ── 3. Cluster watches ──────────────────────────────────────────
    let client = kube::Client::try_default()
        .await
        .context("failed to build Kubernetes client")?;
    let cluster = Arc::new(KubeClusterState::new());
    let watch_handles = cluster.spawn_watches(client, &watch_selectors(&config), cancel_token.clone());
    if !cluster.wait_synced(KUBE_SYNC_TIMEOUT).await {
        warn!(
            timeout_secs = KUBE_SYNC_TIMEOUT.as_secs(),
            "cluster caches not synced, continuing with partial view"
        );
    }

    // ── 4. Kernel and host adapters ─────────────────────────────────
    let node = &config.node;
    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new(TOOLCHAIN_TIMEOUT));
    let maps = PinnedMaps::new(&node.pin_dir);
    let opt = Arc::new(PinnedOptMap::new(maps.clone()));
    let registers = Arc::new(ConfigRegisterService::new(Arc::new(
        PinnedConfigRegister::new(maps.clone()),
    )));

    let view = Arc::new(PodViewService::new(
        cluster,
        MonitorPolicy::new(
            config.mesh.exclude_namespaces.clone(),
            config.kube.sidecar_uid_label.clone(),
        ),
    ));
    let devices = Arc::new(DeviceService::new(
        Arc::new(HostDeviceManager::new(Arc::clone(&runner), node.pin_dir.clone())),
        Arc::new(ProcSysctl::new(&node.proc_dir)),
        Arc::clone(&registers),
        config.e4lb.device.clone(),
    ));
    let mesh_policy = Arc::new(MeshPolicyService::new(
        Arc::clone(&view),
        opt.clone(),
        Arc::clone(&registers),
        FilterPorts {
            inbound: config.mesh.filter_port_inbound.clone(),
            outbound: config.mesh.filter_port_outbound.clone(),
        },
        Arc::clone(&metrics_port),
    ));
    let pod_network = Arc::new(PodNetworkService::new(
        Arc::clone(&view),
        Arc::new(NsenterPodNetwork::new(
            Arc::clone(&runner),
            node.pin_dir.clone(),
            node.netns_search_dirs().into_iter().map(PathBuf::from).collect(),
        )),
        opt,
        Arc::clone(&metrics_port),
    ));
    let socket_path = config.socket_path();
    let chain = Arc::new(CniChainInstaller::new(ChainLayout {
        app_dir: PathBuf::from(&node.app_dir),
        cni_bin_dir: PathBuf::from(&node.cni_bin_dir),
        cni_netd_dir: PathBuf::from(&node.cni_netd_dir),
        socket_path: socket_path.clone(),
        plugin_name: CNI_PLUGIN_NAME.to_string(),
    }));

    let services = NodeServices {
        loader: Arc::new(BpftoolLoader::new(
            Arc::clone(&runner),
            &node.prog_path,
            &node.pin_dir,
        )),
        registers,
        devices,
        view,
        broker: MessageBroker::new(EVENT_BROADCAST_CAPACITY),
        mesh_policy,
        pod_network: Arc::clone(&pod_network),
        chain,
        flow_table: Arc::new(PinnedFlowTable::new(maps)),
        clock: Arc::new(UptimeClock::new(&node.proc_dir)),
        metrics: metrics_port,
    };

    // ── 5. Control socket bind ──────────────────────────────────────
    let listener = bind_unix_socket(Path::new(&socket_path))?;

    // ── 6. Node lifecycle ───────────────────────────────────────────
    let mut lifecycle = NodeLifecycle::new(settings, services, cancel_token.child_token());
    let outcome = lifecycle
        .start()
        .await
        .context("node lifecycle failed to start")?;
    info!(
        tasks = ?lifecycle.running_tasks(),
        pod_callbacks = outcome.serve_pod_callbacks,
        "node lifecycle started"
    );

    // ── 7. Control socket ───────────────────────────────────────────
    let mut state = AppState::new(Arc::clone(&metrics), BUILD);
    if outcome.serve_pod_callbacks {
        state = state.with_pod_network(pod_network);
    }
    let server_token = CancellationToken::new();
    let server_handle = {
        let state = Arc::new(state);
        let shutdown = server_token.clone().cancelled_owned();
        tokio::spawn(async move {
            if let Err(e) = serve_unix(listener, state, shutdown).await {
                tracing::error!(error = %e, "control API server failed");
            }
        })
    };

    // ── 8. Ready, wait for cancellation ────────────────────────────
    info!(socket = %socket_path, "agent ready, waiting for shutdown signal");
    cancel_token.cancelled().await;

    // ── 9. Ordered shutdown sequence ────────────────────────────────
    info!("shutdown phase 1: stopping node tasks and plugin chain");
    lifecycle.shutdown(GRACEFUL_SHUTDOWN_TIMEOUT).await;

    info!("shutdown phase 2: draining control socket");
    server_token.cancel();
    if tokio::time::timeout(HTTP_TIMEOUT, server_handle).await.is_err() {
        warn!("control socket did not drain in time");
    }

    info!("shutdown phase 3: stopping cluster watches");
    for handle in watch_handles {
        let _ = tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, handle).await;
    }

    info!("agent stopped");
    Ok(())
}
