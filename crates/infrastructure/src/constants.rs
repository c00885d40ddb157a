use std::time::Duration;

// ── Paths ──────────────────────────────────────────────────────────

pub const DEFAULT_CONFIG_PATH: &str = "/etc/xnet/config.yaml";

/// Prebuilt kernel program bundle loaded by the toolchain.
pub const DEFAULT_PROG_PATH: &str = "/app/xnet.kern.o";

/// bpffs directory holding pinned programs and maps.
pub const DEFAULT_PIN_DIR: &str = "/sys/fs/bpf/fsm";

/// Directory holding the plugin binary shipped with the agent image.
pub const DEFAULT_APP_DIR: &str = "/app";

/// Control socket file name, created under the host run mount.
pub const CNI_SOCK_NAME: &str = "xnet-cni.sock";

/// Plugin binary and chain entry type.
pub const CNI_PLUGIN_NAME: &str = "xnet-cni";

// ── Host mounts (host path → path inside the agent container) ──────

pub const MOUNT_SYS_FS: &str = "/host/sys/fs";
pub const MOUNT_SYS_RUN: &str = "/host/run";
pub const MOUNT_SYS_PROC: &str = "/host/proc";
pub const MOUNT_CNI_BIN: &str = "/host/cni/bin";
pub const MOUNT_CNI_NETD: &str = "/host/cni/net.d";

// ── Control socket routes ──────────────────────────────────────────

pub const VERSION_URI: &str = "/version";
pub const CREATE_POD_URI: &str = "/v1/cni/pod/create";
pub const DELETE_POD_URI: &str = "/v1/cni/pod/delete";
pub const METRICS_URI: &str = "/metrics";

// ── Timing ─────────────────────────────────────────────────────────

/// Quiet period after the last sidecar event before reconciling.
pub const RECONCILE_DEBOUNCE: Duration = Duration::from_secs(4);

/// Upper bound on every external toolchain invocation.
pub const TOOLCHAIN_TIMEOUT: Duration = Duration::from_secs(4);

/// Interval of the pod attachment repair loop.
pub const POD_REPAIR_INTERVAL: Duration = Duration::from_secs(30);

/// Interval at which the plugin chain presence is re-checked.
pub const CNI_RECHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Read/write/header timeout of the control socket server, and its drain grace.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on the initial list of every cluster watch.
pub const KUBE_SYNC_TIMEOUT: Duration = Duration::from_secs(60);

// ── Channel capacities ─────────────────────────────────────────────

pub const EVENT_BROADCAST_CAPACITY: usize = 1_024;

// ── E4lb ───────────────────────────────────────────────────────────

pub const DEFAULT_E4LB_DEVICE: &str = "flb0";
