use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_APP_DIR, DEFAULT_PIN_DIR, DEFAULT_PROG_PATH, MOUNT_CNI_BIN, MOUNT_CNI_NETD, MOUNT_SYS_FS,
    MOUNT_SYS_PROC, MOUNT_SYS_RUN,
};

/// Host paths as seen from inside the agent container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    #[serde(default = "default_cni_bin")]
    pub cni_bin_dir: String,

    #[serde(default = "default_cni_netd")]
    pub cni_netd_dir: String,

    #[serde(default = "default_sys_fs")]
    pub sys_fs_dir: String,

    #[serde(default = "default_sys_run")]
    pub sys_run_dir: String,

    #[serde(default = "default_proc")]
    pub proc_dir: String,

    /// bpffs directory for pinned programs and maps.
    #[serde(default = "default_pin_dir")]
    pub pin_dir: String,

    #[serde(default = "default_prog_path")]
    pub prog_path: String,

    #[serde(default = "default_app_dir")]
    pub app_dir: String,

    /// Extra network namespace directories; `<sys_run_dir>/netns` and
    /// `<sys_run_dir>/docker/netns` are always searched.
    #[serde(default)]
    pub netns_dirs: Vec<String>,
}

impl NodeConfig {
    /// Every candidate directory holding pod network namespaces.
    pub fn netns_search_dirs(&self) -> Vec<String> {
        let mut dirs = vec![
            format!("{}/netns", self.sys_run_dir),
            format!("{}/docker/netns", self.sys_run_dir),
        ];
        for dir in &self.netns_dirs {
            if !dirs.contains(dir) {
                dirs.push(dir.clone());
            }
        }
        dirs
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            cni_bin_dir: default_cni_bin(),
            cni_netd_dir: default_cni_netd(),
            sys_fs_dir: default_sys_fs(),
            sys_run_dir: default_sys_run(),
            proc_dir: default_proc(),
            pin_dir: default_pin_dir(),
            prog_path: default_prog_path(),
            app_dir: default_app_dir(),
            netns_dirs: Vec::new(),
        }
    }
}

/// A CNI bridge the Mesh classifiers are attached to at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    pub name: String,

    #[serde(default)]
    pub mac: Option<String>,
}

fn default_cni_bin() -> String {
    MOUNT_CNI_BIN.to_string()
}
fn default_cni_netd() -> String {
    MOUNT_CNI_NETD.to_string()
}
fn default_sys_fs() -> String {
    MOUNT_SYS_FS.to_string()
}
fn default_sys_run() -> String {
    MOUNT_SYS_RUN.to_string()
}
fn default_proc() -> String {
    MOUNT_SYS_PROC.to_string()
}
fn default_pin_dir() -> String {
    DEFAULT_PIN_DIR.to_string()
}
fn default_prog_path() -> String {
    DEFAULT_PROG_PATH.to_string()
}
fn default_app_dir() -> String {
    DEFAULT_APP_DIR.to_string()
}
