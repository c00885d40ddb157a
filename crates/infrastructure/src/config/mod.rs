//! Agent configuration: structs, parsing, and validation.
//!
//! The config module is split across several sub-modules:
//! - `common`: shared helpers and `ConfigError`
//! - `mesh`, `e4lb`, `conntrack`, `node`, `kube`: per-section configs

mod common;
mod conntrack;
mod e4lb;
mod kube;
mod mesh;
mod node;

pub use common::{ConfigError, parse_mac};
pub use conntrack::ConnTrackConfig;
pub use e4lb::E4lbConfig;
pub use kube::KubeConfig;
pub use mesh::MeshConfig;
pub use node::{BridgeConfig, NodeConfig};

use std::path::Path;

use domain::config::policy::{MagicOverride, parse_magic};
use domain::conntrack::entity::FlushParams;
use domain::conntrack::schedule::FlushSchedule;
use serde::{Deserialize, Serialize};

use crate::constants::CNI_SOCK_NAME;
use common::{validation, warn_if_world_readable};

// ── Top-level config ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    #[serde(default)]
    pub agent: AgentInfo,

    #[serde(default)]
    pub mesh: MeshConfig,

    #[serde(default)]
    pub e4lb: E4lbConfig,

    #[serde(default)]
    pub conntrack: ConnTrackConfig,

    #[serde(default)]
    pub node: NodeConfig,

    #[serde(default)]
    pub bridges: Vec<BridgeConfig>,

    #[serde(default)]
    pub kube: KubeConfig,

    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

impl AgentConfig {
    /// Load config from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        warn_if_world_readable(path, "config file");
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load from `path` when it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the config after deserialization.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mesh.name.trim().is_empty() {
            return Err(validation("mesh.name", "mesh name must not be empty"));
        }
        if self.mesh.namespace.trim().is_empty() {
            return Err(validation(
                "mesh.namespace",
                "mesh control plane namespace must not be empty",
            ));
        }
        if self.mesh.filter_port_inbound.is_empty() || self.mesh.filter_port_outbound.is_empty()
        {
            return Err(validation(
                "mesh.filter_port_inbound",
                "sidecar filter port names must not be empty",
            ));
        }

        let magics = [
            ("mesh.cfg_ipv4_magic", &self.mesh.cfg_ipv4_magic),
            ("mesh.cfg_ipv6_magic", &self.mesh.cfg_ipv6_magic),
            ("e4lb.cfg_ipv4_magic", &self.e4lb.cfg_ipv4_magic),
            ("e4lb.cfg_ipv6_magic", &self.e4lb.cfg_ipv6_magic),
        ];
        for (field, token) in magics {
            parse_magic(token).map_err(|e| validation(field, e.to_string()))?;
        }

        if self.e4lb.enabled && self.e4lb.device.trim().is_empty() {
            return Err(validation("e4lb.device", "tap device name must not be empty"));
        }

        validate_flush("conntrack.tcp", &self.conntrack.tcp)?;
        validate_flush("conntrack.udp", &self.conntrack.udp)?;

        for (idx, bridge) in self.bridges.iter().enumerate() {
            if bridge.name.trim().is_empty() {
                return Err(validation(
                    &format!("bridges[{idx}].name"),
                    "bridge name must not be empty",
                ));
            }
            if let Some(ref mac) = bridge.mac {
                parse_mac(mac).map_err(|e| validation(&format!("bridges[{idx}].mac"), e.to_string()))?;
            }
        }

        if self.lifecycle.upgrade && self.lifecycle.uninstall {
            return Err(validation(
                "lifecycle",
                "upgrade and uninstall are mutually exclusive",
            ));
        }

        Ok(())
    }

    pub fn mesh_magic(&self) -> Result<MagicOverride, ConfigError> {
        MagicOverride::parse(&self.mesh.cfg_ipv4_magic, &self.mesh.cfg_ipv6_magic)
            .map_err(|e| validation("mesh.cfg_magic", e.to_string()))
    }

    pub fn e4lb_magic(&self) -> Result<MagicOverride, ConfigError> {
        MagicOverride::parse(&self.e4lb.cfg_ipv4_magic, &self.e4lb.cfg_ipv6_magic)
            .map_err(|e| validation("e4lb.cfg_magic", e.to_string()))
    }

    /// Unix socket the CNI plugin calls back on.
    pub fn socket_path(&self) -> String {
        self.agent
            .socket_path
            .clone()
            .unwrap_or_else(|| format!("{}/{CNI_SOCK_NAME}", self.node.sys_run_dir))
    }
}

fn validate_flush(field: &str, params: &FlushParams) -> Result<(), ConfigError> {
    if !params.is_active() {
        return Ok(());
    }
    FlushSchedule::parse(&params.crontab)
        .map(|_| ())
        .map_err(|e| validation(&format!("{field}.crontab"), e.to_string()))
}

// ── Agent info ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentInfo {
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    /// CNI callback socket. Defaults to `<node.sys_run_dir>/xnet-cni.sock`.
    #[serde(default)]
    pub socket_path: Option<String>,
}

impl Default for AgentInfo {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            socket_path: None,
        }
    }
}

/// One-shot program bundle maintenance modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LifecycleConfig {
    /// Unload then reload the program bundle at startup.
    #[serde(default)]
    pub upgrade: bool,

    /// Tear everything down and exit.
    #[serde(default)]
    pub uninstall: bool,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}
fn default_log_format() -> LogFormat {
    LogFormat::Json
}

// ── Log level ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(format!(
                "invalid log level '{s}': expected error|warn|info|debug|trace"
            )),
        }
    }
}

// ── Log format ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" | "pretty" => Ok(Self::Text),
            _ => Err(format!("invalid log format '{s}': expected json|text")),
        }
    }
}
