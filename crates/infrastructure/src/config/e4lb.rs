use serde::{Deserialize, Serialize};

use super::common::default_true;
use crate::constants::DEFAULT_E4LB_DEVICE;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct E4lbConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub ipv4: bool,

    #[serde(default = "default_true")]
    pub ipv6: bool,

    #[serde(default)]
    pub cfg_ipv4_magic: String,

    #[serde(default)]
    pub cfg_ipv6_magic: String,

    /// Tap device carrying load-balanced traffic.
    #[serde(default = "default_device")]
    pub device: String,
}

impl Default for E4lbConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ipv4: true,
            ipv6: true,
            cfg_ipv4_magic: String::new(),
            cfg_ipv6_magic: String::new(),
            device: default_device(),
        }
    }
}

fn default_device() -> String {
    DEFAULT_E4LB_DEVICE.to_string()
}
