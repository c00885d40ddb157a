use domain::conntrack::entity::FlushParams;
use serde::{Deserialize, Serialize};

/// Idle flow flush jobs, one per protocol table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnTrackConfig {
    #[serde(default = "FlushParams::tcp_default")]
    pub tcp: FlushParams,

    #[serde(default = "FlushParams::udp_default")]
    pub udp: FlushParams,
}

impl Default for ConnTrackConfig {
    fn default() -> Self {
        Self {
            tcp: FlushParams::tcp_default(),
            udp: FlushParams::udp_default(),
        }
    }
}
