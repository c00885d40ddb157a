use domain::common::entity::{IpProto, SysId};
use domain::common::error::DomainError;
use domain::flow::entity::{OptKey, OptValue};

/// Secondary port for the redirect override maps (`fsm_xtcp_opt`,
/// `fsm_xudp_opt`). The table is picked from `key.proto`.
///
/// Implementations open the pinned map per call; no handle outlives a call.
pub trait OptMapPort: Send + Sync {
    /// Upsert. `sys` is stamped into the key before the update.
    fn add_opt(&self, sys: SysId, key: &OptKey, value: &OptValue) -> Result<(), DomainError>;

    /// Delete; an absent key is success.
    fn del_opt(&self, sys: SysId, key: &OptKey) -> Result<(), DomainError>;

    /// Every entry of one protocol's table, in map order.
    fn list_opts(&self, proto: IpProto) -> Result<Vec<(OptKey, OptValue)>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opt_map_port_is_object_safe() {
        fn _check(port: &dyn OptMapPort) {
            let _ = port.list_opts(IpProto::Tcp);
        }
    }
}
