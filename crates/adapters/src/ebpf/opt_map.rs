use domain::common::entity::{IpProto, SysId};
use domain::common::error::DomainError;
use domain::flow::entity::{OptKey, OptValue};
use ebpf_common::opt::{OptKey as RawOptKey, OptVal as RawOptVal};
use ebpf_common::{MAP_NAME_TCP_OPT, MAP_NAME_UDP_OPT};
use ports::secondary::opt_map_port::OptMapPort;

use super::pinned::{PinnedMaps, engine_err, is_not_found};

/// The per-protocol `fsm_x{tcp,udp}_opt` redirect tables.
pub struct PinnedOptMap {
    maps: PinnedMaps,
}

impl PinnedOptMap {
    pub fn new(maps: PinnedMaps) -> Self {
        Self { maps }
    }
}

pub(crate) fn opt_map_name(proto: IpProto) -> Result<&'static str, DomainError> {
    match proto {
        IpProto::Tcp => Ok(MAP_NAME_TCP_OPT),
        IpProto::Udp => Ok(MAP_NAME_UDP_OPT),
        IpProto::Other(n) => Err(DomainError::InvalidConfig(format!(
            "no opt table for protocol {n}"
        ))),
    }
}

impl OptMapPort for PinnedOptMap {
    fn add_opt(&self, sys: SysId, key: &OptKey, value: &OptValue) -> Result<(), DomainError> {
        let name = opt_map_name(key.proto)?;
        let mut map = self.maps.hash::<RawOptKey, RawOptVal>(name)?;
        let mut raw = key.to_ebpf();
        raw.sys = sys.to_u32();
        map.insert(raw, value.to_ebpf(), 0)
            .map_err(|e| engine_err(name, "update", &e))
    }

    fn del_opt(&self, sys: SysId, key: &OptKey) -> Result<(), DomainError> {
        let name = opt_map_name(key.proto)?;
        let mut map = self.maps.hash::<RawOptKey, RawOptVal>(name)?;
        let mut raw = key.to_ebpf();
        raw.sys = sys.to_u32();
        match map.remove(&raw) {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(engine_err(name, "delete", &e)),
        }
    }

    fn list_opts(&self, proto: IpProto) -> Result<Vec<(OptKey, OptValue)>, DomainError> {
        let name = opt_map_name(proto)?;
        let map = self.maps.hash::<RawOptKey, RawOptVal>(name)?;
        map.iter()
            .map(|item| {
                item.map(|(k, v)| (OptKey::from_ebpf(&k), OptValue::from_ebpf(&v)))
                    .map_err(|e| engine_err(name, "iterate", &e))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_selected_by_protocol() {
        assert_eq!(opt_map_name(IpProto::Tcp).unwrap(), "fsm_xtcp_opt");
        assert_eq!(opt_map_name(IpProto::Udp).unwrap(), "fsm_xudp_opt");
        assert!(opt_map_name(IpProto::Other(1)).is_err());
    }
}
