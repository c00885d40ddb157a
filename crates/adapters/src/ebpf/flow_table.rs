use domain::common::entity::IpProto;
use domain::common::error::DomainError;
use domain::flow::entity::{FlowRecord, FlowTuple};
use ebpf_common::flow::{FlowKey, FlowOp};
use ebpf_common::{MAP_NAME_TCP_FLOW, MAP_NAME_UDP_FLOW};
use ports::secondary::flow_table_port::FlowTablePort;

use super::pinned::{PinnedMaps, engine_err, is_not_found};

/// The kernel-maintained `fsm_x{tcp,udp}_flow` tables.
pub struct PinnedFlowTable {
    maps: PinnedMaps,
}

impl PinnedFlowTable {
    pub fn new(maps: PinnedMaps) -> Self {
        Self { maps }
    }
}

fn flow_map_name(proto: IpProto) -> Result<&'static str, DomainError> {
    match proto {
        IpProto::Tcp => Ok(MAP_NAME_TCP_FLOW),
        IpProto::Udp => Ok(MAP_NAME_UDP_FLOW),
        IpProto::Other(n) => Err(DomainError::InvalidConfig(format!(
            "no flow table for protocol {n}"
        ))),
    }
}

impl FlowTablePort for PinnedFlowTable {
    fn scan(&self, proto: IpProto) -> Result<Vec<FlowRecord>, DomainError> {
        let name = flow_map_name(proto)?;
        let map = self.maps.hash::<FlowKey, FlowOp>(name)?;
        let mut records = Vec::new();
        for item in map.iter() {
            match item {
                Ok((key, op)) => records.push(FlowRecord {
                    tuple: FlowTuple::from_ebpf(&key),
                    atime_ns: op.atime,
                }),
                // Entries evicted by the kernel mid-walk.
                Err(e) if is_not_found(&e) => {}
                Err(e) => return Err(engine_err(name, "iterate", &e)),
            }
        }
        Ok(records)
    }

    fn evict(&self, proto: IpProto, tuple: &FlowTuple) -> Result<(), DomainError> {
        let name = flow_map_name(proto)?;
        let mut map = self.maps.hash::<FlowKey, FlowOp>(name)?;
        match map.remove(&tuple.to_ebpf()) {
            Err(e) if !is_not_found(&e) => Err(engine_err(name, "delete", &e)),
            _ => Ok(()),
        }
    }
}
