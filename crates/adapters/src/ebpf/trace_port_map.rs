use domain::common::entity::SysId;
use domain::common::error::DomainError;
use domain::flow::entity::{TracePortKey, TracePortValue};
use ebpf_common::MAP_NAME_TRACE_PORT;
use ebpf_common::trace_port::{TracePortKey as RawKey, TracePortVal as RawVal};
use ports::secondary::trace_port_map_port::TracePortMapPort;

use super::pinned::{PinnedMaps, engine_err, is_not_found};

pub struct PinnedTracePortMap {
    maps: PinnedMaps,
}

impl PinnedTracePortMap {
    pub fn new(maps: PinnedMaps) -> Self {
        Self { maps }
    }
}

impl TracePortMapPort for PinnedTracePortMap {
    fn add_trace_port(
        &self,
        sys: SysId,
        key: &TracePortKey,
        value: &TracePortValue,
    ) -> Result<(), DomainError> {
        let mut map = self.maps.hash::<RawKey, RawVal>(MAP_NAME_TRACE_PORT)?;
        let mut raw = key.to_ebpf();
        raw.sys = sys.to_u32();
        map.insert(raw, value.to_ebpf(), 0)
            .map_err(|e| engine_err(MAP_NAME_TRACE_PORT, "update", &e))
    }

    fn del_trace_port(&self, sys: SysId, key: &TracePortKey) -> Result<(), DomainError> {
        let mut map = self.maps.hash::<RawKey, RawVal>(MAP_NAME_TRACE_PORT)?;
        let mut raw = key.to_ebpf();
        raw.sys = sys.to_u32();
        match map.remove(&raw) {
            Err(e) if !is_not_found(&e) => Err(engine_err(MAP_NAME_TRACE_PORT, "delete", &e)),
            _ => Ok(()),
        }
    }

    fn list_trace_ports(&self) -> Result<Vec<(TracePortKey, TracePortValue)>, DomainError> {
        let map = self.maps.hash::<RawKey, RawVal>(MAP_NAME_TRACE_PORT)?;
        map.iter()
            .map(|item| {
                item.map(|(k, v)| (TracePortKey::from_ebpf(&k), TracePortValue::from_ebpf(&v)))
                    .map_err(|e| engine_err(MAP_NAME_TRACE_PORT, "iterate", &e))
            })
            .collect()
    }
}
