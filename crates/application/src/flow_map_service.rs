use std::sync::Arc;

use domain::common::entity::{IpProto, SysId};
use domain::common::error::DomainError;
use domain::flow::entity::{MapEntry, OptKey, OptValue, TracePortKey, TracePortValue};
use ports::secondary::opt_map_port::OptMapPort;
use ports::secondary::trace_port_map_port::TracePortMapPort;

/// Operator-facing access to the Opt and TracePort tables.
pub struct FlowMapService {
    opt: Arc<dyn OptMapPort>,
    trace: Arc<dyn TracePortMapPort>,
}

impl FlowMapService {
    pub fn new(opt: Arc<dyn OptMapPort>, trace: Arc<dyn TracePortMapPort>) -> Self {
        Self { opt, trace }
    }

    pub fn show_opts(&self, proto: IpProto) -> Result<Vec<MapEntry<OptKey, OptValue>>, DomainError> {
        Ok(self
            .opt
            .list_opts(proto)?
            .into_iter()
            .map(|(key, value)| MapEntry { key, value })
            .collect())
    }

    pub fn add_opt(&self, sys: SysId, key: &OptKey, value: &OptValue) -> Result<(), DomainError> {
        self.opt.add_opt(sys, key, value)
    }

    pub fn del_opt(&self, sys: SysId, key: &OptKey) -> Result<(), DomainError> {
        self.opt.del_opt(sys, key)
    }

    pub fn show_trace_ports(
        &self,
    ) -> Result<Vec<MapEntry<TracePortKey, TracePortValue>>, DomainError> {
        Ok(self
            .trace
            .list_trace_ports()?
            .into_iter()
            .map(|(key, value)| MapEntry { key, value })
            .collect())
    }

    pub fn add_trace_port(
        &self,
        sys: SysId,
        port: u16,
        value: TracePortValue,
    ) -> Result<(), DomainError> {
        self.trace
            .add_trace_port(sys, &TracePortKey { sys, port }, &value)
    }

    pub fn del_trace_port(&self, sys: SysId, port: u16) -> Result<(), DomainError> {
        self.trace.del_trace_port(sys, &TracePortKey { sys, port })
    }
}
