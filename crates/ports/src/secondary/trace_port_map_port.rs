use domain::common::entity::SysId;
use domain::common::error::DomainError;
use domain::flow::entity::{TracePortKey, TracePortValue};

/// Secondary port for the per-port trace toggle map (`fsm_xtrace_port`).
pub trait TracePortMapPort: Send + Sync {
    fn add_trace_port(
        &self,
        sys: SysId,
        key: &TracePortKey,
        value: &TracePortValue,
    ) -> Result<(), DomainError>;

    /// Delete; an absent key is success.
    fn del_trace_port(&self, sys: SysId, key: &TracePortKey) -> Result<(), DomainError>;

    fn list_trace_ports(&self) -> Result<Vec<(TracePortKey, TracePortValue)>, DomainError>;
}
