use domain::common::entity::IpProto;
use domain::common::error::DomainError;
use domain::flow::entity::{FlowRecord, FlowTuple};

/// Secondary port for the dataplane connection-tracking tables
/// (`fsm_xtcp_flow`, `fsm_xudp_flow`).
pub trait FlowTablePort: Send + Sync {
    /// Snapshot of one protocol's table.
    fn scan(&self, proto: IpProto) -> Result<Vec<FlowRecord>, DomainError>;

    /// Evict one flow; an absent entry is success.
    fn evict(&self, proto: IpProto, tuple: &FlowTuple) -> Result<(), DomainError>;
}

/// Kernel monotonic clock, the time base of flow `atime`.
pub trait MonotonicClock: Send + Sync {
    fn now_ns(&self) -> Result<u64, DomainError>;
}
