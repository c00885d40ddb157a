use crate::common::entity::SysId;
use crate::flow::entity::{FlowRecord, FlowTuple};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Pick at most `batch` flows of family `sys` idle for longer than
/// `idle_seconds`, measured against `now_ns` on the kernel monotonic clock.
///
/// Remaining eligible flows are left for the next tick.
pub fn select_idle(
    records: &[FlowRecord],
    sys: SysId,
    now_ns: u64,
    idle_seconds: u64,
    batch: usize,
) -> Vec<FlowTuple> {
    let threshold = idle_seconds.saturating_mul(NANOS_PER_SEC);
    records
        .iter()
        .filter(|r| r.tuple.sys == sys)
        .filter(|r| now_ns.saturating_sub(r.atime_ns) > threshold)
        .take(batch)
        .map(|r| r.tuple)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;
    use crate::common::entity::IpProto;

    fn record(i: u32, sys: SysId, atime_ns: u64) -> FlowRecord {
        FlowRecord {
            tuple: FlowTuple {
                sys,
                daddr: IpAddr::V4(Ipv4Addr::from(i)),
                saddr: IpAddr::V4(Ipv4Addr::LOCALHOST),
                dport: 80,
                sport: 40_000,
                proto: IpProto::Tcp,
                v6: false,
            },
            atime_ns,
        }
    }

    #[test]
    fn batch_cap_bounds_each_tick() {
        let now = 10_000 * NANOS_PER_SEC;
        let records: Vec<_> = (0..10_000).map(|i| record(i, SysId::Mesh, 0)).collect();
        assert_eq!(select_idle(&records, SysId::Mesh, now, 3600, 4096).len(), 4096);
    }

    #[test]
    fn fresh_and_foreign_flows_are_kept() {
        let now = 1_000 * NANOS_PER_SEC;
        let records = vec![
            record(1, SysId::Mesh, 0),
            record(2, SysId::Mesh, now - NANOS_PER_SEC),
            record(3, SysId::E4lb, 0),
        ];
        let picked = select_idle(&records, SysId::Mesh, now, 120, 4096);
        assert_eq!(picked, vec![records[0].tuple]);
    }

    #[test]
    fn atime_in_future_is_not_idle() {
        let records = vec![record(1, SysId::Mesh, 5 * NANOS_PER_SEC)];
        assert!(select_idle(&records, SysId::Mesh, NANOS_PER_SEC, 1, 10).is_empty());
    }
}
