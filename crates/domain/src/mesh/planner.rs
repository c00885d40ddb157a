//! Redirect planning for sidecar-less mesh traffic.
//!
//! Every monitored pod is pinned to one running sidecar, chosen by its IPv4
//! value modulo the sidecar count over the IP-sorted sidecar list. Two TCP
//! Opt entries per pod send its outbound and inbound traffic to that sidecar.

use std::collections::BTreeMap;
use std::net::IpAddr;

use crate::common::entity::{IpProto, SysId, ipv4_to_u32};
use crate::flow::entity::{OptKey, OptValue};
use crate::pod::entity::PodInfo;

/// Port names identifying a sidecar's redirect listeners.
#[derive(Debug, Clone)]
pub struct FilterPorts {
    pub inbound: String,
    pub outbound: String,
}

/// A sidecar usable as a redirect target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarTarget {
    pub addr: IpAddr,
    pub inbound_port: u16,
    pub outbound_port: u16,
}

impl SidecarTarget {
    /// `None` when the pod has no usable IP or lacks either named port.
    pub fn from_pod(pod: &PodInfo, ports: &FilterPorts) -> Option<Self> {
        let addr = pod.ip.as_deref()?.parse().ok()?;
        Some(Self {
            addr,
            inbound_port: pod.port_named(&ports.inbound)?,
            outbound_port: pod.port_named(&ports.outbound)?,
        })
    }
}

pub type RedirectSet = BTreeMap<OptKey, OptValue>;

/// Desired Mesh-scoped TCP Opt entries.
///
/// `sidecars` must already be sorted by IPv4; sidecar pods themselves are
/// never redirected.
pub fn plan_redirects(sidecars: &[SidecarTarget], pods: &[PodInfo]) -> RedirectSet {
    let mut desired = RedirectSet::new();
    if sidecars.is_empty() {
        return desired;
    }
    for pod in pods.iter().filter(|p| p.is_running()) {
        let Some(ip) = pod.ip.as_deref() else {
            continue;
        };
        let Ok(addr) = ip.parse::<IpAddr>() else {
            continue;
        };
        if sidecars.iter().any(|s| s.addr == addr) {
            continue;
        }
        let idx = ipv4_to_u32(ip) as usize % sidecars.len();
        let sidecar = &sidecars[idx];
        desired.insert(
            OptKey::local(SysId::Mesh, addr, IpProto::Tcp),
            OptValue::redirect(sidecar.addr, sidecar.outbound_port, IpProto::Tcp),
        );
        desired.insert(
            OptKey::remote(SysId::Mesh, addr, IpProto::Tcp),
            OptValue::redirect(sidecar.addr, sidecar.inbound_port, IpProto::Tcp),
        );
    }
    desired
}

/// Changes that bring `current` to `desired`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RedirectDiff {
    pub upserts: Vec<(OptKey, OptValue)>,
    pub deletes: Vec<OptKey>,
}

impl RedirectDiff {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}

/// Only Mesh TCP entries in `current` are considered owned by the planner.
pub fn diff(current: &[(OptKey, OptValue)], desired: &RedirectSet) -> RedirectDiff {
    let owned: BTreeMap<OptKey, OptValue> = current
        .iter()
        .filter(|(k, _)| k.sys == SysId::Mesh && k.proto == IpProto::Tcp)
        .copied()
        .collect();

    let upserts = desired
        .iter()
        .filter(|(k, v)| owned.get(*k) != Some(*v))
        .map(|(k, v)| (*k, *v))
        .collect();
    let deletes = owned
        .keys()
        .filter(|k| !desired.contains_key(*k))
        .copied()
        .collect();

    RedirectDiff { upserts, deletes }
}
