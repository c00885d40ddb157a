//! Userspace view of the redirect (Opt), trace-port and flow-table entries.
//!
//! Ports are host byte order here; the `to_ebpf`/`from_ebpf` conversions own
//! the network-order layout. `Serialize` renders the operator JSON schema.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ebpf_common::flow::FlowKey;
use ebpf_common::opt::{OptKey as RawOptKey, OptVal as RawOptVal};
use ebpf_common::sys::{TC_DIR_EGR, TC_DIR_IGR};
use ebpf_common::trace_port::{TracePortKey as RawTracePortKey, TracePortVal as RawTracePortVal};
use serde::Serialize;

use crate::common::entity::{IpProto, SysId, addr_to_words, words_to_addr};

const UNSPECIFIED: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Wildcard address in the same family as `addr`.
fn unspecified_like(addr: IpAddr) -> IpAddr {
    if addr.is_ipv6() {
        IpAddr::V6(Ipv6Addr::UNSPECIFIED)
    } else {
        UNSPECIFIED
    }
}

fn sys_from_raw(sys: u32) -> SysId {
    SysId::from_u32(sys).unwrap_or(SysId::Noop)
}

// ── Opt (redirect override) ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OptKey {
    pub sys: SysId,
    pub local_addr: IpAddr,
    pub remote_addr: IpAddr,
    pub local_port: u16,
    pub remote_port: u16,
    pub proto: IpProto,
    pub v6: bool,
}

impl OptKey {
    /// Key matching every flow whose local side is `addr`.
    pub fn local(sys: SysId, addr: IpAddr, proto: IpProto) -> Self {
        Self {
            sys,
            local_addr: addr,
            remote_addr: unspecified_like(addr),
            local_port: 0,
            remote_port: 0,
            proto,
            v6: addr.is_ipv6(),
        }
    }

    /// Key matching every flow whose remote side is `addr`.
    pub fn remote(sys: SysId, addr: IpAddr, proto: IpProto) -> Self {
        Self {
            sys,
            local_addr: unspecified_like(addr),
            remote_addr: addr,
            local_port: 0,
            remote_port: 0,
            proto,
            v6: addr.is_ipv6(),
        }
    }

    pub fn to_ebpf(&self) -> RawOptKey {
        RawOptKey {
            sys: self.sys.to_u32(),
            laddr: addr_to_words(self.local_addr),
            raddr: addr_to_words(self.remote_addr),
            lport: self.local_port.to_be(),
            rport: self.remote_port.to_be(),
            proto: self.proto.to_u8(),
            v6: u8::from(self.v6),
            _pad: [0; 2],
        }
    }

    pub fn from_ebpf(raw: &RawOptKey) -> Self {
        let v6 = raw.v6 != 0;
        Self {
            sys: sys_from_raw(raw.sys),
            local_addr: words_to_addr(raw.laddr, v6),
            remote_addr: words_to_addr(raw.raddr, v6),
            local_port: u16::from_be(raw.lport),
            remote_port: u16::from_be(raw.rport),
            proto: IpProto::from_u8(raw.proto),
            v6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OptValue {
    pub daddr: IpAddr,
    pub saddr: IpAddr,
    pub dport: u16,
    pub sport: u16,
    pub proto: IpProto,
    pub v6: bool,
}

impl OptValue {
    /// Redirect to `addr:port`, leaving the source untouched.
    pub fn redirect(addr: IpAddr, port: u16, proto: IpProto) -> Self {
        Self {
            daddr: addr,
            saddr: unspecified_like(addr),
            dport: port,
            sport: 0,
            proto,
            v6: addr.is_ipv6(),
        }
    }

    pub fn to_ebpf(&self) -> RawOptVal {
        RawOptVal {
            daddr: addr_to_words(self.daddr),
            saddr: addr_to_words(self.saddr),
            dport: self.dport.to_be(),
            sport: self.sport.to_be(),
            proto: self.proto.to_u8(),
            v6: u8::from(self.v6),
            _pad: [0; 2],
        }
    }

    pub fn from_ebpf(raw: &RawOptVal) -> Self {
        let v6 = raw.v6 != 0;
        Self {
            daddr: words_to_addr(raw.daddr, v6),
            saddr: words_to_addr(raw.saddr, v6),
            dport: u16::from_be(raw.dport),
            sport: u16::from_be(raw.sport),
            proto: IpProto::from_u8(raw.proto),
            v6,
        }
    }
}

// ── Trace port ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TracePortKey {
    pub sys: SysId,
    pub port: u16,
}

impl TracePortKey {
    pub fn to_ebpf(&self) -> RawTracePortKey {
        RawTracePortKey {
            sys: self.sys.to_u32(),
            port: self.port.to_be(),
            _pad: [0; 2],
        }
    }

    pub fn from_ebpf(raw: &RawTracePortKey) -> Self {
        Self {
            sys: sys_from_raw(raw.sys),
            port: u16::from_be(raw.port),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TracePortValue {
    #[serde(rename = "trace_tc_ingress_on")]
    pub ingress: bool,
    #[serde(rename = "trace_tc_egress_on")]
    pub egress: bool,
}

impl TracePortValue {
    pub fn to_ebpf(&self) -> RawTracePortVal {
        let mut tc_dir = [0u8; 2];
        tc_dir[TC_DIR_IGR] = u8::from(self.ingress);
        tc_dir[TC_DIR_EGR] = u8::from(self.egress);
        RawTracePortVal { tc_dir }
    }

    pub fn from_ebpf(raw: &RawTracePortVal) -> Self {
        Self {
            ingress: raw.tc_dir[TC_DIR_IGR] == 1,
            egress: raw.tc_dir[TC_DIR_EGR] == 1,
        }
    }
}

// ── Dump rendering ──────────────────────────────────────────────────

/// One `{"key": ..., "value": ...}` object of an operator dump.
#[derive(Debug, Clone, Serialize)]
pub struct MapEntry<K, V> {
    pub key: K,
    pub value: V,
}

// ── Flow table ──────────────────────────────────────────────────────

/// Flow-table key in userspace form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowTuple {
    pub sys: SysId,
    pub daddr: IpAddr,
    pub saddr: IpAddr,
    pub dport: u16,
    pub sport: u16,
    pub proto: IpProto,
    pub v6: bool,
}

impl FlowTuple {
    pub fn to_ebpf(&self) -> FlowKey {
        FlowKey {
            sys: self.sys.to_u32(),
            daddr: addr_to_words(self.daddr),
            saddr: addr_to_words(self.saddr),
            dport: self.dport.to_be(),
            sport: self.sport.to_be(),
            proto: self.proto.to_u8(),
            v6: u8::from(self.v6),
            _pad: [0; 2],
        }
    }

    pub fn from_ebpf(raw: &FlowKey) -> Self {
        let v6 = raw.v6 != 0;
        Self {
            sys: sys_from_raw(raw.sys),
            daddr: words_to_addr(raw.daddr, v6),
            saddr: words_to_addr(raw.saddr, v6),
            dport: u16::from_be(raw.dport),
            sport: u16::from_be(raw.sport),
            proto: IpProto::from_u8(raw.proto),
            v6,
        }
    }
}

/// A flow-table entry and its last-access time (kernel monotonic ns).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowRecord {
    pub tuple: FlowTuple,
    pub atime_ns: u64,
}
