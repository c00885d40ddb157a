use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use ebpf_common::sys::{SYS_E4LB, SYS_MESH, SYS_NOOP};
use ebpf_common::{IPPROTO_TCP, IPPROTO_UDP};
use serde::{Serialize, Serializer};

use super::error::DomainError;

/// Kernel program family a register slot or flow-map entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SysId {
    Noop,
    Mesh,
    E4lb,
}

impl SysId {
    pub const ALL: [SysId; 3] = [SysId::Noop, SysId::Mesh, SysId::E4lb];

    pub fn to_u32(self) -> u32 {
        match self {
            Self::Noop => SYS_NOOP,
            Self::Mesh => SYS_MESH,
            Self::E4lb => SYS_E4LB,
        }
    }

    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            SYS_NOOP => Some(Self::Noop),
            SYS_MESH => Some(Self::Mesh),
            SYS_E4LB => Some(Self::E4lb),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Mesh => "mesh",
            Self::E4lb => "e4lb",
        }
    }
}

impl std::fmt::Display for SysId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SysId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "noop" => Ok(Self::Noop),
            "mesh" => Ok(Self::Mesh),
            "e4lb" => Ok(Self::E4lb),
            other => Err(DomainError::InvalidConfig(format!("unknown sys: {other}"))),
        }
    }
}

impl Serialize for SysId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Transport protocol of a flow-map entry. Unknown numbers are kept verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IpProto {
    Tcp,
    Udp,
    Other(u8),
}

impl IpProto {
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Tcp => IPPROTO_TCP,
            Self::Udp => IPPROTO_UDP,
            Self::Other(n) => n,
        }
    }

    pub fn from_u8(n: u8) -> Self {
        match n {
            IPPROTO_TCP => Self::Tcp,
            IPPROTO_UDP => Self::Udp,
            other => Self::Other(other),
        }
    }

    /// Operator-facing name; empty for protocols the dataplane never keys on.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "IPPROTO_TCP",
            Self::Udp => "IPPROTO_UDP",
            Self::Other(_) => "",
        }
    }

    /// Short lowercase label for metrics and logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Other(_) => "other",
        }
    }
}

impl Serialize for IpProto {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// IP stack selector for per-stack register words and enablement toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpStack {
    V4,
    V6,
}

// ── Kernel address / port encoding ───────────────────────────────────

/// Encode an address into the dataplane's `[u32; 4]` network-order layout.
/// IPv4 occupies word 0, remaining words are zero.
pub fn addr_to_words(addr: IpAddr) -> [u32; 4] {
    match addr {
        IpAddr::V4(v4) => [u32::from_ne_bytes(v4.octets()), 0, 0, 0],
        IpAddr::V6(v6) => {
            let o = v6.octets();
            let mut words = [0u32; 4];
            for (i, w) in words.iter_mut().enumerate() {
                *w = u32::from_ne_bytes([o[i * 4], o[i * 4 + 1], o[i * 4 + 2], o[i * 4 + 3]]);
            }
            words
        }
    }
}

/// Decode the `[u32; 4]` layout. The family comes from the entry's `v6`
/// byte; an IPv4 address reads word 0 only.
pub fn words_to_addr(words: [u32; 4], v6: bool) -> IpAddr {
    if !v6 {
        return IpAddr::V4(Ipv4Addr::from(words[0].to_ne_bytes()));
    }
    let mut octets = [0u8; 16];
    for (i, w) in words.iter().enumerate() {
        octets[i * 4..i * 4 + 4].copy_from_slice(&w.to_ne_bytes());
    }
    IpAddr::V6(Ipv6Addr::from(octets))
}

/// Numeric value of an IPv4 address string, used for deterministic ordering.
/// Unparseable or IPv6 addresses map to 0.
pub fn ipv4_to_u32(ip: &str) -> u32 {
    ip.parse::<Ipv4Addr>().map(u32::from).unwrap_or(0)
}
