use ebpf_common::config::{
    CFG_BIT_ACL_CHECK_ON, CFG_BIT_ALLOW_ALL, CFG_BIT_DENY_ALL, CFG_BIT_OTH_PROTO_DENY_ALL,
    CFG_BIT_TCP_NAT_ALL_OFF, CFG_BIT_TCP_NAT_BY_IP_ON, CFG_BIT_TCP_NAT_BY_IP_PORT_ON,
    CFG_BIT_TCP_NAT_BY_PORT_ON, CFG_BIT_TCP_PROTO_ALLOW_ALL, CFG_BIT_TCP_PROTO_ALLOW_NAT_ESCAPE,
    CFG_BIT_TCP_PROTO_DENY_ALL, CFG_BIT_TRACE_ACL_ON, CFG_BIT_TRACE_BY_IP_ON,
    CFG_BIT_TRACE_BY_PORT_ON, CFG_BIT_TRACE_FLOW_ON, CFG_BIT_TRACE_HDR_ON, CFG_BIT_TRACE_NAT_ON,
    CFG_BIT_TRACE_OPT_ON, CFG_BIT_UDP_NAT_ALL_OFF, CFG_BIT_UDP_NAT_BY_IP_ON,
    CFG_BIT_UDP_NAT_BY_IP_PORT_ON, CFG_BIT_UDP_NAT_BY_PORT_ON, CFG_BIT_UDP_PROTO_ALLOW_ALL,
    CFG_BIT_UDP_PROTO_ALLOW_NAT_ESCAPE, CFG_BIT_UDP_PROTO_DENY_ALL, XNetCfg,
};
use serde::Serialize;

use crate::common::entity::IpStack;

/// Named flag of a per-stack config register word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CfgFlag {
    DenyAll,
    AllowAll,
    TcpProtoDenyAll,
    TcpProtoAllowAll,
    TcpProtoAllowNatEscape,
    UdpProtoDenyAll,
    UdpProtoAllowAll,
    UdpProtoAllowNatEscape,
    OthProtoDenyAll,
    TcpNatByIpPortOn,
    TcpNatByIpOn,
    TcpNatByPortOn,
    TcpNatAllOff,
    UdpNatByIpPortOn,
    UdpNatByIpOn,
    UdpNatByPortOn,
    UdpNatAllOff,
    AclCheckOn,
    TraceHdrOn,
    TraceNatOn,
    TraceOptOn,
    TraceAclOn,
    TraceFlowOn,
    TraceByIpOn,
    TraceByPortOn,
}

impl CfgFlag {
    pub const ALL: [CfgFlag; 25] = [
        Self::DenyAll,
        Self::AllowAll,
        Self::TcpProtoDenyAll,
        Self::TcpProtoAllowAll,
        Self::TcpProtoAllowNatEscape,
        Self::UdpProtoDenyAll,
        Self::UdpProtoAllowAll,
        Self::UdpProtoAllowNatEscape,
        Self::OthProtoDenyAll,
        Self::TcpNatByIpPortOn,
        Self::TcpNatByIpOn,
        Self::TcpNatByPortOn,
        Self::TcpNatAllOff,
        Self::UdpNatByIpPortOn,
        Self::UdpNatByIpOn,
        Self::UdpNatByPortOn,
        Self::UdpNatAllOff,
        Self::AclCheckOn,
        Self::TraceHdrOn,
        Self::TraceNatOn,
        Self::TraceOptOn,
        Self::TraceAclOn,
        Self::TraceFlowOn,
        Self::TraceByIpOn,
        Self::TraceByPortOn,
    ];

    /// Bit offset inside the stack word.
    pub fn offset(self) -> u32 {
        match self {
            Self::DenyAll => CFG_BIT_DENY_ALL,
            Self::AllowAll => CFG_BIT_ALLOW_ALL,
            Self::TcpProtoDenyAll => CFG_BIT_TCP_PROTO_DENY_ALL,
            Self::TcpProtoAllowAll => CFG_BIT_TCP_PROTO_ALLOW_ALL,
            Self::TcpProtoAllowNatEscape => CFG_BIT_TCP_PROTO_ALLOW_NAT_ESCAPE,
            Self::UdpProtoDenyAll => CFG_BIT_UDP_PROTO_DENY_ALL,
            Self::UdpProtoAllowAll => CFG_BIT_UDP_PROTO_ALLOW_ALL,
            Self::UdpProtoAllowNatEscape => CFG_BIT_UDP_PROTO_ALLOW_NAT_ESCAPE,
            Self::OthProtoDenyAll => CFG_BIT_OTH_PROTO_DENY_ALL,
            Self::TcpNatByIpPortOn => CFG_BIT_TCP_NAT_BY_IP_PORT_ON,
            Self::TcpNatByIpOn => CFG_BIT_TCP_NAT_BY_IP_ON,
            Self::TcpNatByPortOn => CFG_BIT_TCP_NAT_BY_PORT_ON,
            Self::TcpNatAllOff => CFG_BIT_TCP_NAT_ALL_OFF,
            Self::UdpNatByIpPortOn => CFG_BIT_UDP_NAT_BY_IP_PORT_ON,
            Self::UdpNatByIpOn => CFG_BIT_UDP_NAT_BY_IP_ON,
            Self::UdpNatByPortOn => CFG_BIT_UDP_NAT_BY_PORT_ON,
            Self::UdpNatAllOff => CFG_BIT_UDP_NAT_ALL_OFF,
            Self::AclCheckOn => CFG_BIT_ACL_CHECK_ON,
            Self::TraceHdrOn => CFG_BIT_TRACE_HDR_ON,
            Self::TraceNatOn => CFG_BIT_TRACE_NAT_ON,
            Self::TraceOptOn => CFG_BIT_TRACE_OPT_ON,
            Self::TraceAclOn => CFG_BIT_TRACE_ACL_ON,
            Self::TraceFlowOn => CFG_BIT_TRACE_FLOW_ON,
            Self::TraceByIpOn => CFG_BIT_TRACE_BY_IP_ON,
            Self::TraceByPortOn => CFG_BIT_TRACE_BY_PORT_ON,
        }
    }

    fn mask(self) -> u64 {
        1u64 << self.offset()
    }
}

/// One stack's flag word. Callers go through named flags only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagWord(u64);

impl FlagWord {
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn is_set(self, flag: CfgFlag) -> bool {
        self.0 & flag.mask() != 0
    }

    pub fn set(&mut self, flag: CfgFlag) {
        self.0 |= flag.mask();
    }

    pub fn clear(&mut self, flag: CfgFlag) {
        self.0 &= !flag.mask();
    }

    pub fn any_set(self, flags: &[CfgFlag]) -> bool {
        flags.iter().any(|f| self.is_set(*f))
    }

    /// Names of the flags currently set, in bit order.
    pub fn set_flags(self) -> Vec<CfgFlag> {
        CfgFlag::ALL
            .into_iter()
            .filter(|f| self.is_set(*f))
            .collect()
    }
}

/// Full register slot: one flag word per IP stack.
///
/// Always read, mutated in memory, then written back whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigValue {
    pub ipv4: FlagWord,
    pub ipv6: FlagWord,
}

impl ConfigValue {
    pub fn stack(&self, stack: IpStack) -> FlagWord {
        match stack {
            IpStack::V4 => self.ipv4,
            IpStack::V6 => self.ipv6,
        }
    }

    pub fn stack_mut(&mut self, stack: IpStack) -> &mut FlagWord {
        match stack {
            IpStack::V4 => &mut self.ipv4,
            IpStack::V6 => &mut self.ipv6,
        }
    }

    pub fn to_ebpf(&self) -> XNetCfg {
        XNetCfg {
            ipv4_flags: self.ipv4.bits(),
            ipv6_flags: self.ipv6.bits(),
        }
    }

    pub fn from_ebpf(cfg: &XNetCfg) -> Self {
        Self {
            ipv4: FlagWord::from_bits(cfg.ipv4_flags),
            ipv6: FlagWord::from_bits(cfg.ipv6_flags),
        }
    }
}

/// Operator view of a register slot.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigView {
    pub sys: crate::common::entity::SysId,
    pub ipv4: Vec<CfgFlag>,
    pub ipv6: Vec<CfgFlag>,
}

impl ConfigView {
    pub fn new(sys: crate::common::entity::SysId, value: &ConfigValue) -> Self {
        Self {
            sys,
            ipv4: value.ipv4.set_flags(),
            ipv6: value.ipv6.set_flags(),
        }
    }
}
