//! Per-family configuration register shared with the dataplane.
//!
//! The `fsm_xcfg` Array is indexed by sys id. Each slot carries one flag
//! word per IP stack; bit positions are the `CFG_BIT_*` constants below.

// ── Flag bit offsets ────────────────────────────────────────────────

pub const CFG_BIT_DENY_ALL: u32 = 0;
pub const CFG_BIT_ALLOW_ALL: u32 = 1;
pub const CFG_BIT_TCP_PROTO_DENY_ALL: u32 = 2;
pub const CFG_BIT_TCP_PROTO_ALLOW_ALL: u32 = 3;
pub const CFG_BIT_TCP_PROTO_ALLOW_NAT_ESCAPE: u32 = 4;
pub const CFG_BIT_UDP_PROTO_DENY_ALL: u32 = 5;
pub const CFG_BIT_UDP_PROTO_ALLOW_ALL: u32 = 6;
pub const CFG_BIT_UDP_PROTO_ALLOW_NAT_ESCAPE: u32 = 7;
pub const CFG_BIT_OTH_PROTO_DENY_ALL: u32 = 8;
pub const CFG_BIT_TCP_NAT_BY_IP_PORT_ON: u32 = 9;
pub const CFG_BIT_TCP_NAT_BY_IP_ON: u32 = 10;
pub const CFG_BIT_TCP_NAT_BY_PORT_ON: u32 = 11;
pub const CFG_BIT_TCP_NAT_ALL_OFF: u32 = 12;
pub const CFG_BIT_UDP_NAT_BY_IP_PORT_ON: u32 = 13;
pub const CFG_BIT_UDP_NAT_BY_IP_ON: u32 = 14;
pub const CFG_BIT_UDP_NAT_BY_PORT_ON: u32 = 15;
pub const CFG_BIT_UDP_NAT_ALL_OFF: u32 = 16;
pub const CFG_BIT_ACL_CHECK_ON: u32 = 17;
pub const CFG_BIT_TRACE_HDR_ON: u32 = 18;
pub const CFG_BIT_TRACE_NAT_ON: u32 = 19;
pub const CFG_BIT_TRACE_OPT_ON: u32 = 20;
pub const CFG_BIT_TRACE_ACL_ON: u32 = 21;
pub const CFG_BIT_TRACE_FLOW_ON: u32 = 22;
pub const CFG_BIT_TRACE_BY_IP_ON: u32 = 23;
pub const CFG_BIT_TRACE_BY_PORT_ON: u32 = 24;

/// Highest defined bit offset (inclusive).
pub const CFG_BIT_MAX: u32 = CFG_BIT_TRACE_BY_PORT_ON;

/// One `fsm_xcfg` slot. Size: 16 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XNetCfg {
    pub ipv4_flags: u64,
    pub ipv6_flags: u64,
}

// SAFETY: XNetCfg is #[repr(C)], Copy, 'static, and contains only primitive
// types with no padding. Safe for zero-copy eBPF map operations via aya.
#[cfg(feature = "userspace")]
unsafe impl aya::Pod for XNetCfg {}
