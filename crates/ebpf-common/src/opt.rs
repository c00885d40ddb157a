//! NAT/redirect override entries (`fsm_xtcp_opt`, `fsm_xudp_opt`).
//!
//! Addresses are `[u32; 4]` in network byte order with IPv4 in word 0;
//! ports are in network byte order.

// ── Opt key — 44 bytes ──────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OptKey {
    pub sys: u32,
    pub laddr: [u32; 4],
    pub raddr: [u32; 4],
    pub lport: u16,
    pub rport: u16,
    pub proto: u8,
    pub v6: u8,
    pub _pad: [u8; 2],
}

// ── Opt value — 40 bytes ────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptVal {
    pub daddr: [u32; 4],
    pub saddr: [u32; 4],
    pub dport: u16,
    pub sport: u16,
    pub proto: u8,
    pub v6: u8,
    pub _pad: [u8; 2],
}

// SAFETY: OptKey and OptVal are #[repr(C)], Copy, 'static, and contain only
// primitive types with explicit padding. Safe for zero-copy eBPF map operations.
#[cfg(feature = "userspace")]
unsafe impl aya::Pod for OptKey {}

#[cfg(feature = "userspace")]
unsafe impl aya::Pod for OptVal {}
