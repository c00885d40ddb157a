//! Connection-tracking flow tables (`fsm_xtcp_flow`, `fsm_xudp_flow`).
//!
//! Entries are created and refreshed by the dataplane; userspace only
//! scans them and evicts idle ones.

// ── Flow key — 44 bytes ─────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FlowKey {
    pub sys: u32,
    pub daddr: [u32; 4],
    pub saddr: [u32; 4],
    pub dport: u16,
    pub sport: u16,
    pub proto: u8,
    pub v6: u8,
    pub _pad: [u8; 2],
}

// ── Flow op — 16 bytes ──────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlowOp {
    /// Last access, kernel monotonic clock in nanoseconds.
    pub atime: u64,
    pub fin: u8,
    pub _pad: [u8; 7],
}

// SAFETY: #[repr(C)], Copy, 'static, primitive-only with explicit padding.
#[cfg(feature = "userspace")]
unsafe impl aya::Pod for FlowKey {}

#[cfg(feature = "userspace")]
unsafe impl aya::Pod for FlowOp {}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem;

    #[test]
    fn test_flow_key_size() {
        assert_eq!(mem::size_of::<FlowKey>(), 44);
    }

    #[test]
    fn test_flow_op_size() {
        assert_eq!(mem::size_of::<FlowOp>(), 16);
        assert_eq!(mem::align_of::<FlowOp>(), 8);
    }
}
