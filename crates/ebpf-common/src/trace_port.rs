/// Per-port trace toggle key (`fsm_xtrace_port`). Size: 8 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TracePortKey {
    pub sys: u32,
    /// Network byte order.
    pub port: u16,
    pub _pad: [u8; 2],
}

/// Trace enablement indexed by `TC_DIR_IGR` / `TC_DIR_EGR`; 1 = on.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TracePortVal {
    pub tc_dir: [u8; 2],
}

// SAFETY: both types are #[repr(C)], Copy, 'static, primitive-only.
#[cfg(feature = "userspace")]
unsafe impl aya::Pod for TracePortKey {}

#[cfg(feature = "userspace")]
unsafe impl aya::Pod for TracePortVal {}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem;

    #[test]
    fn test_trace_port_key_size() {
        assert_eq!(mem::size_of::<TracePortKey>(), 8);
    }

    #[test]
    fn test_trace_port_val_size() {
        assert_eq!(mem::size_of::<TracePortVal>(), 2);
    }
}
