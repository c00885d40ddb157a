//! Program family discriminators stamped into every config register index
//! and every flow-map key.

pub const SYS_NOOP: u32 = 0;
pub const SYS_MESH: u32 = 1;
pub const SYS_E4LB: u32 = 2;

/// Number of config register slots (`fsm_xcfg` max entries).
pub const SYS_COUNT: u32 = 3;

/// Traffic-control direction indices into `TracePortVal::tc_dir`.
pub const TC_DIR_IGR: usize = 0;
pub const TC_DIR_EGR: usize = 1;
