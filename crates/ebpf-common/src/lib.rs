#![cfg_attr(not(feature = "std"), no_std)]

pub mod config;
pub mod flow;
pub mod opt;
pub mod sys;
pub mod trace_port;

// ── Pinned map names ────────────────────────────────────────────────

pub const MAP_NAME_CFG: &str = "fsm_xcfg";
pub const MAP_NAME_TCP_OPT: &str = "fsm_xtcp_opt";
pub const MAP_NAME_UDP_OPT: &str = "fsm_xudp_opt";
pub const MAP_NAME_TRACE_PORT: &str = "fsm_xtrace_port";
pub const MAP_NAME_TCP_FLOW: &str = "fsm_xtcp_flow";
pub const MAP_NAME_UDP_FLOW: &str = "fsm_xudp_flow";

// ── IP protocol numbers ─────────────────────────────────────────────

pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;
