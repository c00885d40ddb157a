#![forbid(unsafe_code)]

pub mod broker;
pub mod config_register_service;
pub mod conntrack_flush;
pub mod device_service;
pub mod flow_map_service;
pub mod lifecycle;
pub mod mesh_policy_service;
pub mod plugin_chain_service;
pub mod pod_network_service;
pub mod pod_view_service;
pub mod reconciler;
