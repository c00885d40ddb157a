pub mod clock;
pub mod config_register;
pub mod flow_table;
pub mod loader;
pub mod opt_map;
pub mod pinned;
pub mod trace_port_map;
