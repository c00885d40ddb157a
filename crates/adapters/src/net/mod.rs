pub mod command;
pub mod device;
pub mod pod_network;
pub mod sysctl;
pub mod tc;
