#![deny(unsafe_code)]

pub mod cni;
pub mod ebpf;
pub mod http;
pub mod k8s;
pub mod net;
