#![forbid(unsafe_code)]

pub mod common;
pub mod config;
pub mod conntrack;
pub mod flow;
pub mod mesh;
pub mod pod;
