pub mod cluster_state;
pub mod convert;
