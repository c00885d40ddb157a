pub mod entity;
pub mod error;
pub mod eviction;
pub mod schedule;
