pub mod entity;
pub mod policy;
