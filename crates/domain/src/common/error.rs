use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("toolchain unavailable: {0}")]
    ToolchainMissing(String),

    #[error("engine error: {0}")]
    EngineError(String),
}
