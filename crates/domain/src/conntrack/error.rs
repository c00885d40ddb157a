use thiserror::Error;

use crate::common::error::DomainError;

#[derive(Debug, Error)]
pub enum FlushError {
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },
}

impl From<FlushError> for DomainError {
    fn from(e: FlushError) -> Self {
        DomainError::InvalidConfig(e.to_string())
    }
}
