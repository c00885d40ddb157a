use thiserror::Error;

use crate::common::error::DomainError;

#[derive(Debug, Error)]
pub enum ConfigRegisterError {
    #[error("invalid config magic '{token}': expected decimal or 0x-prefixed hex u64")]
    InvalidMagic { token: String },

    #[error("config register for {sys} not present")]
    MissingSlot { sys: &'static str },
}

impl From<ConfigRegisterError> for DomainError {
    fn from(e: ConfigRegisterError) -> Self {
        DomainError::InvalidConfig(e.to_string())
    }
}
