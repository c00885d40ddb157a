use domain::common::error::DomainError;

use super::PortFuture;

/// Secondary port for the node's container-networking plugin chain.
pub trait PluginChainPort: Send + Sync {
    /// Place the plugin binary and insert it into the primary chain config.
    /// Idempotent.
    fn install(&self) -> PortFuture<'_, ()>;

    /// Whether the plugin is still present in the primary chain config.
    fn is_installed(&self) -> Result<bool, DomainError>;

    /// Remove the plugin from every chain config and delete the binary.
    /// Idempotent.
    fn cleanup(&self) -> PortFuture<'_, ()>;
}
