use super::PortFuture;

/// Result of a load request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Pin directory already present; nothing was done.
    AlreadyPinned,
    Loaded,
    /// The toolchain ran but the load failed. Not fatal.
    Failed(String),
}

/// Secondary port for loading the prebuilt kernel program bundle.
///
/// `load` fails with `DomainError::ToolchainMissing` when the external
/// toolchain cannot be located.
pub trait ProgramLoaderPort: Send + Sync {
    fn load(&self) -> PortFuture<'_, LoadOutcome>;

    /// Remove the pin directory unconditionally.
    fn unload(&self) -> PortFuture<'_, ()>;
}
