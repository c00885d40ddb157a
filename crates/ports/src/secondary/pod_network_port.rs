use domain::common::entity::SysId;

use super::PortFuture;

/// Secondary port for classifier attachment inside pod network namespaces.
pub trait PodNetworkPort: Send + Sync {
    fn attach<'a>(&'a self, sys: SysId, netns: &'a str, if_name: &'a str) -> PortFuture<'a, ()>;

    /// Best-effort; a missing namespace or device is success.
    fn detach<'a>(&'a self, netns: &'a str, if_name: &'a str) -> PortFuture<'a, ()>;

    /// Network namespace paths currently present on the host.
    fn list_netns(&self) -> PortFuture<'_, Vec<String>>;
}
