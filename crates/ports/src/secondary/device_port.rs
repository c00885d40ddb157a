use domain::common::entity::SysId;
use domain::common::error::DomainError;

use super::PortFuture;

/// Secondary port for host network devices and traffic-control attachment.
pub trait DevicePort: Send + Sync {
    /// Create a tap device and bring it up. Already-present is success.
    fn add_tap<'a>(&'a self, dev: &'a str) -> PortFuture<'a, ()>;

    /// Delete a link. Absent is success.
    fn remove_link<'a>(&'a self, dev: &'a str) -> PortFuture<'a, ()>;

    /// Kernel interface index of `dev`.
    fn ifindex(&self, dev: &str) -> Result<u32, DomainError>;

    /// Attach the ingress and egress classifiers of family `sys` to `dev`.
    fn attach<'a>(&'a self, sys: SysId, dev: &'a str) -> PortFuture<'a, ()>;
}

/// Secondary port for host sysctl writes.
pub trait SysctlPort: Send + Sync {
    /// `key` in dotted form, e.g. `net.ipv4.conf.all.arp_ignore`.
    fn set(&self, key: &str, value: &str) -> Result<(), DomainError>;
}
