use std::sync::Arc;

use domain::common::entity::SysId;
use domain::common::error::DomainError;
use domain::config::entity::{ConfigValue, ConfigView};
use domain::config::policy::{self, MagicOverride};
use ports::secondary::config_register_port::ConfigRegisterPort;
use tracing::{info, warn};

/// Read-modify-write access to the per-family config registers.
///
/// Every mutation reads the whole register, applies a domain policy and
/// writes the whole register back.
pub struct ConfigRegisterService {
    port: Arc<dyn ConfigRegisterPort>,
}

impl ConfigRegisterService {
    pub fn new(port: Arc<dyn ConfigRegisterPort>) -> Self {
        Self { port }
    }

    fn update(
        &self,
        sys: SysId,
        mutate: impl FnOnce(&mut ConfigValue),
    ) -> Result<ConfigValue, DomainError> {
        let mut value = self.port.get(sys)?;
        mutate(&mut value);
        self.port.set(sys, &value)?;
        Ok(value)
    }

    /// Mesh register: magic image first, then the default UDP policy and ACL.
    pub fn init_mesh(&self, magic: &MagicOverride) -> Result<ConfigValue, DomainError> {
        let value = self.update(SysId::Mesh, |v| {
            magic.apply(v);
            policy::init_mesh(v);
        })?;
        info!(
            ipv4 = format!("{:#x}", value.ipv4.bits()),
            ipv6 = format!("{:#x}", value.ipv6.bits()),
            "mesh config register initialized"
        );
        Ok(value)
    }

    pub fn init_e4lb(
        &self,
        magic: &MagicOverride,
        ipv4_enabled: bool,
        ipv6_enabled: bool,
    ) -> Result<ConfigValue, DomainError> {
        let value = self.update(SysId::E4lb, |v| {
            magic.apply(v);
            policy::init_e4lb(v, ipv4_enabled, ipv6_enabled);
        })?;
        info!(
            ipv4_enabled,
            ipv6_enabled,
            ipv4 = format!("{:#x}", value.ipv4.bits()),
            ipv6 = format!("{:#x}", value.ipv6.bits()),
            "e4lb config register initialized"
        );
        Ok(value)
    }

    pub fn e4lb_off(&self) -> Result<ConfigValue, DomainError> {
        self.update(SysId::E4lb, policy::e4lb_off)
    }

    /// Turn on ACL enforcement for `sys`, writing only when it was off.
    pub fn ensure_acl(&self, sys: SysId) -> Result<bool, DomainError> {
        let mut value = self.port.get(sys)?;
        if !policy::ensure_acl(&mut value) {
            return Ok(false);
        }
        self.port.set(sys, &value)?;
        info!(sys = %sys, "acl enforcement enabled");
        Ok(true)
    }

    /// After a fresh load, make every family's register readable, writing
    /// a zeroed register where the read fails.
    pub fn init_bookkeeping(&self) -> Result<(), DomainError> {
        for sys in SysId::ALL {
            if let Err(e) = self.port.get(sys) {
                warn!(sys = %sys, error = %e, "register unreadable, writing defaults");
                self.port.set(sys, &ConfigValue::default())?;
            }
        }
        Ok(())
    }

    pub fn view(&self, sys: SysId) -> Result<ConfigView, DomainError> {
        Ok(ConfigView::new(sys, &self.port.get(sys)?))
    }

    pub fn view_all(&self) -> Result<Vec<ConfigView>, DomainError> {
        SysId::ALL.into_iter().map(|sys| self.view(sys)).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use domain::config::entity::{CfgFlag, FlagWord};
    use ports::test_utils::InMemoryConfigRegister;

    use super::*;

    fn service() -> (Arc<InMemoryConfigRegister>, ConfigRegisterService) {
        let port = Arc::new(InMemoryConfigRegister::default());
        (port.clone(), ConfigRegisterService::new(port))
    }

    #[test]
    fn init_mesh_sets_acl_and_default_udp_on_ipv4_only() {
        let (port, svc) = service();
        svc.init_mesh(&MagicOverride::default()).unwrap();
        let v = port.value(SysId::Mesh);
        assert!(v.ipv4.is_set(CfgFlag::AclCheckOn));
        assert!(v.ipv4.is_set(CfgFlag::UdpProtoAllowAll));
        assert_eq!(v.ipv6.bits(), 0);
    }

    #[test]
    fn magic_replaces_word_before_policy() {
        let (port, svc) = service();
        let mut seeded = ConfigValue::default();
        seeded.ipv4.set(CfgFlag::DenyAll);
        port.set(SysId::Mesh, &seeded).unwrap();

        let mut image = FlagWord::default();
        image.set(CfgFlag::TraceHdrOn);
        let magic = MagicOverride {
            ipv4: Some(image.bits()),
            ipv6: None,
        };
        svc.init_mesh(&magic).unwrap();

        let v = port.value(SysId::Mesh);
        assert!(!v.ipv4.is_set(CfgFlag::DenyAll));
        assert!(v.ipv4.is_set(CfgFlag::TraceHdrOn));
        assert!(v.ipv4.is_set(CfgFlag::AclCheckOn));
    }

    #[test]
    fn init_e4lb_never_leaves_nat_all_off_without_by_ip_port() {
        let (port, svc) = service();
        let mut seeded = ConfigValue::default();
        seeded.ipv4.set(CfgFlag::TcpNatAllOff);
        seeded.ipv6.set(CfgFlag::TcpNatAllOff);
        port.set(SysId::E4lb, &seeded).unwrap();

        svc.init_e4lb(&MagicOverride::default(), true, false).unwrap();
        let v = port.value(SysId::E4lb);
        assert!(v.ipv4.is_set(CfgFlag::TcpNatByIpPortOn));
        assert!(!v.ipv4.is_set(CfgFlag::TcpNatAllOff));
        // Disabled stack only loses the catch-all deny.
        assert!(v.ipv6.is_set(CfgFlag::TcpNatAllOff));
    }

    #[test]
    fn read_failure_is_surfaced() {
        let (port, svc) = service();
        port.fail_get.store(true, Ordering::SeqCst);
        assert!(svc.init_mesh(&MagicOverride::default()).is_err());
        assert_eq!(port.writes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn ensure_acl_writes_only_when_needed() {
        let (port, svc) = service();
        assert!(svc.ensure_acl(SysId::Mesh).unwrap());
        assert!(!svc.ensure_acl(SysId::Mesh).unwrap());
        assert_eq!(port.writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn e4lb_off_marks_nat_all_off_on_both_stacks() {
        let (port, svc) = service();
        svc.init_e4lb(&MagicOverride::default(), true, true).unwrap();
        svc.e4lb_off().unwrap();
        let v = port.value(SysId::E4lb);
        for word in [v.ipv4, v.ipv6] {
            assert!(word.is_set(CfgFlag::TcpNatAllOff));
            assert!(!word.is_set(CfgFlag::TcpNatByIpPortOn));
            assert!(!word.is_set(CfgFlag::TcpProtoAllowNatEscape));
        }
    }

    #[test]
    fn view_lists_every_family() {
        let (_, svc) = service();
        svc.init_mesh(&MagicOverride::default()).unwrap();
        let views = svc.view_all().unwrap();
        assert_eq!(views.len(), 3);
        assert!(views[1].ipv4.contains(&CfgFlag::AclCheckOn));
    }
}
