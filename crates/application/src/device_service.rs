use std::sync::Arc;

use domain::common::entity::SysId;
use domain::common::error::DomainError;
use ports::secondary::device_port::{DevicePort, SysctlPort};
use tracing::{error, info, warn};

use crate::config_register_service::ConfigRegisterService;

/// Host ARP behaviour required while the E4lb virtual address is up.
pub const E4LB_ARP_SYSCTLS: [(&str, &str); 2] = [
    ("net.ipv4.conf.all.arp_ignore", "1"),
    ("net.ipv4.conf.all.arp_announce", "2"),
];

/// Host bridge carrying pod traffic, attached to the Mesh family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeDevice {
    pub name: String,
    pub mac: Option<String>,
}

/// Host-side device management: the E4lb tap device and the CNI bridges.
///
/// Failures here only ever disable the optional path they belong to.
pub struct DeviceService {
    devices: Arc<dyn DevicePort>,
    sysctl: Arc<dyn SysctlPort>,
    registers: Arc<ConfigRegisterService>,
    e4lb_device: String,
}

impl DeviceService {
    pub fn new(
        devices: Arc<dyn DevicePort>,
        sysctl: Arc<dyn SysctlPort>,
        registers: Arc<ConfigRegisterService>,
        e4lb_device: impl Into<String>,
    ) -> Self {
        Self {
            devices,
            sysctl,
            registers,
            e4lb_device: e4lb_device.into(),
        }
    }

    pub fn e4lb_device(&self) -> &str {
        &self.e4lb_device
    }

    async fn try_bridge_on(&self) -> Result<u32, DomainError> {
        let dev = self.e4lb_device.as_str();
        self.devices.add_tap(dev).await?;
        let ifindex = self.devices.ifindex(dev)?;
        self.devices.attach(SysId::E4lb, dev).await?;
        for (key, value) in E4LB_ARP_SYSCTLS {
            self.sysctl.set(key, value)?;
        }
        Ok(ifindex)
    }

    /// Bring the E4lb device up with its programs attached. Returns `false`
    /// when load balancing stays unavailable.
    pub async fn bridge_on(&self) -> bool {
        match self.try_bridge_on().await {
            Ok(ifindex) => {
                info!(dev = %self.e4lb_device, ifindex, "e4lb device attached");
                true
            }
            Err(e) => {
                error!(dev = %self.e4lb_device, error = %e, "e4lb device setup failed, load balancing disabled");
                false
            }
        }
    }

    /// Re-run `bridge_on` when the device is gone.
    pub async fn repair_e4lb(&self) -> bool {
        match self.devices.ifindex(&self.e4lb_device) {
            Ok(_) => true,
            Err(e) => {
                info!(dev = %self.e4lb_device, reason = %e, "e4lb device missing, recreating");
                self.bridge_on().await
            }
        }
    }

    /// NAT off in the E4lb register, then drop the device.
    pub async fn e4lb_off(&self) -> Result<(), DomainError> {
        self.registers.e4lb_off()?;
        if let Err(e) = self.devices.remove_link(&self.e4lb_device).await {
            warn!(dev = %self.e4lb_device, error = %e, "e4lb device removal failed");
        }
        info!("e4lb turned off");
        Ok(())
    }

    /// Attach the Mesh family to each bridge. Returns how many succeeded.
    pub async fn attach_bridges(&self, bridges: &[BridgeDevice]) -> usize {
        let mut attached = 0;
        for bridge in bridges {
            match self.devices.attach(SysId::Mesh, &bridge.name).await {
                Ok(()) => {
                    attached += 1;
                    info!(dev = %bridge.name, mac = ?bridge.mac, "bridge attached");
                }
                Err(e) => warn!(dev = %bridge.name, error = %e, "bridge attach failed"),
            }
        }
        attached
    }
}
