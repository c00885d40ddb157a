use domain::common::entity::SysId;
use domain::common::error::DomainError;
use domain::config::entity::ConfigValue;
use ebpf_common::MAP_NAME_CFG;
use ebpf_common::config::XNetCfg;
use ports::secondary::config_register_port::ConfigRegisterPort;
use tracing::debug;

use super::pinned::{PinnedMaps, engine_err};

/// The `fsm_xcfg` array, one register per program family.
pub struct PinnedConfigRegister {
    maps: PinnedMaps,
}

impl PinnedConfigRegister {
    pub fn new(maps: PinnedMaps) -> Self {
        Self { maps }
    }
}

impl ConfigRegisterPort for PinnedConfigRegister {
    fn get(&self, sys: SysId) -> Result<ConfigValue, DomainError> {
        let array = self.maps.array::<XNetCfg>(MAP_NAME_CFG)?;
        let raw = array
            .get(&sys.to_u32(), 0)
            .map_err(|e| engine_err(MAP_NAME_CFG, "get", &e))?;
        Ok(ConfigValue::from_ebpf(&raw))
    }

    fn set(&self, sys: SysId, value: &ConfigValue) -> Result<(), DomainError> {
        let mut array = self.maps.array::<XNetCfg>(MAP_NAME_CFG)?;
        array
            .set(sys.to_u32(), value.to_ebpf(), 0)
            .map_err(|e| engine_err(MAP_NAME_CFG, "set", &e))?;
        debug!(
            sys = %sys,
            ipv4 = format!("{:#x}", value.ipv4.bits()),
            ipv6 = format!("{:#x}", value.ipv6.bits()),
            "config register written"
        );
        Ok(())
    }
}
