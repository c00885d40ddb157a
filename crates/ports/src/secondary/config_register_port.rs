use domain::common::entity::SysId;
use domain::common::error::DomainError;
use domain::config::entity::ConfigValue;

/// Secondary port for the per-family config register (`fsm_xcfg`).
///
/// Each call is a whole-slot read or a whole-slot replace; callers do the
/// read-modify-write.
pub trait ConfigRegisterPort: Send + Sync {
    fn get(&self, sys: SysId) -> Result<ConfigValue, DomainError>;

    fn set(&self, sys: SysId, value: &ConfigValue) -> Result<(), DomainError>;
}
