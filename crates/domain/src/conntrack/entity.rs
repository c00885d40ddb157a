use serde::{Deserialize, Serialize};

use crate::common::entity::{IpProto, SysId};

/// Parameters of one idle-flow flush job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushParams {
    /// Five-field cron expression; empty disables the job.
    pub crontab: String,
    pub idle_seconds: i64,
    pub batch_size: i64,
}

impl FlushParams {
    /// A job is only scheduled with a cron expression and positive limits.
    pub fn is_active(&self) -> bool {
        !self.crontab.trim().is_empty() && self.idle_seconds > 0 && self.batch_size > 0
    }

    pub fn tcp_default() -> Self {
        Self {
            crontab: "30 3 */1 * *".to_string(),
            idle_seconds: 3600,
            batch_size: 4096,
        }
    }

    pub fn udp_default() -> Self {
        Self {
            crontab: "*/2 * * * *".to_string(),
            idle_seconds: 120,
            batch_size: 4096,
        }
    }
}

/// Identity of a flush job: which table and which program family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushTarget {
    pub proto: IpProto,
    pub sys: SysId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_active() {
        assert!(FlushParams::tcp_default().is_active());
        assert!(FlushParams::udp_default().is_active());
    }

    #[test]
    fn empty_or_non_positive_disables() {
        let mut p = FlushParams::udp_default();
        p.crontab = " ".into();
        assert!(!p.is_active());

        let mut p = FlushParams::udp_default();
        p.idle_seconds = 0;
        assert!(!p.is_active());

        let mut p = FlushParams::tcp_default();
        p.batch_size = -1;
        assert!(!p.is_active());
    }
}
