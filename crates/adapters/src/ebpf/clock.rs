use std::path::PathBuf;

use domain::common::error::DomainError;
use ports::secondary::flow_table_port::MonotonicClock;

/// Kernel clock read from `/proc/uptime`, comparable with flow `atime`
/// stamps on hosts that do not suspend.
pub struct UptimeClock {
    path: PathBuf,
}

impl UptimeClock {
    pub fn new(proc_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: proc_dir.into().join("uptime"),
        }
    }
}

impl Default for UptimeClock {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl MonotonicClock for UptimeClock {
    fn now_ns(&self) -> Result<u64, DomainError> {
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| DomainError::EngineError(format!("read {}: {e}", self.path.display())))?;
        parse_uptime_ns(&raw)
    }
}

fn parse_uptime_ns(raw: &str) -> Result<u64, DomainError> {
    let first = raw
        .split_whitespace()
        .next()
        .ok_or_else(|| DomainError::EngineError("empty uptime".to_string()))?;
    let (secs, frac) = first.split_once('.').unwrap_or((first, "0"));
    let secs: u64 = secs
        .parse()
        .map_err(|e| DomainError::EngineError(format!("uptime '{first}': {e}")))?;
    let frac_digits: String = frac.chars().take(9).collect();
    let scale = 10u64.pow(9 - frac_digits.len() as u32);
    let frac_ns = if frac_digits.is_empty() {
        0
    } else {
        frac_digits
            .parse::<u64>()
            .map_err(|e| DomainError::EngineError(format!("uptime '{first}': {e}")))?
            * scale
    };
    Ok(secs * 1_000_000_000 + frac_ns)
}
