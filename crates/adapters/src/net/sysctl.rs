use std::path::PathBuf;

use domain::common::error::DomainError;
use ports::secondary::device_port::SysctlPort;
use tracing::debug;

/// Writes kernel parameters under `<proc>/sys`.
pub struct ProcSysctl {
    root: PathBuf,
}

impl ProcSysctl {
    pub fn new(proc_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: proc_dir.into().join("sys"),
        }
    }

    fn path_of(&self, key: &str) -> PathBuf {
        key.split('.').fold(self.root.clone(), |p, part| p.join(part))
    }
}

impl SysctlPort for ProcSysctl {
    fn set(&self, key: &str, value: &str) -> Result<(), DomainError> {
        let path = self.path_of(key);
        std::fs::write(&path, value)
            .map_err(|e| DomainError::EngineError(format!("sysctl {key}={value}: {e}")))?;
        debug!(key, value, "sysctl written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_key_maps_to_proc_path() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("sys/net/ipv4/conf/all");
        std::fs::create_dir_all(&conf).unwrap();
        std::fs::write(conf.join("arp_ignore"), "0").unwrap();

        let sysctl = ProcSysctl::new(dir.path());
        sysctl.set("net.ipv4.conf.all.arp_ignore", "1").unwrap();
        assert_eq!(
            std::fs::read_to_string(conf.join("arp_ignore")).unwrap(),
            "1"
        );
    }

    #[test]
    fn missing_key_errors() {
        let dir = tempfile::tempdir().unwrap();
        let sysctl = ProcSysctl::new(dir.path());
        assert!(sysctl.set("net.ipv4.nope", "1").is_err());
    }
}
