use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use aya::Pod;
use aya::maps::{Array, HashMap, Map, MapData, MapError};
use domain::common::error::DomainError;

/// Opens pinned maps by name under one bpffs directory.
///
/// Maps are reopened per operation so the agent never holds a stale fd
/// across a program reload.
#[derive(Debug, Clone)]
pub struct PinnedMaps {
    pin_dir: PathBuf,
}

impl PinnedMaps {
    pub fn new(pin_dir: impl Into<PathBuf>) -> Self {
        Self {
            pin_dir: pin_dir.into(),
        }
    }

    pub fn pin_dir(&self) -> &Path {
        &self.pin_dir
    }

    fn open(&self, name: &str) -> Result<MapData, DomainError> {
        let path = self.pin_dir.join(name);
        MapData::from_pin(&path).map_err(|e| {
            DomainError::EngineError(format!("open pinned map {}: {e}", path.display()))
        })
    }

    pub fn hash<K: Pod, V: Pod>(&self, name: &str) -> Result<HashMap<MapData, K, V>, DomainError> {
        let data = self.open(name)?;
        HashMap::try_from(Map::HashMap(data))
            .map_err(|e| DomainError::EngineError(format!("map '{name}' type mismatch: {e}")))
    }

    pub fn array<V: Pod>(&self, name: &str) -> Result<Array<MapData, V>, DomainError> {
        let data = self.open(name)?;
        Array::try_from(Map::Array(data))
            .map_err(|e| DomainError::EngineError(format!("map '{name}' type mismatch: {e}")))
    }
}

/// Missing-key failures from lookups and deletes.
pub fn is_not_found(err: &MapError) -> bool {
    match err {
        MapError::KeyNotFound => true,
        MapError::SyscallError(e) => e.io_error.kind() == ErrorKind::NotFound,
        _ => false,
    }
}

pub fn engine_err(map: &str, op: &str, err: &MapError) -> DomainError {
    DomainError::EngineError(format!("{map} {op} failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_not_found_is_not_found() {
        assert!(is_not_found(&MapError::KeyNotFound));
    }

    #[test]
    fn open_missing_pin_is_engine_error() {
        let maps = PinnedMaps::new("/nonexistent/bpf/fsm");
        let Err(err) = maps.array::<u64>("fsm_xcfg") else {
            panic!("opening an absent pin must fail");
        };
        assert!(matches!(err, DomainError::EngineError(ref m) if m.contains("fsm_xcfg")));
    }
}
