//! Shared helpers and error type used across config modules.

use std::path::Path;

use tracing::warn;

// ── Config errors ──────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(String),

    #[error("validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("invalid value '{value}' for field '{field}': expected one of {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },
}

impl From<serde_yaml_ng::Error> for ConfigError {
    fn from(e: serde_yaml_ng::Error) -> Self {
        Self::Yaml(e.to_string())
    }
}

pub(super) fn validation(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.to_string(),
        message: message.into(),
    }
}

// ── Shared serde defaults ──────────────────────────────────────────

pub(super) fn default_true() -> bool {
    true
}

// ── Parsing helpers ────────────────────────────────────────────────

/// Parse a colon-separated 48-bit MAC address.
pub fn parse_mac(s: &str) -> Result<[u8; 6], ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        field: "mac".to_string(),
        value: s.to_string(),
        expected: format!("aa:bb:cc:dd:ee:ff ({reason})"),
    };
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 6 {
        return Err(invalid("six octets"));
    }
    let mut mac = [0u8; 6];
    for (slot, part) in mac.iter_mut().zip(parts) {
        if part.len() != 2 {
            return Err(invalid("two hex digits per octet"));
        }
        *slot = u8::from_str_radix(part, 16).map_err(|_| invalid("hex digits"))?;
    }
    Ok(mac)
}

#[cfg(unix)]
pub(super) fn warn_if_world_readable(path: &Path, label: &str) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(metadata) = std::fs::metadata(path) {
        let mode = metadata.permissions().mode();
        if mode & 0o002 != 0 {
            warn!(
                path = %path.display(),
                mode = format!("{mode:04o}"),
                "{label} is world-writable, consider chmod 644 or stricter",
            );
        }
    }
}

#[cfg(not(unix))]
pub(super) fn warn_if_world_readable(_path: &Path, _label: &str) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_parses() {
        assert_eq!(
            parse_mac("0a:58:0a:f4:00:01").unwrap(),
            [0x0a, 0x58, 0x0a, 0xf4, 0x00, 0x01]
        );
    }

    #[test]
    fn mac_rejects_malformed() {
        assert!(parse_mac("0a:58:0a:f4:00").is_err());
        assert!(parse_mac("0a:58:0a:f4:00:zz").is_err());
        assert!(parse_mac("0a58:0a:f4:00:01:02").is_err());
    }
}
