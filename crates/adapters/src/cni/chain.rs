use std::path::{Path, PathBuf};

use domain::common::error::DomainError;
use ports::secondary::PortFuture;
use ports::secondary::plugin_chain_port::PluginChainPort;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

/// Host-side CNI layout the plugin is chained into.
#[derive(Debug, Clone)]
pub struct ChainLayout {
    /// Directory shipping the plugin binary inside the agent image.
    pub app_dir: PathBuf,
    pub cni_bin_dir: PathBuf,
    pub cni_netd_dir: PathBuf,
    /// Control socket the plugin calls back on.
    pub socket_path: String,
    pub plugin_name: String,
}

/// Chains the plugin into the node's primary CNI config list.
pub struct CniChainInstaller {
    layout: ChainLayout,
}

impl CniChainInstaller {
    pub fn new(layout: ChainLayout) -> Self {
        Self { layout }
    }

    fn plugin_entry(&self) -> Value {
        json!({
            "type": self.layout.plugin_name,
            "socket": self.layout.socket_path,
        })
    }

    fn binary_target(&self) -> PathBuf {
        self.layout.cni_bin_dir.join(&self.layout.plugin_name)
    }

    async fn install_binary(&self) -> Result<(), DomainError> {
        let source = self.layout.app_dir.join(&self.layout.plugin_name);
        let target = self.binary_target();
        let tmp = target.with_extension("tmp");
        tokio::fs::copy(&source, &tmp)
            .await
            .map_err(|e| io_err("copy plugin binary", &source, &e))?;
        set_executable(&tmp).await?;
        tokio::fs::rename(&tmp, &target)
            .await
            .map_err(|e| io_err("install plugin binary", &target, &e))?;
        debug!(target = %target.display(), "plugin binary installed");
        Ok(())
    }
}

impl PluginChainPort for CniChainInstaller {
    fn install(&self) -> PortFuture<'_, ()> {
        Box::pin(async move {
            self.install_binary().await?;

            let netd = &self.layout.cni_netd_dir;
            let primary = primary_config(netd)?.ok_or_else(|| {
                DomainError::NotFound(format!("no CNI config in {}", netd.display()))
            })?;
            let raw = read_json(&primary)?;

            let (target, mut list) = if is_conflist(&primary) {
                (primary.clone(), raw)
            } else {
                (primary.with_extension("conflist"), conf_to_conflist(raw))
            };

            if insert_plugin(&mut list, self.plugin_entry())? || target != primary {
                write_json_atomic(&target, &list)?;
            }
            if target != primary {
                std::fs::remove_file(&primary).map_err(|e| io_err("remove", &primary, &e))?;
            }
            info!(config = %target.display(), plugin = %self.layout.plugin_name, "plugin chained");
            Ok(())
        })
    }

    fn is_installed(&self) -> Result<bool, DomainError> {
        if !self.binary_target().is_file() {
            return Ok(false);
        }
        let Some(primary) = primary_config(&self.layout.cni_netd_dir)? else {
            return Ok(false);
        };
        if !is_conflist(&primary) {
            return Ok(false);
        }
        Ok(has_plugin(&read_json(&primary)?, &self.layout.plugin_name))
    }

    fn cleanup(&self) -> PortFuture<'_, ()> {
        Box::pin(async move {
            for path in config_files(&self.layout.cni_netd_dir)? {
                if !is_conflist(&path) {
                    continue;
                }
                let mut list = read_json(&path)?;
                if remove_plugin(&mut list, &self.layout.plugin_name) {
                    write_json_atomic(&path, &list)?;
                    info!(config = %path.display(), "plugin unchained");
                }
            }
            let target = self.binary_target();
            match tokio::fs::remove_file(&target).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                    Err(io_err("remove", &target, &e))
                }
                _ => Ok(()),
            }
        })
    }
}

// ── Config list manipulation ───────────────────────────────────────

fn is_conflist(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "conflist")
}

fn config_files(netd: &Path) -> Result<Vec<PathBuf>, DomainError> {
    let entries = match std::fs::read_dir(netd) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err("read dir", netd, &e)),
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .is_some_and(|e| e == "conflist" || e == "conf")
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Lexicographically first `.conflist`, else first `.conf`.
fn primary_config(netd: &Path) -> Result<Option<PathBuf>, DomainError> {
    let files = config_files(netd)?;
    let conflist = files.iter().find(|p| is_conflist(p)).cloned();
    Ok(conflist.or_else(|| files.into_iter().next()))
}

/// Wrap a single-plugin `.conf` into a config list.
pub fn conf_to_conflist(conf: Value) -> Value {
    let mut plugin = match conf {
        Value::Object(map) => map,
        other => return other,
    };
    let name = plugin.remove("name").unwrap_or(Value::Null);
    let version = plugin
        .get("cniVersion")
        .cloned()
        .unwrap_or_else(|| Value::String("0.3.1".to_string()));
    let mut list = Map::new();
    list.insert("cniVersion".to_string(), version);
    list.insert("name".to_string(), name);
    list.insert("plugins".to_string(), Value::Array(vec![Value::Object(plugin)]));
    Value::Object(list)
}

fn plugins_mut(list: &mut Value) -> Result<&mut Vec<Value>, DomainError> {
    list.get_mut("plugins")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| DomainError::InvalidConfig("CNI config list has no plugins array".into()))
}

pub fn has_plugin(list: &Value, plugin_type: &str) -> bool {
    list.get("plugins")
        .and_then(Value::as_array)
        .is_some_and(|plugins| {
            plugins
                .iter()
                .any(|p| p.get("type").and_then(Value::as_str) == Some(plugin_type))
        })
}

/// Append `entry` unless a plugin of the same type is already chained.
pub fn insert_plugin(list: &mut Value, entry: Value) -> Result<bool, DomainError> {
    let plugin_type = entry
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if has_plugin(list, &plugin_type) {
        return Ok(false);
    }
    plugins_mut(list)?.push(entry);
    Ok(true)
}

pub fn remove_plugin(list: &mut Value, plugin_type: &str) -> bool {
    let Ok(plugins) = plugins_mut(list) else {
        return false;
    };
    let before = plugins.len();
    plugins.retain(|p| p.get("type").and_then(Value::as_str) != Some(plugin_type));
    plugins.len() != before
}

fn read_json(path: &Path) -> Result<Value, DomainError> {
    let raw = std::fs::read(path).map_err(|e| io_err("read", path, &e))?;
    serde_json::from_slice(&raw)
        .map_err(|e| DomainError::InvalidConfig(format!("{}: {e}", path.display())))
}

fn write_json_atomic(path: &Path, value: &Value) -> Result<(), DomainError> {
    let body = serde_json::to_vec_pretty(value)
        .map_err(|e| DomainError::EngineError(format!("encode {}: {e}", path.display())))?;
    let tmp = path.with_extension("xnet.tmp");
    std::fs::write(&tmp, body).map_err(|e| io_err("write", &tmp, &e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err("rename", path, &e))
}

#[cfg(unix)]
async fn set_executable(path: &Path) -> Result<(), DomainError> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|e| io_err("chmod", path, &e))
}

#[cfg(not(unix))]
async fn set_executable(_path: &Path) -> Result<(), DomainError> {
    Ok(())
}

fn io_err(op: &str, path: &Path, e: &std::io::Error) -> DomainError {
    DomainError::EngineError(format!("{op} {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Host {
        _root: tempfile::TempDir,
        layout: ChainLayout,
    }

    fn host() -> Host {
        let root = tempfile::tempdir().unwrap();
        let app = root.path().join("app");
        let bin = root.path().join("bin");
        let netd = root.path().join("net.d");
        for d in [&app, &bin, &netd] {
            std::fs::create_dir_all(d).unwrap();
        }
        std::fs::write(app.join("xnet-cni"), b"#!/bin/true").unwrap();
        Host {
            layout: ChainLayout {
                app_dir: app,
                cni_bin_dir: bin,
                cni_netd_dir: netd,
                socket_path: "/host/run/xnet-cni.sock".into(),
                plugin_name: "xnet-cni".into(),
            },
            _root: root,
        }
    }

    fn flannel_conflist() -> Value {
        json!({
            "cniVersion": "0.3.1",
            "name": "cbr0",
            "plugins": [{"type": "flannel"}, {"type": "portmap"}]
        })
    }

    #[tokio::test]
    async fn install_appends_once_and_copies_binary() {
        let h = host();
        let conf = h.layout.cni_netd_dir.join("10-flannel.conflist");
        std::fs::write(&conf, flannel_conflist().to_string()).unwrap();

        let installer = CniChainInstaller::new(h.layout.clone());
        assert!(!installer.is_installed().unwrap());
        installer.install().await.unwrap();
        installer.install().await.unwrap();

        let list = read_json(&conf).unwrap();
        let plugins = list["plugins"].as_array().unwrap();
        assert_eq!(plugins.len(), 3);
        assert_eq!(plugins[2]["type"], "xnet-cni");
        assert_eq!(plugins[2]["socket"], "/host/run/xnet-cni.sock");
        assert!(h.layout.cni_bin_dir.join("xnet-cni").is_file());
        assert!(installer.is_installed().unwrap());
    }

    #[tokio::test]
    async fn single_conf_is_converted_to_list() {
        let h = host();
        let conf = h.layout.cni_netd_dir.join("10-bridge.conf");
        std::fs::write(
            &conf,
            json!({"cniVersion": "0.4.0", "name": "br", "type": "bridge"}).to_string(),
        )
        .unwrap();

        CniChainInstaller::new(h.layout.clone())
            .install()
            .await
            .unwrap();

        assert!(!conf.exists());
        let list = read_json(&h.layout.cni_netd_dir.join("10-bridge.conflist")).unwrap();
        assert_eq!(list["name"], "br");
        assert_eq!(list["cniVersion"], "0.4.0");
        assert_eq!(list["plugins"][0]["type"], "bridge");
        assert_eq!(list["plugins"][1]["type"], "xnet-cni");
    }

    #[tokio::test]
    async fn install_without_primary_config_fails() {
        let h = host();
        let err = CniChainInstaller::new(h.layout.clone())
            .install()
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let h = host();
        let conf = h.layout.cni_netd_dir.join("10-flannel.conflist");
        std::fs::write(&conf, flannel_conflist().to_string()).unwrap();
        let installer = CniChainInstaller::new(h.layout.clone());
        installer.install().await.unwrap();

        installer.cleanup().await.unwrap();
        installer.cleanup().await.unwrap();

        assert_eq!(read_json(&conf).unwrap(), flannel_conflist());
        assert!(!h.layout.cni_bin_dir.join("xnet-cni").exists());
        assert!(!installer.is_installed().unwrap());
    }

    #[test]
    fn conflist_preferred_over_conf() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("05-a.conf"), "{}").unwrap();
        std::fs::write(dir.path().join("20-b.conflist"), "{}").unwrap();
        let primary = primary_config(dir.path()).unwrap().unwrap();
        assert!(primary.ends_with("20-b.conflist"));
    }

    #[test]
    fn remove_plugin_reports_change() {
        let mut list = flannel_conflist();
        assert!(remove_plugin(&mut list, "portmap"));
        assert!(!remove_plugin(&mut list, "portmap"));
        assert_eq!(list["plugins"].as_array().unwrap().len(), 1);
    }
}
