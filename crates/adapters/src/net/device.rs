use std::path::PathBuf;
use std::sync::Arc;

use domain::common::entity::SysId;
use domain::common::error::DomainError;
use ports::secondary::PortFuture;
use ports::secondary::device_port::DevicePort;
use tracing::info;

use super::command::{CommandRunner, args, run_checked, run_tolerant};
use super::tc;

const ALREADY_EXISTS: &[&str] = &["File exists", "Device or resource busy"];

/// Host link management through `ip` and `tc`.
pub struct HostDeviceManager {
    runner: Arc<dyn CommandRunner>,
    pin_dir: String,
    sys_class_net: PathBuf,
}

impl HostDeviceManager {
    pub fn new(runner: Arc<dyn CommandRunner>, pin_dir: impl Into<String>) -> Self {
        Self {
            runner,
            pin_dir: pin_dir.into(),
            sys_class_net: PathBuf::from("/sys/class/net"),
        }
    }

    /// Override the sysfs directory used for ifindex lookups.
    #[must_use]
    pub fn with_sys_class_net(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sys_class_net = dir.into();
        self
    }
}

impl DevicePort for HostDeviceManager {
    fn add_tap<'a>(&'a self, dev: &'a str) -> PortFuture<'a, ()> {
        Box::pin(async move {
            run_tolerant(
                self.runner.as_ref(),
                "ip",
                &args(&["tuntap", "add", "dev", dev, "mode", "tap"]),
                ALREADY_EXISTS,
            )
            .await?;
            run_checked(
                self.runner.as_ref(),
                "ip",
                &args(&["link", "set", dev, "up"]),
            )
            .await?;
            info!(dev, "tap device up");
            Ok(())
        })
    }

    fn remove_link<'a>(&'a self, dev: &'a str) -> PortFuture<'a, ()> {
        Box::pin(async move {
            run_tolerant(
                self.runner.as_ref(),
                "ip",
                &args(&["link", "delete", dev]),
                tc::GONE,
            )
            .await?;
            Ok(())
        })
    }

    fn ifindex(&self, dev: &str) -> Result<u32, DomainError> {
        let path = self.sys_class_net.join(dev).join("ifindex");
        let raw = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DomainError::NotFound(format!("link {dev}")),
            _ => DomainError::EngineError(format!("read {}: {e}", path.display())),
        })?;
        raw.trim()
            .parse::<u32>()
            .map_err(|e| DomainError::EngineError(format!("ifindex of {dev}: {e}")))
    }

    fn attach<'a>(&'a self, sys: SysId, dev: &'a str) -> PortFuture<'a, ()> {
        Box::pin(async move {
            for cmd in tc::attach_commands(&self.pin_dir, sys, dev) {
                run_checked(self.runner.as_ref(), "tc", &cmd).await?;
            }
            info!(dev, sys = %sys, "classifiers attached");
            Ok(())
        })
    }
}
