use std::path::PathBuf;
use std::sync::Arc;

use domain::common::entity::SysId;
use ports::secondary::PortFuture;
use ports::secondary::pod_network_port::PodNetworkPort;
use tracing::{debug, info};

use super::command::{CommandRunner, run_checked, run_tolerant};
use super::tc;

/// Attaches classifiers inside pod network namespaces via `nsenter`.
pub struct NsenterPodNetwork {
    runner: Arc<dyn CommandRunner>,
    pin_dir: String,
    netns_dirs: Vec<PathBuf>,
}

impl NsenterPodNetwork {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        pin_dir: impl Into<String>,
        netns_dirs: Vec<PathBuf>,
    ) -> Self {
        Self {
            runner,
            pin_dir: pin_dir.into(),
            netns_dirs,
        }
    }

    fn in_netns(netns: &str, tc_args: Vec<String>) -> Vec<String> {
        let mut full = vec![format!("--net={netns}"), "tc".to_string()];
        full.extend(tc_args);
        full
    }
}

impl PodNetworkPort for NsenterPodNetwork {
    fn attach<'a>(&'a self, sys: SysId, netns: &'a str, if_name: &'a str) -> PortFuture<'a, ()> {
        Box::pin(async move {
            for cmd in tc::attach_commands(&self.pin_dir, sys, if_name) {
                run_checked(self.runner.as_ref(), "nsenter", &Self::in_netns(netns, cmd)).await?;
            }
            info!(netns, if_name, sys = %sys, "pod classifiers attached");
            Ok(())
        })
    }

    fn detach<'a>(&'a self, netns: &'a str, if_name: &'a str) -> PortFuture<'a, ()> {
        Box::pin(async move {
            run_tolerant(
                self.runner.as_ref(),
                "nsenter",
                &Self::in_netns(netns, tc::detach_command(if_name)),
                tc::GONE,
            )
            .await?;
            debug!(netns, if_name, "pod classifiers detached");
            Ok(())
        })
    }

    fn list_netns(&self) -> PortFuture<'_, Vec<String>> {
        Box::pin(async move {
            let mut found = Vec::new();
            for dir in &self.netns_dirs {
                let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
                    continue;
                };
                while let Ok(Some(entry)) = entries.next_entry().await {
                    found.push(entry.path().to_string_lossy().into_owned());
                }
            }
            found.sort();
            Ok(found)
        })
    }
}
