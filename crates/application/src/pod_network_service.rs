use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use domain::common::entity::{IpProto, SysId};
use domain::common::error::DomainError;
use domain::pod::entity::pod_key;
use ports::secondary::metrics_port::MetricsPort;
use ports::secondary::opt_map_port::OptMapPort;
use ports::secondary::pod_network_port::PodNetworkPort;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::pod_view_service::PodViewService;

/// Interface detached from every network namespace on reset.
pub const POD_IF_NAME: &str = "eth0";

/// Container network setup/teardown notification from the chained plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodAttachRequest {
    pub pod_name: String,
    pub pod_namespace: String,
    pub netns: String,
    pub if_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Attachment {
    namespace: String,
    name: String,
    netns: String,
    if_name: String,
}

/// Mesh program attachment to pod interfaces, driven by plugin callbacks
/// and kept honest by a periodic repair pass.
pub struct PodNetworkService {
    view: Arc<PodViewService>,
    network: Arc<dyn PodNetworkPort>,
    opt: Arc<dyn OptMapPort>,
    metrics: Arc<dyn MetricsPort>,
    attachments: Mutex<HashMap<String, Attachment>>,
}

impl PodNetworkService {
    pub fn new(
        view: Arc<PodViewService>,
        network: Arc<dyn PodNetworkPort>,
        opt: Arc<dyn OptMapPort>,
        metrics: Arc<dyn MetricsPort>,
    ) -> Self {
        Self {
            view,
            network,
            opt,
            metrics,
            attachments: Mutex::new(HashMap::new()),
        }
    }

    /// Attach when the pod is monitored. Returns whether it was attached.
    pub async fn pod_created(&self, req: &PodAttachRequest) -> Result<bool, DomainError> {
        if !self.view.is_monitored_pod(&req.pod_namespace, &req.pod_name) {
            debug!(pod = %pod_key(&req.pod_namespace, &req.pod_name), "pod not monitored");
            self.metrics.record_pod_attach("skipped");
            return Ok(false);
        }
        if let Err(e) = self
            .network
            .attach(SysId::Mesh, &req.netns, &req.if_name)
            .await
        {
            self.metrics.record_pod_attach("failed");
            return Err(e);
        }
        self.metrics.record_pod_attach("attached");
        let key = pod_key(&req.pod_namespace, &req.pod_name);
        info!(pod = %key, netns = %req.netns, if_name = %req.if_name, "mesh attached to pod");
        self.attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                key,
                Attachment {
                    namespace: req.pod_namespace.clone(),
                    name: req.pod_name.clone(),
                    netns: req.netns.clone(),
                    if_name: req.if_name.clone(),
                },
            );
        Ok(true)
    }

    /// Detach and forget; unknown pods are fine.
    pub async fn pod_deleted(&self, req: &PodAttachRequest) -> Result<(), DomainError> {
        let key = pod_key(&req.pod_namespace, &req.pod_name);
        self.attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        if let Err(e) = self.network.detach(&req.netns, &req.if_name).await {
            warn!(pod = %key, netns = %req.netns, error = %e, "detach failed");
        }
        Ok(())
    }

    pub fn attachment_count(&self) -> usize {
        self.attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drop attachments of vanished or unmonitored pods and re-apply the rest.
    pub async fn repair(&self) {
        let snapshot: Vec<(String, Attachment)> = self
            .attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, a)| (k.clone(), a.clone()))
            .collect();

        for (key, att) in snapshot {
            let present = self.view.get_pod(&att.namespace, &att.name).is_some();
            if !present || !self.view.is_monitored_pod(&att.namespace, &att.name) {
                self.attachments
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&key);
                if let Err(e) = self.network.detach(&att.netns, &att.if_name).await {
                    debug!(pod = %key, error = %e, "detach of stale attachment failed");
                }
                info!(pod = %key, present, "stale pod attachment dropped");
                continue;
            }
            if let Err(e) = self
                .network
                .attach(SysId::Mesh, &att.netns, &att.if_name)
                .await
            {
                warn!(pod = %key, netns = %att.netns, error = %e, "pod re-attach failed");
                self.metrics.record_pod_attach("failed");
            }
        }
    }

    pub async fn run_repair(self: Arc<Self>, interval: Duration, cancel_token: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                () = cancel_token.cancelled() => break,
                _ = ticker.tick() => self.repair().await,
            }
        }
        info!("pod repair loop stopped");
    }

    /// Detach from every pod namespace and remove all Mesh redirects.
    pub async fn reset(&self) -> Result<(), DomainError> {
        let namespaces = self.network.list_netns().await?;
        for netns in &namespaces {
            if let Err(e) = self.network.detach(netns, POD_IF_NAME).await {
                debug!(netns = %netns, error = %e, "detach during reset failed");
            }
        }
        self.attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        let mut removed = 0usize;
        for proto in [IpProto::Tcp, IpProto::Udp] {
            for (key, _) in self.opt.list_opts(proto)? {
                if key.sys != SysId::Mesh {
                    continue;
                }
                match self.opt.del_opt(SysId::Mesh, &key) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(proto = proto.label(), key = ?key, error = %e, "redirect delete failed"),
                }
            }
        }
        info!(netns = namespaces.len(), removed, "pods reset");
        Ok(())
    }
}
