use std::sync::Arc;

use domain::common::entity::{IpProto, SysId};
use domain::mesh::planner::{FilterPorts, SidecarTarget, diff, plan_redirects};
use ports::secondary::metrics_port::MetricsPort;
use ports::secondary::opt_map_port::OptMapPort;
use tracing::{debug, info, warn};

use crate::config_register_service::ConfigRegisterService;
use crate::pod_view_service::PodViewService;

/// Outcome of one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub desired: usize,
    pub upserted: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl ReconcileReport {
    fn result_label(&self) -> &'static str {
        if self.failed == 0 { "ok" } else { "partial" }
    }
}

/// Converges the Mesh-scoped TCP Opt entries on the sidecar assignment
/// derived from the current cluster view.
///
/// The kernel map is authoritative: every pass reads the current entries
/// back instead of trusting a local copy.
pub struct MeshPolicyService {
    view: Arc<PodViewService>,
    opt: Arc<dyn OptMapPort>,
    registers: Arc<ConfigRegisterService>,
    filter_ports: FilterPorts,
    metrics: Arc<dyn MetricsPort>,
}

impl MeshPolicyService {
    pub fn new(
        view: Arc<PodViewService>,
        opt: Arc<dyn OptMapPort>,
        registers: Arc<ConfigRegisterService>,
        filter_ports: FilterPorts,
        metrics: Arc<dyn MetricsPort>,
    ) -> Self {
        Self {
            view,
            opt,
            registers,
            filter_ports,
            metrics,
        }
    }

    /// One full pass. Individual failures are logged and counted; the next
    /// pass retries them.
    pub fn reconcile(&self) -> ReconcileReport {
        let sidecars: Vec<SidecarTarget> = self
            .view
            .list_sidecar_pods()
            .iter()
            .filter_map(|pod| {
                let target = SidecarTarget::from_pod(pod, &self.filter_ports);
                if target.is_none() {
                    debug!(pod = %pod.key(), "sidecar lacks redirect ports, skipped");
                }
                target
            })
            .collect();
        let pods = self.view.list_monitored_pods();
        let desired = plan_redirects(&sidecars, &pods);

        let mut report = ReconcileReport {
            desired: desired.len(),
            ..ReconcileReport::default()
        };

        let current = match self.opt.list_opts(IpProto::Tcp) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(map = "tcp_opt", error = %e, "cannot read current redirects, pass skipped");
                self.metrics.record_reconcile_pass("error");
                return report;
            }
        };

        let changes = diff(&current, &desired);
        for (key, value) in &changes.upserts {
            match self.opt.add_opt(SysId::Mesh, key, value) {
                Ok(()) => report.upserted += 1,
                Err(e) => {
                    warn!(map = "tcp_opt", key = ?key, error = %e, "redirect upsert failed");
                    report.failed += 1;
                }
            }
        }
        for key in &changes.deletes {
            match self.opt.del_opt(SysId::Mesh, key) {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    warn!(map = "tcp_opt", key = ?key, error = %e, "redirect delete failed");
                    report.failed += 1;
                }
            }
        }

        if let Err(e) = self.registers.ensure_acl(SysId::Mesh) {
            warn!(sys = %SysId::Mesh, error = %e, "cannot ensure acl enforcement");
            report.failed += 1;
        }

        self.metrics.record_reconcile_pass(report.result_label());
        self.metrics.set_redirect_entries(report.desired as u64);
        info!(
            sidecars = sidecars.len(),
            pods = pods.len(),
            desired = report.desired,
            upserted = report.upserted,
            deleted = report.deleted,
            failed = report.failed,
            "mesh policies reconciled"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use domain::config::entity::CfgFlag;
    use domain::flow::entity::{OptKey, OptValue};
    use domain::pod::policy::MonitorPolicy;
    use ports::test_utils::{
        FakeClusterState, InMemoryConfigRegister, InMemoryOptMap, NoopMetrics, TEST_SIDECAR_LABEL,
        running_pod, sidecar_pod,
    };

    use super::*;

    struct Fixture {
        cluster: Arc<FakeClusterState>,
        opt: Arc<InMemoryOptMap>,
        registers: Arc<InMemoryConfigRegister>,
        service: MeshPolicyService,
    }

    fn fixture() -> Fixture {
        let cluster = Arc::new(FakeClusterState::default());
        cluster.add_namespace("bookstore");
        let opt = Arc::new(InMemoryOptMap::default());
        let registers = Arc::new(InMemoryConfigRegister::default());
        let view = Arc::new(PodViewService::new(
            cluster.clone(),
            MonitorPolicy::new(Vec::new(), TEST_SIDECAR_LABEL),
        ));
        let service = MeshPolicyService::new(
            view,
            opt.clone(),
            Arc::new(ConfigRegisterService::new(registers.clone())),
            FilterPorts {
                inbound: "inbound".to_string(),
                outbound: "outbound".to_string(),
            },
            Arc::new(NoopMetrics),
        );
        Fixture {
            cluster,
            opt,
            registers,
            service,
        }
    }

    fn v4(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn pass_writes_two_redirects_per_pod() {
        let f = fixture();
        f.cluster.sidecars.lock().unwrap().push(sidecar_pod("s0", "10.0.0.2"));
        f.cluster
            .pods
            .lock()
            .unwrap()
            .push(running_pod("bookstore", "web", "10.0.1.7"));

        let report = f.service.reconcile();
        assert_eq!(report.upserted, 2);
        assert_eq!(report.failed, 0);

        let entries = f.opt.entries(IpProto::Tcp);
        let out = entries
            .get(&OptKey::local(SysId::Mesh, v4("10.0.1.7"), IpProto::Tcp))
            .unwrap();
        assert_eq!(out.daddr, v4("10.0.0.2"));
        assert_eq!(out.dport, 15001);
        let inb = entries
            .get(&OptKey::remote(SysId::Mesh, v4("10.0.1.7"), IpProto::Tcp))
            .unwrap();
        assert_eq!(inb.dport, 15003);
        assert!(f.registers.value(SysId::Mesh).ipv4.is_set(CfgFlag::AclCheckOn));
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let f = fixture();
        f.cluster.sidecars.lock().unwrap().push(sidecar_pod("s0", "10.0.0.2"));
        f.cluster
            .pods
            .lock()
            .unwrap()
            .push(running_pod("bookstore", "web", "10.0.1.7"));
        f.service.reconcile();
        let report = f.service.reconcile();
        assert_eq!((report.upserted, report.deleted), (0, 0));
    }

    #[test]
    fn stale_mesh_entries_are_removed_and_foreign_ones_kept() {
        let f = fixture();
        let stale = OptKey::local(SysId::Mesh, v4("10.9.9.9"), IpProto::Tcp);
        let foreign = OptKey::local(SysId::E4lb, v4("10.9.9.9"), IpProto::Tcp);
        let val = OptValue::redirect(v4("10.0.0.2"), 15001, IpProto::Tcp);
        f.opt.add_opt(SysId::Mesh, &stale, &val).unwrap();
        f.opt.add_opt(SysId::E4lb, &foreign, &val).unwrap();

        let report = f.service.reconcile();
        assert_eq!(report.deleted, 1);
        let entries = f.opt.entries(IpProto::Tcp);
        assert!(!entries.contains_key(&stale));
        assert!(entries.contains_key(&foreign));
    }

    #[test]
    fn failed_upsert_does_not_stop_the_pass() {
        let f = fixture();
        f.cluster.sidecars.lock().unwrap().push(sidecar_pod("s0", "10.0.0.2"));
        {
            let mut pods = f.cluster.pods.lock().unwrap();
            pods.push(running_pod("bookstore", "a", "10.0.1.1"));
            pods.push(running_pod("bookstore", "b", "10.0.1.2"));
        }
        let poisoned = OptKey::local(SysId::Mesh, IpAddr::V4(Ipv4Addr::new(10, 0, 1, 1)), IpProto::Tcp);
        f.opt.poisoned.lock().unwrap().insert(poisoned);

        let report = f.service.reconcile();
        assert_eq!(report.failed, 1);
        assert_eq!(report.upserted, 3);
        assert!(!f.opt.entries(IpProto::Tcp).contains_key(&poisoned));
    }

    #[test]
    fn unreadable_map_skips_the_pass() {
        let f = fixture();
        f.opt.fail_list.store(true, std::sync::atomic::Ordering::SeqCst);
        f.cluster.sidecars.lock().unwrap().push(sidecar_pod("s0", "10.0.0.2"));
        let report = f.service.reconcile();
        assert_eq!(report.upserted + report.deleted, 0);
    }
}
