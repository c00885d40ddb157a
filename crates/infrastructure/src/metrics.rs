use ports::secondary::metrics_port::{ConnTrackMetrics, PodMetrics, ProgramMetrics, ReconcileMetrics};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

// ── Label types ─────────────────────────────────────────────────────

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ProgramLabels {
    pub program: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ResultLabels {
    pub result: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ProtoLabels {
    pub proto: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OpLabels {
    pub op: String,
}

// ── Agent metrics registry ──────────────────────────────────────────

/// Prometheus metrics registry for the agent.
///
/// All metric families use interior mutability (atomics), so recording
/// metrics only requires `&self`. Wrap in `Arc` for multi-task sharing.
pub struct AgentMetrics {
    registry: Registry,
    pub ebpf_program_status: Family<ProgramLabels, Gauge>,
    pub reconcile_passes_total: Family<ResultLabels, Counter>,
    pub redirect_entries: Gauge,
    pub conntrack_evicted_total: Family<ProtoLabels, Counter>,
    pub pod_attach_total: Family<ResultLabels, Counter>,
    pub cni_requests_total: Family<OpLabels, Counter>,
}

impl AgentMetrics {
    /// Create a new registry with every metric under the `xnet` prefix.
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("xnet");

        let ebpf_program_status = Family::<ProgramLabels, Gauge>::default();
        registry.register(
            "ebpf_program_status",
            "Kernel program family status (1=ready, 0=failed)",
            ebpf_program_status.clone(),
        );

        let reconcile_passes_total = Family::<ResultLabels, Counter>::default();
        registry.register(
            "reconcile_passes",
            "Mesh policy reconciliation passes",
            reconcile_passes_total.clone(),
        );

        let redirect_entries = Gauge::default();
        registry.register(
            "redirect_entries",
            "Mesh redirect entries after the last reconciliation pass",
            redirect_entries.clone(),
        );

        let conntrack_evicted_total = Family::<ProtoLabels, Counter>::default();
        registry.register(
            "conntrack_evicted",
            "Idle flow entries evicted by the flush scheduler",
            conntrack_evicted_total.clone(),
        );

        let pod_attach_total = Family::<ResultLabels, Counter>::default();
        registry.register(
            "pod_attach",
            "Pod network attach attempts",
            pod_attach_total.clone(),
        );

        let cni_requests_total = Family::<OpLabels, Counter>::default();
        registry.register(
            "cni_requests",
            "Plugin chain callbacks received",
            cni_requests_total.clone(),
        );

        Self {
            registry,
            ebpf_program_status,
            reconcile_passes_total,
            redirect_entries,
            conntrack_evicted_total,
            pod_attach_total,
            cni_requests_total,
        }
    }

    /// Encode the registry in OpenMetrics text format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if let Err(e) = prometheus_client::encoding::text::encode(&mut buffer, &self.registry) {
            tracing::warn!(error = %e, "metrics encoding failed");
        }
        buffer
    }
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

// ── Sub-trait implementations ──────────────────────────────────────

impl ProgramMetrics for AgentMetrics {
    fn set_ebpf_program_status(&self, program: &str, loaded: bool) {
        self.ebpf_program_status
            .get_or_create(&ProgramLabels {
                program: program.to_string(),
            })
            .set(i64::from(loaded));
    }
}

impl ReconcileMetrics for AgentMetrics {
    fn record_reconcile_pass(&self, result: &str) {
        self.reconcile_passes_total
            .get_or_create(&ResultLabels {
                result: result.to_string(),
            })
            .inc();
    }

    fn set_redirect_entries(&self, count: u64) {
        self.redirect_entries
            .set(count.try_into().unwrap_or(i64::MAX));
    }
}

impl ConnTrackMetrics for AgentMetrics {
    fn record_conntrack_evicted(&self, proto: &str, count: u64) {
        self.conntrack_evicted_total
            .get_or_create(&ProtoLabels {
                proto: proto.to_string(),
            })
            .inc_by(count);
    }
}

impl PodMetrics for AgentMetrics {
    fn record_pod_attach(&self, result: &str) {
        self.pod_attach_total
            .get_or_create(&ResultLabels {
                result: result.to_string(),
            })
            .inc();
    }

    fn record_cni_request(&self, op: &str) {
        self.cni_requests_total
            .get_or_create(&OpLabels { op: op.to_string() })
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ports::secondary::metrics_port::MetricsPort;

    #[test]
    fn encode_contains_prefixed_families() {
        let m = AgentMetrics::new();
        m.set_ebpf_program_status("mesh", true);
        m.record_reconcile_pass("ok");
        m.record_conntrack_evicted("udp", 3);
        let text = m.encode();
        assert!(text.contains("xnet_ebpf_program_status{program=\"mesh\"} 1"));
        assert!(text.contains("xnet_reconcile_passes_total{result=\"ok\"} 1"));
        assert!(text.contains("xnet_conntrack_evicted_total{proto=\"udp\"} 3"));
    }

    #[test]
    fn agent_metrics_is_a_metrics_port() {
        let m: std::sync::Arc<dyn MetricsPort> = std::sync::Arc::new(AgentMetrics::new());
        m.record_cni_request("create");
        m.record_pod_attach("attached");
        m.set_redirect_entries(2);
    }
}
