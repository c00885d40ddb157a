// Focused sub-traits for recording Prometheus metrics.
//
// All methods take `&self` because the underlying implementation uses
// atomic operations (interior mutability via `prometheus-client`).
//
// Default implementations are no-ops, allowing test doubles to implement
// only the sub-traits relevant to the service under test.

// ── Kernel program metrics ─────────────────────────────────────────

pub trait ProgramMetrics: Send + Sync {
    /// Set the load status of a program family (true=ready, false=failed).
    fn set_ebpf_program_status(&self, _program: &str, _loaded: bool) {}
}

// ── Reconciliation metrics ─────────────────────────────────────────

pub trait ReconcileMetrics: Send + Sync {
    /// Record a mesh reconciliation pass ("ok" or "partial").
    fn record_reconcile_pass(&self, _result: &str) {}

    /// Set the number of Mesh redirect entries after the last pass.
    fn set_redirect_entries(&self, _count: u64) {}
}

// ── Conntrack flush metrics ────────────────────────────────────────

pub trait ConnTrackMetrics: Send + Sync {
    /// Add to the idle flows evicted for a protocol.
    fn record_conntrack_evicted(&self, _proto: &str, _count: u64) {}
}

// ── Pod network metrics ────────────────────────────────────────────

pub trait PodMetrics: Send + Sync {
    /// Record a pod attach attempt ("attached", "skipped", "failed").
    fn record_pod_attach(&self, _result: &str) {}

    /// Record a plugin callback ("create" or "delete").
    fn record_cni_request(&self, _op: &str) {}
}

// ── Composite super-trait ──────────────────────────────────────────

/// Unified metrics port composing all sub-traits.
pub trait MetricsPort: ProgramMetrics + ReconcileMetrics + ConnTrackMetrics + PodMetrics {}

impl<T> MetricsPort for T where T: ProgramMetrics + ReconcileMetrics + ConnTrackMetrics + PodMetrics {}
