use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use domain::common::error::DomainError;
use domain::conntrack::entity::{FlushParams, FlushTarget};
use domain::conntrack::eviction::select_idle;
use domain::conntrack::schedule::FlushSchedule;
use ports::secondary::flow_table_port::{FlowTablePort, MonotonicClock};
use ports::secondary::metrics_port::MetricsPort;
use tokio_util::sync::CancellationToken;

/// One idle-flow flush job bound to a protocol table and program family.
pub struct ConnTrackFlushJob {
    target: FlushTarget,
    schedule: FlushSchedule,
    idle_seconds: u64,
    batch_size: usize,
    table: Arc<dyn FlowTablePort>,
    clock: Arc<dyn MonotonicClock>,
    metrics: Arc<dyn MetricsPort>,
}

impl ConnTrackFlushJob {
    /// `Ok(None)` when the parameters leave the job disabled.
    pub fn new(
        target: FlushTarget,
        params: &FlushParams,
        table: Arc<dyn FlowTablePort>,
        clock: Arc<dyn MonotonicClock>,
        metrics: Arc<dyn MetricsPort>,
    ) -> Result<Option<Self>, DomainError> {
        if !params.is_active() {
            return Ok(None);
        }
        let schedule = FlushSchedule::parse(&params.crontab)?;
        Ok(Some(Self {
            target,
            schedule,
            idle_seconds: params.idle_seconds.unsigned_abs(),
            batch_size: usize::try_from(params.batch_size).unwrap_or(usize::MAX),
            table,
            clock,
            metrics,
        }))
    }

    pub fn target(&self) -> FlushTarget {
        self.target
    }

    /// Evict up to one batch of idle flows. Returns the number evicted.
    pub fn run_once(&self) -> Result<usize, DomainError> {
        let proto = self.target.proto;
        let records = self.table.scan(proto)?;
        let now_ns = self.clock.now_ns()?;
        let selected = select_idle(
            &records,
            self.target.sys,
            now_ns,
            self.idle_seconds,
            self.batch_size,
        );

        let mut evicted = 0usize;
        for tuple in &selected {
            match self.table.evict(proto, tuple) {
                Ok(()) => evicted += 1,
                Err(e) => tracing::warn!(
                    proto = proto.label(),
                    key = ?tuple,
                    error = %e,
                    "flow eviction failed"
                ),
            }
        }
        self.metrics
            .record_conntrack_evicted(proto.label(), evicted as u64);
        tracing::debug!(
            proto = proto.label(),
            sys = %self.target.sys,
            scanned = records.len(),
            evicted,
            "idle flows flushed"
        );
        Ok(evicted)
    }

    /// Fire `run_once` on every cron tick (local time) until cancelled.
    pub async fn run(self, cancel_token: CancellationToken) {
        let proto = self.target.proto.label();
        tracing::info!(proto, cron = self.schedule.expr(), "conntrack flush scheduled");
        loop {
            let now = Local::now();
            let Some(next) = self.schedule.next_after(&now) else {
                tracing::warn!(proto, cron = self.schedule.expr(), "cron has no further ticks");
                return;
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                () = cancel_token.cancelled() => break,
                () = tokio::time::sleep(wait) => {
                    if let Err(e) = self.run_once() {
                        tracing::warn!(proto, error = %e, "conntrack flush tick failed");
                    }
                }
            }
        }
        tracing::info!(proto, "conntrack flush stopped");
    }
}
