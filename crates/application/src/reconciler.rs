//! Debounced trigger for mesh policy reconciliation.

use std::sync::Arc;
use std::time::Duration;

use domain::pod::entity::PodEvent;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::mesh_policy_service::MeshPolicyService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenerState {
    Idle,
    Debouncing,
}

/// Coalesces bursts of sidecar updates into one reconciliation pass, run
/// `debounce` after the last observed event.
///
/// The listener starts in `Debouncing`, so one pass runs `debounce` after
/// startup even without any event.
pub struct BroadcastListener {
    service: Arc<MeshPolicyService>,
    debounce: Duration,
}

impl BroadcastListener {
    pub fn new(service: Arc<MeshPolicyService>, debounce: Duration) -> Self {
        Self { service, debounce }
    }

    pub async fn run(
        self,
        mut updates: broadcast::Receiver<PodEvent>,
        cancel_token: CancellationToken,
    ) {
        let mut state = ListenerState::Debouncing;
        let timer = tokio::time::sleep(self.debounce);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                biased;
                () = cancel_token.cancelled() => break,
                received = updates.recv() => {
                    match received {
                        Ok(event) => {
                            debug!(
                                topic = event.kind.sidecar_topic(),
                                pod = %event.pod.key(),
                                "sidecar update, debouncing"
                            );
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "sidecar updates lagged, debouncing");
                        }
                        Err(RecvError::Closed) => break,
                    }
                    timer.as_mut().reset(Instant::now() + self.debounce);
                    state = ListenerState::Debouncing;
                }
                () = &mut timer, if state == ListenerState::Debouncing => {
                    state = ListenerState::Idle;
                    self.service.reconcile();
                }
            }
        }
        info!("broadcast listener stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use domain::mesh::planner::FilterPorts;
    use domain::pod::entity::PodEventKind;
    use domain::pod::policy::MonitorPolicy;
    use ports::secondary::metrics_port::{
        ConnTrackMetrics, PodMetrics, ProgramMetrics, ReconcileMetrics,
    };
    use ports::test_utils::{
        FakeClusterState, InMemoryConfigRegister, InMemoryOptMap, TEST_SIDECAR_LABEL, sidecar_pod,
    };

    use super::*;
    use crate::broker::MessageBroker;
    use crate::config_register_service::ConfigRegisterService;
    use crate::pod_view_service::PodViewService;

    #[derive(Default)]
    struct PassCounter(AtomicUsize);

    impl ProgramMetrics for PassCounter {}
    impl ConnTrackMetrics for PassCounter {}
    impl PodMetrics for PassCounter {}
    impl ReconcileMetrics for PassCounter {
        fn record_reconcile_pass(&self, _result: &str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn listener(counter: Arc<PassCounter>) -> BroadcastListener {
        let cluster = Arc::new(FakeClusterState::default());
        let view = Arc::new(PodViewService::new(
            cluster,
            MonitorPolicy::new(Vec::new(), TEST_SIDECAR_LABEL),
        ));
        let service = MeshPolicyService::new(
            view,
            Arc::new(InMemoryOptMap::default()),
            Arc::new(ConfigRegisterService::new(Arc::new(
                InMemoryConfigRegister::default(),
            ))),
            FilterPorts {
                inbound: "inbound".to_string(),
                outbound: "outbound".to_string(),
            },
            counter,
        );
        BroadcastListener::new(Arc::new(service), Duration::from_secs(4))
    }

    fn update() -> PodEvent {
        PodEvent {
            kind: PodEventKind::Updated,
            pod: sidecar_pod("s0", "10.0.0.2"),
        }
    }

    async fn wait(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn initial_pass_runs_once_after_debounce() {
        let counter = Arc::new(PassCounter::default());
        let broker = MessageBroker::new(16);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(listener(counter.clone()).run(
            broker.subscribe_sidecar_updates(),
            cancel.clone(),
        ));

        wait(3_900).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
        wait(200).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        wait(60_000).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_events_yields_one_pass_after_last_event() {
        let counter = Arc::new(PassCounter::default());
        let broker = MessageBroker::new(16);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(listener(counter.clone()).run(
            broker.subscribe_sidecar_updates(),
            cancel.clone(),
        ));

        // Gaps below the window keep pushing the timer out.
        for _ in 0..5 {
            wait(1_000).await;
            broker.publish_sidecar_update(update());
        }
        // Last event at t=5s; nothing fires before t=9s.
        wait(3_900).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
        wait(200).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        wait(30_000).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        // A later event re-arms the timer from Idle.
        broker.publish_sidecar_update(update());
        wait(4_100).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_without_pending_pass() {
        let counter = Arc::new(PassCounter::default());
        let broker = MessageBroker::new(16);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(listener(counter.clone()).run(
            broker.subscribe_sidecar_updates(),
            cancel.clone(),
        ));

        wait(1_000).await;
        cancel.cancel();
        task.await.unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
        assert_eq!(broker.subscriber_count(), 0);
    }
}
