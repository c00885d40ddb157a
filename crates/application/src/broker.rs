use domain::pod::entity::PodEvent;
use tokio::sync::broadcast;
use tracing::trace;

/// Fan-out of sidecar pod lifecycle events to in-process subscribers.
#[derive(Clone)]
pub struct MessageBroker {
    sidecar_updates: broadcast::Sender<PodEvent>,
}

impl MessageBroker {
    pub fn new(capacity: usize) -> Self {
        let (sidecar_updates, _) = broadcast::channel(capacity);
        Self { sidecar_updates }
    }

    /// Publish a sidecar event; dropped silently without subscribers.
    pub fn publish_sidecar_update(&self, event: PodEvent) {
        trace!(
            topic = event.kind.sidecar_topic(),
            pod = %event.pod.key(),
            "sidecar update"
        );
        let _ = self.sidecar_updates.send(event);
    }

    pub fn subscribe_sidecar_updates(&self) -> broadcast::Receiver<PodEvent> {
        self.sidecar_updates.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sidecar_updates.receiver_count()
    }
}
