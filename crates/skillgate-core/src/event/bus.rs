//! Runtime event bus shared by the manager and every skill sandbox.
//!
//! Lifecycle events (`skill.enabled`, `skill.disabled`, `skill.failed`) and
//! skill-emitted events travel on the same `tokio::sync::broadcast` channel.
//! Delivery is best-effort: with no subscriber the event is dropped, and a
//! slow subscriber sees `Lagged` rather than blocking publishers.

use skillgate_types::event::BusEvent;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
}

impl EventBus {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }

    /// Returns how many subscribers the event reached.
    pub fn publish(&self, event: BusEvent) -> usize {
        let name = event.name.clone();
        let source = event.source.clone();
        match self.sender.send(event) {
            Ok(reached) => {
                tracing::trace!(event = %name, source = ?source, reached, "bus publish");
                reached
            }
            Err(_) => {
                tracing::trace!(event = %name, source = ?source, "bus publish without subscribers");
                0
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
