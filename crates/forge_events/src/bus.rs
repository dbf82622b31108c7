//! Per-project broadcast bus.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use crate::event::ProgressEvent;

/// Buffered events per project channel before lagging receivers start
/// missing events.
const CHANNEL_CAPACITY: usize = 256;

/// Publish capability for pipeline components.
///
/// Publishing never blocks and never fails from the caller's point of
/// view; a missing or disconnected observer is not the publisher's
/// problem.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: ProgressEvent);
}

/// Sink that drops every event. Useful in tests and batch runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: ProgressEvent) {}
}

/// Per-project, many-observer broadcast bus.
///
/// Each project gets its own channel, created lazily on first
/// subscribe or publish. Subscribers receive only events published
/// after they subscribed; there is no replay buffer. Clients recover
/// after reconnect from the pipeline run's current stage instead.
#[derive(Default)]
pub struct EventBus {
    channels: Mutex<HashMap<String, broadcast::Sender<ProgressEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a project's future events.
    pub fn subscribe(&self, project_id: &str) -> broadcast::Receiver<ProgressEvent> {
        let mut channels = self.channels.lock();
        channels
            .entry(project_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Number of live subscribers for a project.
    pub fn subscriber_count(&self, project_id: &str) -> usize {
        self.channels
            .lock()
            .get(project_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: ProgressEvent) {
        let mut channels = self.channels.lock();
        if let Some(tx) = channels.get(&event.project_id) {
            if tx.receiver_count() == 0 {
                // All observers are gone; drop the channel so the map
                // does not grow unboundedly across projects.
                debug!(project_id = %event.project_id, "pruning event channel with no subscribers");
                channels.remove(&event.project_id);
                return;
            }
            // A send error means receivers raced away between the
            // count check and the send; fire-and-forget either way.
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;

    #[tokio::test]
    async fn test_subscriber_receives_future_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("proj-1");

        bus.publish(ProgressEvent::new("proj-1", EventType::Progress, "one"));
        bus.publish(ProgressEvent::new("proj-1", EventType::Progress, "two"));

        assert_eq!(rx.recv().await.unwrap().message, "one");
        assert_eq!(rx.recv().await.unwrap().message, "two");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let bus = EventBus::new();
        // Must not panic or error
        bus.publish(ProgressEvent::new("proj-1", EventType::System, "lost"));
        assert_eq!(bus.subscriber_count("proj-1"), 0);
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscribers() {
        let bus = EventBus::new();
        let _early = bus.subscribe("proj-1");
        bus.publish(ProgressEvent::new("proj-1", EventType::Progress, "before"));

        let mut late = bus.subscribe("proj-1");
        bus.publish(ProgressEvent::new("proj-1", EventType::Progress, "after"));

        assert_eq!(late.recv().await.unwrap().message, "after");
    }

    #[tokio::test]
    async fn test_events_are_isolated_per_project() {
        let bus = EventBus::new();
        let mut rx_a = bus.subscribe("proj-a");
        let _rx_b = bus.subscribe("proj-b");

        bus.publish(ProgressEvent::new("proj-b", EventType::Build, "b only"));
        bus.publish(ProgressEvent::new("proj-a", EventType::Build, "a only"));

        assert_eq!(rx_a.recv().await.unwrap().message, "a only");
    }

    #[tokio::test]
    async fn test_channel_pruned_after_all_subscribers_drop() {
        let bus = EventBus::new();
        let rx = bus.subscribe("proj-1");
        drop(rx);

        bus.publish(ProgressEvent::new("proj-1", EventType::Progress, "x"));
        assert_eq!(bus.subscriber_count("proj-1"), 0);
    }
}
