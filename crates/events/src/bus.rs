//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` across the application; SSE
//! handlers subscribe and filter by project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storyforge_core::types::DbId;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// UpdateEvent
// ---------------------------------------------------------------------------

/// A state change pushed to listeners.
///
/// Built with [`UpdateEvent::new`] and the
/// [`for_project`](UpdateEvent::for_project) /
/// [`with_payload`](UpdateEvent::with_payload) builders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEvent {
    /// Dot-separated event name, e.g. `"task.completed"`. Serialized as
    /// `type` so SSE frames read `{"type": ...}`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Project the event concerns; `None` for global events such as jobs.
    pub project_id: Option<DbId>,

    /// Event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl UpdateEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            project_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn for_project(mut self, project_id: DbId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Whether a listener on `project_id` should receive this event.
    /// Global events concern no project and only reach unfiltered listeners.
    pub fn concerns(&self, project_id: DbId) -> bool {
        self.project_id == Some(project_id)
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use storyforge_events::{EventBus, UpdateEvent, UpdateNotifier};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(UpdateEvent::new("workflow.state").for_project(1));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<UpdateEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest messages are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.sender.subscribe()
    }

    /// Number of connected listeners.
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub(crate) fn send(&self, event: UpdateEvent) {
        // A send error only means nobody is listening.
        if self.sender.send(event).is_err() {
            tracing::trace!("Update dropped: no listeners");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::UpdateNotifier;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(
            UpdateEvent::new("task.completed")
                .for_project(42)
                .with_payload(serde_json::json!({"kind": "image"})),
        );

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, "task.completed");
        assert_eq!(received.project_id, Some(42));
        assert_eq!(received.payload["kind"], "image");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.listener_count(), 2);

        bus.publish(UpdateEvent::new("project.lock"));

        assert_eq!(rx1.recv().await.unwrap().event_type, "project.lock");
        assert_eq!(rx2.recv().await.unwrap().event_type, "project.lock");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(UpdateEvent::new("orphan.event"));
    }

    #[test]
    fn project_scoping() {
        let scoped = UpdateEvent::new("workflow.state").for_project(3);
        assert!(scoped.concerns(3));
        assert!(!scoped.concerns(4));

        let global = UpdateEvent::new("job.failed")
            .with_payload(serde_json::json!({"error": "provider rejected the prompt"}));
        assert!(!global.concerns(3));
    }

    #[test]
    fn serializes_event_type_as_type() {
        let json = serde_json::to_value(UpdateEvent::new("init").for_project(1)).unwrap();
        assert_eq!(json["type"], "init");
        assert_eq!(json["project_id"], 1);
    }
}
