//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`PipelineEvent`]s.
//! It is designed to be shared via `Arc<EventBus>` across the application.

use chrono::Utc;
use hvac_core::pipeline::state::FailureReason;
use hvac_core::types::{JobKey, Timestamp};
use serde::Serialize;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// PipelineEvent
// ---------------------------------------------------------------------------

/// What happened to a pipeline job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineEventKind {
    /// Accepted and waiting for a worker slot.
    Queued,
    /// Child process spawned.
    Started,
    /// A stdout milestone marker was observed.
    Progress { percent: u8 },
    /// Child exited with status 0.
    Completed,
    /// Child exited abnormally, timed out or could not be spawned.
    Failed { reason: FailureReason },
}

/// A lifecycle event for one pipeline job.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineEvent {
    /// Registry key of the job (project identifier).
    pub job_key: JobKey,
    /// User identifier the executable was launched with.
    pub uuid: String,
    /// Plan identifier the executable was launched with.
    pub plan_id: String,
    #[serde(flatten)]
    pub kind: PipelineEventKind,
    /// When the event was created (UTC).
    pub timestamp: Timestamp,
}

impl PipelineEvent {
    pub fn new(
        job_key: impl Into<JobKey>,
        uuid: impl Into<String>,
        plan_id: impl Into<String>,
        kind: PipelineEventKind,
    ) -> Self {
        Self {
            job_key: job_key.into(),
            uuid: uuid.into(),
            plan_id: plan_id.into(),
            kind,
            timestamp: Utc::now(),
        }
    }

    /// Dot-separated event name, e.g. `"pipeline.completed"`.
    pub fn event_type(&self) -> &'static str {
        match self.kind {
            PipelineEventKind::Queued => "pipeline.queued",
            PipelineEventKind::Started => "pipeline.started",
            PipelineEventKind::Progress { .. } => "pipeline.progress",
            PipelineEventKind::Completed => "pipeline.completed",
            PipelineEventKind::Failed { .. } => "pipeline.failed",
        }
    }

    /// Whether this event ends the job's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            PipelineEventKind::Completed | PipelineEventKind::Failed { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`PipelineEvent`].
///
/// # Usage
///
/// ```rust
/// use hvac_events::bus::{EventBus, PipelineEvent, PipelineEventKind};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(PipelineEvent::new("p1", "u1", "plan-1", PipelineEventKind::Queued));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: PipelineEvent) {
        tracing::trace!(
            event_type = event.event_type(),
            job_key = %event.job_key,
            "Publishing pipeline event"
        );
        // Ignore the SendError; it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(PipelineEvent::new(
            "p1",
            "u1",
            "plan-1",
            PipelineEventKind::Progress { percent: 50 },
        ));

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.job_key, "p1");
        assert_eq!(received.uuid, "u1");
        assert_eq!(received.plan_id, "plan-1");
        assert_eq!(received.kind, PipelineEventKind::Progress { percent: 50 });
        assert_eq!(received.event_type(), "pipeline.progress");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(PipelineEvent::new("p2", "u", "x", PipelineEventKind::Completed));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.event_type(), "pipeline.completed");
        assert_eq!(e2.event_type(), "pipeline.completed");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(PipelineEvent::new("orphan", "u", "x", PipelineEventKind::Queued));
    }

    #[test]
    fn terminal_kinds() {
        let done = PipelineEvent::new("p", "u", "x", PipelineEventKind::Completed);
        let failed = PipelineEvent::new(
            "p",
            "u",
            "x",
            PipelineEventKind::Failed {
                reason: FailureReason::Timeout,
            },
        );
        let started = PipelineEvent::new("p", "u", "x", PipelineEventKind::Started);
        assert!(done.is_terminal());
        assert!(failed.is_terminal());
        assert!(!started.is_terminal());
    }

    #[test]
    fn serializes_flat_with_kind_tag() {
        let event = PipelineEvent::new(
            "p3",
            "u3",
            "plan-3",
            PipelineEventKind::Progress { percent: 75 },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["job_key"], "p3");
        assert_eq!(json["kind"], "progress");
        assert_eq!(json["percent"], 75);
        assert!(json["timestamp"].is_string());
    }
}
