//! Event types and the in-process event bus
//!
//! Mutations publish [`MrsEvent`]s so that open dashboards can refresh the
//! affected project. Background jobs report their lifecycle on the same bus.
//! Every event carries the `project_id` it concerns, which the SSE feed uses
//! to restrict delivery to members of that project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events broadcast across the service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum MrsEvent {
    /// Project data changed (topics, queries, settings); views should reload
    ProjectChanged {
        project_id: String,
        slug: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A background job was accepted
    JobQueued {
        job_id: String,
        kind: String,
        project_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A background job finished successfully
    JobCompleted {
        job_id: String,
        kind: String,
        project_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A background job attempt failed
    JobFailed {
        job_id: String,
        kind: String,
        project_id: String,
        error: String,
        will_retry: bool,
        timestamp: DateTime<Utc>,
    },

    /// Supplemental queries were stored for a topic
    QueriesGenerated {
        project_id: String,
        topic_id: String,
        count: usize,
        timestamp: DateTime<Utc>,
    },
}

impl MrsEvent {
    /// Convenience constructor for the most common event
    pub fn project_changed(project_id: &str, slug: &str, reason: &str) -> Self {
        MrsEvent::ProjectChanged {
            project_id: project_id.to_string(),
            slug: slug.to_string(),
            reason: reason.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Event type name, used as the SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            MrsEvent::ProjectChanged { .. } => "ProjectChanged",
            MrsEvent::JobQueued { .. } => "JobQueued",
            MrsEvent::JobCompleted { .. } => "JobCompleted",
            MrsEvent::JobFailed { .. } => "JobFailed",
            MrsEvent::QueriesGenerated { .. } => "QueriesGenerated",
        }
    }

    /// Project the event concerns
    pub fn project_id(&self) -> &str {
        match self {
            MrsEvent::ProjectChanged { project_id, .. }
            | MrsEvent::JobQueued { project_id, .. }
            | MrsEvent::JobCompleted { project_id, .. }
            | MrsEvent::JobFailed { project_id, .. }
            | MrsEvent::QueriesGenerated { project_id, .. } => project_id,
        }
    }
}

/// Broadcast bus for [`MrsEvent`]s
///
/// Cloning is cheap; all clones share the same channel. Slow subscribers
/// lose the oldest events once `capacity` is exceeded.
///
/// ```
/// use mrs_common::events::{EventBus, MrsEvent};
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
/// bus.emit_lossy(MrsEvent::project_changed("p1", "acme-bank", "topic created"));
/// assert_eq!(rx.try_recv().unwrap().project_id(), "p1");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MrsEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<MrsEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: MrsEvent) -> Result<usize, broadcast::error::SendError<MrsEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: MrsEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
