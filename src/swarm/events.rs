//! Swarm lifecycle events.
//!
//! Broadcast to any number of subscribers (loggers, UIs). Ordering matches the
//! order in which the scheduler observed the transitions.

use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::swarm::task::TaskId;

/// Event discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwarmEventKind {
    WorkerRegistered,
    WorkerDeregistered,
    TaskCreated,
    TaskAssigned,
    TaskCompleted,
    TaskFailed,
    /// A failed task went back to the queue under the retry policy.
    TaskRetried,
    TaskCancelled,
    /// Queue non-empty while the active set is full. Informational.
    SwarmOverloaded,
    /// Queue and active set drained; the scheduler loop is going dormant.
    SwarmIdle,
}

impl SwarmEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkerRegistered => "worker_registered",
            Self::WorkerDeregistered => "worker_deregistered",
            Self::TaskCreated => "task_created",
            Self::TaskAssigned => "task_assigned",
            Self::TaskCompleted => "task_completed",
            Self::TaskFailed => "task_failed",
            Self::TaskRetried => "task_retried",
            Self::TaskCancelled => "task_cancelled",
            Self::SwarmOverloaded => "swarm_overloaded",
            Self::SwarmIdle => "swarm_idle",
        }
    }
}

impl std::fmt::Display for SwarmEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmEvent {
    #[serde(rename = "type")]
    pub kind: SwarmEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl SwarmEvent {
    pub fn new(kind: SwarmEventKind) -> Self {
        Self {
            kind,
            worker_id: None,
            task_id: None,
            data: None,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn worker(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = Some(worker_id.into());
        self
    }

    #[must_use]
    pub fn task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    #[must_use]
    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Fan-out point for swarm events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SwarmEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn emit(&self, event: SwarmEvent) {
        tracing::debug!(
            event = %event.kind,
            worker_id = ?event.worker_id,
            task_id = ?event.task_id,
            "Swarm event"
        );
        // Ok if nobody is listening
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwarmEvent> {
        self.tx.subscribe()
    }

    /// Subscribe as a `Stream`. Events missed by a lagging reader are skipped.
    pub fn stream(&self) -> impl Stream<Item = SwarmEvent> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).filter_map(|item| async move {
            match item {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!(error = %e, "Event subscriber lagged");
                    None
                }
            }
        })
    }
}
