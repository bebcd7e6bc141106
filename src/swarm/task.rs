//! Task records and their state machine.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SwarmError;
use crate::swarm::capability::normalize_capabilities;

/// Unique task identifier, generated at submission.
pub type TaskId = Uuid;

/// Task priority. Ordering is `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.pad(s)
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" | "normal" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

/// Status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Queued, not yet routed.
    Pending,
    /// Handed to an agent, not yet started.
    Assigned,
    /// The agent is running the task body.
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        use TaskStatus::*;

        matches!(
            (self, target),
            (Pending, Assigned) | (Pending, Cancelled) |
            // Assigned can time out before the body starts
            (Assigned, InProgress) | (Assigned, Failed) | (Assigned, Cancelled) |
            (InProgress, Completed) | (InProgress, Failed) | (InProgress, Cancelled) |
            // Retry
            (Failed, Pending)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.pad(s)
    }
}

/// Outcome of running a task body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    pub output: serde_json::Value,
    /// Present iff `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl TaskResult {
    pub fn success(output: serde_json::Value) -> Self {
        Self {
            success: true,
            output,
            error: None,
            execution_time_ms: 0,
            metadata: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: serde_json::Value::Null,
            error: Some(error.into()),
            execution_time_ms: 0,
            metadata: None,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn with_execution_time(mut self, elapsed: Duration) -> Self {
        self.execution_time_ms = elapsed.as_millis() as u64;
        self
    }
}

/// Key/value bag attached to a task.
///
/// Reserved keys:
/// - `retryCount`: number of times the task was re-queued after failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskContext(serde_json::Map<String, serde_json::Value>);

impl TaskContext {
    pub const RETRY_COUNT: &'static str = "retryCount";

    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.0.insert(key.into(), value);
    }

    pub fn retry_count(&self) -> u32 {
        self.0
            .get(Self::RETRY_COUNT)
            .and_then(|v| v.as_u64())
            .map(|n| n.min(u32::MAX as u64) as u32)
            .unwrap_or(0)
    }

    pub fn set_retry_count(&mut self, count: u32) {
        self.0
            .insert(Self::RETRY_COUNT.to_string(), serde_json::Value::from(count));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for TaskContext {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

/// A unit of requested work.
///
/// `result` is set iff the status is terminal. `assigned_agent_id` is set iff
/// the status is not `Pending`, except for tasks cancelled before they were
/// ever assigned, which end `Cancelled` with no agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    pub priority: Priority,
    pub required_capabilities: Vec<String>,
    pub context: TaskContext,
    pub status: TaskStatus,
    pub assigned_agent_id: Option<String>,
    pub result: Option<TaskResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new<I, S>(
        description: impl Into<String>,
        required_capabilities: I,
        priority: Priority,
        context: TaskContext,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            priority,
            required_capabilities: normalize_capabilities(required_capabilities),
            context,
            status: TaskStatus::Pending,
            assigned_agent_id: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition_to(&mut self, target: TaskStatus) -> Result<(), SwarmError> {
        if !self.status.can_transition_to(target) {
            return Err(SwarmError::InvalidTransition {
                id: self.id,
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record the agent this task was handed to.
    pub fn assign(&mut self, agent_id: &str) -> Result<(), SwarmError> {
        self.transition_to(TaskStatus::Assigned)?;
        self.assigned_agent_id = Some(agent_id.to_string());
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), SwarmError> {
        self.transition_to(TaskStatus::InProgress)
    }

    /// Finish with a result; status follows `result.success`.
    pub fn finish(&mut self, result: TaskResult) -> Result<(), SwarmError> {
        let target = if result.success {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        self.transition_to(target)?;
        self.result = Some(result);
        Ok(())
    }

    /// Shorthand for finishing with a failure result.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), SwarmError> {
        self.finish(TaskResult::failure(error))
    }

    pub fn cancel(&mut self, reason: impl Into<String>) -> Result<(), SwarmError> {
        self.transition_to(TaskStatus::Cancelled)?;
        self.result = Some(TaskResult::failure(reason));
        Ok(())
    }

    /// Put a failed task back in `Pending` and bump its retry counter.
    pub fn reset_for_retry(&mut self) -> Result<u32, SwarmError> {
        self.transition_to(TaskStatus::Pending)?;
        self.assigned_agent_id = None;
        self.result = None;
        let count = self.context.retry_count() + 1;
        self.context.set_retry_count(count);
        Ok(count)
    }

    /// Time since the last state change.
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.updated_at).to_std().unwrap_or(Duration::ZERO)
    }
}
