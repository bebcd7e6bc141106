//! Agent lifecycle: admission control, task execution and rolling metrics.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ExecutionError;
use crate::swarm::capability::AgentProfile;
use crate::swarm::task::{Task, TaskId, TaskResult};

/// Execution time at which the speed component of the quality score hits zero.
const SPEED_BASELINE_MS: f64 = 60_000.0;

/// An execution unit that accepts and runs tasks.
///
/// Each kind decides for itself which tasks it accepts. A kind that rejects
/// every task is valid.
#[async_trait]
pub trait Agent: Send + Sync {
    fn profile(&self) -> &AgentProfile;

    /// Acceptance test for a task.
    fn can_handle(&self, task: &Task) -> bool;

    /// Run the task body. Long-running bodies should watch `cancel`.
    async fn execute(
        &self,
        task: &Task,
        cancel: CancellationToken,
    ) -> Result<TaskResult, ExecutionError>;

    /// Whether this agent should receive complex tasks before normal routing.
    fn is_coordinator(&self) -> bool {
        false
    }
}

/// Runtime status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Busy,
    /// At capacity.
    Overloaded,
    /// Needs `recover()` before taking new work.
    Error,
    Offline,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Overloaded => "overloaded",
            Self::Error => "error",
            Self::Offline => "offline",
        };
        f.pad(s)
    }
}

/// Rolling performance metrics, updated after every terminal task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    /// Running mean over completed and failed tasks, in milliseconds.
    pub average_execution_time: f64,
    /// completed / (completed + failed)
    pub success_rate: f64,
    /// 0.7 * success_rate + 0.3 * speed score of the latest task.
    pub quality_score: f64,
}

impl Default for Performance {
    fn default() -> Self {
        Self {
            average_execution_time: 0.0,
            success_rate: 1.0,
            quality_score: 1.0,
        }
    }
}

/// Mutable runtime snapshot of an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub agent_id: String,
    pub status: AgentStatus,
    pub current_tasks: Vec<TaskId>,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub last_activity: DateTime<Utc>,
    pub performance: Performance,
}

impl AgentState {
    fn new(agent_id: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            status: AgentStatus::Idle,
            current_tasks: Vec::new(),
            completed_tasks: 0,
            failed_tasks: 0,
            last_activity: Utc::now(),
            performance: Performance::default(),
        }
    }

    fn record(&mut self, success: bool, elapsed_ms: f64) {
        if success {
            self.completed_tasks += 1;
        } else {
            self.failed_tasks += 1;
        }

        let finished = (self.completed_tasks + self.failed_tasks) as f64;
        let perf = &mut self.performance;
        perf.average_execution_time += (elapsed_ms - perf.average_execution_time) / finished;
        perf.success_rate = self.completed_tasks as f64 / finished;
        let speed = (1.0 - elapsed_ms / SPEED_BASELINE_MS).max(0.0);
        perf.quality_score = 0.7 * perf.success_rate + 0.3 * speed;
    }

    fn refresh_status(&mut self, max: usize) {
        if matches!(self.status, AgentStatus::Error | AgentStatus::Offline) {
            return;
        }
        self.status = match self.current_tasks.len() {
            0 => AgentStatus::Idle,
            n if n >= max => AgentStatus::Overloaded,
            _ => AgentStatus::Busy,
        };
    }
}

/// Messages an agent sends back to the scheduler.
#[derive(Debug)]
pub enum AgentSignal {
    /// The task body started.
    Started { agent_id: String, task_id: TaskId },
    /// The task reached `Completed` or `Failed`; `task.result` is set.
    Finished { agent_id: String, task: Task },
}

pub type SignalSender = mpsc::UnboundedSender<AgentSignal>;

/// An [`Agent`] together with the runtime state the engine tracks for it.
pub struct ManagedAgent {
    agent: Arc<dyn Agent>,
    state: Mutex<AgentState>,
}

impl ManagedAgent {
    pub fn new(agent: Arc<dyn Agent>) -> Arc<Self> {
        let state = AgentState::new(&agent.profile().id);
        Arc::new(Self {
            agent,
            state: Mutex::new(state),
        })
    }

    pub fn id(&self) -> &str {
        &self.agent.profile().id
    }

    pub fn profile(&self) -> &AgentProfile {
        self.agent.profile()
    }

    pub fn is_coordinator(&self) -> bool {
        self.agent.is_coordinator()
    }

    pub fn can_handle(&self, task: &Task) -> bool {
        self.agent.can_handle(task)
    }

    /// Snapshot of the runtime state.
    pub fn state(&self) -> AgentState {
        self.state.lock().clone()
    }

    pub fn status(&self) -> AgentStatus {
        self.state.lock().status
    }

    pub fn current_task_count(&self) -> usize {
        self.state.lock().current_tasks.len()
    }

    /// True if idle, or busy with spare capacity.
    pub fn is_available(&self) -> bool {
        let state = self.state.lock();
        match state.status {
            AgentStatus::Idle => true,
            AgentStatus::Busy => state.current_tasks.len() < self.profile().max_concurrent_tasks,
            _ => false,
        }
    }

    /// Fraction of this agent's slots in use.
    pub fn current_load(&self) -> f64 {
        self.current_task_count() as f64 / self.profile().max_concurrent_tasks as f64
    }

    pub fn capability_score<S: AsRef<str>>(&self, required: &[S]) -> f64 {
        self.profile().capability_score(required)
    }

    /// Take a task and start running it in the background.
    ///
    /// Returns false without side effects if the agent rejects the task or
    /// has no free slot. On success the task is `Assigned` to this agent.
    pub fn assign_task(
        self: &Arc<Self>,
        task: &mut Task,
        cancel: CancellationToken,
        signals: SignalSender,
    ) -> bool {
        if !self.agent.can_handle(task) {
            return false;
        }

        {
            let mut state = self.state.lock();
            if matches!(state.status, AgentStatus::Error | AgentStatus::Offline) {
                return false;
            }
            let max = self.profile().max_concurrent_tasks;
            if state.current_tasks.len() >= max {
                return false;
            }
            if let Err(e) = task.assign(self.id()) {
                tracing::warn!(agent_id = %self.id(), error = %e, "Refusing assignment");
                return false;
            }
            state.current_tasks.push(task.id);
            state.refresh_status(max);
            state.last_activity = Utc::now();
        }

        tracing::debug!(agent_id = %self.id(), task_id = %task.id, "Task assigned to agent");

        let agent = Arc::clone(self);
        let task = task.clone();
        tokio::spawn(async move {
            agent.run_task(task, cancel, signals).await;
        });

        true
    }

    /// Execution wrapper. Every path ends in a `Finished` signal.
    async fn run_task(self: Arc<Self>, mut task: Task, cancel: CancellationToken, signals: SignalSender) {
        if let Err(e) = task.start() {
            tracing::warn!(task_id = %task.id, error = %e, "Task could not start");
        }
        let _ = signals.send(AgentSignal::Started {
            agent_id: self.id().to_string(),
            task_id: task.id,
        });

        let started = Instant::now();
        let outcome = AssertUnwindSafe(self.agent.execute(&task, cancel))
            .catch_unwind()
            .await;
        let elapsed = started.elapsed();

        let (result, panicked) = match outcome {
            Ok(Ok(result)) => (result, false),
            Ok(Err(e)) => (TaskResult::failure(e.to_string()), false),
            Err(payload) => {
                let err = ExecutionError::Panicked(panic_message(payload.as_ref()));
                tracing::warn!(agent_id = %self.id(), task_id = %task.id, error = %err, "Agent panicked");
                (TaskResult::failure(err.to_string()), true)
            }
        };
        let result = normalize_result(result, elapsed);
        let success = result.success;

        if let Err(e) = task.finish(result) {
            tracing::warn!(task_id = %task.id, error = %e, "Could not record task result");
        }
        self.record_finished(task.id, success, elapsed, panicked);

        tracing::info!(
            agent_id = %self.id(),
            task_id = %task.id,
            success,
            elapsed_ms = elapsed.as_millis() as u64,
            "Task finished"
        );

        let _ = signals.send(AgentSignal::Finished {
            agent_id: self.id().to_string(),
            task,
        });
    }

    fn record_finished(&self, task_id: TaskId, success: bool, elapsed: Duration, panicked: bool) {
        let mut state = self.state.lock();
        state.current_tasks.retain(|id| *id != task_id);
        state.record(success, elapsed.as_secs_f64() * 1000.0);
        state.last_activity = Utc::now();
        if panicked && state.status != AgentStatus::Offline {
            state.status = AgentStatus::Error;
        }
        state.refresh_status(self.profile().max_concurrent_tasks);
    }

    /// Bring an agent in `Error` back into rotation.
    pub fn recover(&self) -> bool {
        let mut state = self.state.lock();
        if state.status != AgentStatus::Error {
            return false;
        }
        state.status = AgentStatus::Idle;
        state.refresh_status(self.profile().max_concurrent_tasks);
        true
    }

    /// Take the agent out of rotation and drop its task bookkeeping.
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.status = AgentStatus::Offline;
        state.current_tasks.clear();
        state.last_activity = Utc::now();
    }
}

impl std::fmt::Debug for ManagedAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedAgent")
            .field("id", &self.id())
            .field("state", &*self.state.lock())
            .finish()
    }
}

/// Keep `error` present iff the result is a failure, and stamp the wall time.
fn normalize_result(mut result: TaskResult, elapsed: Duration) -> TaskResult {
    if result.success {
        result.error = None;
    } else if result.error.is_none() {
        result.error = Some("Task failed without an error message".to_string());
    }
    result.with_execution_time(elapsed)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
