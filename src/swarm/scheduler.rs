//! Swarm scheduler: priority queue and admission, with timeouts and retries.
//!
//! All three task collections (pending, active, completed) live behind one
//! mutex. Two background tasks take that lock:
//! - the **tick loop**, started when work arrives and stopped once the queue
//!   and active set are both empty (admission, overload signal, timeout sweep)
//! - the **signal listener**, which applies agent start/finish signals and
//!   the retry policy
//!
//! Timeouts are advisory: the task record is failed and its slot freed, and
//! the body's cancellation token is triggered, but a body that ignores the
//! token keeps running until it returns on its own.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use chrono::Utc;
use futures::Stream;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify, broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::OrchestrationConfig;
use crate::error::{ConfigError, SwarmError};
use crate::swarm::agent::{Agent, AgentSignal, AgentState, ManagedAgent, SignalSender};
use crate::swarm::events::{EventBus, SwarmEvent, SwarmEventKind};
use crate::swarm::router;
use crate::swarm::task::{Priority, Task, TaskContext, TaskId, TaskStatus};

/// Error recorded on tasks failed by the timeout sweep.
pub const TIMEOUT_ERROR: &str = "Task timed out";

/// Counters returned by [`Swarm::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmStatus {
    pub is_running: bool,
    pub active_tasks: usize,
    pub pending_tasks: usize,
    pub completed_tasks: usize,
    pub registered_workers: usize,
}

struct ActiveTask {
    task: Task,
    cancel: CancellationToken,
}

#[derive(Default)]
struct TaskQueues {
    pending: VecDeque<Task>,
    active: HashMap<TaskId, ActiveTask>,
    completed: Vec<Task>,
    /// Whether the tick loop is alive.
    running: bool,
}

struct SwarmInner {
    config: OrchestrationConfig,
    /// Registration order is the router's iteration order.
    agents: RwLock<Vec<Arc<ManagedAgent>>>,
    coordinator_id: RwLock<Option<String>>,
    queues: Mutex<TaskQueues>,
    events: EventBus,
    signals: SignalSender,
    wake: Notify,
    /// Parent of every task token; fired when shutdown completes.
    root_cancel: CancellationToken,
    accepting: AtomicBool,
}

/// Task scheduler over a pool of agents.
///
/// Cheap to clone; clones share the same state. Must be created inside a
/// Tokio runtime.
#[derive(Clone)]
pub struct Swarm {
    inner: Arc<SwarmInner>,
}

impl Swarm {
    /// Create a swarm with no agents.
    pub fn new(config: OrchestrationConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let (signals, signal_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(SwarmInner {
            events: EventBus::new(config.event_capacity),
            config,
            agents: RwLock::new(Vec::new()),
            coordinator_id: RwLock::new(None),
            queues: Mutex::new(TaskQueues::default()),
            signals,
            wake: Notify::new(),
            root_cancel: CancellationToken::new(),
            accepting: AtomicBool::new(true),
        });

        tokio::spawn(listen(Arc::downgrade(&inner), signal_rx));

        Ok(Self { inner })
    }

    pub fn config(&self) -> &OrchestrationConfig {
        &self.inner.config
    }

    // ── Agents ──────────────────────────────────────────────────────────

    /// Add an agent to the pool.
    ///
    /// The first coordinator registered becomes the designated coordinator
    /// unless one was set explicitly.
    pub fn register_agent(&self, agent: Arc<dyn Agent>) -> Result<(), SwarmError> {
        let managed = ManagedAgent::new(agent);
        let id = managed.id().to_string();

        {
            let mut agents = self.inner.agents.write();
            if agents.iter().any(|a| a.id() == id) {
                return Err(SwarmError::DuplicateAgent { id });
            }
            agents.push(Arc::clone(&managed));
        }

        if managed.is_coordinator() {
            let mut coordinator = self.inner.coordinator_id.write();
            if coordinator.is_none() {
                *coordinator = Some(id.clone());
            }
        }

        let profile = managed.profile();
        info!(
            agent_id = %id,
            name = %profile.name,
            max_tasks = profile.max_concurrent_tasks,
            "Agent registered"
        );
        self.inner.events.emit(
            SwarmEvent::new(SwarmEventKind::WorkerRegistered)
                .worker(&id)
                .data(serde_json::json!({
                    "name": profile.name,
                    "capabilities": profile.capabilities.iter().map(|c| &c.name).collect::<Vec<_>>(),
                    "maxConcurrentTasks": profile.max_concurrent_tasks,
                })),
        );

        // New capacity may unblock the queue head
        self.inner.wake.notify_one();
        Ok(())
    }

    /// Remove an idle agent from the pool.
    pub fn deregister_agent(&self, agent_id: &str) -> Result<(), SwarmError> {
        let removed = {
            let mut agents = self.inner.agents.write();
            let pos = agents
                .iter()
                .position(|a| a.id() == agent_id)
                .ok_or_else(|| SwarmError::AgentNotFound {
                    id: agent_id.to_string(),
                })?;
            let in_flight = agents[pos].current_task_count();
            if in_flight > 0 {
                return Err(SwarmError::AgentBusy {
                    id: agent_id.to_string(),
                    tasks: in_flight,
                });
            }
            agents.remove(pos)
        };
        removed.release();

        {
            let mut coordinator = self.inner.coordinator_id.write();
            if coordinator.as_deref() == Some(agent_id) {
                *coordinator = None;
            }
        }

        info!(agent_id = %agent_id, "Agent deregistered");
        self.inner
            .events
            .emit(SwarmEvent::new(SwarmEventKind::WorkerDeregistered).worker(agent_id));
        Ok(())
    }

    /// Designate which registered agent receives complex tasks first.
    pub fn set_coordinator(&self, agent_id: &str) -> Result<(), SwarmError> {
        if self.inner.find_agent(agent_id).is_none() {
            return Err(SwarmError::AgentNotFound {
                id: agent_id.to_string(),
            });
        }
        *self.inner.coordinator_id.write() = Some(agent_id.to_string());
        Ok(())
    }

    pub fn coordinator_id(&self) -> Option<String> {
        self.inner.coordinator_id.read().clone()
    }

    /// Return an agent parked in `Error` to service.
    pub fn recover_agent(&self, agent_id: &str) -> Result<bool, SwarmError> {
        let agent = self
            .inner
            .find_agent(agent_id)
            .ok_or_else(|| SwarmError::AgentNotFound {
                id: agent_id.to_string(),
            })?;
        let recovered = agent.recover();
        if recovered {
            info!(agent_id = %agent_id, "Agent recovered");
            self.inner.wake.notify_one();
        }
        Ok(recovered)
    }

    /// Runtime snapshots of all agents, in registration order.
    pub fn agent_states(&self) -> Vec<AgentState> {
        self.inner.agents.read().iter().map(|a| a.state()).collect()
    }

    // ── Tasks ───────────────────────────────────────────────────────────

    /// Queue a task and wake the scheduler. Never fails.
    ///
    /// After `shutdown()` the task is recorded as cancelled straight away.
    pub async fn submit_task<I, S>(
        &self,
        description: impl Into<String>,
        required_capabilities: I,
        priority: Priority,
        context: Option<TaskContext>,
    ) -> TaskId
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut task = Task::new(
            description,
            required_capabilities,
            priority,
            context.unwrap_or_default(),
        );
        let task_id = task.id;

        let mut queues = self.inner.queues.lock().await;

        if !self.inner.accepting.load(Ordering::SeqCst) {
            warn!(task_id = %task_id, "Task submitted after shutdown, cancelling");
            if let Err(e) = task.cancel("Swarm is shut down") {
                warn!(task_id = %task_id, error = %e, "Could not cancel task");
            }
            queues.completed.push(task);
            self.inner
                .events
                .emit(SwarmEvent::new(SwarmEventKind::TaskCancelled).task(task_id));
            return task_id;
        }

        debug!(task_id = %task_id, priority = %priority, "Task submitted");
        self.inner.events.emit(
            SwarmEvent::new(SwarmEventKind::TaskCreated)
                .task(task_id)
                .data(serde_json::json!({
                    "priority": priority,
                    "requiredCapabilities": task.required_capabilities,
                })),
        );
        queues.pending.push_back(task);
        self.inner.ensure_running(&mut queues);
        drop(queues);

        self.inner.wake.notify_one();
        task_id
    }

    /// Cancel a pending or active task.
    ///
    /// An active task's body is only signalled through its cancellation
    /// token; the record moves to completed immediately.
    pub async fn cancel_task(&self, task_id: TaskId) -> Result<(), SwarmError> {
        let mut queues = self.inner.queues.lock().await;

        let cancelled = if let Some(pos) = queues.pending.iter().position(|t| t.id == task_id) {
            queues.pending.remove(pos)
        } else if let Some(active) = queues.active.remove(&task_id) {
            active.cancel.cancel();
            Some(active.task)
        } else {
            None
        };

        let Some(mut task) = cancelled else {
            return match queues.completed.iter().find(|t| t.id == task_id) {
                Some(done) => Err(SwarmError::TaskAlreadyTerminal {
                    id: task_id,
                    status: done.status.to_string(),
                }),
                None => Err(SwarmError::TaskNotFound { id: task_id }),
            };
        };

        if let Err(e) = task.cancel("Cancelled by request") {
            warn!(task_id = %task_id, error = %e, "Could not cancel task");
        }
        info!(task_id = %task_id, "Task cancelled");
        self.inner.emit_cancelled(&task);
        queues.completed.push(task);
        drop(queues);

        self.inner.wake.notify_one();
        Ok(())
    }

    /// Look a task up in any of the three collections.
    pub async fn get_task(&self, task_id: TaskId) -> Option<Task> {
        let queues = self.inner.queues.lock().await;
        queues
            .active
            .get(&task_id)
            .map(|a| a.task.clone())
            .or_else(|| queues.pending.iter().find(|t| t.id == task_id).cloned())
            .or_else(|| queues.completed.iter().find(|t| t.id == task_id).cloned())
    }

    /// Active tasks, oldest first.
    pub async fn active_tasks(&self) -> Vec<Task> {
        let queues = self.inner.queues.lock().await;
        let mut tasks: Vec<Task> = queues.active.values().map(|a| a.task.clone()).collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }

    /// Pending tasks in queue order.
    pub async fn pending_tasks(&self) -> Vec<Task> {
        self.inner.queues.lock().await.pending.iter().cloned().collect()
    }

    /// Finished tasks in the order they finished.
    pub async fn completed_tasks(&self) -> Vec<Task> {
        self.inner.queues.lock().await.completed.clone()
    }

    pub async fn status(&self) -> SwarmStatus {
        let queues = self.inner.queues.lock().await;
        SwarmStatus {
            is_running: queues.running,
            active_tasks: queues.active.len(),
            pending_tasks: queues.pending.len(),
            completed_tasks: queues.completed.len(),
            registered_workers: self.inner.agents.read().len(),
        }
    }

    // ── Events ──────────────────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<SwarmEvent> {
        self.inner.events.subscribe()
    }

    pub fn event_stream(&self) -> impl Stream<Item = SwarmEvent> + Send + 'static {
        self.inner.events.stream()
    }

    // ── Shutdown ────────────────────────────────────────────────────────

    /// Stop admitting, give active tasks the grace period to finish, then
    /// cancel whatever is left and take every agent offline.
    ///
    /// Concurrent and repeated calls return once the first one has finished.
    pub async fn shutdown(&self) {
        if !self.inner.accepting.swap(false, Ordering::SeqCst) {
            debug!("Shutdown already requested, waiting for it to finish");
            self.inner.root_cancel.cancelled().await;
            return;
        }

        let grace = self.inner.config.shutdown_grace;
        info!(grace_ms = grace.as_millis() as u64, "Swarm shutting down");

        let deadline = Instant::now() + grace;
        loop {
            let active = self.inner.queues.lock().await.active.len();
            if active == 0 {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                warn!(active, "Grace period elapsed with tasks still active");
                break;
            }
            let nap = self.inner.config.tick_interval.min(deadline - now);
            tokio::time::sleep(nap).await;
        }

        let mut queues = self.inner.queues.lock().await;

        let mut leftovers: Vec<ActiveTask> = queues.active.drain().map(|(_, a)| a).collect();
        leftovers.sort_by_key(|a| a.task.created_at);
        for mut active in leftovers {
            active.cancel.cancel();
            if let Err(e) = active.task.cancel("Cancelled by shutdown") {
                warn!(task_id = %active.task.id, error = %e, "Could not cancel task");
            }
            self.inner.emit_cancelled(&active.task);
            queues.completed.push(active.task);
        }

        let pending: Vec<Task> = queues.pending.drain(..).collect();
        for mut task in pending {
            if let Err(e) = task.cancel("Swarm shut down before the task ran") {
                warn!(task_id = %task.id, error = %e, "Could not cancel task");
            }
            self.inner.emit_cancelled(&task);
            queues.completed.push(task);
        }

        queues.running = false;
        drop(queues);

        for agent in self.inner.agents.read().iter() {
            agent.release();
        }
        self.inner.wake.notify_one();
        // Fired last; concurrent shutdown() calls wait on it
        self.inner.root_cancel.cancel();

        info!("Swarm shut down");
    }
}

impl SwarmInner {
    fn find_agent(&self, agent_id: &str) -> Option<Arc<ManagedAgent>> {
        self.agents
            .read()
            .iter()
            .find(|a| a.id() == agent_id)
            .cloned()
    }

    fn emit_cancelled(&self, task: &Task) {
        let mut event = SwarmEvent::new(SwarmEventKind::TaskCancelled).task(task.id);
        if let Some(agent_id) = &task.assigned_agent_id {
            event = event.worker(agent_id);
        }
        self.events.emit(event);
    }

    fn ensure_running(self: &Arc<Self>, queues: &mut TaskQueues) {
        if queues.running {
            return;
        }
        queues.running = true;
        tokio::spawn(Arc::clone(self).run_loop());
    }

    async fn run_loop(self: Arc<Self>) {
        info!("Scheduler loop started");

        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.wake.notified() => {}
            }
            if !self.tick().await {
                break;
            }
        }

        info!("Scheduler loop stopped");
    }

    /// One scheduling pass. Returns false once the loop should stop.
    async fn tick(self: &Arc<Self>) -> bool {
        let mut queues = self.queues.lock().await;
        if !queues.running {
            return false;
        }

        if self.accepting.load(Ordering::SeqCst) {
            self.admit(&mut queues);
        }

        if !queues.pending.is_empty() && queues.active.len() >= self.config.max_concurrent_tasks {
            self.events.emit(
                SwarmEvent::new(SwarmEventKind::SwarmOverloaded).data(serde_json::json!({
                    "pending": queues.pending.len(),
                    "active": queues.active.len(),
                })),
            );
        }

        self.sweep_timeouts(&mut queues);

        if queues.pending.is_empty() && queues.active.is_empty() {
            queues.running = false;
            self.events.emit(SwarmEvent::new(SwarmEventKind::SwarmIdle));
            return false;
        }
        true
    }

    /// Move queue-head tasks onto agents until the queue or capacity runs out.
    ///
    /// A head task nobody can take blocks everything behind it for this pass.
    fn admit(self: &Arc<Self>, queues: &mut TaskQueues) {
        if queues.pending.is_empty() {
            return;
        }

        // Stable: equal priorities keep submission order
        queues
            .pending
            .make_contiguous()
            .sort_by(|a, b| b.priority.cmp(&a.priority));

        let agents: Vec<Arc<ManagedAgent>> = self.agents.read().clone();
        let coordinator = self.coordinator_id.read().clone();

        while queues.active.len() < self.config.max_concurrent_tasks {
            let Some(mut task) = queues.pending.pop_front() else {
                break;
            };

            let cancel = self.root_cancel.child_token();
            match self.route(&agents, coordinator.as_deref(), &mut task, &cancel) {
                Some(agent_id) => {
                    info!(task_id = %task.id, agent_id = %agent_id, "Task assigned");
                    self.events.emit(
                        SwarmEvent::new(SwarmEventKind::TaskAssigned)
                            .worker(&agent_id)
                            .task(task.id)
                            .data(serde_json::json!({ "priority": task.priority })),
                    );
                    queues.active.insert(task.id, ActiveTask { task, cancel });
                }
                None => {
                    debug!(task_id = %task.id, "No agent available for queue head");
                    queues.pending.push_front(task);
                    break;
                }
            }
        }
    }

    /// Coordinator first for complex tasks, then the best-scoring agent.
    fn route(
        &self,
        agents: &[Arc<ManagedAgent>],
        coordinator_id: Option<&str>,
        task: &mut Task,
        cancel: &CancellationToken,
    ) -> Option<String> {
        if router::is_complex(task) {
            let coordinator = coordinator_id.and_then(|id| agents.iter().find(|a| a.id() == id));
            if let Some(coordinator) = coordinator
                && coordinator.is_available()
                && coordinator.assign_task(task, cancel.clone(), self.signals.clone())
            {
                return Some(coordinator.id().to_string());
            }
        }

        let agent = router::find_best_agent(agents, task, coordinator_id, self.config.load_balancing)?;
        if agent.assign_task(task, cancel.clone(), self.signals.clone()) {
            Some(agent.id().to_string())
        } else {
            None
        }
    }

    fn sweep_timeouts(&self, queues: &mut TaskQueues) {
        let now = Utc::now();
        let timeout = self.config.task_timeout;

        let mut expired: Vec<TaskId> = queues
            .active
            .values()
            .filter(|a| a.task.idle_for(now) > timeout)
            .map(|a| a.task.id)
            .collect();
        expired.sort();

        for task_id in expired {
            let Some(mut active) = queues.active.remove(&task_id) else {
                continue;
            };
            active.cancel.cancel();
            if let Err(e) = active.task.fail(TIMEOUT_ERROR) {
                warn!(task_id = %task_id, error = %e, "Could not fail timed-out task");
            }

            warn!(
                task_id = %task_id,
                agent_id = ?active.task.assigned_agent_id,
                timeout_ms = timeout.as_millis() as u64,
                "Task timed out"
            );
            let mut event = SwarmEvent::new(SwarmEventKind::TaskFailed)
                .task(task_id)
                .data(serde_json::json!({ "reason": "timeout", "error": TIMEOUT_ERROR }));
            if let Some(agent_id) = &active.task.assigned_agent_id {
                event = event.worker(agent_id);
            }
            self.events.emit(event);
            queues.completed.push(active.task);
        }
    }

    async fn handle_signal(self: &Arc<Self>, signal: AgentSignal) {
        let mut queues = self.queues.lock().await;
        match signal {
            AgentSignal::Started { agent_id, task_id } => {
                if let Some(active) = queues.active.get_mut(&task_id)
                    && let Err(e) = active.task.start()
                {
                    debug!(task_id = %task_id, agent_id = %agent_id, error = %e, "Ignoring start signal");
                }
            }
            AgentSignal::Finished { agent_id, task } => {
                self.on_finished(&mut queues, &agent_id, task);
            }
        }
        drop(queues);
        self.wake.notify_one();
    }

    /// Apply an agent's terminal result, including the retry policy.
    fn on_finished(self: &Arc<Self>, queues: &mut TaskQueues, agent_id: &str, mut task: Task) {
        if queues.active.remove(&task.id).is_none() {
            // Timed out or cancelled while the body was still running
            debug!(task_id = %task.id, agent_id = %agent_id, "Result for task no longer active");
            return;
        }

        let execution_time = task.result.as_ref().map(|r| r.execution_time_ms);
        if task.status == TaskStatus::Completed {
            self.events.emit(
                SwarmEvent::new(SwarmEventKind::TaskCompleted)
                    .worker(agent_id)
                    .task(task.id)
                    .data(serde_json::json!({ "executionTime": execution_time })),
            );
            queues.completed.push(task);
            return;
        }

        let error = task.result.as_ref().and_then(|r| r.error.clone());
        let retries = task.context.retry_count();
        if task.status == TaskStatus::Failed
            && self.config.retry_attempts > 0
            && retries < self.config.retry_attempts
        {
            match task.reset_for_retry() {
                Ok(count) => {
                    info!(
                        task_id = %task.id,
                        agent_id = %agent_id,
                        retry = count,
                        max_retries = self.config.retry_attempts,
                        "Task failed, retrying"
                    );
                    self.events.emit(
                        SwarmEvent::new(SwarmEventKind::TaskRetried)
                            .worker(agent_id)
                            .task(task.id)
                            .data(serde_json::json!({ "retryCount": count, "error": error })),
                    );
                    queues.pending.push_back(task);
                    if self.accepting.load(Ordering::SeqCst) {
                        self.ensure_running(queues);
                    }
                    return;
                }
                Err(e) => warn!(task_id = %task.id, error = %e, "Could not requeue task"),
            }
        }

        warn!(
            task_id = %task.id,
            agent_id = %agent_id,
            error = ?error,
            retries,
            "Task failed"
        );
        self.events.emit(
            SwarmEvent::new(SwarmEventKind::TaskFailed)
                .worker(agent_id)
                .task(task.id)
                .data(serde_json::json!({ "reason": "execution", "error": error })),
        );
        queues.completed.push(task);
    }
}

/// Forward agent signals into the scheduler until the swarm is dropped.
async fn listen(inner: Weak<SwarmInner>, mut rx: mpsc::UnboundedReceiver<AgentSignal>) {
    while let Some(signal) = rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.handle_signal(signal).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swarm::agents::{CodingAgent, DryRunExecutor};
    use std::time::Duration;

    fn config() -> OrchestrationConfig {
        OrchestrationConfig::default().with_tick_interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = OrchestrationConfig::default().with_max_concurrent_tasks(0);
        assert!(Swarm::new(config).is_err());
    }

    #[tokio::test]
    async fn duplicate_agents_rejected() {
        let swarm = Swarm::new(config()).unwrap();
        let executor = Arc::new(DryRunExecutor::new(Duration::from_millis(1)));
        swarm
            .register_agent(Arc::new(CodingAgent::new("coder", executor.clone())))
            .unwrap();
        let err = swarm
            .register_agent(Arc::new(CodingAgent::new("coder", executor)))
            .unwrap_err();
        assert!(matches!(err, SwarmError::DuplicateAgent { .. }));
        assert_eq!(swarm.status().await.registered_workers, 1);
    }

    #[tokio::test]
    async fn pending_task_can_be_cancelled() {
        let swarm = Swarm::new(config()).unwrap();
        let id = swarm
            .submit_task("write a parser", ["coding"], Priority::High, None)
            .await;

        swarm.cancel_task(id).await.unwrap();
        let task = swarm.get_task(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert!(task.result.is_some());
        assert!(task.assigned_agent_id.is_none(), "never assigned");

        let again = swarm.cancel_task(id).await.unwrap_err();
        assert!(matches!(again, SwarmError::TaskAlreadyTerminal { .. }));
        let missing = swarm.cancel_task(uuid::Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(missing, SwarmError::TaskNotFound { .. }));
    }

    #[tokio::test]
    async fn unknown_agent_operations_fail() {
        let swarm = Swarm::new(config()).unwrap();
        assert!(matches!(
            swarm.deregister_agent("ghost"),
            Err(SwarmError::AgentNotFound { .. })
        ));
        assert!(swarm.set_coordinator("ghost").is_err());
        assert!(swarm.recover_agent("ghost").is_err());
    }

    #[tokio::test]
    async fn submissions_after_shutdown_are_cancelled() {
        let swarm = Swarm::new(config().with_shutdown_grace(Duration::from_millis(10))).unwrap();
        swarm.shutdown().await;

        let id = swarm.submit_task("late", ["coding"], Priority::Low, None).await;
        let task = swarm.get_task(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);

        let status = swarm.status().await;
        assert!(!status.is_running);
        assert_eq!(status.pending_tasks, 0);
        assert_eq!(status.completed_tasks, 1);
    }
}
