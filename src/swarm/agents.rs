//! Concrete agent kinds and the task-body collaborator they delegate to.
//!
//! Kinds differ only in profile and acceptance test:
//! - `CoordinatorAgent`: takes complex tasks before normal routing
//! - `CodingAgent` / `ResearchAgent`: keyword or capability match
//! - `CapabilityAgent`: accepts when it has every required capability

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::error::ExecutionError;
use crate::swarm::agent::Agent;
use crate::swarm::capability::{AgentProfile, Capability};
use crate::swarm::router;
use crate::swarm::task::{Task, TaskResult};

static CODING_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(code|implement|refactor|bug|debug|compile|function|test|fix)")
        .expect("coding keyword pattern is valid")
});

static RESEARCH_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(research|search|investigate|analy[sz]e|summari[sz]e|compare|document)")
        .expect("research keyword pattern is valid")
});

/// Runs a task body on behalf of an agent.
///
/// This is where the language-model turn loop plugs in; the engine treats it
/// as a black box that may take arbitrarily long.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(
        &self,
        profile: &AgentProfile,
        task: &Task,
        cancel: CancellationToken,
    ) -> Result<TaskResult, ExecutionError>;
}

/// Executor used when no model backend is wired in: waits, then reports
/// what it would have done.
#[derive(Debug, Clone)]
pub struct DryRunExecutor {
    delay: Duration,
}

impl DryRunExecutor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for DryRunExecutor {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

#[async_trait]
impl TaskExecutor for DryRunExecutor {
    async fn execute(
        &self,
        profile: &AgentProfile,
        task: &Task,
        cancel: CancellationToken,
    ) -> Result<TaskResult, ExecutionError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(ExecutionError::Cancelled),
            _ = tokio::time::sleep(self.delay) => Ok(TaskResult::success(serde_json::json!({
                "agent": profile.id,
                "summary": format!("{} handled: {}", profile.name, task.description),
            }))
            .with_metadata(serde_json::json!({ "dryRun": true }))),
        }
    }
}

fn shares_capability(profile: &AgentProfile, task: &Task) -> bool {
    task.required_capabilities
        .iter()
        .any(|c| profile.has_capability(c))
}

/// Routes complex work; rejects everything else.
pub struct CoordinatorAgent {
    profile: AgentProfile,
    executor: Arc<dyn TaskExecutor>,
}

impl CoordinatorAgent {
    pub fn new(id: impl Into<String>, executor: Arc<dyn TaskExecutor>) -> Self {
        let profile = AgentProfile::new(id, "Coordinator", 3)
            .with_capability(Capability::new("coordination", 10.0, "Splits and delegates work"))
            .with_capability(Capability::new("planning", 9.0, "Builds multi-step plans"))
            .with_capability(Capability::new("delegation", 8.0, "Hands sub-tasks to specialists"));
        Self { profile, executor }
    }
}

#[async_trait]
impl Agent for CoordinatorAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    fn can_handle(&self, task: &Task) -> bool {
        router::is_complex(task)
    }

    async fn execute(
        &self,
        task: &Task,
        cancel: CancellationToken,
    ) -> Result<TaskResult, ExecutionError> {
        self.executor.execute(&self.profile, task, cancel).await
    }

    fn is_coordinator(&self) -> bool {
        true
    }
}

/// Writes, fixes and tests code.
pub struct CodingAgent {
    profile: AgentProfile,
    executor: Arc<dyn TaskExecutor>,
}

impl CodingAgent {
    pub fn new(id: impl Into<String>, executor: Arc<dyn TaskExecutor>) -> Self {
        let profile = AgentProfile::new(id, "Coding", 2)
            .with_capability(Capability::new("coding", 9.0, "Writes and edits code"))
            .with_capability(Capability::new("debugging", 8.0, "Tracks down failures"))
            .with_capability(Capability::new("testing", 7.0, "Writes and runs tests"))
            .with_capability(Capability::new("refactoring", 7.0, "Restructures code"));
        Self { profile, executor }
    }
}

#[async_trait]
impl Agent for CodingAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    fn can_handle(&self, task: &Task) -> bool {
        CODING_KEYWORDS.is_match(&task.description) || shares_capability(&self.profile, task)
    }

    async fn execute(
        &self,
        task: &Task,
        cancel: CancellationToken,
    ) -> Result<TaskResult, ExecutionError> {
        self.executor.execute(&self.profile, task, cancel).await
    }
}

/// Looks things up and writes summaries.
pub struct ResearchAgent {
    profile: AgentProfile,
    executor: Arc<dyn TaskExecutor>,
}

impl ResearchAgent {
    pub fn new(id: impl Into<String>, executor: Arc<dyn TaskExecutor>) -> Self {
        let profile = AgentProfile::new(id, "Research", 3)
            .with_capability(Capability::new("research", 9.0, "Finds sources"))
            .with_capability(Capability::new("search", 8.0, "Runs searches"))
            .with_capability(Capability::new("analysis", 8.0, "Compares and evaluates"))
            .with_capability(Capability::new("documentation", 6.0, "Writes summaries"));
        Self { profile, executor }
    }
}

#[async_trait]
impl Agent for ResearchAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    fn can_handle(&self, task: &Task) -> bool {
        RESEARCH_KEYWORDS.is_match(&task.description) || shares_capability(&self.profile, task)
    }

    async fn execute(
        &self,
        task: &Task,
        cancel: CancellationToken,
    ) -> Result<TaskResult, ExecutionError> {
        self.executor.execute(&self.profile, task, cancel).await
    }
}

/// Generic agent defined entirely by its profile.
pub struct CapabilityAgent {
    profile: AgentProfile,
    executor: Arc<dyn TaskExecutor>,
}

impl CapabilityAgent {
    pub fn new(profile: AgentProfile, executor: Arc<dyn TaskExecutor>) -> Self {
        Self { profile, executor }
    }
}

#[async_trait]
impl Agent for CapabilityAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    fn can_handle(&self, task: &Task) -> bool {
        task.required_capabilities
            .iter()
            .all(|c| self.profile.has_capability(c))
    }

    async fn execute(
        &self,
        task: &Task,
        cancel: CancellationToken,
    ) -> Result<TaskResult, ExecutionError> {
        self.executor.execute(&self.profile, task, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swarm::task::{Priority, TaskContext};

    fn executor() -> Arc<dyn TaskExecutor> {
        Arc::new(DryRunExecutor::new(Duration::from_millis(1)))
    }

    fn task(description: &str, caps: &[&str]) -> Task {
        Task::new(description, caps.iter().copied(), Priority::Medium, TaskContext::new())
    }

    #[test]
    fn coding_agent_matches_keywords_or_capabilities() {
        let agent = CodingAgent::new("coder", executor());
        assert!(agent.can_handle(&task("Fix the login bug", &[])));
        assert!(agent.can_handle(&task("do the thing", &["testing"])));
        assert!(!agent.can_handle(&task("plan a trip", &["travel"])));
    }

    #[test]
    fn research_agent_matches_keywords_or_capabilities() {
        let agent = ResearchAgent::new("researcher", executor());
        assert!(agent.can_handle(&task("Summarize the RFC", &[])));
        assert!(agent.can_handle(&task("anything", &["search"])));
        assert!(!agent.can_handle(&task("refactor parser", &["coding"])));
    }

    #[test]
    fn coordinator_only_takes_complex_tasks() {
        let agent = CoordinatorAgent::new("coord", executor());
        assert!(agent.is_coordinator());
        assert!(!agent.can_handle(&task("small fix", &["coding"])));
        assert!(agent.can_handle(&task(
            "comprehensive migration",
            &["coding", "testing", "documentation"]
        )));
    }

    #[test]
    fn capability_agent_needs_every_capability() {
        let profile = AgentProfile::new("ops", "Ops", 1)
            .with_capability(Capability::new("deploy", 5.0, ""))
            .with_capability(Capability::new("monitoring", 4.0, ""));
        let agent = CapabilityAgent::new(profile, executor());
        assert!(agent.can_handle(&task("ship", &["deploy"])));
        assert!(agent.can_handle(&task("ship", &["deploy", "monitoring"])));
        assert!(!agent.can_handle(&task("ship", &["deploy", "coding"])));
    }

    #[tokio::test]
    async fn dry_run_reports_and_honours_cancel() {
        let profile = AgentProfile::new("dry", "Dry", 1);
        let t = task("write docs", &[]);

        let result = DryRunExecutor::new(Duration::from_millis(1))
            .execute(&profile, &t, CancellationToken::new())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output["agent"], "dry");
        assert_eq!(result.metadata, Some(serde_json::json!({ "dryRun": true })));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = DryRunExecutor::new(Duration::from_secs(60))
            .execute(&profile, &t, cancel)
            .await;
        assert!(matches!(err, Err(ExecutionError::Cancelled)));
    }
}
