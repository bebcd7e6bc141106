//! Capability routing and the complexity classifier.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::swarm::agent::ManagedAgent;
use crate::swarm::task::Task;

/// Descriptions longer than this count toward complexity.
const LONG_DESCRIPTION_CHARS: usize = 200;

/// Tasks needing more than this many capabilities count toward complexity.
const MANY_CAPABILITIES: usize = 2;

static COMPLEXITY_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)multiple|complex|comprehensive|end-to-end")
        .expect("complexity keyword pattern is valid")
});

/// True if at least two complexity signals hold.
pub fn is_complex(task: &Task) -> bool {
    let signals = [
        task.required_capabilities.len() > MANY_CAPABILITIES,
        task.description.chars().count() > LONG_DESCRIPTION_CHARS,
        COMPLEXITY_KEYWORDS.is_match(&task.description),
    ];
    signals.iter().filter(|hit| **hit).count() >= 2
}

/// Pick the highest-scoring available agent, skipping the coordinator.
///
/// With load balancing the score is scaled by `1 - load * 0.5`. Ties keep the
/// earliest agent in `agents` order.
pub fn find_best_agent(
    agents: &[Arc<ManagedAgent>],
    task: &Task,
    coordinator_id: Option<&str>,
    load_balancing: bool,
) -> Option<Arc<ManagedAgent>> {
    let mut best: Option<(&Arc<ManagedAgent>, f64)> = None;

    for agent in agents {
        if Some(agent.id()) == coordinator_id || !agent.is_available() {
            continue;
        }

        let mut score = agent.capability_score(&task.required_capabilities);
        if load_balancing {
            score *= 1.0 - agent.current_load() * 0.5;
        }

        tracing::trace!(agent_id = %agent.id(), task_id = %task.id, score, "Scored agent");

        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((agent, score)),
        }
    }

    best.map(|(agent, _)| Arc::clone(agent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutionError;
    use crate::swarm::agent::Agent;
    use crate::swarm::capability::{AgentProfile, Capability};
    use crate::swarm::task::{Priority, TaskContext, TaskResult};
    use async_trait::async_trait;
    use tokio::sync::{Notify, mpsc};
    use tokio_util::sync::CancellationToken;

    struct Parked {
        profile: AgentProfile,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Agent for Parked {
        fn profile(&self) -> &AgentProfile {
            &self.profile
        }
        fn can_handle(&self, _task: &Task) -> bool {
            true
        }
        async fn execute(
            &self,
            _task: &Task,
            _cancel: CancellationToken,
        ) -> Result<TaskResult, ExecutionError> {
            self.release.notified().await;
            Ok(TaskResult::success(serde_json::Value::Null))
        }
    }

    fn agent(id: &str, caps: &[(&str, f64)], max: usize) -> Arc<ManagedAgent> {
        let mut profile = AgentProfile::new(id, id, max);
        for (name, weight) in caps {
            profile = profile.with_capability(Capability::new(*name, *weight, ""));
        }
        ManagedAgent::new(Arc::new(Parked {
            profile,
            release: Arc::new(Notify::new()),
        }))
    }

    fn task(description: &str, caps: &[&str]) -> Task {
        Task::new(description, caps.iter().copied(), Priority::Medium, TaskContext::new())
    }

    #[test]
    fn complexity_needs_two_signals() {
        assert!(!is_complex(&task("a complex job", &["a"])));
        assert!(is_complex(&task("a complex job", &["a", "b", "c"])));
        assert!(is_complex(&task(&"End-To-End ".repeat(30), &[])));
        assert!(!is_complex(&task(&"x".repeat(250), &["a"])));
        assert!(is_complex(&task(&"x".repeat(250), &["a", "b", "c"])));
    }

    #[test]
    fn highest_score_wins() {
        let agents = vec![
            agent("low", &[("coding", 3.0)], 2),
            agent("high", &[("coding", 9.0)], 2),
        ];
        let best = find_best_agent(&agents, &task("fix", &["coding"]), None, false).unwrap();
        assert_eq!(best.id(), "high");
    }

    #[test]
    fn ties_keep_first() {
        let agents = vec![
            agent("first", &[("coding", 5.0)], 2),
            agent("second", &[("coding", 5.0)], 2),
        ];
        let best = find_best_agent(&agents, &task("fix", &["coding"]), None, true).unwrap();
        assert_eq!(best.id(), "first");
    }

    #[test]
    fn coordinator_is_skipped() {
        let agents = vec![
            agent("coord", &[("coding", 10.0)], 2),
            agent("coder", &[("coding", 1.0)], 2),
        ];
        let best = find_best_agent(&agents, &task("fix", &["coding"]), Some("coord"), false);
        assert_eq!(best.unwrap().id(), "coder");
    }

    #[test]
    fn no_agents_no_match() {
        assert!(find_best_agent(&[], &task("fix", &["coding"]), None, true).is_none());
    }

    #[tokio::test]
    async fn load_balancing_prefers_less_busy_agent() {
        let busy = agent("busy", &[("coding", 10.0)], 2);
        let free = agent("free", &[("coding", 8.0)], 2);
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut occupying = task("occupy", &["coding"]);
        assert!(busy.assign_task(&mut occupying, CancellationToken::new(), tx));

        let agents = vec![Arc::clone(&busy), Arc::clone(&free)];
        let t = task("fix", &["coding"]);

        // 10 * (1 - 0.5 * 0.5) = 7.5 < 8
        assert_eq!(find_best_agent(&agents, &t, None, true).unwrap().id(), "free");
        assert_eq!(find_best_agent(&agents, &t, None, false).unwrap().id(), "busy");
    }
}
