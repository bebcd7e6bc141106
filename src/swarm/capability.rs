//! Capability model: what an agent can do and what a task needs.

use serde::{Deserialize, Serialize};

/// A named skill an agent advertises, weighted for routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    /// Routing weight; higher wins.
    pub priority: f64,
    pub description: String,
}

impl Capability {
    pub fn new(name: impl Into<String>, priority: f64, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority,
            description: description.into(),
        }
    }
}

/// Static identity of an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,
    /// Ordered capability list.
    pub capabilities: Vec<Capability>,
    /// Per-agent cap on concurrently assigned tasks.
    pub max_concurrent_tasks: usize,
}

impl AgentProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, max_concurrent_tasks: usize) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            capabilities: Vec::new(),
            max_concurrent_tasks: max_concurrent_tasks.max(1),
        }
    }

    /// Append a capability.
    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Look up a capability by name.
    pub fn capability(&self, name: &str) -> Option<&Capability> {
        self.capabilities.iter().find(|c| c.name == name)
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.capability(name).is_some()
    }

    /// Mean weight of the required capabilities this agent has.
    ///
    /// Missing capabilities are left out of both the sum and the count, so
    /// `{a:10, b:6}` against `{a, c}` scores 10. No match scores 0.
    pub fn capability_score<S: AsRef<str>>(&self, required: &[S]) -> f64 {
        let (sum, matched) = required
            .iter()
            .filter_map(|name| self.capability(name.as_ref()))
            .fold((0.0, 0usize), |(sum, n), cap| (sum + cap.priority, n + 1));

        if matched == 0 { 0.0 } else { sum / matched as f64 }
    }
}

/// Normalise a required-capability list: trimmed, deduplicated, sorted.
///
/// Order is irrelevant for matching; sorting keeps task records stable.
pub fn normalize_capabilities<I, S>(caps: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = caps
        .into_iter()
        .map(|c| c.as_ref().trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> AgentProfile {
        AgentProfile::new("worker-1", "Worker", 2)
            .with_capability(Capability::new("a", 10.0, "alpha"))
            .with_capability(Capability::new("b", 6.0, "beta"))
    }

    #[test]
    fn score_counts_only_matching_capabilities() {
        assert_eq!(profile().capability_score(&["a", "c"]), 10.0);
    }

    #[test]
    fn score_averages_matches() {
        assert_eq!(profile().capability_score(&["a", "b"]), 8.0);
    }

    #[test]
    fn score_without_matches_is_zero() {
        assert_eq!(profile().capability_score(&["x", "y"]), 0.0);
        assert_eq!(profile().capability_score::<&str>(&[]), 0.0);
    }

    #[test]
    fn normalize_dedups_and_sorts() {
        let caps = normalize_capabilities(["search", " coding ", "search", ""]);
        assert_eq!(caps, vec!["coding".to_string(), "search".to_string()]);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        assert_eq!(AgentProfile::new("x", "X", 0).max_concurrent_tasks, 1);
    }
}
