//! Batch execution planner.
//!
//! Splits the tool calls of one agent turn into consecutive batches that are
//! safe to run concurrently, then runs the batches one after another.
//! Results always come back in invocation order.
//!
//! Combinability (symmetric):
//!
//! | category | combines with            |
//! |----------|--------------------------|
//! | read     | read, compute, network   |
//! | compute  | read, compute            |
//! | network  | read                     |
//! | write    | nothing                  |
//! | bash     | nothing                  |

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ToolError;
use crate::tools::tool::{ToolInvocation, ToolResult, ToolRunner};

/// Side-effect class of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// Pure queries.
    Read,
    /// Mutates persistent state.
    Write,
    /// In-memory bookkeeping.
    Compute,
    /// External calls.
    Network,
    /// Arbitrary shell commands.
    Bash,
}

const CATEGORY_TABLE: &[(&str, ToolCategory)] = &[
    ("read_file", ToolCategory::Read),
    ("list_dir", ToolCategory::Read),
    ("glob", ToolCategory::Read),
    ("grep", ToolCategory::Read),
    ("search_files", ToolCategory::Read),
    ("memory_search", ToolCategory::Read),
    ("memory_read", ToolCategory::Read),
    ("memory_tree", ToolCategory::Read),
    ("write_file", ToolCategory::Write),
    ("edit_file", ToolCategory::Write),
    ("apply_patch", ToolCategory::Write),
    ("delete_file", ToolCategory::Write),
    ("memory_write", ToolCategory::Write),
    ("echo", ToolCategory::Compute),
    ("time", ToolCategory::Compute),
    ("json", ToolCategory::Compute),
    ("think", ToolCategory::Compute),
    ("http", ToolCategory::Network),
    ("web_fetch", ToolCategory::Network),
    ("web_search", ToolCategory::Network),
    ("shell", ToolCategory::Bash),
    ("bash", ToolCategory::Bash),
];

impl ToolCategory {
    /// Look a tool name up. Unknown tools are treated as `Write`.
    pub fn classify(tool_name: &str) -> Self {
        CATEGORY_TABLE
            .iter()
            .find(|(name, _)| *name == tool_name)
            .map(|(_, category)| *category)
            .unwrap_or(Self::Write)
    }

    /// Whether calls of these two categories may share a batch.
    pub fn combines_with(self, other: ToolCategory) -> bool {
        use ToolCategory::*;

        matches!(
            (self, other),
            (Read, Read)
                | (Read, Compute)
                | (Read, Network)
                | (Compute, Read)
                | (Compute, Compute)
                | (Network, Read)
        )
    }
}

/// Positions (into the invocation list) of calls that run together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub indices: Vec<usize>,
    pub categories: Vec<ToolCategory>,
}

impl Batch {
    fn new() -> Self {
        Self {
            indices: Vec::new(),
            categories: Vec::new(),
        }
    }

    fn accepts(&self, category: ToolCategory) -> bool {
        self.categories.iter().all(|c| c.combines_with(category))
    }

    fn push(&mut self, index: usize, category: ToolCategory) {
        self.indices.push(index);
        self.categories.push(category);
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Partition invocations into consecutive batches.
///
/// Scans left to right; a call joins the open batch if it combines with every
/// call already in it, otherwise it opens the next batch. An empty batch takes
/// any call, so `write` and `bash` end up alone.
pub fn plan_batches(invocations: &[ToolInvocation]) -> Vec<Batch> {
    let mut batches = Vec::new();
    let mut current = Batch::new();

    for (index, invocation) in invocations.iter().enumerate() {
        let category = ToolCategory::classify(&invocation.name);
        if !current.is_empty() && !current.accepts(category) {
            batches.push(std::mem::replace(&mut current, Batch::new()));
        }
        current.push(index, category);
    }
    if !current.is_empty() {
        batches.push(current);
    }

    batches
}

/// Aggregate result of one `execute` call.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// One entry per invocation, in invocation order.
    pub results: Vec<ToolResult>,
    /// Invocations that ran inside a multi-call batch.
    pub parallel_count: usize,
    /// Invocations run one at a time, including sequential fallbacks.
    pub sequential_count: usize,
    /// Invocations skipped because of cancellation.
    pub skipped_count: usize,
    pub batch_count: usize,
    pub elapsed: Duration,
}

impl BatchOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }
}

/// Runs planned batches against a [`ToolRunner`].
#[derive(Clone)]
pub struct BatchExecutor {
    runner: Arc<dyn ToolRunner>,
}

impl BatchExecutor {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self { runner }
    }

    pub async fn execute(&self, invocations: &[ToolInvocation]) -> BatchOutcome {
        self.execute_with_cancel(invocations, CancellationToken::new())
            .await
    }

    /// Like [`execute`](Self::execute); batches not yet started when `cancel`
    /// fires are reported as [`ToolError::Cancelled`] failures without running.
    pub async fn execute_with_cancel(
        &self,
        invocations: &[ToolInvocation],
        cancel: CancellationToken,
    ) -> BatchOutcome {
        let started = Instant::now();
        let batches = plan_batches(invocations);

        tracing::debug!(
            invocations = invocations.len(),
            batches = batches.len(),
            "Planned tool batches"
        );

        let mut results = Vec::with_capacity(invocations.len());
        let mut parallel_count = 0;
        let mut sequential_count = 0;
        let mut skipped_count = 0;

        for batch in &batches {
            if cancel.is_cancelled() {
                skipped_count += batch.len();
                results.extend(batch.indices.iter().map(|&i| {
                    let invocation = &invocations[i];
                    let skipped = ToolError::Cancelled {
                        name: invocation.name.clone(),
                    };
                    ToolResult::from_outcome(invocation, Err(skipped), Duration::ZERO)
                }));
                continue;
            }

            if batch.len() == 1 {
                let invocation = &invocations[batch.indices[0]];
                results.push(self.run_guarded(invocation).await);
                sequential_count += 1;
            } else {
                tracing::debug!(size = batch.len(), categories = ?batch.categories, "Running batch in parallel");
                match self.run_parallel(batch, invocations).await {
                    Some(batch_results) => {
                        results.extend(batch_results);
                        parallel_count += batch.len();
                    }
                    None => {
                        tracing::warn!(size = batch.len(), "Parallel dispatch failed, running batch sequentially");
                        for &i in &batch.indices {
                            results.push(self.run_guarded(&invocations[i]).await);
                        }
                        sequential_count += batch.len();
                    }
                }
            }
        }

        BatchOutcome {
            results,
            parallel_count,
            sequential_count,
            skipped_count,
            batch_count: batches.len(),
            elapsed: started.elapsed(),
        }
    }

    /// Run one call, turning a panic into a failed result.
    async fn run_guarded(&self, invocation: &ToolInvocation) -> ToolResult {
        let start = Instant::now();
        let outcome = AssertUnwindSafe(self.runner.run(invocation))
            .catch_unwind()
            .await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(result) => ToolResult::from_outcome(invocation, result, elapsed),
            Err(_) => {
                tracing::warn!(tool = %invocation.name, invocation_id = %invocation.id, "Tool call panicked");
                let panicked = ToolError::ExecutionFailed {
                    name: invocation.name.clone(),
                    reason: "panicked".to_string(),
                };
                ToolResult::from_outcome(invocation, Err(panicked), elapsed)
            }
        }
    }

    /// Spawn every call of the batch. `None` if any spawned call failed to
    /// join; the caller then reruns the whole batch sequentially.
    async fn run_parallel(
        &self,
        batch: &Batch,
        invocations: &[ToolInvocation],
    ) -> Option<Vec<ToolResult>> {
        let handles: Vec<_> = batch
            .indices
            .iter()
            .map(|&i| {
                let runner = Arc::clone(&self.runner);
                let invocation = invocations[i].clone();
                tokio::spawn(async move {
                    let start = Instant::now();
                    let outcome = runner.run(&invocation).await;
                    (outcome, start.elapsed())
                })
            })
            .collect();

        // join_all yields in handle order, which is batch order
        let joined = join_all(handles).await;

        batch
            .indices
            .iter()
            .zip(joined)
            .map(|(&i, joined)| match joined {
                Ok((outcome, elapsed)) => Some(ToolResult::from_outcome(&invocations[i], outcome, elapsed)),
                Err(e) => {
                    tracing::debug!(tool = %invocations[i].name, error = %e, "Spawned tool call did not complete");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calls(names: &[&str]) -> Vec<ToolInvocation> {
        names
            .iter()
            .map(|n| ToolInvocation::new(*n, serde_json::json!({})))
            .collect()
    }

    fn plan(names: &[&str]) -> Vec<Vec<usize>> {
        plan_batches(&calls(names))
            .into_iter()
            .map(|b| b.indices)
            .collect()
    }

    #[test]
    fn classification_defaults_to_write() {
        assert_eq!(ToolCategory::classify("read_file"), ToolCategory::Read);
        assert_eq!(ToolCategory::classify("shell"), ToolCategory::Bash);
        assert_eq!(ToolCategory::classify("mystery_tool"), ToolCategory::Write);
    }

    #[test]
    fn combinability_is_symmetric() {
        use ToolCategory::*;
        let all = [Read, Write, Compute, Network, Bash];
        for a in all {
            for b in all {
                assert_eq!(a.combines_with(b), b.combines_with(a), "{a:?} vs {b:?}");
            }
        }
        assert!(!Network.combines_with(Network));
        assert!(!Compute.combines_with(Network));
        assert!(!Write.combines_with(Write));
    }

    #[test]
    fn write_splits_reads() {
        assert_eq!(plan(&["read_file", "write_file", "read_file"]), vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn reads_group_with_compute_and_network() {
        assert_eq!(plan(&["read_file", "echo", "list_dir"]), vec![vec![0, 1, 2]]);
        assert_eq!(plan(&["read_file", "http", "grep"]), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn network_and_compute_never_share() {
        assert_eq!(plan(&["read_file", "http", "echo"]), vec![vec![0, 1], vec![2]]);
        assert_eq!(plan(&["http", "http"]), vec![vec![0], vec![1]]);
    }

    #[test]
    fn bash_and_unknown_run_alone() {
        assert_eq!(
            plan(&["shell", "read_file", "custom", "echo", "time"]),
            vec![vec![0], vec![1], vec![2], vec![3, 4]]
        );
    }

    #[test]
    fn empty_plan() {
        assert!(plan(&[]).is_empty());
    }
}
