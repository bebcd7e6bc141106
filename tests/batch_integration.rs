//! Integration tests for the tool batch planner.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use ai_assist_swarm::error::ToolError;
use ai_assist_swarm::tools::{
    BatchExecutor, ToolInvocation, ToolOutput, ToolRegistry, ToolRunner,
};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Runner that sleeps `delay_ms`, records completion order, and panics on
/// tools named in `panic_on`.
#[derive(Default)]
struct RecordingRunner {
    finished: Mutex<Vec<String>>,
    calls: Mutex<usize>,
    panic_on: Option<&'static str>,
    cancel_on: Option<(&'static str, CancellationToken)>,
}

impl RecordingRunner {
    fn finished(&self) -> Vec<String> {
        self.finished.lock().clone()
    }

    fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl ToolRunner for RecordingRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        *self.calls.lock() += 1;

        let delay = invocation.arguments["delay_ms"].as_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;

        if self.panic_on == Some(invocation.name.as_str()) {
            panic!("{} blew up", invocation.name);
        }
        if let Some((name, token)) = &self.cancel_on
            && *name == invocation.name
        {
            token.cancel();
        }

        let label = invocation.arguments["label"]
            .as_str()
            .unwrap_or(&invocation.name)
            .to_string();
        self.finished.lock().push(label.clone());
        Ok(ToolOutput::text(label, Duration::from_millis(delay)))
    }
}

fn call(name: &str, label: &str, delay_ms: u64) -> ToolInvocation {
    ToolInvocation::new(
        name,
        serde_json::json!({ "label": label, "delay_ms": delay_ms }),
    )
}

#[tokio::test]
async fn write_always_runs_alone() {
    timeout(TEST_TIMEOUT, async {
        let runner = Arc::new(RecordingRunner::default());
        let executor = BatchExecutor::new(runner.clone());
        let calls = vec![
            call("read_file", "r0", 0),
            call("write_file", "w1", 0),
            call("read_file", "r2", 0),
        ];

        let outcome = executor.execute(&calls).await;

        assert_eq!(outcome.batch_count, 3);
        assert_eq!(outcome.sequential_count, 3);
        assert_eq!(outcome.parallel_count, 0);
        assert_eq!(runner.finished(), vec!["r0", "w1", "r2"]);
        assert!(outcome.all_succeeded());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn parallel_results_keep_invocation_order() {
    timeout(TEST_TIMEOUT, async {
        let runner = Arc::new(RecordingRunner::default());
        let executor = BatchExecutor::new(runner.clone());
        let calls = vec![
            call("read_file", "slow", 300),
            call("list_dir", "fast", 10),
            call("grep", "medium", 150),
        ];

        let outcome = executor.execute(&calls).await;

        assert_eq!(outcome.batch_count, 1);
        assert_eq!(outcome.parallel_count, 3);
        // Completion order differs from invocation order
        assert_eq!(runner.finished(), vec!["fast", "medium", "slow"]);

        let ids: Vec<&str> = outcome.results.iter().map(|r| r.invocation_id.as_str()).collect();
        let expected: Vec<&str> = calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, expected);
        let outputs: Vec<&str> = outcome
            .results
            .iter()
            .map(|r| r.output.as_str().unwrap())
            .collect();
        assert_eq!(outputs, vec!["slow", "fast", "medium"]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn dispatch_failure_falls_back_to_sequential() {
    timeout(TEST_TIMEOUT, async {
        let runner = Arc::new(RecordingRunner {
            panic_on: Some("memory_read"),
            ..Default::default()
        });
        let executor = BatchExecutor::new(runner.clone());
        let calls = vec![
            call("read_file", "a", 0),
            call("memory_read", "boom", 0),
            call("list_dir", "c", 0),
        ];

        let outcome = executor.execute(&calls).await;

        assert_eq!(outcome.results.len(), 3);
        assert!(outcome.results[0].success);
        assert!(!outcome.results[1].success);
        assert_eq!(
            outcome.results[1].error.as_deref(),
            Some("Tool memory_read execution failed: panicked")
        );
        assert!(outcome.results[2].success);
        assert_eq!(outcome.parallel_count, 0);
        assert_eq!(outcome.sequential_count, 3);
        // Whole batch ran twice: once spawned, once in the fallback
        assert_eq!(runner.calls(), 6);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn registry_failures_become_results() {
    timeout(TEST_TIMEOUT, async {
        let executor = BatchExecutor::new(Arc::new(ToolRegistry::with_builtins()));
        let calls = vec![
            ToolInvocation::new("echo", serde_json::json!({ "message": "hi" })),
            ToolInvocation::new("no_such_tool", serde_json::json!({})),
            ToolInvocation::new("echo", serde_json::json!({})),
            ToolInvocation::new("time", serde_json::json!({})),
        ];

        let outcome = executor.execute(&calls).await;

        assert_eq!(outcome.batch_count, 3);
        assert_eq!(outcome.results[0].output, serde_json::json!("hi"));
        assert!(outcome.results[1].error.as_ref().unwrap().contains("not found"));
        assert!(!outcome.results[2].success, "missing message parameter");
        assert!(outcome.results[3].success);
        assert_eq!(outcome.parallel_count, 2);
        assert_eq!(outcome.sequential_count, 2);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn cancellation_skips_remaining_batches() {
    timeout(TEST_TIMEOUT, async {
        let token = CancellationToken::new();
        let runner = Arc::new(RecordingRunner {
            cancel_on: Some(("write_file", token.clone())),
            ..Default::default()
        });
        let executor = BatchExecutor::new(runner.clone());
        let calls = vec![
            call("read_file", "before", 0),
            call("write_file", "trigger", 0),
            call("read_file", "after", 0),
            call("shell", "never", 0),
        ];

        let outcome = executor.execute_with_cancel(&calls, token).await;

        assert_eq!(runner.finished(), vec!["before", "trigger"]);
        assert_eq!(outcome.skipped_count, 2);
        assert!(outcome.results[1].success);
        for skipped in &outcome.results[2..] {
            assert!(!skipped.success);
            let error = skipped.error.as_deref().unwrap();
            assert_eq!(error, format!("Tool {} was cancelled", skipped.tool_name));
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn empty_input_is_a_no_op() {
    let executor = BatchExecutor::new(Arc::new(RecordingRunner::default()));
    let outcome = executor.execute(&[]).await;
    assert!(outcome.results.is_empty());
    assert_eq!(outcome.batch_count, 0);
}
