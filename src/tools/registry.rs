//! Tool registry for managing available tools.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::ToolError;
use crate::tools::tool::{Tool, ToolInvocation, ToolOutput, ToolRunner};

/// Names of built-in tools that cannot be shadowed by dynamic registrations.
const PROTECTED_TOOL_NAMES: &[&str] = &["echo", "time"];

/// Registry of available tools. Doubles as the planner's runner.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    /// Names registered as built-in (protected from shadowing).
    builtin_names: RwLock<HashSet<String>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            builtin_names: RwLock::new(HashSet::new()),
        }
    }

    /// Registry with the built-in tools already installed.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        crate::tools::builtin::register_all(&registry);
        registry
    }

    /// Register a tool. Returns false if it would shadow a built-in.
    pub async fn register(&self, tool: Arc<dyn Tool>) -> bool {
        let name = tool.name().to_string();
        if self.builtin_names.read().await.contains(&name) {
            tracing::warn!(
                tool = %name,
                "Rejected tool registration: would shadow a built-in tool"
            );
            return false;
        }
        self.tools.write().await.insert(name.clone(), tool);
        tracing::debug!(tool = %name, "Registered tool");
        true
    }

    /// Register at startup, before the registry is shared. Protected names
    /// become built-ins.
    pub fn register_sync(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if let Ok(mut tools) = self.tools.try_write() {
            tools.insert(name.clone(), tool);
            if PROTECTED_TOOL_NAMES.contains(&name.as_str())
                && let Ok(mut builtins) = self.builtin_names.try_write()
            {
                builtins.insert(name.clone());
            }
            tracing::debug!(tool = %name, "Registered tool");
        }
    }

    pub async fn unregister(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.write().await.remove(name)
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    pub async fn has(&self, name: &str) -> bool {
        self.tools.read().await.contains_key(name)
    }

    /// Tool names, sorted.
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn count(&self) -> usize {
        self.tools.try_read().map(|t| t.len()).unwrap_or(0)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolRunner for ToolRegistry {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        let tool = self
            .get(&invocation.name)
            .await
            .ok_or_else(|| ToolError::NotFound {
                name: invocation.name.clone(),
            })?;

        tracing::debug!(
            tool = %invocation.name,
            invocation_id = %invocation.id,
            "Tool call started"
        );

        let timeout = tool.execution_timeout();
        let start = Instant::now();
        let result = tokio::time::timeout(timeout, tool.execute(invocation.arguments.clone())).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(output)) => {
                tracing::debug!(tool = %invocation.name, elapsed_ms, "Tool call succeeded");
                Ok(output)
            }
            Ok(Err(e)) => {
                tracing::debug!(tool = %invocation.name, elapsed_ms, error = %e, "Tool call failed");
                Err(e)
            }
            Err(_) => {
                tracing::warn!(tool = %invocation.name, elapsed_ms, "Tool call timed out");
                Err(ToolError::Timeout {
                    name: invocation.name.clone(),
                    timeout,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug)]
    struct MockTool {
        name: String,
        delay: Duration,
    }

    impl MockTool {
        fn named(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                delay: Duration::ZERO,
            })
        }
    }

    #[async_trait]
    impl Tool for MockTool {
        fn name(&self) -> &str {
            &self.name
        }
        fn description(&self) -> &str {
            "A mock tool for testing"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _params: serde_json::Value) -> Result<ToolOutput, ToolError> {
            tokio::time::sleep(self.delay).await;
            Ok(ToolOutput::text("mock", self.delay))
        }
        fn execution_timeout(&self) -> Duration {
            Duration::from_millis(50)
        }
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let registry = ToolRegistry::new();
        assert!(registry.register(MockTool::named("test_tool")).await);
        assert!(registry.has("test_tool").await);
        assert!(!registry.has("nonexistent").await);

        let retrieved = registry.get("test_tool").await;
        assert_eq!(retrieved.unwrap().name(), "test_tool");
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let registry = ToolRegistry::new();
        registry.register(MockTool::named("b")).await;
        registry.register(MockTool::named("a")).await;

        assert_eq!(registry.count(), 2);
        assert_eq!(registry.list().await, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_unregister() {
        let registry = ToolRegistry::new();
        registry.register(MockTool::named("temp")).await;
        assert!(registry.unregister("temp").await.is_some());
        assert!(!registry.has("temp").await);
    }

    #[tokio::test]
    async fn builtins_cannot_be_shadowed() {
        let registry = ToolRegistry::with_builtins();
        assert!(!registry.register(MockTool::named("echo")).await);
        let echo = registry.get("echo").await.unwrap();
        assert!(!echo.description().contains("mock"));
    }

    #[tokio::test]
    async fn run_reports_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry
            .run(&ToolInvocation::new("missing", serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }

    #[tokio::test]
    async fn run_enforces_tool_timeout() {
        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(MockTool {
                name: "slow".to_string(),
                delay: Duration::from_secs(5),
            }))
            .await;
        let err = registry
            .run(&ToolInvocation::new("slow", serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
    }
}
