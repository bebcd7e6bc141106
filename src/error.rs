//! Error types for the swarm engine.

use std::time::Duration;

use uuid::Uuid;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Swarm error: {0}")]
    Swarm(#[from] SwarmError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Scheduler and agent registry errors.
#[derive(Debug, thiserror::Error)]
pub enum SwarmError {
    #[error("Agent {id} not found")]
    AgentNotFound { id: String },

    #[error("Agent {id} is already registered")]
    DuplicateAgent { id: String },

    #[error("Agent {id} still has {tasks} task(s) in flight")]
    AgentBusy { id: String, tasks: usize },

    #[error("Task {id} not found")]
    TaskNotFound { id: Uuid },

    #[error("Task {id} already finished as {status}")]
    TaskAlreadyTerminal { id: Uuid, status: String },

    #[error("Task {id} cannot transition from {from} to {to}")]
    InvalidTransition { id: Uuid, from: String, to: String },
}

/// Tool execution errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    #[error("Tool {name} not found")]
    NotFound { name: String },

    #[error("Tool {name} execution failed: {reason}")]
    ExecutionFailed { name: String, reason: String },

    #[error("Tool {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("Invalid parameters for tool {name}: {reason}")]
    InvalidParameters { name: String, reason: String },

    #[error("Tool {name} was cancelled")]
    Cancelled { name: String },
}

/// Errors raised by an agent's task body.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Agent {agent} failed: {reason}")]
    Failed { agent: String, reason: String },

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Execution panicked: {0}")]
    Panicked(String),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_errors_render_with_context() {
        let err: Error = SwarmError::AgentNotFound {
            id: "coder-1".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Swarm error: Agent coder-1 not found");

        let err: Error = ToolError::Timeout {
            name: "shell".to_string(),
            timeout: Duration::from_secs(2),
        }
        .into();
        assert_eq!(err.to_string(), "Tool error: Tool shell timed out after 2s");
    }
}
