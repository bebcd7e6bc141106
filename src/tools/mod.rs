//! Tools and the batch execution planner.

pub mod batch;
pub mod builtin;
pub mod registry;
pub mod tool;

pub use batch::{Batch, BatchExecutor, BatchOutcome, ToolCategory, plan_batches};
pub use registry::ToolRegistry;
pub use tool::{Tool, ToolInvocation, ToolOutput, ToolResult, ToolRunner};
