//! Built-in tools.

mod echo;
mod time;

use std::sync::Arc;

pub use echo::EchoTool;
pub use time::TimeTool;

use crate::tools::registry::ToolRegistry;

/// Install every built-in tool.
pub fn register_all(registry: &ToolRegistry) {
    registry.register_sync(Arc::new(EchoTool));
    registry.register_sync(Arc::new(TimeTool));
}
