//! Task orchestration: agents, routing, scheduling.

pub mod agent;
pub mod agents;
pub mod capability;
pub mod events;
pub mod router;
pub mod scheduler;
pub mod task;

pub use agent::{Agent, AgentState, AgentStatus, ManagedAgent, Performance};
pub use agents::{
    CapabilityAgent, CodingAgent, CoordinatorAgent, DryRunExecutor, ResearchAgent, TaskExecutor,
};
pub use capability::{AgentProfile, Capability};
pub use events::{EventBus, SwarmEvent, SwarmEventKind};
pub use scheduler::{Swarm, SwarmStatus};
pub use task::{Priority, Task, TaskContext, TaskId, TaskResult, TaskStatus};
