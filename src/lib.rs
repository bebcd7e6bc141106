//! AI Assist swarm: task orchestration engine and tool batch planner.

pub mod config;
pub mod error;
pub mod swarm;
pub mod tools;

pub use config::OrchestrationConfig;
pub use error::{Error, Result};
pub use swarm::Swarm;
