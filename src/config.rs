//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;

/// Orchestration settings for one [`Swarm`](crate::swarm::Swarm) instance.
///
/// Immutable once the swarm is built.
#[derive(Debug, Clone)]
pub struct OrchestrationConfig {
    /// Global cap on tasks in the active set.
    pub max_concurrent_tasks: usize,
    /// Active tasks untouched for longer than this are failed by the sweep.
    pub task_timeout: Duration,
    /// How many times a failed task is re-queued before it is final.
    pub retry_attempts: u32,
    /// Bias routing away from agents that are already busy.
    pub load_balancing: bool,
    /// Reserved.
    pub failover_enabled: bool,
    /// Scheduler tick period.
    pub tick_interval: Duration,
    /// How long `shutdown()` waits for active tasks before cancelling them.
    pub shutdown_grace: Duration,
    /// Buffer size of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 10,
            task_timeout: Duration::from_secs(300), // 5 minutes
            retry_attempts: 2,
            load_balancing: true,
            failover_enabled: false,
            tick_interval: Duration::from_millis(100),
            shutdown_grace: Duration::from_secs(30),
            event_capacity: 256,
        }
    }
}

impl OrchestrationConfig {
    /// Build config from environment variables, falling back to defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            max_concurrent_tasks: env_parse("SWARM_MAX_CONCURRENT_TASKS")?
                .unwrap_or(defaults.max_concurrent_tasks),
            task_timeout: env_parse("SWARM_TASK_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.task_timeout),
            retry_attempts: env_parse("SWARM_RETRY_ATTEMPTS")?.unwrap_or(defaults.retry_attempts),
            load_balancing: env_bool("SWARM_LOAD_BALANCING")?.unwrap_or(defaults.load_balancing),
            failover_enabled: env_bool("SWARM_FAILOVER")?.unwrap_or(defaults.failover_enabled),
            tick_interval: env_parse("SWARM_TICK_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick_interval),
            shutdown_grace: env_parse("SWARM_SHUTDOWN_GRACE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.shutdown_grace),
            event_capacity: defaults.event_capacity,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_tasks == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_concurrent_tasks".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.task_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "task_timeout".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "tick_interval".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "event_capacity".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn with_max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max;
        self
    }

    #[must_use]
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_load_balancing(mut self, enabled: bool) -> Self {
        self.load_balancing = enabled;
        self
    }

    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::ParseError(format!("{key}={raw}: {e}"))),
        Err(_) => Ok(None),
    }
}

fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| ConfigError::ParseError(format!("{key}={raw}: expected a boolean"))),
        Err(_) => Ok(None),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
