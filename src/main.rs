use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use uuid::Uuid;

use ai_assist_swarm::config::OrchestrationConfig;
use ai_assist_swarm::swarm::{
    AgentProfile, Capability, CapabilityAgent, CodingAgent, CoordinatorAgent, DryRunExecutor,
    Priority, ResearchAgent, Swarm, SwarmEvent, TaskExecutor,
};
use ai_assist_swarm::tools::{BatchExecutor, ToolInvocation, ToolRegistry};

const HELP: &str = "\
Commands:
  submit <priority> <cap,cap|-> <description>   queue a task ('-' goes to the general agent)
  status                                        scheduler counters
  tasks                                         list every task
  agents                                        agent states
  cancel <task-id>                              cancel a pending or active task
  batch <tool[:arg]> ...                        run tool calls through the planner
  help                                          this text
  quit                                          shut down and exit";

#[derive(Debug, PartialEq)]
enum Command {
    Submit {
        priority: Priority,
        capabilities: Vec<String>,
        description: String,
    },
    Status,
    Tasks,
    Agents,
    Cancel(Uuid),
    Batch(Vec<ToolInvocation>),
    Help,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Self, String> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Err("empty command".to_string());
        };

        match verb {
            "submit" => {
                let priority = parts
                    .next()
                    .ok_or("usage: submit <priority> <cap,cap|-> <description>")?
                    .parse::<Priority>()?;
                let caps = parts.next().ok_or("missing capabilities (use - for none)")?;
                let capabilities = if caps == "-" {
                    Vec::new()
                } else {
                    caps.split(',').map(str::to_string).collect()
                };
                let description = parts.collect::<Vec<_>>().join(" ");
                if description.is_empty() {
                    return Err("missing description".to_string());
                }
                Ok(Self::Submit {
                    priority,
                    capabilities,
                    description,
                })
            }
            "status" => Ok(Self::Status),
            "tasks" => Ok(Self::Tasks),
            "agents" => Ok(Self::Agents),
            "cancel" => {
                let raw = parts.next().ok_or("usage: cancel <task-id>")?;
                Uuid::parse_str(raw)
                    .map(Self::Cancel)
                    .map_err(|e| format!("invalid task id: {e}"))
            }
            "batch" => {
                let invocations: Vec<ToolInvocation> = parts
                    .map(|call| match call.split_once(':') {
                        Some((name, arg)) => {
                            ToolInvocation::new(name, serde_json::json!({ "message": arg }))
                        }
                        None => ToolInvocation::new(call, serde_json::json!({})),
                    })
                    .collect();
                if invocations.is_empty() {
                    return Err("usage: batch <tool[:arg]> ...".to_string());
                }
                Ok(Self::Batch(invocations))
            }
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "/quit" => Ok(Self::Quit),
            other => Err(format!("unknown command '{other}', try 'help'")),
        }
    }
}

/// stderr logging, plus a daily-rolling file when `AI_ASSIST_LOG_DIR` is set.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = fmt::layer().with_target(false).with_writer(std::io::stderr);

    match std::env::var("AI_ASSIST_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "ai-assist-swarm.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}

/// Coordinator, catch-all, then specialists.
///
/// `general` accepts any task whose capabilities it has, including none, and
/// sits ahead of the specialists so it wins zero-score ties.
fn register_default_agents(
    swarm: &Swarm,
    executor: Arc<dyn TaskExecutor>,
) -> ai_assist_swarm::Result<()> {
    swarm.register_agent(Arc::new(CoordinatorAgent::new("coordinator", executor.clone())))?;

    let general = AgentProfile::new("general", "General", 4)
        .with_capability(Capability::new("general", 5.0, "Catch-all assistant work"))
        .with_capability(Capability::new("writing", 5.0, "Drafts text"));
    swarm.register_agent(Arc::new(CapabilityAgent::new(general, executor.clone())))?;

    swarm.register_agent(Arc::new(CodingAgent::new("coding", executor.clone())))?;
    swarm.register_agent(Arc::new(ResearchAgent::new("research", executor)))?;

    Ok(())
}

fn print_event(event: &SwarmEvent) {
    let mut line = format!("  [{}]", event.kind);
    if let Some(task_id) = event.task_id {
        line.push_str(&format!(" task={task_id}"));
    }
    if let Some(worker_id) = &event.worker_id {
        line.push_str(&format!(" agent={worker_id}"));
    }
    if let Some(data) = &event.data {
        line.push_str(&format!(" {data}"));
    }
    eprintln!("{line}");
}

async fn handle(
    command: Command,
    swarm: &Swarm,
    batches: &BatchExecutor,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Submit {
            priority,
            capabilities,
            description,
        } => {
            let id = swarm
                .submit_task(description, capabilities, priority, None)
                .await;
            println!("{id}");
        }
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&swarm.status().await)?);
        }
        Command::Tasks => {
            let groups = [
                ("active", swarm.active_tasks().await),
                ("pending", swarm.pending_tasks().await),
                ("completed", swarm.completed_tasks().await),
            ];
            for (label, tasks) in groups {
                println!("{label} ({}):", tasks.len());
                for task in tasks {
                    let agent = task.assigned_agent_id.as_deref().unwrap_or("-");
                    println!(
                        "  {} {:<11} {:<8} {:<12} {}",
                        task.id, task.status, task.priority, agent, task.description
                    );
                }
            }
        }
        Command::Agents => {
            for state in swarm.agent_states() {
                println!(
                    "  {:<12} {:<10} tasks={} done={} failed={} quality={:.2}",
                    state.agent_id,
                    state.status,
                    state.current_tasks.len(),
                    state.completed_tasks,
                    state.failed_tasks,
                    state.performance.quality_score
                );
            }
        }
        Command::Cancel(id) => {
            swarm.cancel_task(id).await?;
            println!("cancelled {id}");
        }
        Command::Batch(invocations) => {
            let outcome = batches.execute(&invocations).await;
            for result in &outcome.results {
                match &result.error {
                    None => println!("  ok   {} {}", result.tool_name, result.output),
                    Some(e) => println!("  fail {} {e}", result.tool_name),
                }
            }
            println!(
                "  {} batch(es), {} parallel, {} sequential, {:?}",
                outcome.batch_count, outcome.parallel_count, outcome.sequential_count, outcome.elapsed
            );
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _log_guard = init_tracing();

    let config = OrchestrationConfig::from_env()?;
    eprintln!("🤖 AI Assist swarm v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Max tasks: {}, timeout: {:?}, retries: {}",
        config.max_concurrent_tasks, config.task_timeout, config.retry_attempts
    );
    eprintln!("   Type 'help' for commands.\n");

    let swarm = Swarm::new(config)?;
    register_default_agents(&swarm, Arc::new(DryRunExecutor::default()))?;

    let batches = BatchExecutor::new(Arc::new(ToolRegistry::with_builtins()));

    let mut events = Box::pin(swarm.event_stream());
    let printer = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            print_event(&event);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break, // EOF
            Err(e) => {
                tracing::error!(error = %e, "Error reading stdin");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match Command::parse(line) {
            Ok(Command::Quit) => break,
            Ok(command) => {
                if let Err(e) = handle(command, &swarm, &batches).await {
                    eprintln!("error: {e}");
                }
            }
            Err(e) => eprintln!("{e}"),
        }
    }

    swarm.shutdown().await;
    printer.abort();
    Ok(())
}
