use std::io::{self, BufRead, Write as _};
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};

use tandem::backend::HttpBackend;
use tandem::config::Config;
use tandem::core::TaskSpec;
use tandem::orchestrator::{
    DualPlannerOrchestrator, DualWorkerOrchestrator, EscalationHandler, ExecutionResult,
    ProgressObserver,
};
use tandem::storage::{PlanDocument, StateStore};
use tandem::{tlog, Result};

/// Tandem - dual-worker task orchestration with judge arbitration
#[derive(Parser, Debug)]
#[command(name = "tandem")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    TANDEM_DEBUG=1    Enable debug logging (alternative to --debug)\n    TANDEM_API_KEY    Bearer token for the completion backend")]
struct Cli {
    /// Enable debug logging (writes to ~/.tandem/tandem.log)
    #[arg(short = 'd', long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Decompose a goal into a validated task plan and store it
    Plan {
        /// The goal in natural language
        goal: String,
    },

    /// Plan a goal and execute the resulting task graph
    Run {
        /// The goal in natural language
        goal: String,
    },

    /// List stored plan session ids
    Plans,
}

/// Escalation handler that asks the operator on the terminal.
struct ConsoleEscalation;

#[async_trait]
impl EscalationHandler for ConsoleEscalation {
    async fn resolve(&self, task: &TaskSpec, result: &ExecutionResult) -> Result<String> {
        println!("\n=== ESCALATION: task {} ===", task.id);
        println!("Task: {}", task.description);
        if let Some(reason) = &result.escalation_reason {
            println!("Reason: {reason}");
        }
        if let Some(decision) = &result.judge_decision {
            println!("Judge reasoning: {}", decision.reasoning);
            for concern in &decision.concerns {
                println!("  concern: {concern}");
            }
        }
        if let Some(a) = &result.worker_a_response {
            println!("\n--- Output A ({}) ---\n{}", a.model_name, a.output);
        }
        if let Some(b) = &result.worker_b_response {
            println!("\n--- Output B ({}) ---\n{}", b.model_name, b.output);
        }
        print!("\nChoose [a/b] or type a replacement output: ");
        io::stdout().flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        let choice = line.trim();

        let chosen = match choice {
            "a" | "A" => result
                .worker_a_response
                .as_ref()
                .map(|r| r.output.clone())
                .unwrap_or_default(),
            "b" | "B" => result
                .worker_b_response
                .as_ref()
                .map(|r| r.output.clone())
                .unwrap_or_default(),
            other => other.to_string(),
        };
        Ok(chosen)
    }
}

/// Progress printer for graph execution.
struct ConsoleProgress;

#[async_trait]
impl ProgressObserver for ConsoleProgress {
    async fn task_finished(&self, task_id: &str, result: &ExecutionResult) {
        println!(
            "  [{}] {} ({} attempt{}, {:.1}s)",
            result.status,
            task_id,
            result.attempts,
            if result.attempts == 1 { "" } else { "s" },
            result.total_secs
        );
    }
}

async fn make_plan(
    config: &Config,
    backend: Arc<HttpBackend>,
    goal: &str,
) -> Result<PlanDocument> {
    let planner = DualPlannerOrchestrator::new(config.clone(), backend);
    let (graph, metadata) = planner.create_validated_plan(goal).await?;
    Ok(PlanDocument::new(goal, graph, metadata))
}

async fn cmd_plan(config: Config, goal: &str) -> Result<()> {
    let backend = Arc::new(HttpBackend::new(&config.backend)?);
    let plan = make_plan(&config, backend, goal).await?;

    let store = StateStore::open(&config.storage_dir()?)?;
    store.save_plan(&plan)?;

    println!("Plan {} ({} via {} attempt{}):", plan.session_id, plan.metadata.verdict, plan.metadata.attempts, if plan.metadata.attempts == 1 { "" } else { "s" });
    for task in &plan.graph.tasks {
        println!(
            "  {} [{}] [{}] {}",
            task.id, task.criticality, task.category, task.description
        );
    }
    for (from, to) in &plan.graph.edges {
        println!("  {from} -> {to}");
    }
    Ok(())
}

async fn cmd_run(config: Config, goal: &str) -> Result<()> {
    let backend = Arc::new(HttpBackend::new(&config.backend)?);
    let plan = make_plan(&config, Arc::clone(&backend), goal).await?;
    let store = StateStore::open(&config.storage_dir()?)?;
    store.save_plan(&plan)?;
    println!(
        "Plan {} accepted ({} tasks), executing...",
        plan.session_id,
        plan.graph.len()
    );

    let orchestrator = DualWorkerOrchestrator::new(config, backend)
        .with_escalation_handler(Arc::new(ConsoleEscalation))
        .with_observer(Arc::new(ConsoleProgress));

    let results = orchestrator.execute_graph(&plan.graph).await?;
    for result in results.values() {
        store.save_execution_result(&plan.session_id, result)?;
    }

    let completed = results
        .values()
        .filter(|r| r.status == tandem::TaskStatus::Completed)
        .count();
    println!("\n{completed}/{} tasks completed", results.len());
    for result in results.values() {
        if let Some(reason) = &result.escalation_reason {
            println!("  {}: {}", result.task_id, reason);
        }
    }
    Ok(())
}

fn cmd_plans(config: Config) -> Result<()> {
    let store = StateStore::open(&config.storage_dir()?)?;
    let plans = store.list_plans()?;
    if plans.is_empty() {
        println!("No stored plans");
        return Ok(());
    }
    for session_id in plans {
        let plan = store.load_plan(&session_id)?;
        println!("{session_id}  {} tasks  {}", plan.graph.len(), plan.goal);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tandem::log::init_with_debug(cli.debug);

    let config = Config::load()?;
    config.ensure_dirs()?;
    tlog!("tandem starting: {:?}", cli.command);

    match cli.command {
        Command::Plan { goal } => cmd_plan(config, &goal).await,
        Command::Run { goal } => cmd_run(config, &goal).await,
        Command::Plans => cmd_plans(config),
    }
}
