//! Prompt builders for workers, judges, and planners.
//!
//! Each builder returns the full user-message text for one backend call.
//! Strategy-specific worker prompts deliberately diverge in approach so
//! the two outputs of a pair explore different parts of the solution
//! space; the judge rubric mirrors the weight profile for the task's
//! category so the model scores the dimensions that actually count.

use crate::core::{weights_for, Category, TaskSpec, WeightProfile};
use crate::judge::RetryFeedback;
use crate::worker::WorkerStrategy;

/// System message for worker calls.
pub const WORKER_SYSTEM: &str =
    "You are an expert engineer. Produce exactly the requested output, nothing else.";

/// System message for judge calls.
pub const JUDGE_SYSTEM: &str = "You are an expert reviewer and technical judge. \
     Evaluate both outputs objectively using the provided criteria.";

/// System message for planner calls.
pub const PLANNER_SYSTEM: &str = "You are an expert at planning software work. \
     Decompose goals into atomic, executable tasks.";

/// System message for planning-judge calls.
pub const PLANNING_JUDGE_SYSTEM: &str = "You are an expert at evaluating development plans. \
     Compare plans objectively using structured criteria.";

fn or_none(text: &str) -> &str {
    if text.is_empty() {
        "(none)"
    } else {
        text
    }
}

fn task_block(task: &TaskSpec) -> String {
    let constraints = if task.constraints.is_empty() {
        "(none)".to_string()
    } else {
        task.constraints
            .iter()
            .map(|c| format!("- {c}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "TASK: {}\n\nINPUT:\n{}\n\nCONSTRAINTS:\n{}\n\nOUTPUT SPECIFICATION:\n{}",
        task.description,
        or_none(&task.input),
        constraints,
        or_none(&task.output),
    )
}

fn strategy_guidance(strategy: WorkerStrategy) -> &'static str {
    match strategy {
        WorkerStrategy::Pragmatic => {
            "Your approach:\n\
             - Write clean, idiomatic output that works\n\
             - Follow common patterns, keep it simple and readable\n\
             - Cover the basic failure modes\n\
             - Make it maintainable"
        }
        WorkerStrategy::SecurityFirst => {
            "Your approach:\n\
             - Think through ALL edge cases (null, empty, invalid input)\n\
             - Consider security implications (injection, overflow, auth)\n\
             - Validate every input and handle every error\n\
             - Watch for race conditions and concurrency hazards"
        }
        WorkerStrategy::PerformanceFirst => {
            "Your approach:\n\
             - Optimize time and space complexity\n\
             - Choose efficient data structures\n\
             - Cut unnecessary work, consider caching\n\
             - Keep the result readable despite the optimization"
        }
        WorkerStrategy::Comprehensive => {
            "Think through:\n\
             1. What are the core requirements?\n\
             2. What edge cases exist?\n\
             3. What could go wrong?\n\
             4. How will this be tested and maintained?\n\
             5. What are the performance and security implications?"
        }
    }
}

/// Build the prompt for a worker's first attempt at a task.
pub fn worker_prompt(task: &TaskSpec, strategy: WorkerStrategy) -> String {
    format!(
        "{}\n\n{}\n\nDeliver ONLY the requested output. No explanations unless explicitly asked.",
        task_block(task),
        strategy_guidance(strategy),
    )
}

/// Build the prompt for a retry attempt, carrying the judge's feedback.
pub fn worker_retry_prompt(
    task: &TaskSpec,
    strategy: WorkerStrategy,
    feedback: &RetryFeedback,
) -> String {
    let concerns = if feedback.concerns.is_empty() {
        "(no specific concerns recorded)".to_string()
    } else {
        feedback
            .concerns
            .iter()
            .map(|c| format!("- {c}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "You are retrying a task. A previous attempt was rejected.\n\n{}\n\n{}\n\n\
         PREVIOUS ATTEMPT HAD THESE ISSUES:\n{}\n\n\
         GUIDANCE FOR THIS RETRY:\n{}\n\n\
         Address every concern above and produce an improved output.",
        task_block(task),
        strategy_guidance(strategy),
        concerns,
        or_none(&feedback.recommendation),
    )
}

fn rubric_line(name: &str, weight: f64, detail: &str) -> Option<String> {
    if weight <= 0.0 {
        return None;
    }
    Some(format!("- {} ({:.0}%): {}", name, weight * 100.0, detail))
}

/// Render the scoring rubric for a category from its weight profile.
fn rubric_for(category: Category) -> String {
    let w: WeightProfile = weights_for(category);
    [
        rubric_line("correctness", w.correctness, "solves the problem, no logical errors"),
        rubric_line("completeness", w.completeness, "all constraints satisfied, nothing missing"),
        rubric_line("edge_cases", w.edge_cases, "errors, nulls, boundary conditions handled"),
        rubric_line("security", w.security, "input sanitization, no vulnerabilities"),
        rubric_line("code_quality", w.code_quality, "clear naming, good structure, conventions"),
        rubric_line("performance", w.performance, "efficient time and space, no wasted work"),
        rubric_line("clarity", w.clarity, "easy to follow, well expressed"),
        rubric_line("structure", w.structure, "logical organization and flow"),
        rubric_line("accuracy", w.accuracy, "factually correct, faithful to the input"),
        rubric_line("relevance", w.relevance, "on topic, addresses the actual request"),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join("\n")
}

/// Build the judge prompt comparing two worker outputs.
#[allow(clippy::too_many_arguments)]
pub fn judge_prompt(
    task: &TaskSpec,
    a_model: &str,
    a_strategy: WorkerStrategy,
    a_output: &str,
    b_model: &str,
    b_strategy: WorkerStrategy,
    b_output: &str,
) -> String {
    format!(
        "You are evaluating two outputs for the same task.\n\n\
         TASK: {}\n\n\
         OUTPUT A ({a_model} - {a_strategy}):\n```\n{a_output}\n```\n\n\
         OUTPUT B ({b_model} - {b_strategy}):\n```\n{b_output}\n```\n\n\
         SCORE EACH OUTPUT 0-100 ON:\n{}\n\n\
         DECISION RULES:\n\
         - If both score >85: pick the simpler/cleaner one\n\
         - If one scores >85 and the other <85: pick the better one\n\
         - If both score <85: REJECT_BOTH\n\
         - If scores are within 5 points: consider MERGE\n\n\
         OUTPUT FORMAT (JSON):\n\
         {{\n\
         \"verdict\": \"ACCEPT_A\" | \"ACCEPT_B\" | \"REJECT_BOTH\" | \"MERGE\",\n\
         \"confidence\": 0.0-1.0,\n\
         \"worker_a_scores\": {{\"correctness\": 0-100, ...}},\n\
         \"worker_b_scores\": {{\"correctness\": 0-100, ...}},\n\
         \"reasoning\": \"Step-by-step analysis of both outputs\",\n\
         \"concerns\": [\"...\"],\n\
         \"winner_justification\": \"Why this output is better\",\n\
         \"recommendation\": \"If rejected, what guidance for retry?\"\n\
         }}",
        task.description,
        rubric_for(task.category),
    )
}

/// Build the prompt for a planner attempt.
///
/// `extra_context` carries validation issues or the planning judge's
/// recommendation on retry attempts.
pub fn planner_prompt(goal: &str, strategy: WorkerStrategy, extra_context: Option<&str>) -> String {
    let approach = match strategy {
        WorkerStrategy::Comprehensive => {
            "Think through:\n\
             1. What are ALL the components needed?\n\
             2. What edge cases must be handled?\n\
             3. What are the hidden dependencies?\n\
             4. What validation and testing is needed?\n\n\
             Include validation tasks, error handling tasks, and setup/teardown tasks."
        }
        _ => {
            "Requirements:\n\
             - Each task must be small and independently testable\n\
             - Each task must have clear input/output\n\
             - Include task dependencies (which tasks must complete first)\n\
             - Be practical, do not over-decompose"
        }
    };
    let context = match extra_context {
        Some(ctx) => format!("\n\nADDITIONAL CONTEXT FROM A PREVIOUS ATTEMPT:\n{ctx}\n"),
        None => String::new(),
    };
    format!(
        "Break down this goal into atomic, executable tasks.\n\n\
         GOAL: {goal}\n{context}\n{approach}\n\n\
         Output format (JSON):\n\
         {{\n\
         \"tasks\": [{{\n\
         \"id\": \"T1\",\n\
         \"description\": \"Clear, actionable description\",\n\
         \"input\": \"What it needs\",\n\
         \"output\": \"What it produces\",\n\
         \"estimated_lines\": 30,\n\
         \"dependencies\": [],\n\
         \"criticality\": \"simple\" | \"standard\" | \"important\" | \"critical\",\n\
         \"category\": \"code\" | \"writing\" | \"analysis\" | \"general\" | ...\n\
         }}],\n\
         \"edges\": [[\"T1\", \"T2\"]]\n\
         }}"
    )
}

/// Build the planning-judge prompt comparing two plans.
pub fn planning_judge_prompt(
    goal: &str,
    a_model: &str,
    plan_a_json: &str,
    b_model: &str,
    plan_b_json: &str,
) -> String {
    format!(
        "You are evaluating two task decomposition plans for the same goal.\n\n\
         GOAL: {goal}\n\n\
         PLAN A ({a_model} - pragmatic):\n{plan_a_json}\n\n\
         PLAN B ({b_model} - comprehensive):\n{plan_b_json}\n\n\
         EVALUATION CRITERIA:\n\
         - completeness (30%): all necessary tasks identified, including validation\n\
         - atomicity (25%): each task has one clear purpose and reasonable size\n\
         - dependencies (25%): correctly identified, valid DAG, nothing hidden\n\
         - testability (10%): each task independently verifiable\n\
         - practicality (10%): implementable, not over-decomposed\n\n\
         DECISION OPTIONS:\n\
         - ACCEPT_A: plan A is significantly better\n\
         - ACCEPT_B: plan B is significantly better\n\
         - MERGE: both have strengths, merge them\n\
         - REJECT_BOTH: neither is adequate\n\n\
         OUTPUT (JSON):\n\
         {{\n\
         \"verdict\": \"ACCEPT_A\" | \"ACCEPT_B\" | \"MERGE\" | \"REJECT_BOTH\",\n\
         \"confidence\": 0.0-1.0,\n\
         \"plan_a_score\": 0-100,\n\
         \"plan_b_score\": 0-100,\n\
         \"reasoning\": \"...\",\n\
         \"merge_strategy\": {{\"take_from_a\": [\"T1\"], \"take_from_b\": [\"T2\"]}},\n\
         \"recommendation\": \"If rejected or merged, what to fix\"\n\
         }}"
    )
}
