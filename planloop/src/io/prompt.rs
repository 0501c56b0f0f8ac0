//! Prompt rendering for the planner and executor roles.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use tracing::debug;

use crate::core::types::{ExecutorInput, PlannerInput, Task};

const PLANNER_TEMPLATE: &str = include_str!("prompts/planner.md");
const EXECUTOR_TEMPLATE: &str = include_str!("prompts/executor.md");
const TRUNCATED_MARKER: &str = " [truncated]";

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template("planner", PLANNER_TEMPLATE)
            .context("load planner template")?;
        env.add_template("executor", EXECUTOR_TEMPLATE)
            .context("load executor template")?;
        Ok(Self { env })
    }

    fn render_planner(&self, input: &PlannerInput) -> Result<String> {
        let template = self.env.get_template("planner")?;
        let rendered = template
            .render(context! {
                objective => input.objective.trim(),
                task_for_review => &input.task_for_review,
                completed_tasks => &input.completed_tasks,
            })
            .context("render planner prompt")?;
        Ok(rendered)
    }

    fn render_executor(&self, input: &ExecutorInput) -> Result<String> {
        let template = self.env.get_template("executor")?;
        let rendered = template
            .render(context! { task => &input.task })
            .context("render executor prompt")?;
        Ok(rendered)
    }
}

/// Renders role prompts within a byte budget.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    budget_bytes: usize,
}

impl PromptBuilder {
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    /// Render the planner prompt.
    ///
    /// Over budget, task results are shortened evenly first; whatever still
    /// overflows is cut at the budget.
    pub fn build_planner(&self, input: &PlannerInput) -> Result<String> {
        let engine = PromptEngine::new()?;
        let mut prompt = engine.render_planner(input)?;
        if prompt.len() > self.budget_bytes {
            let excess = prompt.len() - self.budget_bytes;
            let shortened = shorten_results(input, excess);
            debug!(
                before_len = prompt.len(),
                budget = self.budget_bytes,
                "shortening task results for budget"
            );
            prompt = engine.render_planner(&shortened)?;
        }
        truncate_at_boundary(&mut prompt, self.budget_bytes);
        Ok(prompt)
    }

    /// Render the executor prompt.
    pub fn build_executor(&self, input: &ExecutorInput) -> Result<String> {
        let mut prompt = PromptEngine::new()?.render_executor(input)?;
        truncate_at_boundary(&mut prompt, self.budget_bytes);
        Ok(prompt)
    }
}

/// Copy of `input` whose task results together shrink by at least `excess` bytes.
fn shorten_results(input: &PlannerInput, excess: usize) -> PlannerInput {
    let mut shortened = input.clone();
    let mut results: Vec<&mut Task> = shortened
        .completed_tasks
        .iter_mut()
        .chain(shortened.task_for_review.as_mut())
        .filter(|task| task.result.is_some())
        .collect();
    if results.is_empty() {
        return shortened;
    }

    let total: usize = results
        .iter()
        .filter_map(|task| task.result.as_ref().map(String::len))
        .sum();
    let target = total.saturating_sub(excess + results.len() * TRUNCATED_MARKER.len());
    let allowance = target / results.len();

    for task in &mut results {
        if let Some(result) = task.result.as_mut()
            && result.len() > allowance
        {
            truncate_at_boundary(result, allowance);
            result.push_str(TRUNCATED_MARKER);
        }
    }
    shortened
}

fn truncate_at_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}
