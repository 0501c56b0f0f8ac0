//! Planner agent: decides the next task or declares the objective complete.

use std::cell::Cell;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::types::PlannerOutput;
use crate::io::backend::{Backend, execute_and_load_json};
use crate::io::prompt::PromptBuilder;

use super::{Agent, AgentSettings, RoleInput, RoleOutput, prepare_request, write_output_schema};

const PLANNER_OUTPUT_SCHEMA: &str = include_str!("../../schemas/planner_output.schema.json");

/// Planner agent backed by an external agent process.
///
/// Stateless between calls: every invocation sees only the derived planner input.
pub struct PlannerAgent<B: Backend> {
    name: String,
    backend: B,
    settings: AgentSettings,
    schema_path: PathBuf,
    schema: Value,
    calls: Cell<u32>,
}

impl<B: Backend> PlannerAgent<B> {
    pub fn new(name: impl Into<String>, backend: B, settings: AgentSettings) -> Result<Self> {
        let schema = serde_json::from_str(PLANNER_OUTPUT_SCHEMA).context("parse planner schema")?;
        Ok(Self {
            name: name.into(),
            backend,
            schema_path: settings
                .artifacts_dir
                .join("schemas")
                .join("planner_output.schema.json"),
            settings,
            schema,
            calls: Cell::new(0),
        })
    }
}

impl<B: Backend> Agent for PlannerAgent<B> {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(agent = %self.name, call = self.calls.get() + 1))]
    fn invoke(&self, input: &RoleInput) -> Result<RoleOutput> {
        let RoleInput::Plan(input) = input else {
            bail!(
                "planner agent '{}' cannot handle {} input",
                self.name,
                input.state()
            );
        };

        write_output_schema(&self.schema_path, PLANNER_OUTPUT_SCHEMA)?;
        let prompt = PromptBuilder::new(self.settings.prompt_budget_bytes).build_planner(input)?;
        let request =
            prepare_request(&self.settings, &self.name, &self.calls, &self.schema_path, prompt)?;

        let output: PlannerOutput = execute_and_load_json(&self.backend, &request, &self.schema)?;
        debug!(
            is_complete = output.is_complete,
            has_next_task = output.next_task.is_some(),
            "parsed planner output"
        );
        Ok(RoleOutput::Plan(output))
    }
}
