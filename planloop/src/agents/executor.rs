//! Executor agent for carrying out a single task.

use std::cell::Cell;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::types::ExecutorOutput;
use crate::io::backend::{Backend, execute_and_load_json};
use crate::io::prompt::PromptBuilder;

use super::{Agent, AgentSettings, RoleInput, RoleOutput, prepare_request, write_output_schema};

const EXECUTOR_OUTPUT_SCHEMA: &str = include_str!("../../schemas/executor_output.schema.json");

/// Executor agent wrapper that owns schema and prompt settings.
pub struct ExecutorAgent<B: Backend> {
    name: String,
    backend: B,
    settings: AgentSettings,
    schema_path: PathBuf,
    schema: Value,
    calls: Cell<u32>,
}

impl<B: Backend> ExecutorAgent<B> {
    pub fn new(name: impl Into<String>, backend: B, settings: AgentSettings) -> Result<Self> {
        let schema =
            serde_json::from_str(EXECUTOR_OUTPUT_SCHEMA).context("parse executor schema")?;
        Ok(Self {
            name: name.into(),
            backend,
            schema_path: settings
                .artifacts_dir
                .join("schemas")
                .join("executor_output.schema.json"),
            settings,
            schema,
            calls: Cell::new(0),
        })
    }
}

impl<B: Backend> Agent for ExecutorAgent<B> {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(agent = %self.name, call = self.calls.get() + 1))]
    fn invoke(&self, input: &RoleInput) -> Result<RoleOutput> {
        let RoleInput::Execute(input) = input else {
            bail!(
                "executor agent '{}' cannot handle {} input",
                self.name,
                input.state()
            );
        };

        write_output_schema(&self.schema_path, EXECUTOR_OUTPUT_SCHEMA)?;
        let prompt = PromptBuilder::new(self.settings.prompt_budget_bytes).build_executor(input)?;
        let request =
            prepare_request(&self.settings, &self.name, &self.calls, &self.schema_path, prompt)?;

        let output: ExecutorOutput = execute_and_load_json(&self.backend, &request, &self.schema)?;
        debug!(
            task_id = output.completed_task.id,
            result_len = output.completed_task.result.len(),
            "parsed executor output"
        );
        Ok(RoleOutput::Execute(output))
    }
}
