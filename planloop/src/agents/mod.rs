//! Role agents and the dispatch contract the orchestrator depends on.
//!
//! The orchestrator only sees [`Agent`]: a named capability that turns a
//! [`RoleInput`] into a [`RoleOutput`]. [`planner::PlannerAgent`] and
//! [`executor::ExecutorAgent`] fulfil it by running an external agent CLI.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::core::types::{ExecutorInput, ExecutorOutput, PlannerInput, PlannerOutput, State};
use crate::io::backend::BackendRequest;

pub mod executor;
pub mod planner;

/// Input for a single role invocation, tagged by role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleInput {
    Plan(PlannerInput),
    Execute(ExecutorInput),
}

impl RoleInput {
    /// State this input is dispatched from.
    pub fn state(&self) -> State {
        match self {
            RoleInput::Plan(_) => State::Plan,
            RoleInput::Execute(_) => State::Execute,
        }
    }
}

/// Output of a single role invocation, tagged by role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleOutput {
    Plan(PlannerOutput),
    Execute(ExecutorOutput),
}

impl RoleOutput {
    /// State whose reconciliation rules apply to this output.
    pub fn state(&self) -> State {
        match self {
            RoleOutput::Plan(_) => State::Plan,
            RoleOutput::Execute(_) => State::Execute,
        }
    }
}

/// A role invoker. Blocks until it has an output or fails.
///
/// Implementations never see the run memory, only the derived input.
pub trait Agent {
    /// Human-readable agent name used in logs and progress output.
    fn name(&self) -> &str;

    fn invoke(&self, input: &RoleInput) -> Result<RoleOutput>;
}

/// Registered agents keyed by the state they serve.
pub type AgentMap = BTreeMap<State, Box<dyn Agent>>;

pub(crate) fn write_output_schema(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create schema dir {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write schema {}", path.display()))
}

/// Settings shared by the process-backed agents.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Working directory handed to the backend.
    pub workdir: PathBuf,
    /// Root for per-invocation artifacts (`<name>/<call>/`).
    pub artifacts_dir: PathBuf,
    pub prompt_budget_bytes: usize,
    pub output_limit_bytes: usize,
    pub timeout: Duration,
}

/// Allocate the next invocation directory, store the prompt and build the request.
pub(crate) fn prepare_request(
    settings: &AgentSettings,
    name: &str,
    calls: &Cell<u32>,
    schema_path: &Path,
    prompt: String,
) -> Result<BackendRequest> {
    let call = calls.get() + 1;
    calls.set(call);

    let call_dir = settings.artifacts_dir.join(name).join(call.to_string());
    fs::create_dir_all(&call_dir)
        .with_context(|| format!("create invocation dir {}", call_dir.display()))?;
    let prompt_path = call_dir.join("prompt.md");
    fs::write(&prompt_path, &prompt)
        .with_context(|| format!("write prompt {}", prompt_path.display()))?;

    Ok(BackendRequest {
        workdir: settings.workdir.clone(),
        prompt,
        output_schema_path: schema_path.to_path_buf(),
        output_path: call_dir.join("output.json"),
        log_path: call_dir.join("backend.log"),
        timeout: settings.timeout,
        output_limit_bytes: settings.output_limit_bytes,
    })
}
