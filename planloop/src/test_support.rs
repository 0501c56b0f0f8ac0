//! Scripted agents and output builders for loop tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::{Result, anyhow};

use crate::agents::{Agent, RoleInput, RoleOutput};
use crate::core::types::{CompletedTask, ExecutorOutput, PlannerOutput, TaskId};

/// Agent that replays queued outputs and records every input it receives.
///
/// Clones share the script, so a test can box one clone into an
/// [`crate::agents::AgentMap`] and inspect another afterwards.
#[derive(Clone)]
pub struct ScriptedAgent {
    name: String,
    outputs: Rc<RefCell<VecDeque<Result<RoleOutput>>>>,
    inputs: Rc<RefCell<Vec<RoleInput>>>,
}

impl ScriptedAgent {
    pub fn new(name: &str, outputs: Vec<Result<RoleOutput>>) -> Self {
        Self {
            name: name.to_string(),
            outputs: Rc::new(RefCell::new(outputs.into())),
            inputs: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Handle to the recorded inputs; stays valid after the agent is boxed.
    pub fn inputs(&self) -> Rc<RefCell<Vec<RoleInput>>> {
        Rc::clone(&self.inputs)
    }

    pub fn remaining(&self) -> usize {
        self.outputs.borrow().len()
    }

    pub fn assert_drained(&self) {
        assert_eq!(
            self.remaining(),
            0,
            "agent '{}' has unused scripted outputs",
            self.name
        );
    }
}

impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, input: &RoleInput) -> Result<RoleOutput> {
        self.inputs.borrow_mut().push(input.clone());
        self.outputs
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("agent '{}' ran out of scripted outputs", self.name)))
    }
}

/// Planner output requesting `description` as the next task.
pub fn plan_next(description: &str) -> Result<RoleOutput> {
    Ok(RoleOutput::Plan(PlannerOutput {
        is_complete: false,
        next_task: Some(description.to_string()),
        final_response: None,
    }))
}

/// Planner output declaring the objective complete.
pub fn plan_complete(final_response: &str) -> Result<RoleOutput> {
    Ok(RoleOutput::Plan(PlannerOutput {
        is_complete: true,
        next_task: None,
        final_response: Some(final_response.to_string()),
    }))
}

/// Executor output resolving task `id`.
pub fn executed(id: TaskId, description: &str, result: &str) -> Result<RoleOutput> {
    Ok(RoleOutput::Execute(ExecutorOutput {
        completed_task: CompletedTask {
            id,
            description: description.to_string(),
            result: result.to_string(),
        },
    }))
}
