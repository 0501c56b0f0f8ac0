//! Shared deterministic types for the planner/executor loop.
//!
//! These types define the stable contracts between the orchestrator and the
//! role agents. They carry no behavior beyond serialization.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a task within a run. Positive, assigned positionally.
pub type TaskId = u32;

/// State of the loop. Drives which role is dispatched next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Plan,
    Execute,
    Completed,
}

impl State {
    /// States that dispatch to an agent, in dispatch order.
    pub const NON_TERMINAL: [State; 2] = [State::Plan, State::Execute];

    pub fn as_str(self) -> &'static str {
        match self {
            State::Plan => "plan",
            State::Execute => "execute",
            State::Completed => "completed",
        }
    }

    pub fn is_terminal(self) -> bool {
        match self {
            State::Plan | State::Execute => false,
            State::Completed => true,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of executable work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    /// Absent until the executor reports a result; never cleared afterwards.
    pub result: Option<String>,
}

impl Task {
    pub fn is_resolved(&self) -> bool {
        self.result.is_some()
    }
}

/// Input handed to the planner role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerInput {
    pub objective: String,
    pub task_for_review: Option<Task>,
    pub completed_tasks: Vec<Task>,
}

/// Structured output produced by the planner role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerOutput {
    pub is_complete: bool,
    /// Description of the next task to execute.
    pub next_task: Option<String>,
    pub final_response: Option<String>,
}

/// Input handed to the executor role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorInput {
    pub task: Task,
}

/// Task record as reported back by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedTask {
    pub id: TaskId,
    pub description: String,
    pub result: String,
}

/// Structured output produced by the executor role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorOutput {
    pub completed_task: CompletedTask,
}

/// Summary of a single state transition applied by reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: State,
    pub to: State,
    /// Task created (planning) or resolved (execution) by this transition.
    pub task_id: Option<TaskId>,
}
