//! Orchestrator-owned state transitions.
//!
//! Role inputs are derived views of [`Memory`]; role outputs are folded back
//! into it here. A rejected output leaves the memory untouched.

use thiserror::Error;
use tracing::warn;

use crate::core::memory::Memory;
use crate::core::types::{
    ExecutorInput, ExecutorOutput, PlannerInput, PlannerOutput, State, Task, TaskId, Transition,
};

/// Role output that cannot be applied to the current memory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("planner output declares neither completion nor a next task")]
    MissingNextTask,
    #[error("executor output refers to unknown task id {0}")]
    UnknownTaskId(TaskId),
    #[error("cannot apply {expected} output while in state {actual}")]
    WrongState { expected: State, actual: State },
    #[error("state execute has no current task to dispatch")]
    MissingCurrentTask,
}

/// Build the planner's view of `memory`.
///
/// `task_for_review` is the current task. Execution clears it, so in PLAN it
/// is absent and executed tasks reach the planner through `completed_tasks`.
pub fn planner_input(memory: &Memory) -> PlannerInput {
    PlannerInput {
        objective: memory.objective().to_string(),
        task_for_review: memory.current_task().cloned(),
        completed_tasks: memory.completed_tasks(),
    }
}

/// Build the executor's view of `memory`. `None` when no task is pending.
pub fn executor_input(memory: &Memory) -> Option<ExecutorInput> {
    memory
        .current_task()
        .map(|task| ExecutorInput { task: task.clone() })
}

/// Apply a planner output: complete the run or enqueue the next task.
pub fn apply_planner_output(
    memory: &mut Memory,
    output: PlannerOutput,
) -> Result<Transition, ContractViolation> {
    ensure_state(memory, State::Plan)?;

    if output.is_complete {
        memory.current_state = State::Completed;
        memory.current_task = None;
        memory.final_response = Some(output.final_response.unwrap_or_default());
        return Ok(Transition {
            from: State::Plan,
            to: State::Completed,
            task_id: None,
        });
    }

    let Some(description) = output.next_task else {
        return Err(ContractViolation::MissingNextTask);
    };

    let id = memory.task_list.len() as TaskId + 1;
    memory.task_list.push(Task {
        id,
        description,
        result: None,
    });
    memory.current_task = Some(id);
    memory.current_state = State::Execute;

    Ok(Transition {
        from: State::Plan,
        to: State::Execute,
        task_id: Some(id),
    })
}

/// Apply an executor output: record the result and hand control back to the planner.
pub fn apply_executor_output(
    memory: &mut Memory,
    output: ExecutorOutput,
) -> Result<Transition, ContractViolation> {
    ensure_state(memory, State::Execute)?;

    let completed = output.completed_task;
    if memory.current_task != Some(completed.id) {
        warn!(
            reported = completed.id,
            current = ?memory.current_task,
            "executor reported a task other than the current one"
        );
    }

    let task = memory
        .task_list
        .iter_mut()
        .find(|task| task.id == completed.id)
        .ok_or(ContractViolation::UnknownTaskId(completed.id))?;

    match &task.result {
        Some(_) => warn!(task_id = task.id, "task already has a result; keeping it"),
        None => task.result = Some(completed.result),
    }

    memory.current_task = None;
    memory.current_state = State::Plan;

    Ok(Transition {
        from: State::Execute,
        to: State::Plan,
        task_id: Some(completed.id),
    })
}

fn ensure_state(memory: &Memory, expected: State) -> Result<(), ContractViolation> {
    if memory.current_state != expected {
        return Err(ContractViolation::WrongState {
            expected,
            actual: memory.current_state,
        });
    }
    Ok(())
}
