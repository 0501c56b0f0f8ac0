//! Run memory shared by both roles and owned by the orchestrator.

use serde::Serialize;

use crate::core::types::{State, Task, TaskId};

/// Entire run state. Mutated only through [`crate::core::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Memory {
    pub(crate) objective: String,
    pub(crate) task_list: Vec<Task>,
    /// Id of the entry in `task_list` currently being worked on.
    #[serde(rename = "current_task_id")]
    pub(crate) current_task: Option<TaskId>,
    pub(crate) final_response: Option<String>,
    pub(crate) current_state: State,
}

impl Memory {
    /// Fresh memory for `objective`: planning, no tasks, no response.
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            objective: objective.into(),
            task_list: Vec::new(),
            current_task: None,
            final_response: None,
            current_state: State::Plan,
        }
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    pub fn task_list(&self) -> &[Task] {
        &self.task_list
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.current_task.and_then(|id| self.task(id))
    }

    pub fn final_response(&self) -> Option<&str> {
        self.final_response.as_deref()
    }

    pub fn current_state(&self) -> State {
        self.current_state
    }

    /// First task with `id`, if any.
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.task_list.iter().find(|task| task.id == id)
    }

    /// Tasks that have a result, in creation order.
    pub fn completed_tasks(&self) -> Vec<Task> {
        self.task_list
            .iter()
            .filter(|task| task.is_resolved())
            .cloned()
            .collect()
    }

    /// Check the memory invariants:
    /// - task ids are `1..=len` in list order
    /// - `current_task` refers to an entry of `task_list`
    /// - EXECUTE has a current task, PLAN and COMPLETED do not
    /// - `final_response` is present iff the run is COMPLETED
    pub fn check_invariants(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (idx, task) in self.task_list.iter().enumerate() {
            let expected = idx as TaskId + 1;
            if task.id != expected {
                errors.push(format!(
                    "task at position {idx} has id {} (expected {expected})",
                    task.id
                ));
            }
        }

        if let Some(id) = self.current_task
            && self.task(id).is_none()
        {
            errors.push(format!("current task {id} is not in the task list"));
        }

        match self.current_state {
            State::Execute => {
                if self.current_task.is_none() {
                    errors.push("state execute requires a current task".to_string());
                }
            }
            State::Plan | State::Completed => {
                if let Some(id) = self.current_task {
                    errors.push(format!(
                        "state {} must not have a current task (found {id})",
                        self.current_state
                    ));
                }
            }
        }

        let completed = self.current_state == State::Completed;
        if completed != self.final_response.is_some() {
            errors.push(format!(
                "final response must be set iff completed (state {}, final response {})",
                self.current_state,
                if self.final_response.is_some() {
                    "present"
                } else {
                    "absent"
                }
            ));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: TaskId, result: Option<&str>) -> Task {
        Task {
            id,
            description: format!("task {id}"),
            result: result.map(str::to_string),
        }
    }

    #[test]
    fn new_memory_starts_in_plan_with_nothing_pending() {
        let memory = Memory::new("write a report");
        assert_eq!(memory.objective(), "write a report");
        assert_eq!(memory.current_state(), State::Plan);
        assert!(memory.task_list().is_empty());
        assert!(memory.current_task().is_none());
        assert!(memory.final_response().is_none());
        assert!(memory.check_invariants().is_empty());
    }

    #[test]
    fn completed_tasks_keeps_list_order() {
        let mut memory = Memory::new("x");
        memory.task_list = vec![task(1, Some("a")), task(2, None), task(3, Some("c"))];
        let ids: Vec<TaskId> = memory.completed_tasks().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn check_invariants_reports_errors() {
        let mut memory = Memory::new("x");
        memory.task_list = vec![task(2, None)];
        memory.current_task = Some(7);
        memory.current_state = State::Completed;

        let errors = memory.check_invariants();
        assert!(errors.iter().any(|err| err.contains("expected 1")));
        assert!(errors.iter().any(|err| err.contains("not in the task list")));
        assert!(errors.iter().any(|err| err.contains("must not have a current task")));
        assert!(errors.iter().any(|err| err.contains("final response")));
    }

    #[test]
    fn execute_without_task_is_reported() {
        let mut memory = Memory::new("x");
        memory.current_state = State::Execute;
        let errors = memory.check_invariants();
        assert_eq!(errors, vec!["state execute requires a current task".to_string()]);
    }

    #[test]
    fn serializes_current_task_as_id() {
        let mut memory = Memory::new("x");
        memory.task_list = vec![task(1, None)];
        memory.current_task = Some(1);
        memory.current_state = State::Execute;

        let value = serde_json::to_value(&memory).expect("serialize");
        assert_eq!(value["current_task_id"], 1);
        assert_eq!(value["current_state"], "execute");
    }
}
