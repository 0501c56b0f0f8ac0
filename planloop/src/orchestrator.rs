//! The planner/executor loop.
//!
//! Each step dispatches the agent registered for the current state, then folds
//! its output back into the memory through [`crate::core::reconcile`]. The loop
//! ends when the planner declares the objective complete.

use anyhow::anyhow;
use thiserror::Error;
use tracing::{debug, info};

use crate::agents::{Agent, AgentMap, RoleInput, RoleOutput};
use crate::core::memory::Memory;
use crate::core::reconcile::{
    ContractViolation, apply_executor_output, apply_planner_output, executor_input, planner_input,
};
use crate::core::types::{State, Task, Transition};

/// Fatal loop errors. Nothing here is retried.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("no agent registered for state {0}")]
    MissingAgent(State),
    #[error("contract violation: {0}")]
    Contract(#[from] ContractViolation),
    #[error("agent '{agent}' failed")]
    Invocation {
        agent: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("step limit of {max_steps} exceeded before completion")]
    StepLimitExceeded { max_steps: u32 },
    #[error("run is already completed")]
    AlreadyCompleted,
}

/// Progress notifications for presentation.
#[derive(Debug, Clone, Copy)]
pub enum LoopEvent<'a> {
    /// About to invoke `agent` for `state`.
    Dispatch {
        state: State,
        agent: &'a str,
        memory: &'a Memory,
    },
    /// The executor resolved `task`.
    TaskCompleted { task: &'a Task },
    /// The planner declared the objective complete.
    Completed { memory: &'a Memory },
}

/// Result of a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// 1-based step number within this orchestrator.
    pub step: u32,
    pub agent: String,
    pub transition: Transition,
}

pub struct Orchestrator {
    memory: Memory,
    agents: AgentMap,
    max_steps: Option<u32>,
    steps: u32,
}

impl Orchestrator {
    pub fn new(memory: Memory, agents: AgentMap) -> Self {
        Self {
            memory,
            agents,
            max_steps: None,
            steps: 0,
        }
    }

    /// Bound the number of steps; `None` removes the bound.
    pub fn with_max_steps(mut self, max_steps: Option<u32>) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn into_memory(self) -> Memory {
        self.memory
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Every non-terminal state must have an agent.
    pub fn ensure_agents(&self) -> Result<(), OrchestratorError> {
        for state in State::NON_TERMINAL {
            if !self.agents.contains_key(&state) {
                return Err(OrchestratorError::MissingAgent(state));
            }
        }
        Ok(())
    }

    /// Run a single step without progress events.
    pub fn step(&mut self) -> Result<StepOutcome, OrchestratorError> {
        self.step_with(&mut |_| {})
    }

    /// Run a single step, reporting progress to `on_event`.
    pub fn step_with<F: FnMut(LoopEvent<'_>)>(
        &mut self,
        on_event: &mut F,
    ) -> Result<StepOutcome, OrchestratorError> {
        let state = self.memory.current_state();
        let input = match state {
            State::Plan => RoleInput::Plan(planner_input(&self.memory)),
            State::Execute => {
                let input = executor_input(&self.memory)
                    .ok_or(OrchestratorError::Contract(ContractViolation::MissingCurrentTask))?;
                RoleInput::Execute(input)
            }
            State::Completed => return Err(OrchestratorError::AlreadyCompleted),
        };

        let agent = self
            .agents
            .get(&state)
            .ok_or(OrchestratorError::MissingAgent(state))?;

        if let Some(max_steps) = self.max_steps
            && self.steps >= max_steps
        {
            return Err(OrchestratorError::StepLimitExceeded { max_steps });
        }
        self.steps += 1;
        let step = self.steps;

        on_event(LoopEvent::Dispatch {
            state,
            agent: agent.name(),
            memory: &self.memory,
        });
        debug!(step, %state, agent = agent.name(), "dispatching");
        let output = invoke(agent.as_ref(), &input)?;
        let agent_name = agent.name().to_string();

        let transition = match output {
            RoleOutput::Plan(output) => apply_planner_output(&mut self.memory, output)?,
            RoleOutput::Execute(output) => apply_executor_output(&mut self.memory, output)?,
        };
        debug_assert!(
            self.memory.check_invariants().is_empty(),
            "memory invariants violated: {:?}",
            self.memory.check_invariants()
        );
        info!(
            step,
            from = %transition.from,
            to = %transition.to,
            task_id = ?transition.task_id,
            "transition"
        );

        match transition.to {
            State::Plan => {
                if let Some(task) = transition.task_id.and_then(|id| self.memory.task(id)) {
                    on_event(LoopEvent::TaskCompleted { task });
                }
            }
            State::Completed => on_event(LoopEvent::Completed {
                memory: &self.memory,
            }),
            State::Execute => {}
        }

        Ok(StepOutcome {
            step,
            agent: agent_name,
            transition,
        })
    }

    /// Step until completion and return the final memory.
    pub fn run(self) -> Result<Memory, OrchestratorError> {
        self.run_with(|_| {})
    }

    /// Step until completion, reporting progress to `on_event`.
    pub fn run_with<F: FnMut(LoopEvent<'_>)>(
        mut self,
        mut on_event: F,
    ) -> Result<Memory, OrchestratorError> {
        self.ensure_agents()?;
        while !self.memory.current_state().is_terminal() {
            self.step_with(&mut on_event)?;
        }
        info!(
            steps = self.steps,
            tasks = self.memory.task_list().len(),
            "objective completed"
        );
        Ok(self.memory)
    }
}

fn invoke(agent: &dyn Agent, input: &RoleInput) -> Result<RoleOutput, OrchestratorError> {
    let output = agent
        .invoke(input)
        .map_err(|source| OrchestratorError::Invocation {
            agent: agent.name().to_string(),
            source,
        })?;
    if output.state() != input.state() {
        return Err(OrchestratorError::Invocation {
            agent: agent.name().to_string(),
            source: anyhow!(
                "returned {} output for {} input",
                output.state(),
                input.state()
            ),
        });
    }
    Ok(output)
}
