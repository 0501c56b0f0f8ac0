//! Stable exit codes for planloop CLI commands.

use crate::orchestrator::OrchestratorError;

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid config, usage or I/O failure, including a missing agent.
pub const INVALID: i32 = 1;
/// An agent output could not be reconciled with the run memory.
pub const CONTRACT_VIOLATION: i32 = 2;
/// An agent failed to produce a valid output.
pub const AGENT_FAILED: i32 = 3;
/// The run hit `max_steps` before completing.
pub const STEP_LIMIT: i32 = 4;

/// Exit code for a failed command.
pub fn for_error(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<OrchestratorError>() {
        Some(OrchestratorError::Contract(_)) => CONTRACT_VIOLATION,
        Some(OrchestratorError::Invocation { .. }) => AGENT_FAILED,
        Some(OrchestratorError::StepLimitExceeded { .. }) => STEP_LIMIT,
        Some(OrchestratorError::MissingAgent(_) | OrchestratorError::AlreadyCompleted) | None => {
            INVALID
        }
    }
}
