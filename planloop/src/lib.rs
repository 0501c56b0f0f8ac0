//! Planner/executor agent loop.
//!
//! A planner agent breaks an objective into tasks one at a time; an executor
//! agent carries out each task. The orchestrator owns the run memory and is
//! the only place that mutates it.
//!
//! - **[`core`]**: Pure, deterministic logic (memory, reconciliation, types).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config, prompts, agent processes).
//! - **[`agents`]**: Role agents backed by an external agent CLI.
//!
//! [`orchestrator`] drives the loop; [`report`] renders its progress.

pub mod agents;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod orchestrator;
pub mod report;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
