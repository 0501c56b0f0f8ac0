//! I/O helpers for the loop and its agents.

pub mod backend;
pub mod config;
pub mod process;
pub mod prompt;
pub mod schema;
