// ABOUTME: Script execution module for the lockstep runner
// ABOUTME: Runs parsed scripts step by step and reports their results

pub mod error;
pub mod result;
pub mod runner;

pub use error::{ExecutionError, Result};
pub use result::{RunResult, RunStatus, StepResult, StepStatus};
pub use runner::ScriptRunner;
