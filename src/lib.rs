// ABOUTME: Main library module for the lockstep interpolation engine and script runner
// ABOUTME: Exports all core modules and provides the public API

pub mod actions;
pub mod cli;
pub mod engine;
pub mod output;
pub mod parser;
pub mod template;

// Re-export commonly used types
pub use actions::{ActionRegistry, Prompter, StdioPrompter};
pub use cli::{App, Args, Config};
pub use engine::{RunResult, RunStatus, ScriptRunner};
pub use output::{ChannelRouter, Emitter, MemoryEmitter, OutputConfig};
pub use parser::{Script, ScriptParser, ScriptValidator};
pub use template::{CoIteration, Interpolator, Pass, Session, TemplateError, Value};

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
