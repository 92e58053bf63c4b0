// ABOUTME: Built-in script actions and the registry that dispatches them
// ABOUTME: Contains the csv row emitter, prompt, emit and set actions

pub mod csv;
pub mod emit;
pub mod prompt;
pub mod set;

use std::collections::HashMap;
use tracing::trace;

use crate::engine::error::{ExecutionError, Result};
use crate::output::Emitter;
use crate::template::{Interpolator, Session};

pub use prompt::{Prompter, PromptEntry, StdioPrompter};

/// Everything an action may touch while it runs
pub struct ActionContext<'a> {
    pub session: &'a mut Session,
    pub interpolator: &'a Interpolator,
    pub emitter: &'a mut dyn Emitter,
    pub prompter: &'a mut dyn Prompter,
    /// Channel attached to the current step, if any
    pub channel: Option<String>,
    emitted: usize,
}

impl<'a> ActionContext<'a> {
    pub fn new(
        session: &'a mut Session,
        interpolator: &'a Interpolator,
        emitter: &'a mut dyn Emitter,
        prompter: &'a mut dyn Prompter,
    ) -> Self {
        Self {
            session,
            interpolator,
            emitter,
            prompter,
            channel: None,
            emitted: 0,
        }
    }

    pub fn with_channel(mut self, channel: Option<String>) -> Self {
        self.channel = channel;
        self
    }

    /// Hand one line to the emitter on the step's channel
    pub fn emit(&mut self, line: &str) -> Result<()> {
        trace!("emit [{}] {}", self.channel.as_deref().unwrap_or("-"), line);
        self.emitter.emit(line, self.channel.as_deref())?;
        self.emitted += 1;
        Ok(())
    }

    pub fn lines_emitted(&self) -> usize {
        self.emitted
    }
}

pub trait ActionImplementation: Send + Sync {
    fn action_type(&self) -> &'static str;
    fn validate_config(&self, config: &serde_yaml::Value) -> Result<()>;
    fn execute(&self, config: &serde_yaml::Value, context: &mut ActionContext<'_>) -> Result<()>;
}

pub struct ActionRegistry {
    implementations: HashMap<String, Box<dyn ActionImplementation>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            implementations: HashMap::new(),
        };

        registry.register(Box::new(csv::CsvAction));
        registry.register(Box::new(emit::EmitAction));
        registry.register(Box::new(prompt::PromptAction));
        registry.register(Box::new(set::SetAction));

        registry
    }

    pub fn register(&mut self, implementation: Box<dyn ActionImplementation>) {
        let action_type = implementation.action_type().to_string();
        self.implementations.insert(action_type, implementation);
    }

    pub fn get_implementation(&self, action_type: &str) -> Option<&dyn ActionImplementation> {
        self.implementations.get(action_type).map(|imp| imp.as_ref())
    }

    pub fn contains(&self, action_type: &str) -> bool {
        self.implementations.contains_key(action_type)
    }

    pub fn validate_action_config(
        &self,
        action_type: &str,
        config: &serde_yaml::Value,
    ) -> Result<()> {
        self.implementation(action_type)?.validate_config(config)
    }

    pub fn execute_action(
        &self,
        action_type: &str,
        config: &serde_yaml::Value,
        context: &mut ActionContext<'_>,
    ) -> Result<()> {
        self.implementation(action_type)?.execute(config, context)
    }

    pub fn list_supported_actions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.implementations.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    fn implementation(&self, action_type: &str) -> Result<&dyn ActionImplementation> {
        self.get_implementation(action_type)
            .ok_or_else(|| ExecutionError::ActionNotSupported {
                action_type: action_type.to_string(),
            })
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
