// ABOUTME: Error types for script execution and action processing
// ABOUTME: Wraps template and output failures with the step that raised them

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Step {step} ({action}) failed: {source}")]
    StepFailed {
        step: usize,
        action: String,
        source: Box<ExecutionError>,
    },

    #[error("Action type not supported: {action_type}")]
    ActionNotSupported { action_type: String },

    #[error("Invalid configuration for {action}: {message}")]
    ConfigError { action: String, message: String },

    #[error("Prompt for '{name}' failed: {message}")]
    PromptError { name: String, message: String },

    #[error("Template error: {0}")]
    TemplateError(#[from] crate::template::TemplateError),

    #[error("Output error: {0}")]
    OutputError(#[from] crate::output::OutputError),

    #[error("Parser error: {0}")]
    ParserError(#[from] crate::parser::ParserError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ExecutionError {
    pub fn config(action: &str, message: impl Into<String>) -> Self {
        ExecutionError::ConfigError {
            action: action.to_string(),
            message: message.into(),
        }
    }

    /// The innermost error, looking through step wrappers
    pub fn root_cause(&self) -> &ExecutionError {
        match self {
            ExecutionError::StepFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// The template error behind this failure, if any
    pub fn template_error(&self) -> Option<&crate::template::TemplateError> {
        match self.root_cause() {
            ExecutionError::TemplateError(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecutionError>;
