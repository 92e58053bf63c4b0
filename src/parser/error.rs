// ABOUTME: Error types for script parsing and validation
// ABOUTME: Defines specific error types for parser module operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Failed to read script file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid script format: {0}")]
    InvalidFormat(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("Empty script: no steps defined")]
    EmptyScript,

    #[error("Step {step} must be a mapping with exactly one action key: {reason}")]
    MalformedStep { step: usize, reason: String },

    #[error("Unsupported action '{action}' in step {step}. Supported actions: {supported:?}")]
    UnsupportedAction {
        step: usize,
        action: String,
        supported: Vec<String>,
    },

    #[error("Invalid configuration for '{action}' in step {step}: {reason}")]
    InvalidStepConfig {
        step: usize,
        action: String,
        reason: String,
    },

    #[error("Invalid template syntax in '{field}': {error}")]
    InvalidTemplate { field: String, error: String },

    #[error("Invalid output configuration: {reason}")]
    InvalidOutput { reason: String },
}

pub type Result<T> = std::result::Result<T, ParserError>;
