// ABOUTME: Error types for template interpolation operations
// ABOUTME: Covers parsing, path resolution, filters, pattern compilation and cycles

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("Template parse error at offset {offset}: {message}")]
    ParseError { offset: usize, message: String },

    #[error("Unresolved path '{path}' (add an `optional` filter to supply a default)")]
    PathResolutionError { path: String },

    #[error("Index {index} out of range for '{path}' (length {len})")]
    IndexError {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("Unknown filter '{filter}' applied to '{path}'")]
    FilterNotFoundError { path: String, filter: String },

    #[error("Filter '{filter}' cannot be applied to '{path}': {message}")]
    FilterTypeError {
        path: String,
        filter: String,
        message: String,
    },

    #[error("Invalid pattern '{source_text}': {message}")]
    PatternCompileError {
        source_text: String,
        message: String,
    },

    #[error("Cyclic resolution of '{path}'")]
    CyclicResolutionError { path: String },

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl TemplateError {
    pub fn parse(offset: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            offset,
            message: message.into(),
        }
    }

    pub fn filter_type(path: &str, filter: &str, message: impl Into<String>) -> Self {
        Self::FilterTypeError {
            path: path.to_string(),
            filter: filter.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TemplateError>;
