// ABOUTME: Parser module for YAML script definitions
// ABOUTME: Exports script parsing, step normalization and validation

pub mod error;
pub mod script;
pub mod validation;

pub use error::{ParserError, ValidationError};
pub use script::{Script, ScriptParser, Step};
pub use validation::{ScriptValidator, ValidationReport};
