// ABOUTME: Template module: tokenizer, path resolution, filters and co-iteration
// ABOUTME: Provides the interpolation engine shared by every action

pub mod cursor;
pub mod engine;
pub mod error;
pub mod filters;
pub mod parser;
pub mod pattern;
pub mod resolver;
pub mod session;
pub mod value;

pub use cursor::{ArrayHandle, CoIteration, CursorTable, Pass, Step};
pub use engine::Interpolator;
pub use error::{Result, TemplateError};
pub use filters::{FilterContext, FilterFn, FilterRegistry};
pub use parser::{FilterCall, PathExpr, Segment, Template, Token};
pub use pattern::{compile_pattern, compile_source, extract_pattern, PatternDescriptor};
pub use session::Session;
pub use value::Value;
