// ABOUTME: Converts between `/source/flags` literals and pattern descriptors
// ABOUTME: Compiles descriptors, interpolating any tokens in the source first

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::engine::Interpolator;
use super::error::{Result, TemplateError};
use super::parser::contains_token;
use super::session::Session;
use super::value::Value;

const KNOWN_FLAGS: &str = "gimsuxyU";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternDescriptor {
    pub source: String,
    #[serde(default)]
    pub flags: String,
}

impl PatternDescriptor {
    pub fn new(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            flags: flags.into(),
        }
    }

    /// Literal `/source/flags` form
    pub fn to_literal(&self) -> String {
        format!("/{}/{}", self.source.replace('/', "\\/"), self.flags)
    }

    pub fn has_tokens(&self) -> bool {
        contains_token(&self.source)
    }

    /// Accept either a literal string or a `{source, flags}` mapping
    pub fn from_yaml(value: &serde_yaml::Value) -> Result<Self> {
        match value {
            serde_yaml::Value::String(text) => Ok(extract_pattern(text)),
            other => serde_yaml::from_value(other.clone()).map_err(|e| {
                TemplateError::ConfigurationError(format!("invalid pattern: {}", e))
            }),
        }
    }
}

impl fmt::Display for PatternDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_literal())
    }
}

/// Parse `/source/flags`; any other text becomes the source with no flags
pub fn extract_pattern(input: &str) -> PatternDescriptor {
    if input.len() >= 2 && input.starts_with('/') {
        if let Some(end) = input.rfind('/').filter(|end| *end > 0) {
            let flags = &input[end + 1..];
            if flags.chars().all(|c| KNOWN_FLAGS.contains(c)) {
                return PatternDescriptor::new(input[1..end].replace("\\/", "/"), flags);
            }
        }
    }
    PatternDescriptor::new(input, "")
}

/// Interpolate the descriptor's source in manual mode, then compile it
pub fn compile_pattern(
    descriptor: &PatternDescriptor,
    interpolator: &Interpolator,
    session: &Session,
) -> Result<Regex> {
    let source = if descriptor.has_tokens() {
        interpolator
            .interpolate_raw(&Value::String(descriptor.source.clone()), session)?
            .to_display_string()
    } else {
        descriptor.source.clone()
    };
    compile_source(&source, &descriptor.flags)
}

/// Compile already-resolved pattern text with literal-style flags
pub fn compile_source(source: &str, flags: &str) -> Result<Regex> {
    let error = |message: String| TemplateError::PatternCompileError {
        source_text: source.to_string(),
        message,
    };

    let mut builder = RegexBuilder::new(source);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            'U' => builder.swap_greed(true),
            // global/sticky/unicode have no compile-time meaning here
            'g' | 'y' | 'u' => &mut builder,
            other => return Err(error(format!("unsupported flag '{}'", other))),
        };
    }

    builder.build().map_err(|e| error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_literal_form() {
        assert_eq!(
            extract_pattern("/ab+c/i"),
            PatternDescriptor::new("ab+c", "i")
        );
        assert_eq!(extract_pattern("/a\\/b/"), PatternDescriptor::new("a/b", ""));
    }

    #[test]
    fn test_plain_text_is_literal_source() {
        assert_eq!(extract_pattern("^\\d+$"), PatternDescriptor::new("^\\d+$", ""));
        assert_eq!(extract_pattern("/"), PatternDescriptor::new("/", ""));
        // unknown trailing flags mean this was never a literal
        assert_eq!(
            extract_pattern("/usr/local"),
            PatternDescriptor::new("/usr/local", "")
        );
    }

    #[test]
    fn test_round_trip_matches_case_insensitively() {
        let interpolator = Interpolator::new();
        let session = Session::new();
        let regex =
            compile_pattern(&extract_pattern("/ab+c/i"), &interpolator, &session).unwrap();
        assert!(regex.is_match("ABBBC"));
        assert_eq!(extract_pattern("/ab+c/i").to_literal(), "/ab+c/i");
    }

    #[test]
    fn test_tokens_are_interpolated_before_compiling() {
        let interpolator = Interpolator::new();
        let session = Session::from_json(json!({"digits": 3, "prefix": "id-"})).unwrap();
        let descriptor = extract_pattern("/^<% prefix %>\\d{<% digits %>}$/");
        let regex = compile_pattern(&descriptor, &interpolator, &session).unwrap();
        assert!(regex.is_match("id-123"));
        assert!(!regex.is_match("id-12"));
    }

    #[test]
    fn test_compile_failure_carries_resolved_source() {
        let interpolator = Interpolator::new();
        let session = Session::from_json(json!({"open": "("})).unwrap();
        let descriptor = PatternDescriptor::new("<% open %>abc", "");
        match compile_pattern(&descriptor, &interpolator, &session) {
            Err(TemplateError::PatternCompileError { source_text, .. }) => {
                assert_eq!(source_text, "(abc");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(matches!(
            compile_source("abc", "q"),
            Err(TemplateError::PatternCompileError { .. })
        ));
    }
}
