// ABOUTME: Integration tests for script parsing and validation
// ABOUTME: Tests file loading, step normalization and validation reports

use lockstep::parser::{ParserError, ScriptParser, ScriptValidator, ValidationError};

mod common;
use common::{TestEnvironment, TestScriptBuilder};

#[tokio::test]
async fn test_parse_script_file() {
    let env = TestEnvironment::new();
    let builder = TestScriptBuilder::new("from_file")
        .with_session("name", "[Al, Bo]")
        .with_step("emit: hello")
        .with_step("{csv: [name], channel: rows, name: people}");
    let path = env.create_script_file("from_file", &builder).await;

    let script = ScriptParser::new().parse_file(&path).await.unwrap();
    assert_eq!(script.name, "from_file");
    assert_eq!(script.session.len(), 1);

    let steps = script.normalized_steps().unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].action, "emit");
    assert_eq!(steps[1].action, "csv");
    assert_eq!(steps[1].channel.as_deref(), Some("rows"));
    assert_eq!(steps[1].label(), "people");
}

#[tokio::test]
async fn test_parse_missing_file() {
    let env = TestEnvironment::new();
    let result = ScriptParser::new()
        .parse_file(env.script_file("absent"))
        .await;
    assert!(matches!(result, Err(ParserError::IoError(_))));
}

#[test]
fn test_parse_rejects_malformed_steps() {
    let parser = ScriptParser::new();

    let result = parser.parse_string("name: empty\nsteps: []\n");
    assert!(matches!(
        result,
        Err(ParserError::ValidationError(ValidationError::EmptyScript))
    ));

    let result = parser.parse_string("name: two\nsteps:\n  - {emit: a, set: {b: c}}\n");
    assert!(matches!(
        result,
        Err(ParserError::ValidationError(ValidationError::MalformedStep { step: 0, .. }))
    ));
}

#[test]
fn test_validator_accepts_complete_script() {
    let script = TestScriptBuilder::new("complete")
        .with_session("name", "[Al, Bo]")
        .with_session("greeting", "\"hi <% user | optional,there %>\"")
        .with_step("prompt: {user: {description: Who, pattern: '/^[a-z]+$/i'}}")
        .with_step("set: {title: \"<% greeting | upcase %>\"}")
        .with_step("csv: {fields: [name], header: true}")
        .build();

    let report = ScriptValidator::new().validate(&script).unwrap();
    assert!(report.is_valid, "{:?}", report.errors);
    assert!(!report.has_warnings());
}

#[test]
fn test_validator_collects_every_error() {
    let script = TestScriptBuilder::new("broken")
        .with_step("shell: ls")
        .with_step("emit: \"<% name | shout %>\"")
        .with_step("csv: {fields: [a], header: sometimes, delimiter: ''}")
        .with_step("set: \"<% unclosed\"")
        .build();

    let report = ScriptValidator::new().validate(&script).unwrap();
    assert!(!report.is_valid);
    assert!(report.errors.len() >= 3, "{:?}", report.errors);

    assert!(report.errors.iter().any(|e| matches!(
        e,
        ValidationError::UnsupportedAction { step: 0, action, .. } if action == "shell"
    )));
    assert!(report
        .errors
        .iter()
        .any(|e| matches!(e, ValidationError::InvalidTemplate { field, .. } if field == "steps[1].emit")));
    assert!(report.errors.iter().any(|e| matches!(
        e,
        ValidationError::InvalidStepConfig { step: 2, action, .. } if action == "csv"
    )));
}

#[test]
fn test_validator_checks_output_routes() {
    let env = TestEnvironment::new();
    let script = TestScriptBuilder::new("routes")
        .with_session("name", "[Al]")
        .with_step("{csv: [name], channel: rows}")
        .with_output_file(&env.output_file("all.txt"))
        .build();

    let relaxed = ScriptValidator::new().validate(&script).unwrap();
    assert!(relaxed.is_valid);
    assert_eq!(relaxed.warnings.len(), 1);

    let strict = ScriptValidator::new()
        .with_strict_mode(true)
        .validate(&script)
        .unwrap();
    assert!(!strict.is_valid);

    let mut bad_output = script.clone();
    if let Some(output) = bad_output.output.as_mut() {
        output.default = "s3://bucket/key".to_string();
    }
    let report = ScriptValidator::new().validate(&bad_output).unwrap();
    assert!(report
        .errors
        .iter()
        .any(|e| matches!(e, ValidationError::InvalidOutput { .. })));
}
