// ABOUTME: End-to-end tests for scripts that prompt, set and emit delimited rows
// ABOUTME: Runs scripts in memory and through file-backed output channels

use std::io::Cursor;

use lockstep::engine::{ExecutionError, RunStatus, ScriptRunner};
use lockstep::output::{ChannelRouter, OutputConfig};
use lockstep::template::TemplateError;
use lockstep::StdioPrompter;

mod common;
use common::{run_in_memory, TestEnvironment, TestScriptBuilder};

#[test]
fn test_header_and_rows() {
    let script = TestScriptBuilder::new("rows")
        .with_session("name", "[Al, Bo]")
        .with_session("amount", "[10, 20]")
        .with_step("csv: {fields: [name, amount], header: true}")
        .build();

    let run = run_in_memory(&script, "");
    let result = run.result.unwrap();

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(run.emitter.lines(), vec!["name,amount", "Al,10", "Bo,20"]);
    assert_eq!(result.lines_emitted, 3);
    assert!(run.session.cursors().is_empty());
}

#[test]
fn test_header_only() {
    let script = TestScriptBuilder::new("header")
        .with_session("name", "[Al, Bo]")
        .with_step("csv: {fields: [name, amount], header: only}")
        .build();

    let run = run_in_memory(&script, "");
    run.result.unwrap();
    assert_eq!(run.emitter.lines(), vec!["name,amount"]);
}

#[test]
fn test_shortest_array_bounds_rows() {
    let script = TestScriptBuilder::new("uneven")
        .with_session("id", "[1, 2, 3]")
        .with_session("tag", "[a, b, c, d, e]")
        .with_session("region", "eu")
        .with_step("csv: [id, tag, region]")
        .with_step("emit: \"<% tag | join,'-' %>\"")
        .build();

    let run = run_in_memory(&script, "");
    run.result.unwrap();
    assert_eq!(
        run.emitter.lines(),
        vec!["1,a,eu", "2,b,eu", "3,c,eu", "a-b-c-d-e"]
    );
}

#[test]
fn test_rows_repeat_from_the_start_in_a_later_step() {
    let script = TestScriptBuilder::new("twice")
        .with_session("name", "[Al, Bo]")
        .with_step("csv: [name]")
        .with_step("csv: [name]")
        .build();

    let run = run_in_memory(&script, "");
    run.result.unwrap();
    assert_eq!(run.emitter.lines(), vec!["Al", "Bo", "Al", "Bo"]);
}

#[test]
fn test_prompt_answers_feed_later_steps() {
    let script = TestScriptBuilder::new("prompted")
        .with_session("name", "[Al, Bo]")
        .with_step("prompt: {title: {description: Title, default: People}, suffix: Suffix}")
        .with_step("set: {heading: \"# <% title | upcase %>\"}")
        .with_step("emit: \"<% heading %>\"")
        .with_step("csv: {fields: [name], mapping: {name: \"<% name %><% suffix %>\"}}")
        .build();

    let run = run_in_memory(&script, "\n!\n");
    run.result.unwrap();

    assert_eq!(run.emitter.lines(), vec!["# PEOPLE", "Al!", "Bo!"]);
    assert!(run.transcript.contains("Title"));
}

#[test]
fn test_failure_reports_step_and_cause() {
    let script = TestScriptBuilder::new("broken")
        .with_session("name", "[Al, Bo]")
        .with_step("emit: start")
        .with_step("csv: [name, missing]")
        .build();

    let run = run_in_memory(&script, "");
    let err = run.result.unwrap_err();

    match &err {
        ExecutionError::StepFailed { step, action, .. } => {
            assert_eq!(*step, 1);
            assert_eq!(action, "csv");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(matches!(
        err.template_error(),
        Some(TemplateError::PathResolutionError { path }) if path == "missing"
    ));
    assert_eq!(run.emitter.lines(), vec!["start"]);
    assert!(run.session.cursors().is_empty());
}

#[test]
fn test_channels_route_to_files() {
    let env = TestEnvironment::new();
    let rows_file = env.output_file("out/rows.csv");
    let log_file = env.output_file("log.txt");

    let script = TestScriptBuilder::new("routed")
        .with_session("name", "[Al, Bo]")
        .with_session("amount", "[10, 20]")
        .with_step("emit: started")
        .with_step("{csv: {fields: [name, amount], header: true}, channel: rows}")
        .build();

    let config = OutputConfig::to_file(log_file.display().to_string())
        .with_channel("rows", &format!("file://{}", rows_file.display()));
    let mut router = ChannelRouter::from_config(&config).unwrap();
    let mut prompter = StdioPrompter::new(Cursor::new(Vec::<u8>::new()), Vec::<u8>::new());

    let runner = ScriptRunner::new();
    let mut session = ScriptRunner::session_for(&script);
    let result = runner
        .run(&script, &mut session, &mut router, &mut prompter)
        .unwrap();

    assert_eq!(result.lines_emitted, 4);
    assert_eq!(router.lines_emitted(), 4);
    assert_eq!(
        std::fs::read_to_string(&rows_file).unwrap(),
        "name,amount\nAl,10\nBo,20\n"
    );
    assert_eq!(std::fs::read_to_string(&log_file).unwrap(), "started\n");
}

#[test]
fn test_values_with_delimiters_are_quoted() {
    let script = TestScriptBuilder::new("escaped")
        .with_session("city", "[\"Paris, FR\", 'say \"hi\"']")
        .with_step("csv: [city]")
        .build();

    let run = run_in_memory(&script, "");
    run.result.unwrap();
    assert_eq!(
        run.emitter.lines(),
        vec!["\"Paris, FR\"", "say \\\"hi\\\""]
    );
}
