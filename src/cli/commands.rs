// ABOUTME: Command implementations for the lockstep CLI
// ABOUTME: Handles execution of run, validate, render, and init commands

use anyhow::Result;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::args::Args;
use super::config::Config;
use crate::actions::StdioPrompter;
use crate::engine::ScriptRunner;
use crate::output::{ChannelRouter, OutputConfig};
use crate::parser::{Script, ScriptParser, ScriptValidator, ValidationReport};
use crate::template::{Interpolator, Session};

/// Execute a script command
pub async fn run_script(
    script_path: PathBuf,
    vars: Vec<String>,
    output: Option<String>,
    result_path: Option<PathBuf>,
    continue_on_error: bool,
    dry_run: bool,
    config: &Config,
) -> Result<()> {
    info!("Starting script execution: {}", script_path.display());

    let mut script = load_script(&script_path, &vars, config).await?;
    info!("Loaded script: {}", script.name);

    let report = ScriptValidator::new().validate(&script)?;
    log_report(&report);
    if !report.is_valid {
        return Err(anyhow::anyhow!(
            "Script '{}' failed validation with {} error(s)",
            script.name,
            report.errors.len()
        ));
    }

    if dry_run {
        info!("Dry run - script validation successful");
        return Ok(());
    }

    let output_config = resolve_output(script.output.take(), output, config);
    let mut router = ChannelRouter::from_config(&output_config)
        .map_err(|e| anyhow::anyhow!("Failed to open output: {}", e))?;
    let mut prompter = StdioPrompter::stdio();

    let runner =
        ScriptRunner::new().with_continue_on_error(continue_on_error || config.continue_on_error);
    let mut session = ScriptRunner::session_for(&script);

    let run_result = runner
        .run(&script, &mut session, &mut router, &mut prompter)
        .map_err(|e| anyhow::anyhow!("Script execution failed: {}", e))?;

    if let Some(path) = result_path {
        let json_content = serde_json::to_string_pretty(&run_result)
            .map_err(|e| anyhow::anyhow!("Failed to serialize results to JSON: {}", e))?;
        std::fs::write(&path, json_content).map_err(|e| {
            anyhow::anyhow!("Failed to write result file '{}': {}", path.display(), e)
        })?;
        info!("Run result written to: {}", path.display());
    }

    info!(
        "Script '{}' completed: {} steps, {} lines emitted",
        run_result.script_name,
        run_result.steps_executed(),
        run_result.lines_emitted
    );

    if run_result.is_successful() {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Script execution finished with status: {:?}",
            run_result.status
        ))
    }
}

/// Validate a script file
pub async fn validate_script(script_path: PathBuf, strict: bool, config: &Config) -> Result<()> {
    info!("Validating script: {}", script_path.display());

    let script = load_script(&script_path, &[], config).await?;
    let report = ScriptValidator::new()
        .with_strict_mode(strict)
        .validate(&script)?;

    for warning in &report.warnings {
        println!("! {}", warning);
    }
    if !report.is_valid {
        for error in &report.errors {
            println!("✗ {}", error);
        }
        return Err(anyhow::anyhow!(
            "Script '{}' is invalid ({} errors, {} warnings)",
            script.name,
            report.errors.len(),
            report.warnings.len()
        ));
    }

    println!("✓ Script '{}' is valid", script.name);
    println!("  Steps: {}", script.steps.len());
    println!("  Session values: {}", script.session.len());

    Ok(())
}

/// Interpolate one template against a session built from config, file and vars
pub async fn render_template(
    template: String,
    vars: Vec<String>,
    session_path: Option<PathBuf>,
    config: &Config,
) -> Result<()> {
    let mut session = Session::new();
    session.extend(config.session_vars.clone());

    if let Some(path) = session_path {
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read session file '{}': {}", path.display(), e)
        })?;
        let values: serde_yaml::Value = serde_yaml::from_str(&content)?;
        session.extend(Session::from_yaml(values)?.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    session.extend(Args::parse_variables(&vars)?);

    let rendered = Interpolator::new().render(&template, &session)?;
    println!("{}", rendered);
    Ok(())
}

/// Initialize a new script file
pub async fn init_script(name: String, output_dir: PathBuf) -> Result<()> {
    info!("Initializing script '{}' in {}", name, output_dir.display());

    if !output_dir.exists() {
        std::fs::create_dir_all(&output_dir)?;
    }

    let script_file = output_dir.join(format!("{}.yaml", name));
    if script_file.exists() {
        return Err(anyhow::anyhow!(
            "Script file already exists: {}",
            script_file.display()
        ));
    }

    std::fs::write(&script_file, starter_script(&name))?;
    info!("Created script file: {}", script_file.display());

    Ok(())
}

async fn load_script(path: &Path, vars: &[String], config: &Config) -> Result<Script> {
    let mut script = ScriptParser::new()
        .parse_file(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to parse script: {}", e))?;

    // config defaults < script session < command line
    let mut session: IndexMap<String, serde_yaml::Value> = config.session_vars.clone();
    session.extend(std::mem::take(&mut script.session));
    script.session = session;
    script.merge_session(Args::parse_variables(vars)?);

    Ok(script)
}

fn resolve_output(
    script_output: Option<OutputConfig>,
    cli_output: Option<String>,
    config: &Config,
) -> OutputConfig {
    let mut output = script_output.unwrap_or_else(|| match &config.default_output {
        Some(destination) => OutputConfig {
            default: destination.clone(),
            ..OutputConfig::default()
        },
        None => OutputConfig::default(),
    });
    if let Some(destination) = cli_output {
        output.default = destination;
    }
    output
}

fn log_report(report: &ValidationReport) {
    for warning in &report.warnings {
        warn!("Script validation warning: {}", warning);
    }
    for error in &report.errors {
        warn!("Script validation error: {}", error);
    }
}

/// Generate starter script content
fn starter_script(name: &str) -> String {
    format!(
        r##"name: {}
description: Emits a header and one row per element of the session arrays

session:
  name: [Ada, Grace]
  joined: ["1843-01-01", "1906-12-09"]

steps:
  - prompt:
      title:
        description: Report title
        default: People
  - emit: "# <% title %>"
  - csv:
      fields: [name, joined]
      header: true
      mapping:
        joined: "<% joined | date_format,YYYY %>"
    channel: rows

output:
  default: stdout
  channels:
    rows: stdout
"##,
        name
    )
}
