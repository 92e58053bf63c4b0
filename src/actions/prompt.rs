// ABOUTME: Prompt action collecting answers from an interactive reader
// ABOUTME: Normalizes prompt specs, validates answers and stores them in the session

use regex::Regex;
use serde::Deserialize;
use std::io::{BufRead, Write};
use tracing::{debug, info, warn};

use super::{ActionContext, ActionImplementation};
use crate::engine::error::{ExecutionError, Result};
use crate::template::{compile_pattern, PatternDescriptor, Value};

const PROMPT_MESSAGE: &str = "lockstep";

pub struct PromptAction;

/// One normalized question
#[derive(Debug, Clone, PartialEq)]
pub struct PromptEntry {
    pub name: String,
    pub description: Option<String>,
    pub pattern: Option<PatternDescriptor>,
    pub required: bool,
    pub default: Option<serde_yaml::Value>,
    /// Shown when an answer does not match `pattern`
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PromptSpec {
    description: Option<String>,
    pattern: Option<serde_yaml::Value>,
    #[serde(default)]
    required: bool,
    default: Option<serde_yaml::Value>,
    message: Option<String>,
}

/// Terminal-side collaborator used by the prompt action
pub trait Prompter: Send {
    /// Ask one question. `None` means the input is closed.
    fn ask(&mut self, entry: &PromptEntry, default: Option<&str>) -> Result<Option<String>>;

    fn warn(&mut self, message: &str) -> Result<()>;
}

pub struct StdioPrompter<R, W> {
    reader: R,
    writer: W,
    message: String,
}

impl StdioPrompter<std::io::BufReader<std::io::Stdin>, std::io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(
            std::io::BufReader::new(std::io::stdin()),
            std::io::stderr(),
        )
    }
}

impl<R: BufRead, W: Write> StdioPrompter<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            message: PROMPT_MESSAGE.to_string(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<R: BufRead + Send, W: Write + Send> Prompter for StdioPrompter<R, W> {
    fn ask(&mut self, entry: &PromptEntry, default: Option<&str>) -> Result<Option<String>> {
        let label = entry.description.as_deref().unwrap_or(&entry.name);
        match default {
            Some(default) => write!(self.writer, "{}: {} ({}): ", self.message, label, default)?,
            None => write!(self.writer, "{}: {}: ", self.message, label)?,
        }
        self.writer.flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn warn(&mut self, message: &str) -> Result<()> {
        writeln!(self.writer, "{}: {}", self.message, message)?;
        Ok(())
    }
}

/// Turn a prompt config into an ordered list of entries. Accepts a mapping of
/// name to description or spec, optionally nested under `properties`.
pub fn normalize(config: &serde_yaml::Value) -> Result<Vec<PromptEntry>> {
    let mapping = match config {
        serde_yaml::Value::Mapping(map) => match map.get("properties") {
            Some(serde_yaml::Value::Mapping(properties)) => properties,
            _ => map,
        },
        _ => {
            return Err(ExecutionError::config(
                "prompt",
                "expected a mapping of names to prompts",
            ))
        }
    };

    let mut entries = Vec::with_capacity(mapping.len());
    for (key, item) in mapping {
        let name = match key {
            serde_yaml::Value::String(name) => name.clone(),
            other => Value::from(other.clone()).to_display_string(),
        };

        let spec = match item {
            serde_yaml::Value::String(description) => PromptSpec {
                description: Some(description.clone()),
                ..PromptSpec::default()
            },
            serde_yaml::Value::Null => PromptSpec::default(),
            other => serde_yaml::from_value(other.clone()).map_err(|e| {
                ExecutionError::config("prompt", format!("Invalid prompt '{}': {}", name, e))
            })?,
        };

        let pattern = spec
            .pattern
            .as_ref()
            .map(PatternDescriptor::from_yaml)
            .transpose()?;

        entries.push(PromptEntry {
            name,
            description: spec.description,
            pattern,
            required: spec.required,
            default: spec.default,
            message: spec.message,
        });
    }
    Ok(entries)
}

impl PromptAction {
    fn collect(
        &self,
        entry: &PromptEntry,
        pattern: Option<&Regex>,
        context: &mut ActionContext<'_>,
    ) -> Result<Value> {
        let default = match &entry.default {
            Some(template) => Some(
                context
                    .interpolator
                    .interpolate(&Value::from(template.clone()), &*context.session)?,
            ),
            None => None,
        };
        let default_text = default.as_ref().map(Value::to_display_string);

        loop {
            let answer = match context.prompter.ask(entry, default_text.as_deref())? {
                Some(answer) => answer,
                None => {
                    return default.ok_or_else(|| ExecutionError::PromptError {
                        name: entry.name.clone(),
                        message: "input closed before an answer was given".to_string(),
                    })
                }
            };

            if answer.is_empty() {
                if let Some(default) = default.clone() {
                    return Ok(default);
                }
                if entry.required {
                    context.prompter.warn(&format!("{} is required", entry.name))?;
                    continue;
                }
            }

            if let Some(regex) = pattern {
                if !regex.is_match(&answer) {
                    let message = entry
                        .message
                        .clone()
                        .unwrap_or_else(|| format!("{} must match {}", entry.name, regex.as_str()));
                    debug!("Answer for '{}' rejected by pattern", entry.name);
                    context.prompter.warn(&message)?;
                    continue;
                }
            }

            return Ok(Value::String(answer));
        }
    }
}

impl ActionImplementation for PromptAction {
    fn action_type(&self) -> &'static str {
        "prompt"
    }

    fn validate_config(&self, config: &serde_yaml::Value) -> Result<()> {
        let entries = normalize(config)?;
        if entries.is_empty() {
            return Err(ExecutionError::config("prompt", "no prompts defined"));
        }
        Ok(())
    }

    fn execute(&self, config: &serde_yaml::Value, context: &mut ActionContext<'_>) -> Result<()> {
        let entries: Vec<PromptEntry> = normalize(config)?
            .into_iter()
            .filter(|entry| entry.required || !context.session.contains_path(&entry.name))
            .collect();

        if entries.is_empty() {
            debug!("All prompt values already present in session");
            return Ok(());
        }

        // compile everything up front so a bad pattern fails before any question
        let mut patterns = Vec::with_capacity(entries.len());
        for entry in &entries {
            let regex = match &entry.pattern {
                Some(descriptor) => Some(compile_pattern(
                    descriptor,
                    context.interpolator,
                    &*context.session,
                )?),
                None => None,
            };
            patterns.push(regex);
        }

        for (entry, pattern) in entries.iter().zip(&patterns) {
            let value = self.collect(entry, pattern.as_ref(), context)?;
            if context.session.set(entry.name.clone(), value).is_some() {
                warn!("Prompt overwrote existing session value '{}'", entry.name);
            }
        }

        info!("Collected {} prompt answers", entries.len());
        Ok(())
    }
}
