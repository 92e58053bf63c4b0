// ABOUTME: Script validation against the action registry and template syntax
// ABOUTME: Collects every problem into a report instead of stopping at the first

use std::collections::HashSet;

use super::error::{Result, ValidationError};
use super::script::{Script, Step};
use crate::actions::ActionRegistry;
use crate::output::Destination;
use crate::template::Interpolator;

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
    pub is_valid: bool,
}

pub struct ScriptValidator {
    strict_mode: bool,
    registry: ActionRegistry,
    interpolator: Interpolator,
}

impl ScriptValidator {
    pub fn new() -> Self {
        Self {
            strict_mode: false,
            registry: ActionRegistry::new(),
            interpolator: Interpolator::new(),
        }
    }

    /// Treat warnings as errors
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn with_registry(mut self, registry: ActionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Validate a complete script
    pub fn validate(&self, script: &Script) -> Result<ValidationReport> {
        let mut report = ValidationReport::new();

        self.validate_steps(script, &mut report);
        self.validate_session_templates(script, &mut report);
        self.validate_output_config(script, &mut report);

        report.is_valid = report.errors.is_empty() && !(self.strict_mode && report.has_warnings());
        Ok(report)
    }

    fn validate_steps(&self, script: &Script, report: &mut ValidationReport) {
        if script.steps.is_empty() {
            report.errors.push(ValidationError::EmptyScript);
            return;
        }

        let routed: HashSet<&String> = script
            .output
            .as_ref()
            .map(|output| output.channels.keys().collect())
            .unwrap_or_default();

        for (index, value) in script.steps.iter().enumerate() {
            let step = match Step::from_yaml(index, value) {
                Ok(step) => step,
                Err(error) => {
                    report.errors.push(error);
                    continue;
                }
            };

            if !self.registry.contains(&step.action) {
                report.errors.push(ValidationError::UnsupportedAction {
                    step: index,
                    action: step.action.clone(),
                    supported: self
                        .registry
                        .list_supported_actions()
                        .into_iter()
                        .map(String::from)
                        .collect(),
                });
                continue;
            }

            if let Err(error) = self
                .registry
                .validate_action_config(&step.action, &step.config)
            {
                report.errors.push(ValidationError::InvalidStepConfig {
                    step: index,
                    action: step.action.clone(),
                    reason: error.to_string(),
                });
            }

            self.validate_config_templates(
                &format!("steps[{}].{}", index, step.action),
                &step.config,
                report,
            );

            if let Some(channel) = &step.channel {
                if script.output.is_some() && !routed.contains(channel) {
                    report.warnings.push(format!(
                        "Step {} writes to channel '{}' which has no route; it will use the default destination",
                        index, channel
                    ));
                }
            }
        }
    }

    fn validate_session_templates(&self, script: &Script, report: &mut ValidationReport) {
        for (key, value) in &script.session {
            self.validate_config_templates(&format!("session.{}", key), value, report);
        }
    }

    /// Check the syntax and filter names of every string leaf
    fn validate_config_templates(
        &self,
        field: &str,
        value: &serde_yaml::Value,
        report: &mut ValidationReport,
    ) {
        match value {
            serde_yaml::Value::String(text) => {
                if let Err(error) = self.interpolator.validate(text) {
                    report.errors.push(ValidationError::InvalidTemplate {
                        field: field.to_string(),
                        error: error.to_string(),
                    });
                }
            }
            serde_yaml::Value::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.validate_config_templates(&format!("{}[{}]", field, i), item, report);
                }
            }
            serde_yaml::Value::Mapping(map) => {
                for (key, item) in map {
                    let key = key.as_str().unwrap_or("?");
                    self.validate_config_templates(&format!("{}.{}", field, key), item, report);
                }
            }
            serde_yaml::Value::Tagged(tagged) => {
                self.validate_config_templates(field, &tagged.value, report)
            }
            _ => {}
        }
    }

    fn validate_output_config(&self, script: &Script, report: &mut ValidationReport) {
        let Some(output) = &script.output else {
            return;
        };

        let destinations =
            std::iter::once(&output.default).chain(output.channels.values());
        for destination in destinations {
            if let Err(error) = Destination::parse(destination) {
                report.errors.push(ValidationError::InvalidOutput {
                    reason: error.to_string(),
                });
            }
        }
    }
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            is_valid: true,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ScriptValidator {
    fn default() -> Self {
        Self::new()
    }
}
