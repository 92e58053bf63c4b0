// ABOUTME: Script data structures and YAML parsing
// ABOUTME: A script is an initial session plus an ordered list of action steps

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use super::error::{ParserError, Result, ValidationError};
use crate::output::OutputConfig;

/// Step keys that are options rather than the action itself
const STEP_OPTIONS: &[&str] = &["channel", "name"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    pub name: String,
    pub description: Option<String>,
    /// Initial session values
    #[serde(default)]
    pub session: IndexMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub steps: Vec<serde_yaml::Value>,
    pub output: Option<OutputConfig>,
}

/// One normalized step: the single action key, its config and step options
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub index: usize,
    pub action: String,
    pub config: serde_yaml::Value,
    pub channel: Option<String>,
    pub name: Option<String>,
}

impl Step {
    pub fn from_yaml(index: usize, value: &serde_yaml::Value) -> std::result::Result<Self, ValidationError> {
        let malformed = |reason: &str| ValidationError::MalformedStep {
            step: index,
            reason: reason.to_string(),
        };

        let mapping = value
            .as_mapping()
            .ok_or_else(|| malformed("step is not a mapping"))?;

        let option = |key: &str| -> std::result::Result<Option<String>, ValidationError> {
            match mapping.get(key) {
                None | Some(serde_yaml::Value::Null) => Ok(None),
                Some(serde_yaml::Value::String(text)) => Ok(Some(text.clone())),
                Some(_) => Err(malformed(&format!("'{}' must be a string", key))),
            }
        };
        let channel = option("channel")?;
        let name = option("name")?;

        let mut actions = mapping.iter().filter(|(key, _)| {
            key.as_str()
                .map(|k| !STEP_OPTIONS.contains(&k))
                .unwrap_or(true)
        });

        let (action, config) = match (actions.next(), actions.next()) {
            (Some((key, config)), None) => (key, config),
            (None, _) => return Err(malformed("no action found")),
            (Some(_), Some(_)) => return Err(malformed("more than one action key")),
        };
        let action = action
            .as_str()
            .ok_or_else(|| malformed("action key must be a string"))?;

        Ok(Self {
            index,
            action: action.to_string(),
            config: config.clone(),
            channel,
            name,
        })
    }

    /// Label used in logs: the explicit name or `#index action`
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{} {}", self.index, self.action),
        }
    }
}

impl Script {
    /// Parse script from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ParserError::IoError)?;
        Self::from_yaml(&content)
    }

    /// Parse script from YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let script: Script = serde_yaml::from_str(content).map_err(ParserError::YamlError)?;
        script.validate_structure()?;
        Ok(script)
    }

    fn validate_structure(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ParserError::MissingField("name".to_string()));
        }

        if self.steps.is_empty() {
            return Err(ParserError::ValidationError(ValidationError::EmptyScript));
        }

        self.normalized_steps()?;
        Ok(())
    }

    /// Steps with their action key separated from step options
    pub fn normalized_steps(&self) -> Result<Vec<Step>> {
        self.steps
            .iter()
            .enumerate()
            .map(|(index, value)| Step::from_yaml(index, value).map_err(ParserError::from))
            .collect()
    }

    /// Add or replace session values, e.g. from `-V key=value`
    pub fn merge_session<I, K, V>(&mut self, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<serde_yaml::Value>,
    {
        for (key, value) in values {
            self.session.insert(key.into(), value.into());
        }
    }

    /// Convert script back to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(ParserError::YamlError)
    }
}

#[derive(Debug, Clone)]
pub struct ScriptParser;

impl ScriptParser {
    pub fn new() -> Self {
        Self
    }

    pub async fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<Script> {
        let content = fs::read_to_string(path.as_ref())
            .await
            .map_err(ParserError::IoError)?;
        self.parse_string(&content)
    }

    pub fn parse_string(&self, content: &str) -> Result<Script> {
        Script::from_yaml(content)
    }
}

impl Default for ScriptParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
name: report
description: Writes a small table
session:
  name: [Al, Bo]
  amount: ["10", "20"]
steps:
  - csv:
      fields: [name, amount]
      header: true
    channel: rows
  - emit: "done"
output:
  default: stdout
  channels:
    rows: file://./out/rows.csv
"#;

    #[test]
    fn test_parse_basic_script() {
        let script = Script::from_yaml(BASIC).unwrap();
        assert_eq!(script.name, "report");
        assert_eq!(script.session.len(), 2);

        let steps = script.normalized_steps().unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].action, "csv");
        assert_eq!(steps[0].channel.as_deref(), Some("rows"));
        assert_eq!(steps[1].action, "emit");
        assert_eq!(steps[1].label(), "#1 emit");

        let output = script.output.unwrap();
        assert_eq!(output.channels.get("rows").unwrap(), "file://./out/rows.csv");
    }

    #[test]
    fn test_empty_script_rejected() {
        let result = Script::from_yaml("name: nothing\nsteps: []\n");
        assert!(matches!(
            result,
            Err(ParserError::ValidationError(ValidationError::EmptyScript))
        ));
    }

    #[test]
    fn test_empty_name_rejected() {
        let result = Script::from_yaml("name: ''\nsteps:\n  - emit: hi\n");
        assert!(matches!(result, Err(ParserError::MissingField(_))));
    }

    #[test]
    fn test_step_with_two_actions_rejected() {
        let yaml = "name: bad\nsteps:\n  - emit: hi\n    set: {a: 1}\n";
        assert!(matches!(
            Script::from_yaml(yaml),
            Err(ParserError::ValidationError(ValidationError::MalformedStep { step: 0, .. }))
        ));
    }

    #[test]
    fn test_step_without_action_rejected() {
        let yaml = "name: bad\nsteps:\n  - emit: hi\n  - channel: rows\n";
        assert!(matches!(
            Script::from_yaml(yaml),
            Err(ParserError::ValidationError(ValidationError::MalformedStep { step: 1, .. }))
        ));
    }

    #[test]
    fn test_merge_session() {
        let mut script = Script::from_yaml(BASIC).unwrap();
        script.merge_session([("env", "prod"), ("name", "Cy")]);
        assert_eq!(script.session.get("env"), Some(&serde_yaml::Value::from("prod")));
        assert_eq!(script.session.get("name"), Some(&serde_yaml::Value::from("Cy")));
    }

    #[tokio::test]
    async fn test_parse_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(BASIC.as_bytes()).unwrap();

        let script = ScriptParser::new().parse_file(file.path()).await.unwrap();
        assert_eq!(script.name, "report");
        assert!(ScriptParser::new().parse_file("/no/such/script.yaml").await.is_err());
    }
}
