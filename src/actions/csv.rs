// ABOUTME: Delimited-text action emitting one row per co-iteration pass
// ABOUTME: Walks session arrays in lock-step until the shortest is exhausted

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, info};

use super::{ActionContext, ActionImplementation};
use crate::engine::error::{ExecutionError, Result};
use crate::template::{CoIteration, Pass, Value};

pub struct CsvAction;

#[derive(Debug, Clone, Deserialize)]
pub struct CsvConfig {
    /// Literal list of field names, or the name of a session array holding them
    pub fields: serde_yaml::Value,
    #[serde(default, alias = "headers")]
    pub header: serde_yaml::Value,
    /// Per-field templates evaluated once per pass
    #[serde(default)]
    pub mapping: IndexMap<String, serde_yaml::Value>,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderMode {
    Off,
    On,
    Only,
}

fn default_delimiter() -> String {
    ",".to_string()
}

impl CsvConfig {
    /// Accept `csv: [a, b]` and `csv: array_name` as shorthand for `{fields: ...}`
    pub fn from_yaml(config: &serde_yaml::Value) -> Result<Self> {
        let config = match config {
            serde_yaml::Value::Sequence(_) | serde_yaml::Value::String(_) => {
                let mut map = serde_yaml::Mapping::new();
                map.insert(serde_yaml::Value::from("fields"), config.clone());
                serde_yaml::Value::Mapping(map)
            }
            other => other.clone(),
        };

        let parsed: CsvConfig = serde_yaml::from_value(config)
            .map_err(|e| ExecutionError::config("csv", format!("Invalid csv configuration: {}", e)))?;
        if parsed.delimiter.is_empty() {
            return Err(ExecutionError::config("csv", "delimiter cannot be empty"));
        }
        Ok(parsed)
    }
}

impl HeaderMode {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(HeaderMode::Off),
            Value::Bool(true) => Ok(HeaderMode::On),
            Value::Bool(false) => Ok(HeaderMode::Off),
            Value::Integer(0) => Ok(HeaderMode::Off),
            Value::Integer(_) => Ok(HeaderMode::On),
            Value::Float(n) if *n == 0.0 || n.is_nan() => Ok(HeaderMode::Off),
            Value::Float(_) => Ok(HeaderMode::On),
            Value::String(text) => match text.trim().to_lowercase().as_str() {
                "only" => Ok(HeaderMode::Only),
                "true" | "yes" => Ok(HeaderMode::On),
                "false" | "no" | "" => Ok(HeaderMode::Off),
                other => Err(ExecutionError::config(
                    "csv",
                    format!("header must be true, false or \"only\", got '{}'", other),
                )),
            },
            other => Err(ExecutionError::config(
                "csv",
                format!("header must be true, false or \"only\", got {}", other.type_name()),
            )),
        }
    }
}

/// Escape embedded quotes and wrap values containing the delimiter
pub fn csv_safe(value: &Value, delimiter: &str) -> String {
    let text = value.to_display_string().replace('"', "\\\"");
    if text.contains(delimiter) {
        format!("\"{}\"", text)
    } else {
        text
    }
}

impl CsvAction {
    fn field_names(&self, config: &CsvConfig, context: &ActionContext<'_>) -> Result<Vec<String>> {
        let fields = context
            .interpolator
            .interpolate_raw(&Value::from(config.fields.clone()), &*context.session)?;

        match fields {
            Value::Array(items) => Ok(items.iter().map(Value::to_display_string).collect()),
            Value::String(name) => match context.session.lookup(&name)? {
                Some(Value::Array(items)) => Ok(items.iter().map(Value::to_display_string).collect()),
                _ => Err(ExecutionError::config(
                    "csv",
                    format!("fields '{}' does not refer to an array of field names", name),
                )),
            },
            other => Err(ExecutionError::config(
                "csv",
                format!(
                    "fields must be an array or the name of one, got {}",
                    other.type_name()
                ),
            )),
        }
    }

    fn read_row(
        &self,
        names: &[String],
        mapping: &IndexMap<String, Value>,
        delimiter: &str,
        pass: &mut Pass,
        context: &mut ActionContext<'_>,
    ) -> Result<String> {
        let mut cells = Vec::with_capacity(names.len());
        for name in names {
            let value = match mapping.get(name) {
                Some(template) => context
                    .interpolator
                    .interpolate_pass(template, context.session, pass)?,
                None => context
                    .interpolator
                    .lookup_pass(name, context.session, pass)?,
            };
            cells.push(csv_safe(&value, delimiter));
        }
        Ok(cells.join(delimiter))
    }

    fn emit_rows(
        &self,
        names: &[String],
        mapping: &IndexMap<String, Value>,
        delimiter: &str,
        walk: &mut CoIteration,
        context: &mut ActionContext<'_>,
    ) -> Result<()> {
        loop {
            let mut pass = walk.begin_pass();
            let row = self.read_row(names, mapping, delimiter, &mut pass, context);
            // end the pass even on failure so finish() sees its cursors
            let done = walk.end_pass(pass);
            context.emit(&row?)?;
            if done {
                return Ok(());
            }
        }
    }
}

impl ActionImplementation for CsvAction {
    fn action_type(&self) -> &'static str {
        "csv"
    }

    fn validate_config(&self, config: &serde_yaml::Value) -> Result<()> {
        let config = CsvConfig::from_yaml(config)?;
        match &config.fields {
            serde_yaml::Value::Sequence(_) | serde_yaml::Value::String(_) => Ok(()),
            _ => Err(ExecutionError::config(
                "csv",
                "fields must be an array of names or the name of an array",
            )),
        }
    }

    fn execute(&self, config: &serde_yaml::Value, context: &mut ActionContext<'_>) -> Result<()> {
        let config = CsvConfig::from_yaml(config)?;
        let names = self.field_names(&config, context)?;

        let header = context
            .interpolator
            .interpolate_raw(&Value::from(config.header.clone()), &*context.session)?;
        let header = HeaderMode::from_value(&header)?;

        if header != HeaderMode::Off {
            let line = names
                .iter()
                .map(|name| csv_safe(&Value::from(name.as_str()), &config.delimiter))
                .collect::<Vec<_>>()
                .join(&config.delimiter);
            context.emit(&line)?;
            if header == HeaderMode::Only {
                debug!("csv header only, skipping data rows");
                return Ok(());
            }
        }

        let mapping: IndexMap<String, Value> = config
            .mapping
            .iter()
            .map(|(name, template)| (name.clone(), Value::from(template.clone())))
            .collect();

        let mut walk = CoIteration::new();
        let outcome = self.emit_rows(&names, &mapping, &config.delimiter, &mut walk, context);
        let passes = walk.passes();
        walk.finish(context.session.cursors_mut());
        outcome?;

        info!("csv emitted {} rows for {} fields", passes, names.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::StdioPrompter;
    use crate::output::MemoryEmitter;
    use crate::template::{Interpolator, Session, TemplateError};
    use serde_json::json;
    use std::io::Cursor;

    fn run(config: &str, session: &mut Session) -> (Result<()>, MemoryEmitter) {
        let config: serde_yaml::Value = serde_yaml::from_str(config).unwrap();
        let interpolator = Interpolator::new();
        let mut emitter = MemoryEmitter::new();
        let mut prompter = StdioPrompter::new(Cursor::new(Vec::<u8>::new()), Vec::<u8>::new());
        let result = {
            let mut context =
                ActionContext::new(session, &interpolator, &mut emitter, &mut prompter);
            CsvAction.execute(&config, &mut context)
        };
        (result, emitter)
    }

    fn session(value: serde_json::Value) -> Session {
        Session::from_json(value).unwrap()
    }

    #[test]
    fn test_header_and_rows() {
        let mut s = session(json!({"name": ["Al", "Bo"], "amount": ["10", "20"]}));
        let (result, out) = run("{fields: [name, amount], header: true}", &mut s);
        result.unwrap();
        assert_eq!(out.lines(), vec!["name,amount", "Al,10", "Bo,20"]);
        assert!(s.cursors().is_empty());
    }

    #[test]
    fn test_header_only() {
        let mut s = session(json!({"name": ["Al", "Bo"], "amount": ["10", "20"]}));
        let (result, out) = run("{fields: [name, amount], header: only}", &mut s);
        result.unwrap();
        assert_eq!(out.lines(), vec!["name,amount"]);
    }

    #[test]
    fn test_shortest_array_stops_the_walk() {
        let mut s = session(json!({
            "a": [1, 2, 3],
            "b": ["v", "w", "x", "y", "z"],
            "c": "fixed"
        }));
        let (result, out) = run("[a, b, c]", &mut s);
        result.unwrap();
        assert_eq!(out.lines(), vec!["1,v,fixed", "2,w,fixed", "3,x,fixed"]);
        assert!(!s.has_cursor("a"));
        assert!(!s.has_cursor("b"));
    }

    #[test]
    fn test_scalars_only_emit_one_row() {
        let mut s = session(json!({"host": "example.com", "port": 8080}));
        let (result, out) = run("[host, port]", &mut s);
        result.unwrap();
        assert_eq!(out.lines(), vec!["example.com,8080"]);
    }

    #[test]
    fn test_fields_named_by_session_array() {
        let mut s = session(json!({
            "columns": ["city", "zip"],
            "city": ["Oslo", "Bergen"],
            "zip": ["0150", "5003"]
        }));
        let (result, out) = run("{fields: columns, headers: true}", &mut s);
        result.unwrap();
        assert_eq!(out.lines(), vec!["city,zip", "Oslo,0150", "Bergen,5003"]);
    }

    #[test]
    fn test_fields_name_must_refer_to_array() {
        let mut s = session(json!({"columns": "city"}));
        let (result, out) = run("columns", &mut s);
        assert!(matches!(result, Err(ExecutionError::ConfigError { .. })));
        assert!(out.is_empty());
    }

    #[test]
    fn test_mapping_is_evaluated_every_pass() {
        let mut s = session(json!({"name": ["al", "bo"], "amount": [10, 20]}));
        let config = r#"
fields: [name, amount]
mapping:
  name: "<% name | upcase %>"
  amount: "$<% amount %>"
"#;
        let (result, out) = run(config, &mut s);
        result.unwrap();
        assert_eq!(out.lines(), vec!["AL,$10", "BO,$20"]);
        assert!(s.cursors().is_empty());
    }

    #[test]
    fn test_escaping_quotes_and_delimiters() {
        let mut s = session(json!({"note": ["say \"hi\"", "a,b"], "n": [1, 2]}));
        let (result, out) = run("[note, n]", &mut s);
        result.unwrap();
        assert_eq!(out.lines(), vec!["say \\\"hi\\\",1", "\"a,b\",2"]);
    }

    #[test]
    fn test_custom_delimiter() {
        let mut s = session(json!({"a": ["x;y", "z"], "b": [1, 2]}));
        let (result, out) = run("{fields: [a, b], delimiter: ';', header: true}", &mut s);
        result.unwrap();
        assert_eq!(out.lines(), vec!["a;b", "\"x;y\";1", "z;2"]);
    }

    #[test]
    fn test_nested_field_paths() {
        let mut s = session(json!({
            "address": {"city": ["Oslo", "Bergen"], "country": "NO"}
        }));
        let (result, out) = run("[address.city, address.country]", &mut s);
        result.unwrap();
        assert_eq!(out.lines(), vec!["Oslo,NO", "Bergen,NO"]);
    }

    #[test]
    fn test_missing_field_fails_and_clears_cursors() {
        let mut s = session(json!({"a": [1, 2, 3]}));
        let (result, out) = run("[a, missing]", &mut s);
        match result {
            Err(ExecutionError::TemplateError(TemplateError::PathResolutionError { path })) => {
                assert_eq!(path, "missing");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(out.is_empty());
        assert!(s.cursors().is_empty());
    }

    #[test]
    fn test_numeric_header_follows_truthiness() {
        let mut s = session(json!({"a": [1]}));
        let (result, out) = run("{fields: [a], header: 1}", &mut s);
        result.unwrap();
        assert_eq!(out.lines(), vec!["a", "1"]);

        let (result, out) = run("{fields: [a], header: 0}", &mut s);
        result.unwrap();
        assert_eq!(out.lines(), vec!["1"]);
    }

    #[test]
    fn test_invalid_header_value() {
        let mut s = session(json!({"a": [1]}));
        let (result, _) = run("{fields: [a], header: sometimes}", &mut s);
        assert!(matches!(result, Err(ExecutionError::ConfigError { .. })));
    }

    #[test]
    fn test_validate_config() {
        let yaml = |text: &str| serde_yaml::from_str::<serde_yaml::Value>(text).unwrap();
        assert!(CsvAction.validate_config(&yaml("[a, b]")).is_ok());
        assert!(CsvAction.validate_config(&yaml("names")).is_ok());
        assert!(CsvAction.validate_config(&yaml("{fields: 3}")).is_err());
        assert!(CsvAction.validate_config(&yaml("{header: true}")).is_err());
        assert!(CsvAction
            .validate_config(&yaml("{fields: [a], delimiter: ''}"))
            .is_err());
    }
}
