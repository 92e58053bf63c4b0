// ABOUTME: Emit action writing interpolated templates to the output sink
// ABOUTME: Strings become one line, arrays one line per element, objects JSON

use super::{ActionContext, ActionImplementation};
use crate::engine::error::{ExecutionError, Result};
use crate::template::Value;

pub struct EmitAction;

fn line_for(value: &Value) -> String {
    match value {
        Value::Object(_) => value.to_json().to_string(),
        other => other.to_display_string(),
    }
}

impl ActionImplementation for EmitAction {
    fn action_type(&self) -> &'static str {
        "emit"
    }

    fn validate_config(&self, config: &serde_yaml::Value) -> Result<()> {
        match config {
            serde_yaml::Value::Null => Err(ExecutionError::config("emit", "nothing to emit")),
            serde_yaml::Value::String(text) => {
                crate::template::Template::parse(text)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn execute(&self, config: &serde_yaml::Value, context: &mut ActionContext<'_>) -> Result<()> {
        let value = context
            .interpolator
            .interpolate(&Value::from(config.clone()), &*context.session)?;

        match &value {
            Value::Array(items) => {
                for item in items {
                    context.emit(&line_for(item))?;
                }
            }
            other => context.emit(&line_for(other))?,
        }
        Ok(())
    }
}
