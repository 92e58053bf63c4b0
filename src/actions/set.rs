// ABOUTME: Set action storing interpolated values in the session
// ABOUTME: Keys are assigned in order so later templates see earlier results

use tracing::debug;

use super::{ActionContext, ActionImplementation};
use crate::engine::error::{ExecutionError, Result};
use crate::template::Value;

pub struct SetAction;

fn entries(config: &serde_yaml::Value) -> Result<&serde_yaml::Mapping> {
    match config {
        serde_yaml::Value::Mapping(map) if !map.is_empty() => Ok(map),
        _ => Err(ExecutionError::config(
            "set",
            "expected a non-empty mapping of keys to values",
        )),
    }
}

impl ActionImplementation for SetAction {
    fn action_type(&self) -> &'static str {
        "set"
    }

    fn validate_config(&self, config: &serde_yaml::Value) -> Result<()> {
        for key in entries(config)?.keys() {
            if !key.is_string() {
                return Err(ExecutionError::config("set", "keys must be strings"));
            }
        }
        Ok(())
    }

    fn execute(&self, config: &serde_yaml::Value, context: &mut ActionContext<'_>) -> Result<()> {
        for (key, template) in entries(config)? {
            let key = key
                .as_str()
                .ok_or_else(|| ExecutionError::config("set", "keys must be strings"))?;
            let value = context
                .interpolator
                .interpolate(&Value::from(template.clone()), &*context.session)?;
            debug!("set {} = {}", key, value.type_name());
            context.session.set(key, value);
        }
        Ok(())
    }
}
