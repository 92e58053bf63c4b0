// ABOUTME: Session store holding dotted variable names and their values for a run
// ABOUTME: Owns the cursor side-table so iteration state never leaks into values

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;

use super::cursor::CursorTable;
use super::error::{Result, TemplateError};
use super::resolver;
use super::value::Value;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Session {
    #[serde(flatten)]
    values: IndexMap<String, Value>,
    #[serde(skip)]
    cursors: CursorTable,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a session from a JSON object
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        match Value::from(value) {
            Value::Object(values) => Ok(Self {
                values,
                cursors: CursorTable::new(),
            }),
            other => Err(TemplateError::ConfigurationError(format!(
                "session must be an object, got {}",
                other.type_name()
            ))),
        }
    }

    /// Build a session from a YAML mapping
    pub fn from_yaml(value: serde_yaml::Value) -> Result<Self> {
        match Value::from(value) {
            Value::Object(values) => Ok(Self {
                values,
                cursors: CursorTable::new(),
            }),
            Value::Null => Ok(Self::new()),
            other => Err(TemplateError::ConfigurationError(format!(
                "session must be a mapping, got {}",
                other.type_name()
            ))),
        }
    }

    /// Build a session of string values, e.g. from `key=value` pairs
    pub fn from_pairs(pairs: &HashMap<String, String>) -> Self {
        let mut session = Self::new();
        for (key, value) in pairs {
            session.set(key.clone(), Value::from(value.as_str()));
        }
        session
    }

    /// Value stored under the literal key `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Resolve a dotted/indexed path without touching iteration state
    pub fn lookup(&self, path: &str) -> Result<Option<&Value>> {
        Ok(resolver::locate(self, path)?.map(|located| located.value))
    }

    pub fn contains_path(&self, path: &str) -> bool {
        matches!(self.lookup(path), Ok(Some(_)))
    }

    /// Store a value, dropping cursors for any array previously stored under `key`
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        self.cursors.clear_within(&key);
        self.values.insert(key, value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.cursors.clear_within(key);
        self.values.shift_remove(key)
    }

    pub fn extend<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in entries {
            self.set(key, value);
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn cursors(&self) -> &CursorTable {
        &self.cursors
    }

    pub fn cursors_mut(&mut self) -> &mut CursorTable {
        &mut self.cursors
    }

    /// True when the array at `path` is mid-iteration
    pub fn has_cursor(&self, path: &str) -> bool {
        match resolver::locate(self, path) {
            Ok(Some(located)) => self.cursors.has_cursor(&located.handle),
            _ => false,
        }
    }

    /// Iterating read of `path`: returns the current element and whether the
    /// array is now exhausted. Non-array values are returned as-is and never
    /// report exhaustion.
    pub fn advance_or_init(&mut self, path: &str) -> Result<(Value, bool)> {
        let (handle, len) = match resolver::locate(self, path)? {
            Some(located) => match located.value {
                Value::Array(items) => (located.handle, items.len()),
                other => return Ok((other.clone(), false)),
            },
            None => {
                return Err(TemplateError::PathResolutionError {
                    path: path.to_string(),
                })
            }
        };

        let step = self.cursors.advance_or_init(&handle, len);
        let element = resolver::element_at(self, &handle, step.index);
        Ok((element, step.exhausted))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}
