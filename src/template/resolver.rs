// ABOUTME: Resolves dotted/indexed paths against a session
// ABOUTME: Produces the array handle used by the cursor side-table

use super::cursor::ArrayHandle;
use super::error::{Result, TemplateError};
use super::session::Session;
use super::value::Value;

/// A path resolved to a value stored in the session
#[derive(Debug)]
pub struct Located<'s> {
    pub value: &'s Value,
    pub handle: ArrayHandle,
    /// The final segment was an explicit numeric index
    pub pinned: bool,
}

/// Resolve `path`, preferring the longest literal key prefix.
///
/// Returns `Ok(None)` for undefined paths and `IndexError` when an explicit
/// numeric segment falls outside an array.
pub fn locate<'s>(session: &'s Session, path: &str) -> Result<Option<Located<'s>>> {
    let segments: Vec<&str> = path.split('.').map(str::trim).collect();

    for split in (1..=segments.len()).rev() {
        let key = segments[..split].join(".");
        if let Some(root) = session.get(&key) {
            return descend(session, path, root, ArrayHandle::new(key), &segments[split..]);
        }
    }

    Ok(None)
}

fn descend<'s>(
    session: &'s Session,
    path: &str,
    root: &'s Value,
    mut handle: ArrayHandle,
    rest: &[&str],
) -> Result<Option<Located<'s>>> {
    let mut current = root;
    let mut pinned = false;
    let mut i = 0;

    while i < rest.len() {
        let segment = rest[i];
        match current {
            Value::Object(map) => match map.get(segment) {
                Some(next) => {
                    current = next;
                    handle = handle.child(segment);
                    pinned = false;
                    i += 1;
                }
                None => return Ok(None),
            },
            Value::Array(items) => match segment.parse::<usize>() {
                Ok(index) => match items.get(index) {
                    Some(next) => {
                        current = next;
                        handle = handle.child(segment);
                        pinned = true;
                        i += 1;
                    }
                    None => {
                        return Err(TemplateError::IndexError {
                            path: path.to_string(),
                            index,
                            len: items.len(),
                        })
                    }
                },
                // Field access through an array reads the element under its cursor
                Err(_) => {
                    let index = session.cursors().position(&handle).unwrap_or(0);
                    match items.get(index) {
                        Some(next) => {
                            current = next;
                            handle = handle.child(index.to_string());
                            pinned = false;
                        }
                        None => return Ok(None),
                    }
                }
            },
            _ => return Ok(None),
        }
    }

    Ok(Some(Located {
        value: current,
        handle,
        pinned,
    }))
}

/// Follow a handle produced by `locate` back to its value
pub fn value_at<'s>(session: &'s Session, handle: &ArrayHandle) -> Option<&'s Value> {
    let mut current = session.get(handle.root())?;
    for segment in handle.segments() {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Element `index` of the array behind `handle`; `Null` when absent
pub fn element_at(session: &Session, handle: &ArrayHandle, index: usize) -> Value {
    value_at(session, handle)
        .and_then(Value::as_array)
        .and_then(|items| items.get(index))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Session-level pin (`<name>.index`) that overrides iteration for an array
/// without touching its cursor
pub fn index_override(session: &Session, handle: &ArrayHandle) -> Option<usize> {
    session
        .get(&format!("{}.index", handle))
        .and_then(Value::as_i64)
        .and_then(|n| usize::try_from(n).ok())
}
