// ABOUTME: Side-table of per-array iteration cursors and the lock-step pass protocol
// ABOUTME: Lets independent actions walk several session arrays one element per pass

use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::trace;

/// Identity of an array inside a session: the root key plus the concrete
/// segments (field names or indices) that lead to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArrayHandle {
    root: String,
    segments: Vec<String>,
}

impl ArrayHandle {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            segments: Vec::new(),
        }
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self {
            root: self.root.clone(),
            segments,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True when the handle points at or below the session key `key`
    pub fn is_within(&self, key: &str) -> bool {
        if self.root == key {
            return true;
        }
        let full = self.to_string();
        full == key || full.starts_with(&format!("{}.", key))
    }
}

impl fmt::Display for ArrayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.root)?;
        for segment in &self.segments {
            write!(f, ".{}", segment)?;
        }
        Ok(())
    }
}

/// Result of one `advance_or_init` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Index of the element read by this call
    pub index: usize,
    /// No element remains after this one; the cursor has been cleared
    pub exhausted: bool,
    /// The array had no cursor before this call
    pub entered: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CursorTable {
    cursors: HashMap<ArrayHandle, usize>,
}

impl CursorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_cursor(&self, handle: &ArrayHandle) -> bool {
        self.cursors.contains_key(handle)
    }

    /// Index the next iterating read of `handle` will return
    pub fn position(&self, handle: &ArrayHandle) -> Option<usize> {
        self.cursors.get(handle).copied()
    }

    /// Read position for an array of `len` elements, then advance or clear
    pub fn advance_or_init(&mut self, handle: &ArrayHandle, len: usize) -> Step {
        let (index, entered) = match self.cursors.get(handle) {
            Some(index) => (*index, false),
            None => {
                trace!("Iteration for {} initializing to 0", handle);
                (0, true)
            }
        };

        let exhausted = index + 1 >= len;
        if exhausted {
            trace!("Iteration for {} exhausted", handle);
            self.cursors.remove(handle);
        } else {
            trace!("Iteration for {} advancing to {}", handle, index + 1);
            self.cursors.insert(handle.clone(), index + 1);
        }

        Step {
            index,
            exhausted,
            entered,
        }
    }

    pub fn clear(&mut self, handle: &ArrayHandle) -> bool {
        self.cursors.remove(handle).is_some()
    }

    /// Drop every cursor tracking an array stored at or below `key`
    pub fn clear_within(&mut self, key: &str) {
        self.cursors.retain(|handle, _| !handle.is_within(key));
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}

/// One synchronized read across every array touched while resolving a
/// template (or a set of templates). Each array advances at most once.
#[derive(Debug, Default)]
pub struct Pass {
    reads: HashMap<ArrayHandle, usize>,
    exhausted: bool,
}

impl Pass {
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterating read of `handle`; repeated reads in the same pass return the same index
    pub fn read(&mut self, cursors: &mut CursorTable, handle: &ArrayHandle, len: usize) -> usize {
        if let Some(index) = self.reads.get(handle) {
            return *index;
        }
        let step = cursors.advance_or_init(handle, len);
        self.exhausted |= step.exhausted;
        self.reads.insert(handle.clone(), step.index);
        step.index
    }

    /// Index read for `handle` during this pass, if it was read
    pub fn read_index(&self, handle: &ArrayHandle) -> Option<usize> {
        self.reads.get(handle).copied()
    }

    pub fn has_arrays(&self) -> bool {
        !self.reads.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

/// Drives repeated passes until any participating array is exhausted
#[derive(Debug, Default)]
pub struct CoIteration {
    touched: HashSet<ArrayHandle>,
    passes: usize,
    exhausted: bool,
}

impl CoIteration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_pass(&self) -> Pass {
        Pass::new()
    }

    /// Record a finished pass. A pass that touched no arrays ends the walk.
    pub fn end_pass(&mut self, pass: Pass) -> bool {
        self.passes += 1;
        if pass.exhausted || !pass.has_arrays() {
            self.exhausted = true;
        }
        self.touched.extend(pass.reads.into_keys());
        self.exhausted
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Clear the cursors of every array this walk touched
    pub fn finish(self, cursors: &mut CursorTable) {
        for handle in &self.touched {
            cursors.clear(handle);
        }
    }
}
