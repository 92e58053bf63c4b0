// ABOUTME: Interpolation entry points: plain, manual (raw) and iterating-pass modes
// ABOUTME: Resolves tokens, runs filter chains and assembles strings or native values

use indexmap::IndexMap;
use std::collections::HashSet;

use super::cursor::{ArrayHandle, Pass};
use super::error::{Result, TemplateError};
use super::filters::{FilterContext, FilterRegistry};
use super::parser::{contains_token, PathExpr, Segment, Template, Token};
use super::resolver;
use super::session::Session;
use super::value::Value;

#[derive(Clone, Default)]
pub struct Interpolator {
    filters: FilterRegistry,
}

impl Interpolator {
    /// Create an interpolator with all built-in filters
    pub fn new() -> Self {
        Self::with_filters(FilterRegistry::builtin())
    }

    pub fn with_filters(filters: FilterRegistry) -> Self {
        Self { filters }
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    /// Interpolate a string, array or object leaf-by-leaf.
    ///
    /// A string that is exactly one token yields the resolved value's native
    /// type; any other string yields a string. Cursors are never advanced.
    pub fn interpolate(&self, template: &Value, session: &Session) -> Result<Value> {
        Evaluator::new(&self.filters, Snapshot { session }, false).eval_value(template)
    }

    pub fn interpolate_str(&self, text: &str, session: &Session) -> Result<Value> {
        Evaluator::new(&self.filters, Snapshot { session }, false).eval_text(text)
    }

    /// Interpolate and always return text
    pub fn render(&self, text: &str, session: &Session) -> Result<String> {
        Ok(self.interpolate_str(text, session)?.to_display_string())
    }

    /// Manual mode: every token behaves as `<%! ... %>`. Stored templates are
    /// returned verbatim instead of being re-evaluated.
    pub fn interpolate_raw(&self, template: &Value, session: &Session) -> Result<Value> {
        Evaluator::new(&self.filters, Snapshot { session }, true).eval_value(template)
    }

    /// Interpolate as part of an iteration pass. Non-raw tokens that resolve
    /// to an array read the element under its cursor and advance it once per
    /// pass; `pass` collects the exhaustion signal.
    pub fn interpolate_pass(
        &self,
        template: &Value,
        session: &mut Session,
        pass: &mut Pass,
    ) -> Result<Value> {
        Evaluator::new(&self.filters, Iterating { session, pass }, false).eval_value(template)
    }

    /// Direct lookup of a bare path within a pass: no filters, no nested
    /// evaluation, arrays advance through the pass.
    pub fn lookup_pass(&self, path: &str, session: &mut Session, pass: &mut Pass) -> Result<Value> {
        let mut evaluator = Evaluator::new(&self.filters, Iterating { session, pass }, true);
        let (value, _) = evaluator.resolve(path, true)?;
        value.ok_or_else(|| TemplateError::PathResolutionError {
            path: path.to_string(),
        })
    }

    /// Check syntax and filter names without resolving anything
    pub fn validate(&self, text: &str) -> Result<()> {
        let template = Template::parse(text)?;
        for token in template.tokens() {
            self.check_filters(token)?;
        }
        Ok(())
    }

    /// Check if a string contains template expressions
    pub fn has_templates(&self, text: &str) -> bool {
        contains_token(text)
    }

    fn check_filters(&self, token: &Token) -> Result<()> {
        match token.filters.iter().find(|f| !self.filters.contains(&f.name)) {
            Some(unknown) => Err(TemplateError::FilterNotFoundError {
                path: token.path.display(),
                filter: unknown.name.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// How an evaluation reads the session
trait Access {
    fn session(&self) -> &Session;
    fn pass(&self) -> Option<&Pass>;
    fn iterates(&self) -> bool;
    /// Iterating read of an array; `None` when this evaluation never iterates
    fn iterate(&mut self, handle: &ArrayHandle, len: usize) -> Option<usize>;
}

struct Snapshot<'s> {
    session: &'s Session,
}

impl Access for Snapshot<'_> {
    fn session(&self) -> &Session {
        self.session
    }

    fn pass(&self) -> Option<&Pass> {
        None
    }

    fn iterates(&self) -> bool {
        false
    }

    fn iterate(&mut self, _handle: &ArrayHandle, _len: usize) -> Option<usize> {
        None
    }
}

struct Iterating<'s, 'p> {
    session: &'s mut Session,
    pass: &'p mut Pass,
}

impl Access for Iterating<'_, '_> {
    fn session(&self) -> &Session {
        &*self.session
    }

    fn pass(&self) -> Option<&Pass> {
        Some(&*self.pass)
    }

    fn iterates(&self) -> bool {
        true
    }

    fn iterate(&mut self, handle: &ArrayHandle, len: usize) -> Option<usize> {
        Some(self.pass.read(self.session.cursors_mut(), handle, len))
    }
}

/// State for one top-level interpolation call
struct Evaluator<'f, A: Access> {
    filters: &'f FilterRegistry,
    access: A,
    manual: bool,
    in_progress: HashSet<String>,
}

impl<'f, A: Access> Evaluator<'f, A> {
    fn new(filters: &'f FilterRegistry, access: A, manual: bool) -> Self {
        Self {
            filters,
            access,
            manual,
            in_progress: HashSet::new(),
        }
    }

    fn eval_value(&mut self, template: &Value) -> Result<Value> {
        match template {
            Value::String(text) => self.eval_text(text),
            Value::Array(items) => items
                .iter()
                .map(|item| self.eval_value(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut resolved = IndexMap::with_capacity(map.len());
                for (key, value) in map {
                    let key = if contains_token(key) {
                        self.eval_text(key)?.to_display_string()
                    } else {
                        key.clone()
                    };
                    resolved.insert(key, self.eval_value(value)?);
                }
                Ok(Value::Object(resolved))
            }
            // Numbers, booleans, dates and null pass through untouched
            other => Ok(other.clone()),
        }
    }

    fn eval_text(&mut self, text: &str) -> Result<Value> {
        if !contains_token(text) {
            return Ok(Value::String(text.to_string()));
        }

        let template = Template::parse(text)?;
        self.eval_template(&template)
    }

    fn eval_template(&mut self, template: &Template) -> Result<Value> {
        if let Some(token) = template.single_token() {
            return self.eval_token(token);
        }

        let mut out = String::new();
        for segment in template.segments() {
            match segment {
                Segment::Literal(literal) => out.push_str(literal),
                Segment::Token(token) => out.push_str(&self.eval_token(token)?.to_display_string()),
            }
        }
        Ok(Value::String(out))
    }

    fn eval_token(&mut self, token: &Token) -> Result<Value> {
        let label = token.path.display();
        if let Some(unknown) = token.filters.iter().find(|f| !self.filters.contains(&f.name)) {
            return Err(TemplateError::FilterNotFoundError {
                path: label,
                filter: unknown.name.clone(),
            });
        }

        let raw = token.raw || self.manual;
        let (mut value, mut handle) = match &token.path {
            PathExpr::Literal(text) => (Some(Value::String(text.clone())), None),
            PathExpr::Path(path) => {
                let iterate = !raw && !token.has_filter("current");
                let (value, handle) = self.resolve(path, iterate)?;
                match value {
                    Some(Value::String(text)) if !raw && contains_token(&text) => {
                        (Some(self.eval_nested(path, &text)?), None)
                    }
                    other => (other, handle),
                }
            }
        };

        for (position, call) in token.filters.iter().enumerate() {
            // an undefined value flows untouched to a later `optional`
            let optional_follows = token.filters[position + 1..]
                .iter()
                .any(|later| later.name == "optional");
            if value.is_none() && optional_follows && call.name != "optional" {
                continue;
            }

            let filter = self.filters.get(&call.name).ok_or_else(|| {
                TemplateError::FilterNotFoundError {
                    path: label.clone(),
                    filter: call.name.clone(),
                }
            })?;
            let ctx = FilterContext {
                path: &label,
                filter: &call.name,
                handle: handle.as_ref(),
                session: self.access.session(),
                pass: self.access.pass(),
            };
            value = filter(value, &call.args, &ctx)?;
            handle = None;
        }

        value.ok_or(TemplateError::PathResolutionError { path: label })
    }

    /// Evaluate a template stored in the session, guarding against cycles.
    /// Stored strings are templates only when they parse into real tokens;
    /// anything else (`"50<%"`) is plain data and comes back unchanged.
    fn eval_nested(&mut self, path: &str, text: &str) -> Result<Value> {
        let template = match Template::parse(text) {
            Ok(template) if template.tokens().next().is_some() => template,
            _ => return Ok(Value::String(text.to_string())),
        };
        if !self.in_progress.insert(path.to_string()) {
            return Err(TemplateError::CyclicResolutionError {
                path: path.to_string(),
            });
        }
        let result = self.eval_template(&template);
        self.in_progress.remove(path);
        result
    }

    /// Resolve a path. With `iterate` set and an iterating access, an array
    /// target reads through its cursor (or its `.index` pin).
    fn resolve(&mut self, path: &str, iterate: bool) -> Result<(Option<Value>, Option<ArrayHandle>)> {
        let (handle, len) = match resolver::locate(self.access.session(), path)? {
            None => return Ok((None, None)),
            Some(located) => match located.value {
                Value::Array(items) if iterate && !located.pinned && self.access.iterates() => {
                    (located.handle, items.len())
                }
                value => return Ok((Some(value.clone()), Some(located.handle))),
            },
        };

        let index = match resolver::index_override(self.access.session(), &handle) {
            Some(index) if index >= len => {
                return Err(TemplateError::IndexError {
                    path: path.to_string(),
                    index,
                    len,
                })
            }
            Some(index) => index,
            None => match self.access.iterate(&handle, len) {
                Some(index) => index,
                None => 0,
            },
        };

        Ok((Some(resolver::element_at(self.access.session(), &handle, index)), None))
    }
}
