// ABOUTME: Filter registry and built-in filters applied left-to-right to resolved values
// ABOUTME: Implements url coding, optional defaults, date formatting, random, join and current

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rand::Rng;
use std::collections::HashMap;

use super::cursor::{ArrayHandle, Pass};
use super::error::{Result, TemplateError};
use super::resolver;
use super::session::Session;
use super::value::Value;

/// A filter receives the value so far (`None` when the path is undefined),
/// its arguments and the iteration context, and returns the next value.
pub type FilterFn = fn(Option<Value>, &[String], &FilterContext<'_>) -> Result<Option<Value>>;

/// Read-only view of the evaluation state handed to each filter
pub struct FilterContext<'a> {
    pub path: &'a str,
    pub filter: &'a str,
    /// Set while the value is still the array exactly as stored in the session
    pub handle: Option<&'a ArrayHandle>,
    pub session: &'a Session,
    pub pass: Option<&'a Pass>,
}

impl FilterContext<'_> {
    pub fn type_error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::filter_type(self.path, self.filter, message)
    }

    /// Unwrap a defined value or fail with `PathResolutionError`
    pub fn require(&self, value: Option<Value>) -> Result<Value> {
        value.ok_or_else(|| TemplateError::PathResolutionError {
            path: self.path.to_string(),
        })
    }

    /// Position of the array's cursor as seen by this evaluation
    pub fn current_index(&self) -> usize {
        let Some(handle) = self.handle else {
            return 0;
        };
        self.pass
            .and_then(|pass| pass.read_index(handle))
            .or_else(|| self.session.cursors().position(handle))
            .or_else(|| resolver::index_override(self.session, handle))
            .unwrap_or(0)
    }
}

/// Immutable mapping of filter name to function, assembled once
#[derive(Clone)]
pub struct FilterRegistry {
    filters: HashMap<String, FilterFn>,
}

impl FilterRegistry {
    /// Registry holding every built-in filter
    pub fn builtin() -> Self {
        Self::builder().with_builtins().build()
    }

    pub fn builder() -> FilterRegistryBuilder {
        FilterRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<FilterFn> {
        self.filters.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[derive(Default)]
pub struct FilterRegistryBuilder {
    filters: HashMap<String, FilterFn>,
}

impl FilterRegistryBuilder {
    pub fn register(mut self, name: &str, filter: FilterFn) -> Self {
        self.filters.insert(name.to_string(), filter);
        self
    }

    pub fn with_builtins(self) -> Self {
        self.register("urlencode", urlencode_filter)
            .register("urldecode", urldecode_filter)
            .register("optional", optional_filter)
            .register("date_format", date_format_filter)
            .register("random", random_filter)
            .register("join", join_filter)
            .register("current", current_filter)
            .register("upcase", upcase_filter)
            .register("downcase", downcase_filter)
            .register("trim", trim_filter)
            .register("length", length_filter)
            .register("json", json_filter)
            .register("split", split_filter)
    }

    pub fn build(self) -> FilterRegistry {
        FilterRegistry {
            filters: self.filters,
        }
    }
}

/// Scalars usable as text input; arrays and objects are rejected
fn scalar_text(value: &Value, ctx: &FilterContext<'_>) -> Result<String> {
    match value {
        Value::Array(_) | Value::Object(_) => Err(ctx.type_error(format!(
            "expected a string, got {}",
            value.type_name()
        ))),
        other => Ok(other.to_display_string()),
    }
}

pub fn urlencode_filter(
    value: Option<Value>,
    _args: &[String],
    ctx: &FilterContext<'_>,
) -> Result<Option<Value>> {
    let text = scalar_text(&ctx.require(value)?, ctx)?;
    Ok(Some(Value::String(urlencoding::encode(&text).into_owned())))
}

pub fn urldecode_filter(
    value: Option<Value>,
    _args: &[String],
    ctx: &FilterContext<'_>,
) -> Result<Option<Value>> {
    let text = scalar_text(&ctx.require(value)?, ctx)?;
    let decoded = urlencoding::decode(&text)
        .map_err(|e| ctx.type_error(format!("invalid percent-encoding: {}", e)))?;
    Ok(Some(Value::String(decoded.into_owned())))
}

pub fn optional_filter(
    value: Option<Value>,
    args: &[String],
    _ctx: &FilterContext<'_>,
) -> Result<Option<Value>> {
    Ok(Some(match value {
        Some(value) => value,
        None => Value::String(args.first().cloned().unwrap_or_default()),
    }))
}

const DEFAULT_DATE_PATTERN: &str = "YYYY-MM-DDTHH:mm:ssZ";

pub fn date_format_filter(
    value: Option<Value>,
    args: &[String],
    ctx: &FilterContext<'_>,
) -> Result<Option<Value>> {
    let value = ctx.require(value)?;
    let date = to_datetime(&value).ok_or_else(|| {
        ctx.type_error(format!("expected a date, got {}", value.type_name()))
    })?;

    let pattern = args.first().map(String::as_str).unwrap_or(DEFAULT_DATE_PATTERN);
    let strftime = if pattern.contains('%') {
        pattern.to_string()
    } else {
        calendar_to_strftime(pattern)
    };

    if StrftimeItems::new(&strftime).any(|item| matches!(item, Item::Error)) {
        return Err(ctx.type_error(format!("invalid date pattern '{}'", pattern)));
    }

    Ok(Some(Value::String(date.format(&strftime).to_string())))
}

/// Interpret dates, RFC 3339 / ISO-ish strings and Unix seconds
pub fn to_datetime(value: &Value) -> Option<DateTime<FixedOffset>> {
    let utc = |naive: NaiveDateTime| Utc.from_utc_datetime(&naive).fixed_offset();
    match value {
        Value::Date(date) => Some(*date),
        Value::String(text) => {
            let text = text.trim();
            DateTime::parse_from_rfc3339(text)
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
                        .ok()
                        .map(utc)
                })
                .or_else(|| {
                    NaiveDate::parse_from_str(text, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                        .map(utc)
                })
        }
        Value::Integer(secs) => Utc
            .timestamp_opt(*secs, 0)
            .single()
            .map(|d| d.fixed_offset()),
        // whole seconds round down so the nanosecond part stays non-negative
        Value::Float(secs) if secs.is_finite() => Utc
            .timestamp_opt(
                secs.floor() as i64,
                ((secs.rem_euclid(1.0) * 1e9) as u32).min(999_999_999),
            )
            .single()
            .map(|d| d.fixed_offset()),
        _ => None,
    }
}

// Longest tokens first so `YYYY` wins over `YY`
const CALENDAR_TOKENS: &[(&str, &str)] = &[
    ("YYYY", "%Y"),
    ("MMMM", "%B"),
    ("dddd", "%A"),
    ("MMM", "%b"),
    ("ddd", "%a"),
    ("SSS", "%3f"),
    ("YY", "%y"),
    ("MM", "%m"),
    ("DD", "%d"),
    ("HH", "%H"),
    ("hh", "%I"),
    ("mm", "%M"),
    ("ss", "%S"),
    ("ZZ", "%z"),
    ("M", "%-m"),
    ("D", "%-d"),
    ("H", "%-H"),
    ("h", "%-I"),
    ("m", "%-M"),
    ("s", "%-S"),
    ("A", "%p"),
    ("a", "%P"),
    ("Z", "%:z"),
    ("X", "%s"),
];

/// Translate calendar tokens (`YYYY-MM-DD`) into a strftime pattern.
/// Text inside `[...]` is copied literally.
pub fn calendar_to_strftime(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut rest = pattern;

    'outer: while let Some(c) = rest.chars().next() {
        if c == '[' {
            if let Some(end) = rest.find(']') {
                out.push_str(&rest[1..end].replace('%', "%%"));
                rest = &rest[end + 1..];
                continue;
            }
        }
        for (token, spec) in CALENDAR_TOKENS {
            if let Some(stripped) = rest.strip_prefix(token) {
                out.push_str(spec);
                rest = stripped;
                continue 'outer;
            }
        }
        if c == '%' {
            out.push_str("%%");
        } else {
            out.push(c);
        }
        rest = &rest[c.len_utf8()..];
    }

    out
}

pub fn random_filter(
    value: Option<Value>,
    _args: &[String],
    ctx: &FilterContext<'_>,
) -> Result<Option<Value>> {
    let mut rng = rand::thread_rng();
    let value = ctx.require(value)?;

    let result = match &value {
        Value::Array(items) if items.is_empty() => Value::Null,
        Value::Array(items) => items[rng.gen_range(0..items.len())].clone(),
        Value::String(text) => match parse_range(text) {
            Some((a, b)) => Value::Integer(rng.gen_range(a.min(b)..=a.max(b))),
            None => match text.trim().parse::<i64>() {
                Ok(n) => random_below(&mut rng, n),
                Err(_) => value.clone(),
            },
        },
        Value::Integer(n) => random_below(&mut rng, *n),
        _ => value.clone(),
    };

    Ok(Some(result))
}

/// Parse `"A-B"` where A and B are integers (a leading `-` belongs to A)
fn parse_range(text: &str) -> Option<(i64, i64)> {
    let text = text.trim();
    let dash = text.get(1..)?.find('-')? + 1;
    let low = text[..dash].trim().parse().ok()?;
    let high = text[dash + 1..].trim().parse().ok()?;
    Some((low, high))
}

fn random_below(rng: &mut impl Rng, n: i64) -> Value {
    if n <= 1 {
        Value::Integer(0)
    } else {
        Value::Integer(rng.gen_range(0..n))
    }
}

pub fn join_filter(
    value: Option<Value>,
    args: &[String],
    ctx: &FilterContext<'_>,
) -> Result<Option<Value>> {
    let value = ctx.require(value)?;
    let delimiter = args.first().map(String::as_str).unwrap_or(",");
    Ok(Some(match value {
        Value::Array(items) => Value::String(
            items
                .iter()
                .map(Value::to_display_string)
                .collect::<Vec<_>>()
                .join(delimiter),
        ),
        other => other,
    }))
}

pub fn current_filter(
    value: Option<Value>,
    _args: &[String],
    ctx: &FilterContext<'_>,
) -> Result<Option<Value>> {
    Ok(Some(match ctx.require(value)? {
        Value::Array(items) => items
            .get(ctx.current_index())
            .cloned()
            .unwrap_or(Value::Null),
        other => other,
    }))
}

fn map_text(
    value: Option<Value>,
    ctx: &FilterContext<'_>,
    f: impl Fn(&str) -> String,
) -> Result<Option<Value>> {
    Ok(Some(match ctx.require(value)? {
        Value::String(text) => Value::String(f(&text)),
        value @ (Value::Array(_) | Value::Object(_)) => {
            return Err(ctx.type_error(format!("expected a string, got {}", value.type_name())))
        }
        other => other,
    }))
}

pub fn upcase_filter(
    value: Option<Value>,
    _args: &[String],
    ctx: &FilterContext<'_>,
) -> Result<Option<Value>> {
    map_text(value, ctx, str::to_uppercase)
}

pub fn downcase_filter(
    value: Option<Value>,
    _args: &[String],
    ctx: &FilterContext<'_>,
) -> Result<Option<Value>> {
    map_text(value, ctx, str::to_lowercase)
}

pub fn trim_filter(
    value: Option<Value>,
    _args: &[String],
    ctx: &FilterContext<'_>,
) -> Result<Option<Value>> {
    map_text(value, ctx, |s| s.trim().to_string())
}

pub fn length_filter(
    value: Option<Value>,
    _args: &[String],
    ctx: &FilterContext<'_>,
) -> Result<Option<Value>> {
    let len = match ctx.require(value)? {
        Value::String(text) => text.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => {
            return Err(ctx.type_error(format!("{} has no length", other.type_name())));
        }
    };
    Ok(Some(Value::Integer(len as i64)))
}

pub fn json_filter(
    value: Option<Value>,
    _args: &[String],
    ctx: &FilterContext<'_>,
) -> Result<Option<Value>> {
    let value = ctx.require(value)?;
    Ok(Some(Value::String(value.to_json().to_string())))
}

pub fn split_filter(
    value: Option<Value>,
    args: &[String],
    ctx: &FilterContext<'_>,
) -> Result<Option<Value>> {
    let delimiter = args.first().map(String::as_str).unwrap_or(",");
    Ok(Some(match ctx.require(value)? {
        Value::String(text) if delimiter.is_empty() => {
            Value::Array(text.chars().map(|c| Value::String(c.to_string())).collect())
        }
        Value::String(text) => Value::Array(text.split(delimiter).map(Value::from).collect()),
        array @ Value::Array(_) => array,
        other => {
            return Err(ctx.type_error(format!(
                "expected a string, got {}",
                other.type_name()
            )))
        }
    }))
}
