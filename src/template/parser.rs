// ABOUTME: Tokenizer for `<% ... %>` / `<%! ... %>` spans inside template text
// ABOUTME: Splits text into literal and token segments and parses filter chains

use super::error::{Result, TemplateError};

const OPEN: &str = "<%";
const CLOSE: &str = "%>";

/// Quick check used to skip parsing for plain strings
pub fn contains_token(text: &str) -> bool {
    text.contains(OPEN)
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathExpr {
    /// Dotted/indexed session path such as `a.b` or `arr.2`
    Path(String),
    /// Quoted literal such as `'3-7'`
    Literal(String),
}

impl PathExpr {
    pub fn display(&self) -> String {
        match self {
            PathExpr::Path(path) => path.clone(),
            PathExpr::Literal(text) => format!("'{}'", text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub path: PathExpr,
    pub raw: bool,
    pub filters: Vec<FilterCall>,
    pub offset: usize,
}

impl Token {
    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.iter().any(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    Token(Token),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse template text into an ordered list of literal and token segments
    pub fn parse(text: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut pos = 0;

        while let Some(found) = text[pos..].find(OPEN) {
            let start = pos + found;
            if start > pos {
                segments.push(Segment::Literal(text[pos..start].to_string()));
            }

            let mut body_start = start + OPEN.len();
            let raw = text[body_start..].starts_with('!');
            if raw {
                body_start += 1;
            }

            let end = find_close(text, body_start, start)?;
            let mut token = parse_body(&text[body_start..end], body_start)?;
            token.raw = raw;
            token.offset = start;
            segments.push(Segment::Token(token));

            pos = end + CLOSE.len();
        }

        if pos < text.len() {
            segments.push(Segment::Literal(text[pos..].to_string()));
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The token when the template is exactly one token with no surrounding text
    pub fn single_token(&self) -> Option<&Token> {
        match self.segments.as_slice() {
            [Segment::Token(token)] => Some(token),
            _ => None,
        }
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Token(token) => Some(token),
            Segment::Literal(_) => None,
        })
    }
}

/// Locate the closing marker, ignoring any `%>` that sits inside quotes
fn find_close(text: &str, from: usize, open_at: usize) -> Result<usize> {
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;
    let mut quote_at = 0;
    let mut i = from;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'\'' || b == b'"' {
                    quote = Some(b);
                    quote_at = i;
                } else if bytes[i..].starts_with(CLOSE.as_bytes()) {
                    return Ok(i);
                }
            }
        }
        i += 1;
    }

    match quote {
        Some(_) => Err(TemplateError::parse(quote_at, "unterminated quote")),
        None => Err(TemplateError::parse(open_at, "unterminated token, missing `%>`")),
    }
}

fn parse_body(body: &str, offset: usize) -> Result<Token> {
    let parts = split_unquoted(body, '|', offset)?;
    let (path_offset, path_text) = parts[0];
    let path_text = path_text.trim();
    if path_text.is_empty() {
        return Err(TemplateError::parse(path_offset, "empty path"));
    }

    let path = match unquote(path_text) {
        Some(literal) => PathExpr::Literal(literal),
        None => PathExpr::Path(path_text.to_string()),
    };

    let filters = parts[1..]
        .iter()
        .map(|(at, spec)| parse_filter(spec, *at))
        .collect::<Result<Vec<_>>>()?;

    Ok(Token {
        path,
        raw: false,
        filters,
        offset,
    })
}

/// Parse `name`, `name,args` or `name(args)`
fn parse_filter(spec: &str, offset: usize) -> Result<FilterCall> {
    let trimmed = spec.trim();
    let paren = trimmed.find('(');
    let comma = trimmed.find(',');

    let (name, args_text) = match (paren, comma) {
        (Some(p), c) if c.map_or(true, |c| p < c) => {
            if !trimmed.ends_with(')') {
                return Err(TemplateError::parse(offset, "missing `)` in filter arguments"));
            }
            (&trimmed[..p], &trimmed[p + 1..trimmed.len() - 1])
        }
        (_, Some(c)) => (&trimmed[..c], &trimmed[c + 1..]),
        _ => (trimmed, ""),
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(TemplateError::parse(offset, "empty filter name"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(TemplateError::parse(
            offset,
            format!("invalid filter name '{}'", name),
        ));
    }

    let args = if args_text.trim().is_empty() {
        Vec::new()
    } else {
        split_unquoted(args_text, ',', offset)?
            .into_iter()
            .map(|(_, arg)| {
                let arg = arg.trim();
                unquote(arg).unwrap_or_else(|| arg.to_string())
            })
            .collect()
    };

    Ok(FilterCall {
        name: name.to_string(),
        args,
    })
}

/// Split on `sep` outside single/double quotes, returning each part with its offset
fn split_unquoted(text: &str, sep: char, offset: usize) -> Result<Vec<(usize, &str)>> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        if c == '\'' || c == '"' {
            quote = Some(c);
        } else if c == sep {
            parts.push((offset + start, &text[start..i]));
            start = i + c.len_utf8();
        }
    }

    if quote.is_some() {
        return Err(TemplateError::parse(offset, "unterminated quote"));
    }
    parts.push((offset + start, &text[start..]));
    Ok(parts)
}

/// Strip matching quotes and resolve backslash escapes; `None` if not quoted
fn unquote(text: &str) -> Option<String> {
    let first = text.chars().next()?;
    if text.len() < 2 || !(first == '\'' || first == '"') || !text.ends_with(first) {
        return None;
    }

    let inner = &text[1..text.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('t') => out.push('\t'),
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}
