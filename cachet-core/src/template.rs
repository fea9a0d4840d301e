use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;

use crate::error::{CacheError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// A cache directory template such as `cache/{exchange_name}/{market_type}/`.
///
/// Placeholders name fields of the instance the cache belongs to. The
/// instance is serialized with `serde` and its top-level fields are looked
/// up by name, so any `#[derive(Serialize)]` struct works, including ones
/// using `#[serde(rename = "...")]`.
///
/// `{{` and `}}` produce literal braces.
///
/// # Examples
///
/// ```
/// use cachet_core::PathTemplate;
/// use serde::Serialize;
/// use std::path::PathBuf;
///
/// #[derive(Serialize)]
/// struct Connector {
///     exchange_name: String,
///     api_version: u32,
/// }
///
/// let template = PathTemplate::parse("cache/{exchange_name}/v{api_version}/").unwrap();
/// assert_eq!(template.placeholders(), vec!["exchange_name", "api_version"]);
///
/// let connector = Connector { exchange_name: "binance".into(), api_version: 3 };
/// assert_eq!(template.render(&connector).unwrap(), PathBuf::from("cache/binance/v3/"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parses a template string.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidTemplate`] for an unterminated `{`,
    /// an unmatched `}` or an empty `{}` placeholder.
    pub fn parse(template: &str) -> Result<Self> {
        let invalid = |reason: &str| CacheError::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for n in chars.by_ref() {
                        match n {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(invalid("nested `{` inside a placeholder")),
                            other => name.push(other),
                        }
                    }
                    if !closed {
                        return Err(invalid("unterminated placeholder"));
                    }
                    let name = name.trim();
                    if name.is_empty() {
                        return Err(invalid("empty placeholder `{}`"));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(name.to_string()));
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(invalid("single `}` must be escaped as `}}`")),
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// The template as it was written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Field names referenced by the template, in order of appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Field(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Renders the template from the serialized fields of `instance`.
    ///
    /// Strings are inserted verbatim, numbers and booleans by their display
    /// form, and `null` (a `None` field) as an empty string.
    ///
    /// # Errors
    ///
    /// - [`CacheError::NotAStruct`] if `instance` does not serialize to a map
    /// - [`CacheError::MissingField`] if a placeholder names an absent field
    /// - [`CacheError::UnrenderableField`] for sequence or map fields
    pub fn render<T: Serialize + ?Sized>(&self, instance: &T) -> Result<PathBuf> {
        let fields = match serde_json::to_value(instance)? {
            Value::Object(map) => map,
            other => {
                return Err(CacheError::NotAStruct {
                    found: value_kind(&other),
                })
            }
        };

        self.render_with(|name| match fields.get(name) {
            None => Err(CacheError::MissingField {
                field: name.to_string(),
            }),
            Some(value) => scalar_to_string(name, value),
        })
    }

    /// Renders the template from an explicit field map.
    pub fn render_map(&self, fields: &HashMap<String, String>) -> Result<PathBuf> {
        self.render_with(|name| {
            fields
                .get(name)
                .cloned()
                .ok_or_else(|| CacheError::MissingField {
                    field: name.to_string(),
                })
        })
    }

    fn render_with<F>(&self, mut lookup: F) -> Result<PathBuf>
    where
        F: FnMut(&str) -> Result<String>,
    {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => out.push_str(&lookup(name)?),
            }
        }
        Ok(PathBuf::from(out))
    }
}

fn scalar_to_string(field: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(_) | Value::Object(_) => Err(CacheError::UnrenderableField {
            field: field.to_string(),
            reason: format!("{} values have no path form", value_kind(value)),
        }),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a map",
    }
}
