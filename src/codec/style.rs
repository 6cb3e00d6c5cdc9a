//! Version 3 `style`/`explode` grammars.

use super::primitive::coerce;
use super::query::QueryString;
use super::{Shape, NOT_FORMATTED};
use crate::report::ErrorNode;
use crate::spec::{AdditionalProperties, ParameterStyle, SchemaArena, SchemaId, SchemaSpec};
use serde_json::{Map, Value};

/// Leaf decoding shared by every style: optional percent-decoding, then coercion.
pub(crate) struct Leaves<'a> {
    pub schemas: &'a SchemaArena,
    pub percent_decode: bool,
}

impl Leaves<'_> {
    fn text(&self, raw: &str) -> Result<String, String> {
        if self.percent_decode {
            urlencoding::decode(raw)
                .map(|s| s.into_owned())
                .map_err(|_| NOT_FORMATTED.to_string())
        } else {
            Ok(raw.to_string())
        }
    }

    pub fn leaf(&self, schema: Option<SchemaId>, raw: &str) -> Result<Value, String> {
        let text = self.text(raw)?;
        coerce(schema.map(|id| self.schemas.get(id)), &text)
    }

    pub fn array<'t>(
        &self,
        spec: &SchemaSpec,
        tokens: impl IntoIterator<Item = &'t str>,
    ) -> Result<Value, ErrorNode> {
        let mut errors = ErrorNode::new();
        let mut items = Vec::new();
        for (index, token) in tokens.into_iter().enumerate() {
            match self.leaf(spec.items, token) {
                Ok(value) => items.push(value),
                Err(message) => errors.nest(index.to_string()).push(message),
            }
        }
        errors.into_result(Value::Array(items))
    }

    pub fn object<'t>(
        &self,
        spec: &SchemaSpec,
        pairs: impl IntoIterator<Item = (&'t str, &'t str)>,
    ) -> Result<Value, ErrorNode> {
        let mut errors = ErrorNode::new();
        let mut map = Map::new();
        for (key, raw) in pairs {
            let key = match self.text(key) {
                Ok(key) => key,
                Err(message) => {
                    errors.push(message);
                    continue;
                }
            };
            let schema = spec.properties.get(&key).copied().or(
                match spec.additional_properties {
                    AdditionalProperties::Schema(id) => Some(id),
                    _ => None,
                },
            );
            match self.leaf(schema, raw) {
                Ok(value) => {
                    map.insert(key, value);
                }
                Err(message) => errors.nest(key).push(message),
            }
        }
        errors.into_result(Value::Object(map))
    }
}

/// Decode a single wire string for a path, header or cookie parameter, or a
/// query parameter that arrives as one occurrence.
pub(crate) fn decode_styled(
    leaves: &Leaves<'_>,
    style: ParameterStyle,
    explode: bool,
    name: &str,
    raw: &str,
    schema: Option<SchemaId>,
) -> Result<Value, ErrorNode> {
    let spec = schema.map(|id| leaves.schemas.get(id));
    let shape = Shape::of(spec);
    match style {
        ParameterStyle::Simple => split_style(leaves, shape, schema, raw, ',', explode),
        ParameterStyle::Label => {
            let body = raw.strip_prefix('.').ok_or_else(not_formatted)?;
            let delimiter = if explode { '.' } else { ',' };
            match shape {
                Shape::Primitive => leaf(leaves, schema, body),
                // Exploded label objects are `.a=1.b=2`; unexploded are `.a,1,b,2`.
                _ => split_style(leaves, shape, schema, body, delimiter, explode),
            }
        }
        ParameterStyle::Matrix => {
            let prefix = format!(";{name}");
            match shape {
                Shape::Primitive => {
                    let rest = raw.strip_prefix(&prefix).ok_or_else(not_formatted)?;
                    if rest.is_empty() {
                        return leaf(leaves, schema, "");
                    }
                    let value = rest.strip_prefix('=').ok_or_else(not_formatted)?;
                    leaf(leaves, schema, value)
                }
                Shape::Array(spec) if explode => {
                    let entry = format!("{name}=");
                    let mut tokens = Vec::new();
                    for part in raw.split(';').skip(1) {
                        tokens.push(part.strip_prefix(&entry).ok_or_else(not_formatted)?);
                    }
                    if !raw.starts_with(';') || tokens.is_empty() {
                        return Err(not_formatted());
                    }
                    leaves.array(spec, tokens)
                }
                Shape::Array(spec) => {
                    let rest = raw.strip_prefix(&prefix).ok_or_else(not_formatted)?;
                    let list = rest.strip_prefix('=').ok_or_else(not_formatted)?;
                    leaves.array(spec, list.split(','))
                }
                Shape::Object(_) => Err(unsupported(style, "object")),
            }
        }
        ParameterStyle::Form => {
            // Cookies and single query occurrences: exploded arrays and objects
            // cannot be told apart from the unexploded form here.
            split_style(leaves, shape, schema, raw, ',', false)
        }
        ParameterStyle::SpaceDelimited | ParameterStyle::PipeDelimited => {
            let delimiter = if style == ParameterStyle::SpaceDelimited {
                ' '
            } else {
                '|'
            };
            match shape {
                Shape::Array(spec) => leaves.array(spec, raw.split(delimiter)),
                Shape::Object(_) => Err(unsupported(style, "object")),
                Shape::Primitive => leaf(leaves, schema, raw),
            }
        }
        ParameterStyle::DeepObject => Err(unsupported(style, shape.name())),
    }
}

/// `simple`-like grammar: arrays are delimited tokens; objects are either
/// alternating `key,value` tokens or (exploded) `key=value` tokens.
fn split_style(
    leaves: &Leaves<'_>,
    shape: Shape<'_>,
    schema: Option<SchemaId>,
    raw: &str,
    delimiter: char,
    explode: bool,
) -> Result<Value, ErrorNode> {
    match shape {
        Shape::Primitive => leaf(leaves, schema, raw),
        Shape::Array(spec) => leaves.array(spec, raw.split(delimiter)),
        Shape::Object(spec) => {
            let pairs = if explode {
                key_value_tokens(raw.split(delimiter))?
            } else {
                alternating_pairs(raw.split(delimiter))?
            };
            leaves.object(spec, pairs)
        }
    }
}

/// Exploded query forms: every occurrence of a name contributes one array item.
pub(crate) fn decode_exploded_array(
    leaves: &Leaves<'_>,
    spec: &SchemaSpec,
    values: &[&str],
) -> Result<Value, ErrorNode> {
    leaves.array(spec, values.iter().copied())
}

/// Exploded `form` objects: each declared property (or, for schemas without
/// declared properties, every unclaimed key) is its own query pair. Returns the
/// value and the keys it consumed, or `None` when no key applies.
pub(crate) fn decode_exploded_object(
    leaves: &Leaves<'_>,
    spec: &SchemaSpec,
    query: &QueryString,
    claimed: &[&str],
) -> Option<(Result<Value, ErrorNode>, Vec<String>)> {
    let open = spec.properties.is_empty();
    let mut pairs = Vec::new();
    let mut consumed: Vec<String> = Vec::new();
    for (key, value) in query.pairs() {
        let applies = if open {
            !claimed.contains(&key.as_str())
        } else {
            spec.properties.contains_key(key)
        };
        if applies {
            pairs.push((key.as_str(), value.as_str()));
            if !consumed.contains(key) {
                consumed.push(key.clone());
            }
        }
    }
    if pairs.is_empty() {
        return None;
    }
    Some((leaves.object(spec, pairs), consumed))
}

/// `deepObject`: `name[key]=value` pairs.
pub(crate) fn decode_deep_object(
    leaves: &Leaves<'_>,
    name: &str,
    schema: Option<SchemaId>,
    query: &QueryString,
) -> Option<(Result<Value, ErrorNode>, Vec<String>)> {
    let prefix = format!("{name}[");
    let mut pairs = Vec::new();
    let mut consumed: Vec<String> = Vec::new();
    for (key, value) in query.pairs() {
        let Some(inner) = key.strip_prefix(&prefix).and_then(|k| k.strip_suffix(']')) else {
            continue;
        };
        pairs.push((inner, value.as_str()));
        if !consumed.contains(key) {
            consumed.push(key.clone());
        }
    }
    if pairs.is_empty() {
        return None;
    }
    let spec = schema.map(|id| leaves.schemas.get(id));
    let result = match Shape::of(spec) {
        Shape::Object(spec) => leaves.object(spec, pairs),
        shape => Err(unsupported(ParameterStyle::DeepObject, shape.name())),
    };
    Some((result, consumed))
}

fn leaf(leaves: &Leaves<'_>, schema: Option<SchemaId>, raw: &str) -> Result<Value, ErrorNode> {
    leaves.leaf(schema, raw).map_err(ErrorNode::with_message)
}

fn key_value_tokens<'t>(
    tokens: impl Iterator<Item = &'t str>,
) -> Result<Vec<(&'t str, &'t str)>, ErrorNode> {
    tokens
        .map(|token| token.split_once('=').ok_or_else(not_formatted))
        .collect()
}

fn alternating_pairs<'t>(
    tokens: impl Iterator<Item = &'t str>,
) -> Result<Vec<(&'t str, &'t str)>, ErrorNode> {
    let tokens: Vec<&str> = tokens.collect();
    if tokens.len() % 2 != 0 {
        return Err(not_formatted());
    }
    Ok(tokens.chunks(2).map(|pair| (pair[0], pair[1])).collect())
}

fn not_formatted() -> ErrorNode {
    ErrorNode::with_message(NOT_FORMATTED)
}

fn unsupported(style: ParameterStyle, shape: &str) -> ErrorNode {
    ErrorNode::with_message(format!(
        "Style {style} is not supported for {shape} values"
    ))
}
