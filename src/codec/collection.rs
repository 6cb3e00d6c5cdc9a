//! Version 2 `collectionFormat` splitting.

use super::primitive::coerce;
use crate::report::ErrorNode;
use crate::spec::{CollectionFormat, SchemaArena, SchemaId, SchemaType};
use serde_json::Value;

/// Decode one wire string. Arrays split on their format's delimiter; nested
/// `items` arrays split each token again with their own format (default `csv`).
pub(crate) fn decode_collection(
    schemas: &SchemaArena,
    schema: Option<SchemaId>,
    format: CollectionFormat,
    raw: &str,
) -> Result<Value, ErrorNode> {
    let spec = schema.map(|id| schemas.get(id));
    if spec.and_then(|s| s.schema_type) != Some(SchemaType::Array) {
        return coerce(spec, raw).map_err(ErrorNode::with_message);
    }
    match format.delimiter() {
        Some(delimiter) => items(schemas, schema, raw.split(delimiter)),
        // `multi` values arrive one per occurrence; a single occurrence is one item.
        None => items(schemas, schema, std::iter::once(raw)),
    }
}

/// Decode every occurrence of a `multi` parameter as one array item each.
pub(crate) fn decode_multi(
    schemas: &SchemaArena,
    schema: Option<SchemaId>,
    values: &[&str],
) -> Result<Value, ErrorNode> {
    items(schemas, schema, values.iter().copied())
}

fn items<'t>(
    schemas: &SchemaArena,
    array: Option<SchemaId>,
    tokens: impl Iterator<Item = &'t str>,
) -> Result<Value, ErrorNode> {
    let item_schema = array.and_then(|id| schemas.get(id).items);
    let nested_format = item_schema
        .and_then(|id| schemas.get(id).collection_format)
        .unwrap_or(CollectionFormat::Csv);
    let mut errors = ErrorNode::new();
    let mut values = Vec::new();
    for (index, token) in tokens.enumerate() {
        match decode_collection(schemas, item_schema, nested_format, token) {
            Ok(value) => values.push(value),
            Err(problems) => errors.attach(index.to_string(), problems),
        }
    }
    errors.into_result(Value::Array(values))
}
