//! Schema objects compiled into an arena, plus value validation against them.
//!
//! Schemas may reference themselves (`additionalProperties` pointing at its own
//! schema, `items` of a tree node, ...). The arena keeps such references as
//! [`SchemaId`] links so cycles cost nothing; validation recursion is driven by
//! the value being validated, which is always finite.

use super::types::CollectionFormat;
use crate::definition::{json_eq, DefId, DefRef, DefinitionGraph};
use crate::report::{quote, ErrorNode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    Array,
    Boolean,
    Integer,
    Number,
    Object,
    String,
    /// Version 2 formData uploads.
    File,
}

impl SchemaType {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "array" => SchemaType::Array,
            "boolean" => SchemaType::Boolean,
            "integer" => SchemaType::Integer,
            "number" => SchemaType::Number,
            "object" => SchemaType::Object,
            "string" => SchemaType::String,
            "file" => SchemaType::File,
            _ => return None,
        })
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SchemaType::Array => "array",
            SchemaType::Boolean => "boolean",
            SchemaType::Integer => "integer",
            SchemaType::Number => "number",
            SchemaType::Object => "object",
            SchemaType::String => "string",
            SchemaType::File => "file",
        }
    }

    /// Type name with its article, as used in "Expected ..." messages.
    #[must_use]
    pub fn described(self) -> &'static str {
        match self {
            SchemaType::Array => "an array",
            SchemaType::Boolean => "a boolean",
            SchemaType::Integer => "an integer",
            SchemaType::Number => "a number",
            SchemaType::Object => "an object",
            SchemaType::String => "a string",
            SchemaType::File => "a file",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (SchemaType::Array, Value::Array(_)) => true,
            (SchemaType::Boolean, Value::Bool(_)) => true,
            (SchemaType::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            (SchemaType::Number, Value::Number(_)) => true,
            (SchemaType::Object, Value::Object(_)) => true,
            (SchemaType::String | SchemaType::File, Value::String(_)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdditionalProperties {
    #[default]
    Allowed,
    Forbidden,
    Schema(SchemaId),
}

/// Compiled Schema object.
#[derive(Debug, Clone, Default)]
pub struct SchemaSpec {
    /// Declared or inferred type; `None` accepts any JSON type.
    pub schema_type: Option<SchemaType>,
    pub format: Option<String>,
    pub nullable: bool,
    pub items: Option<SchemaId>,
    pub properties: IndexMap<String, SchemaId>,
    pub required: Vec<String>,
    pub additional_properties: AdditionalProperties,
    pub enum_values: Option<Vec<Value>>,
    pub default: Option<Value>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: bool,
    pub exclusive_maximum: bool,
    pub multiple_of: Option<f64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<Regex>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
    pub min_properties: Option<u64>,
    pub max_properties: Option<u64>,
    pub all_of: Vec<SchemaId>,
    pub any_of: Vec<SchemaId>,
    pub one_of: Vec<SchemaId>,
    pub not: Option<SchemaId>,
    pub read_only: bool,
    pub write_only: bool,
    /// Version 2 parameter items carry their own array encoding.
    pub collection_format: Option<CollectionFormat>,
}

/// Arena of compiled schemas.
#[derive(Debug, Clone, Default)]
pub struct SchemaArena {
    schemas: Vec<SchemaSpec>,
    compiled: HashMap<DefId, SchemaId>,
}

impl SchemaArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: SchemaId) -> &SchemaSpec {
        &self.schemas[id.0 as usize]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn add(&mut self, schema: SchemaSpec) -> SchemaId {
        let id = SchemaId(self.schemas.len() as u32);
        self.schemas.push(schema);
        id
    }

    /// Compile the normalized Schema object at `graph[id]`. Compiling the same node
    /// twice returns the same id, which is what makes cyclic schemas finite.
    pub fn compile(&mut self, graph: &DefinitionGraph, id: DefId) -> SchemaId {
        if let Some(done) = self.compiled.get(&id) {
            return *done;
        }
        let slot = self.add(SchemaSpec::default());
        self.compiled.insert(id, slot);
        let spec = self.compile_fields(graph.view(id));
        self.schemas[slot.0 as usize] = spec;
        slot
    }

    fn compile_fields(&mut self, node: DefRef<'_>) -> SchemaSpec {
        let graph = node.graph();
        let mut spec = SchemaSpec {
            schema_type: node
                .property("type")
                .and_then(|t| t.as_str())
                .and_then(SchemaType::parse),
            format: node
                .property("format")
                .and_then(|f| f.as_str())
                .map(str::to_string),
            nullable: flag(node, "nullable") || flag(node, "x-nullable"),
            enum_values: node
                .property("enum")
                .map(|e| e.items().filter_map(|v| v.try_json()).collect()),
            default: node.property("default").and_then(|d| d.try_json()),
            minimum: node.property("minimum").and_then(|v| v.as_f64()),
            maximum: node.property("maximum").and_then(|v| v.as_f64()),
            exclusive_minimum: flag(node, "exclusiveMinimum"),
            exclusive_maximum: flag(node, "exclusiveMaximum"),
            multiple_of: node.property("multipleOf").and_then(|v| v.as_f64()),
            min_length: node.property("minLength").and_then(|v| v.as_u64()),
            max_length: node.property("maxLength").and_then(|v| v.as_u64()),
            pattern: node
                .property("pattern")
                .and_then(|p| p.as_str())
                .and_then(|p| Regex::new(p).ok()),
            min_items: node.property("minItems").and_then(|v| v.as_u64()),
            max_items: node.property("maxItems").and_then(|v| v.as_u64()),
            unique_items: flag(node, "uniqueItems"),
            min_properties: node.property("minProperties").and_then(|v| v.as_u64()),
            max_properties: node.property("maxProperties").and_then(|v| v.as_u64()),
            read_only: flag(node, "readOnly"),
            write_only: flag(node, "writeOnly"),
            collection_format: node
                .property("collectionFormat")
                .and_then(|c| c.as_str())
                .and_then(CollectionFormat::parse),
            required: node
                .property("required")
                .map(|r| r.items().filter_map(|n| n.as_str().map(str::to_string)).collect())
                .unwrap_or_default(),
            ..SchemaSpec::default()
        };

        if let Some(items) = node.property("items").filter(|i| i.is_object()) {
            spec.items = Some(self.compile(graph, items.id()));
        }
        if let Some(properties) = node.property("properties") {
            for (name, child) in properties.entries() {
                let child_id = self.compile(graph, child.id());
                spec.properties.insert(name.to_string(), child_id);
            }
        }
        spec.additional_properties = match node.property("additionalProperties") {
            Some(extra) if extra.is_object() => {
                AdditionalProperties::Schema(self.compile(graph, extra.id()))
            }
            Some(extra) if extra.as_bool() == Some(false) => AdditionalProperties::Forbidden,
            _ => AdditionalProperties::Allowed,
        };
        for (key, target) in [
            ("allOf", &mut spec.all_of),
            ("anyOf", &mut spec.any_of),
            ("oneOf", &mut spec.one_of),
        ] {
            if let Some(list) = node.property(key) {
                for member in list.items() {
                    target.push(self.compile(graph, member.id()));
                }
            }
        }
        if let Some(not) = node.property("not").filter(|n| n.is_object()) {
            spec.not = Some(self.compile(graph, not.id()));
        }

        if spec.schema_type.is_none() {
            spec.schema_type = infer_type(node, &spec);
        }
        spec
    }

    /// Validate `value` against schema `id`, collecting every problem.
    #[must_use]
    pub fn validate(&self, id: SchemaId, value: &Value) -> ErrorNode {
        let mut errors = ErrorNode::new();
        let mut active = Vec::new();
        self.check(id, value, &mut errors, &mut active);
        errors
    }

    fn check(
        &self,
        id: SchemaId,
        value: &Value,
        errors: &mut ErrorNode,
        active: &mut Vec<(SchemaId, *const Value)>,
    ) {
        // allOf/anyOf/oneOf/not can revisit the same schema with the same value.
        let key = (id, value as *const Value);
        if active.contains(&key) {
            return;
        }
        active.push(key);
        self.check_inner(self.get(id), value, errors, active);
        active.pop();
    }

    fn check_inner(
        &self,
        schema: &SchemaSpec,
        value: &Value,
        errors: &mut ErrorNode,
        active: &mut Vec<(SchemaId, *const Value)>,
    ) {
        if value.is_null() {
            if !schema.nullable && schema.schema_type.is_some() {
                errors.push("Value cannot be null");
            }
            return;
        }

        if let Some(ty) = schema.schema_type {
            if !ty.matches(value) {
                errors.push(format!(
                    "Expected {}. Received: {}",
                    ty.described(),
                    quote(value)
                ));
                return;
            }
        }

        if let Some(allowed) = &schema.enum_values {
            if !allowed.iter().any(|candidate| json_eq(candidate, value)) {
                let list: Vec<String> = allowed.iter().map(quote).collect();
                errors.push(format!("Value must be one of: {}", list.join(", ")));
            }
        }

        match value {
            Value::Number(n) => {
                if let Some(f) = n.as_f64() {
                    check_number(schema, f, errors);
                }
            }
            Value::String(s) => check_string(schema, s, errors),
            Value::Array(items) => {
                check_len(
                    items.len(),
                    schema.min_items,
                    schema.max_items,
                    "items",
                    errors,
                );
                if schema.unique_items {
                    for (i, a) in items.iter().enumerate() {
                        if items[..i].iter().any(|b| json_eq(a, b)) {
                            errors.push(format!("Array items must be unique. Duplicate at index {i}"));
                            break;
                        }
                    }
                }
                if let Some(items_schema) = schema.items {
                    for (i, item) in items.iter().enumerate() {
                        self.check(items_schema, item, errors.nest(i.to_string()), active);
                    }
                }
            }
            Value::Object(map) => {
                check_len(
                    map.len(),
                    schema.min_properties,
                    schema.max_properties,
                    "properties",
                    errors,
                );
                let missing: Vec<&str> = schema
                    .required
                    .iter()
                    .filter(|name| !map.contains_key(name.as_str()))
                    .map(String::as_str)
                    .collect();
                match missing.as_slice() {
                    [] => {}
                    [one] => errors.push(format!("Missing required property: {one}")),
                    many => errors.push(format!(
                        "Missing required properties: {}",
                        many.join(", ")
                    )),
                }
                let mut not_allowed = Vec::new();
                for (key, child) in map {
                    if let Some(prop) = schema.properties.get(key) {
                        self.check(*prop, child, errors.nest(key), active);
                        continue;
                    }
                    match schema.additional_properties {
                        AdditionalProperties::Allowed => {}
                        AdditionalProperties::Forbidden => not_allowed.push(key.as_str()),
                        AdditionalProperties::Schema(extra) => {
                            self.check(extra, child, errors.nest(key), active);
                        }
                    }
                }
                match not_allowed.as_slice() {
                    [] => {}
                    [one] => errors.push(format!("Property not allowed: {one}")),
                    many => {
                        errors.push(format!("Properties not allowed: {}", many.join(", ")));
                    }
                }
            }
            Value::Bool(_) | Value::Null => {}
        }

        for member in &schema.all_of {
            self.check(*member, value, errors, active);
        }
        if !schema.any_of.is_empty() {
            let passes = schema
                .any_of
                .iter()
                .any(|member| self.passes(*member, value, active));
            if !passes {
                errors.push("Did not match any of the anyOf schemas");
            }
        }
        if !schema.one_of.is_empty() {
            let passing = schema
                .one_of
                .iter()
                .filter(|member| self.passes(**member, value, active))
                .count();
            if passing != 1 {
                errors.push(format!(
                    "Expected exactly one oneOf schema to match. Matched: {passing}"
                ));
            }
        }
        if let Some(not) = schema.not {
            if self.passes(not, value, active) {
                errors.push("Value must not match the schema defined by not");
            }
        }
    }

    fn passes(
        &self,
        id: SchemaId,
        value: &Value,
        active: &mut Vec<(SchemaId, *const Value)>,
    ) -> bool {
        let mut scratch = ErrorNode::new();
        self.check(id, value, &mut scratch, active);
        !scratch.has_errors()
    }
}

fn flag(node: DefRef<'_>, key: &str) -> bool {
    node.property(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

/// Type from structural hints when `type` is absent.
fn infer_type(node: DefRef<'_>, spec: &SchemaSpec) -> Option<SchemaType> {
    let has = |key: &str| node.property(key).is_some();
    if has("items") {
        return Some(SchemaType::Array);
    }
    if has("properties") || has("additionalProperties") || !spec.required.is_empty() {
        return Some(SchemaType::Object);
    }
    if has("pattern") || has("minLength") || has("maxLength") {
        return Some(SchemaType::String);
    }
    if has("minimum") || has("maximum") || has("multipleOf") {
        return Some(SchemaType::Number);
    }
    let members = spec.enum_values.as_ref()?;
    let first = members.first()?;
    let ty = match first {
        Value::String(_) => SchemaType::String,
        Value::Bool(_) => SchemaType::Boolean,
        Value::Number(_) => SchemaType::Number,
        _ => return None,
    };
    members.iter().all(|m| ty.matches(m)).then_some(ty)
}

fn check_number(schema: &SchemaSpec, n: f64, errors: &mut ErrorNode) {
    if let Some(min) = schema.minimum {
        if schema.exclusive_minimum && n <= min {
            errors.push(format!("Expected a number greater than {min}. Received: {n}"));
        } else if n < min {
            errors.push(format!(
                "Expected a number greater than or equal to {min}. Received: {n}"
            ));
        }
    }
    if let Some(max) = schema.maximum {
        if schema.exclusive_maximum && n >= max {
            errors.push(format!("Expected a number less than {max}. Received: {n}"));
        } else if n > max {
            errors.push(format!(
                "Expected a number less than or equal to {max}. Received: {n}"
            ));
        }
    }
    if let Some(step) = schema.multiple_of.filter(|s| *s > 0.0) {
        let ratio = n / step;
        if (ratio - ratio.round()).abs() > 1e-9 {
            errors.push(format!("Expected a multiple of {step}. Received: {n}"));
        }
    }
    match schema.format.as_deref() {
        Some("int32") if n < f64::from(i32::MIN) || n > f64::from(i32::MAX) => {
            errors.push(format!("Value out of range for int32. Received: {n}"));
        }
        Some("int64") if n.abs() > 9_007_199_254_740_991.0 => {
            errors.push(format!("Value out of range for int64. Received: {n}"));
        }
        _ => {}
    }
}

static DATE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").ok());
static DATE_TIME: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4})-(\d{2})-(\d{2})T(\d{2}):(\d{2}):(\d{2})(?:\.\d+)?(?:Z|[+-](\d{2}):(\d{2}))$",
    )
    .ok()
});

fn field(caps: &Captures<'_>, index: usize) -> Option<u32> {
    caps.get(index).and_then(|m| m.as_str().parse().ok())
}

/// Year, month and day in groups 1 to 3 name a real calendar day.
fn calendar_day(caps: &Captures<'_>) -> bool {
    let (Some(year), Some(month), Some(day)) = (field(caps, 1), field(caps, 2), field(caps, 3))
    else {
        return false;
    };
    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    let days = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if leap => 29,
        2 => 28,
        _ => return false,
    };
    (1..=days).contains(&day)
}

fn is_date(s: &str) -> bool {
    DATE.as_ref()
        .map_or(true, |re| re.captures(s).is_some_and(|c| calendar_day(&c)))
}

fn is_date_time(s: &str) -> bool {
    let Some(re) = DATE_TIME.as_ref() else {
        return true;
    };
    let Some(caps) = re.captures(s) else {
        return false;
    };
    // Leap seconds allowed; offsets are optional groups 7 and 8.
    let below = |index: usize, limit: u32| field(&caps, index).is_some_and(|v| v < limit);
    let offset_ok = caps.get(7).is_none() || (below(7, 24) && below(8, 60));
    calendar_day(&caps) && below(4, 24) && below(5, 60) && below(6, 61) && offset_ok
}

fn check_string(schema: &SchemaSpec, s: &str, errors: &mut ErrorNode) {
    let chars = s.chars().count();
    if let Some(min) = schema.min_length {
        if (chars as u64) < min {
            errors.push(format!(
                "Expected a string with at least {min} characters. Received {chars}"
            ));
        }
    }
    if let Some(max) = schema.max_length {
        if (chars as u64) > max {
            errors.push(format!(
                "Expected a string with at most {max} characters. Received {chars}"
            ));
        }
    }
    if let Some(pattern) = &schema.pattern {
        if !pattern.is_match(s) {
            errors.push(format!(
                "Value does not match the pattern {}. Received: {}",
                pattern.as_str(),
                quote(&Value::String(s.to_string()))
            ));
        }
    }
    let format_ok = match schema.format.as_deref() {
        Some("date") => is_date(s),
        Some("date-time") => is_date_time(s),
        Some("byte") => STANDARD.decode(s).is_ok(),
        _ => true,
    };
    if !format_ok {
        errors.push(format!(
            "Value is not a valid {}. Received: {}",
            schema.format.as_deref().unwrap_or_default(),
            quote(&Value::String(s.to_string()))
        ));
    }
}

fn check_len(len: usize, min: Option<u64>, max: Option<u64>, noun: &str, errors: &mut ErrorNode) {
    if let Some(min) = min {
        if (len as u64) < min {
            errors.push(format!("Expected at least {min} {noun}. Received {len}"));
        }
    }
    if let Some(max) = max {
        if (len as u64) > max {
            errors.push(format!("Expected at most {max} {noun}. Received {len}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(schema: Value) -> (SchemaArena, SchemaId) {
        let (graph, root) = DefinitionGraph::from_json(&schema);
        let mut arena = SchemaArena::new();
        let id = arena.compile(&graph, root);
        (arena, id)
    }

    #[test]
    fn infers_type_from_structure() {
        let (arena, id) = compile(json!({"items": {"maxLength": 3}}));
        assert_eq!(arena.get(id).schema_type, Some(SchemaType::Array));
        let items = arena.get(id).items.unwrap();
        assert_eq!(arena.get(items).schema_type, Some(SchemaType::String));

        let (arena, id) = compile(json!({"enum": [1, 2.5]}));
        assert_eq!(arena.get(id).schema_type, Some(SchemaType::Number));
        let (arena, id) = compile(json!({"enum": [1, "a"]}));
        assert_eq!(arena.get(id).schema_type, None);
    }

    #[test]
    fn cyclic_schema_compiles_to_self_link() {
        let (mut graph, root) = DefinitionGraph::from_json(&json!({"type": "object"}));
        graph.set_property(root, "additionalProperties", root).unwrap();
        let mut arena = SchemaArena::new();
        let id = arena.compile(&graph, root);
        assert_eq!(
            arena.get(id).additional_properties,
            AdditionalProperties::Schema(id)
        );
        let errors = arena.validate(id, &json!({"a": {"b": {"c": 1}}}));
        assert_eq!(errors.to_string(), "a > b > c: Expected an object. Received: 1");
    }

    #[test]
    fn self_referencing_all_of_terminates() {
        let (mut graph, root) = DefinitionGraph::from_json(&json!({"type": "string", "allOf": []}));
        let all_of = graph.property(root, "allOf").unwrap();
        graph.push_item(all_of, root).unwrap();
        let mut arena = SchemaArena::new();
        let id = arena.compile(&graph, root);
        assert!(!arena.validate(id, &json!("ok")).has_errors());
    }

    #[test]
    fn object_constraints() {
        let (arena, id) = compile(json!({
            "type": "object",
            "required": ["name", "age"],
            "properties": {"name": {"type": "string"}, "age": {"type": "integer", "minimum": 0}},
            "additionalProperties": false
        }));
        let errors = arena.validate(id, &json!({"age": -1, "x": 1, "y": 2}));
        assert_eq!(
            errors.to_string(),
            "Missing required property: name\nProperties not allowed: x, y\nage: Expected a number greater than or equal to 0. Received: -1"
        );
    }

    #[test]
    fn dates_must_exist_on_the_calendar() {
        let (arena, id) = compile(json!({"type": "string", "format": "date"}));
        assert_eq!(
            arena.validate(id, &json!("2024-02-30")).to_string(),
            "Value is not a valid date. Received: \"2024-02-30\""
        );
        assert!(arena.validate(id, &json!("2024-13-45")).has_errors());
        assert!(arena.validate(id, &json!("2023-02-29")).has_errors());
        assert!(!arena.validate(id, &json!("2000-02-29")).has_errors());

        let (arena, id) = compile(json!({"type": "string", "format": "date-time"}));
        assert!(!arena.validate(id, &json!("2024-12-31T23:59:60Z")).has_errors());
        assert!(!arena.validate(id, &json!("2024-06-01T08:30:00.5+05:30")).has_errors());
        assert!(arena.validate(id, &json!("2024-06-31T08:30:00Z")).has_errors());
        assert!(arena.validate(id, &json!("2024-06-01T24:00:00Z")).has_errors());
        assert!(arena.validate(id, &json!("2024-06-01T08:30:00+25:00")).has_errors());
    }

    #[test]
    fn formats_and_strings() {
        let (arena, id) = compile(json!({"type": "string", "format": "date"}));
        assert!(!arena.validate(id, &json!("2024-02-29")).has_errors());
        assert!(arena.validate(id, &json!("29/02/2024")).has_errors());

        let (arena, id) = compile(json!({"type": "string", "format": "byte"}));
        assert!(!arena.validate(id, &json!("aGVsbG8=")).has_errors());
        assert!(arena.validate(id, &json!("not base64!")).has_errors());

        let (arena, id) = compile(json!({"type": "string", "pattern": "^[a-z]+$", "maxLength": 3}));
        let errors = arena.validate(id, &json!("abcd"));
        assert_eq!(errors.count(), 1);
        let errors = arena.validate(id, &json!("A1"));
        assert_eq!(errors.count(), 1);
    }

    #[test]
    fn nullable_and_one_of() {
        let (arena, id) = compile(json!({"type": "integer", "nullable": true}));
        assert!(!arena.validate(id, &Value::Null).has_errors());
        let (arena, id) = compile(json!({"oneOf": [{"type": "integer"}, {"type": "number"}]}));
        let errors = arena.validate(id, &json!(3));
        assert_eq!(
            errors.to_string(),
            "Expected exactly one oneOf schema to match. Matched: 2"
        );
        assert!(!arena.validate(id, &json!(3.5)).has_errors());
    }
}
