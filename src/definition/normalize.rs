use super::graph::{DefId, DefNode, DefinitionGraph};
use super::node::{json_eq, Additional, Context, ValidatorId, ValidatorSet, ValueType};
use crate::report::{quote, ErrorNode};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use tracing::trace;

/// Output of a normalization pass: the normalized graph, its root (absent when the
/// root value itself had the wrong type) and every error found.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub graph: DefinitionGraph,
    pub root: Option<DefId>,
    pub errors: ErrorNode,
}

impl Normalized {
    /// The normalized root as JSON, when there is one and it is acyclic.
    #[must_use]
    pub fn to_json(&self) -> Option<Value> {
        self.root.and_then(|id| self.graph.to_json(id).ok())
    }
}

/// Validate `input[value]` against `validators[node]`, applying defaults.
///
/// Cyclic validator graphs and cyclic input graphs are both supported: a
/// `(validator, value)` pair that is already being normalized further up the
/// recursion resolves to that pair's in-progress output node.
#[must_use]
pub fn normalize(
    validators: &ValidatorSet,
    node: ValidatorId,
    input: &DefinitionGraph,
    value: DefId,
    major: u8,
) -> Normalized {
    let mut walker = Normalizer {
        validators,
        input,
        out: DefinitionGraph::new(),
        active: HashMap::new(),
        major,
    };
    let mut errors = ErrorNode::new();
    let root = walker.walk(node, value, None, &mut errors);
    trace!(
        nodes = walker.out.len(),
        errors = errors.count(),
        "Definition normalized"
    );
    Normalized {
        graph: walker.out,
        root,
        errors,
    }
}

/// Convenience wrapper for acyclic JSON input.
#[must_use]
pub fn normalize_json(
    validators: &ValidatorSet,
    node: ValidatorId,
    value: &Value,
    major: u8,
) -> (Option<Value>, ErrorNode) {
    let (input, root) = DefinitionGraph::from_json(value);
    let normalized = normalize(validators, node, &input, root, major);
    (normalized.to_json(), normalized.errors)
}

struct Normalizer<'a> {
    validators: &'a ValidatorSet,
    input: &'a DefinitionGraph,
    out: DefinitionGraph,
    /// Pairs on the active recursion path, mapped to their placeholder output node.
    active: HashMap<(ValidatorId, DefId), DefId>,
    major: u8,
}

impl Normalizer<'_> {
    fn walk(
        &mut self,
        vid: ValidatorId,
        did: DefId,
        siblings: Option<&IndexMap<String, DefId>>,
        errors: &mut ErrorNode,
    ) -> Option<DefId> {
        let validators = self.validators;
        let input = self.input;
        let rules = validators.get(vid);
        let raw = input.get(did);

        if rules.or_boolean {
            if let DefNode::Bool(b) = raw {
                return Some(self.out.push(DefNode::Bool(*b)));
            }
        }

        if !rules.value_type.accepts(raw) {
            errors.push(format!(
                "Value must be {}. Received: {}",
                rules.value_type.described(),
                quote(&input.view(did).to_json())
            ));
            return None;
        }

        let before = errors.count();
        let out_id = match (rules.value_type, raw) {
            (ValueType::Any, _) => self.out.import(input, did),
            (ValueType::Object, DefNode::Object(entries)) => {
                if let Some(placeholder) = self.active.get(&(vid, did)) {
                    return Some(*placeholder);
                }
                let placeholder = self.out.push(DefNode::Object(IndexMap::new()));
                self.active.insert((vid, did), placeholder);
                let fields = self.walk_object(vid, entries, errors);
                self.out.replace(placeholder, DefNode::Object(fields));
                self.active.remove(&(vid, did));
                placeholder
            }
            (ValueType::Array, DefNode::Array(items)) => {
                if let Some(placeholder) = self.active.get(&(vid, did)) {
                    return Some(*placeholder);
                }
                let placeholder = self.out.push(DefNode::Array(Vec::new()));
                self.active.insert((vid, did), placeholder);
                let mut normalized = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let child = match rules.items {
                        Some(items_vid) => {
                            self.walk(items_vid, *item, siblings, errors.nest(index.to_string()))
                        }
                        None => Some(self.out.import(input, *item)),
                    };
                    if let Some(child) = child {
                        normalized.push(child);
                    }
                }
                self.out.replace(placeholder, DefNode::Array(normalized));
                self.active.remove(&(vid, did));
                placeholder
            }
            (_, scalar) => self.out.push(scalar.clone()),
        };

        if let Some(allowed) = &rules.enum_values {
            let actual = self.out.view(out_id).try_json();
            let listed = actual
                .as_ref()
                .is_some_and(|actual| allowed.iter().any(|candidate| json_eq(candidate, actual)));
            if !listed {
                let list: Vec<String> = allowed.iter().map(display_literal).collect();
                errors.push(format!("Value must be one of: {}", list.join(", ")));
            }
        }

        if errors.count() == before {
            if let Some(check) = rules.errors {
                let ctx = Context::new(self.major, &self.out, siblings);
                check(&ctx, self.out.view(out_id), errors);
            }
        }

        Some(out_id)
    }

    fn walk_object(
        &mut self,
        vid: ValidatorId,
        entries: &IndexMap<String, DefId>,
        errors: &mut ErrorNode,
    ) -> IndexMap<String, DefId> {
        let validators = self.validators;
        let input = self.input;
        let rules = validators.get(vid);
        let mut fields: IndexMap<String, DefId> = IndexMap::new();
        let mut not_allowed: Vec<(usize, &str)> = Vec::new();

        // Present properties first, in declared order, so later rules see earlier values.
        for (name, child_vid) in &rules.properties {
            let Some((position, _, raw_child)) = entries.get_full(name.as_str()) else {
                continue;
            };
            let child = validators.get(*child_vid);
            let allowed = child
                .allowed
                .eval(&Context::new(self.major, &self.out, Some(&fields)));
            if !allowed {
                not_allowed.push((position, name.as_str()));
                continue;
            }
            let normalized = self.walk(*child_vid, *raw_child, Some(&fields), errors.nest(name));
            if let Some(id) = normalized {
                fields.insert(name.clone(), id);
            }
        }

        // Then absent ones: requiredness and defaults can read every present sibling.
        for (name, child_vid) in &rules.properties {
            if entries.contains_key(name.as_str()) {
                continue;
            }
            let child = validators.get(*child_vid);
            let ctx = Context::new(self.major, &self.out, Some(&fields));
            if !child.allowed.eval(&ctx) {
                continue;
            }
            if child.required.eval(&ctx) {
                errors.push(format!("Missing required property: {name}"));
                continue;
            }
            if let Some(value) = child.default.as_ref().and_then(|d| d.resolve(&ctx)) {
                let id = self.out.insert_json(&value);
                fields.insert(name.clone(), id);
            }
        }

        for (position, (key, raw_child)) in entries.iter().enumerate() {
            if rules.properties.contains_key(key.as_str()) {
                continue;
            }
            if rules.extensions && key.starts_with("x-") {
                let id = self.out.import(input, *raw_child);
                fields.insert(key.clone(), id);
                continue;
            }
            match rules.additional_properties {
                Additional::Node(extra_vid) => {
                    let normalized =
                        self.walk(extra_vid, *raw_child, Some(&fields), errors.nest(key));
                    if let Some(id) = normalized {
                        fields.insert(key.clone(), id);
                    }
                }
                Additional::Any => {
                    let id = self.out.import(input, *raw_child);
                    fields.insert(key.clone(), id);
                }
                Additional::Forbidden => not_allowed.push((position, key.as_str())),
            }
        }

        not_allowed.sort_by_key(|(position, _)| *position);
        match not_allowed.as_slice() {
            [] => {}
            [(_, single)] => errors.push(format!("Property not allowed: {single}")),
            many => {
                let names: Vec<&str> = many.iter().map(|(_, name)| *name).collect();
                errors.push(format!("Properties not allowed: {}", names.join(", ")));
            }
        }

        fields
    }
}

fn display_literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => quote(other),
    }
}
