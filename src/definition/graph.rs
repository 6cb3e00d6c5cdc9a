use indexmap::IndexMap;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use thiserror::Error;

/// Stable index of a node inside a [`DefinitionGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId(u32);

impl DefId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One value in a definition graph. Compound values refer to their members by id,
/// so a member may be shared or may (transitively) contain its own parent.
#[derive(Debug, Clone, PartialEq)]
pub enum DefNode {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<DefId>),
    Object(IndexMap<String, DefId>),
}

impl DefNode {
    /// Name used in type mismatch messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            DefNode::Null => "null",
            DefNode::Bool(_) => "boolean",
            DefNode::Number(_) => "number",
            DefNode::String(_) => "string",
            DefNode::Array(_) => "array",
            DefNode::Object(_) => "object",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("definition graph contains a reference cycle at node {0}")]
    Cycle(usize),
    #[error("node {0} is not an object")]
    NotAnObject(usize),
    #[error("node {0} is not an array")]
    NotAnArray(usize),
}

/// Append-only arena holding a (possibly cyclic) definition tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefinitionGraph {
    nodes: Vec<DefNode>,
}

impl DefinitionGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy an acyclic JSON value into a fresh graph, returning the graph and root id.
    #[must_use]
    pub fn from_json(value: &Value) -> (Self, DefId) {
        let mut graph = Self::new();
        let root = graph.insert_json(value);
        (graph, root)
    }

    pub fn push(&mut self, node: DefNode) -> DefId {
        let id = DefId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn insert_json(&mut self, value: &Value) -> DefId {
        match value {
            Value::Null => self.push(DefNode::Null),
            Value::Bool(b) => self.push(DefNode::Bool(*b)),
            Value::Number(n) => self.push(DefNode::Number(n.clone())),
            Value::String(s) => self.push(DefNode::String(s.clone())),
            Value::Array(items) => {
                let ids = items.iter().map(|v| self.insert_json(v)).collect();
                self.push(DefNode::Array(ids))
            }
            Value::Object(map) => {
                let entries = map
                    .iter()
                    .map(|(k, v)| (k.clone(), self.insert_json(v)))
                    .collect();
                self.push(DefNode::Object(entries))
            }
        }
    }

    #[must_use]
    pub fn get(&self, id: DefId) -> &DefNode {
        &self.nodes[id.index()]
    }

    pub(crate) fn replace(&mut self, id: DefId, node: DefNode) {
        self.nodes[id.index()] = node;
    }

    #[must_use]
    pub fn view(&self, id: DefId) -> DefRef<'_> {
        DefRef { graph: self, id }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn property(&self, object: DefId, key: &str) -> Option<DefId> {
        match self.get(object) {
            DefNode::Object(map) => map.get(key).copied(),
            _ => None,
        }
    }

    /// Point `object[key]` at an existing node. This is how reference cycles are made.
    pub fn set_property(
        &mut self,
        object: DefId,
        key: impl Into<String>,
        target: DefId,
    ) -> Result<(), GraphError> {
        match &mut self.nodes[object.index()] {
            DefNode::Object(map) => {
                map.insert(key.into(), target);
                Ok(())
            }
            _ => Err(GraphError::NotAnObject(object.index())),
        }
    }

    pub fn push_item(&mut self, array: DefId, target: DefId) -> Result<(), GraphError> {
        match &mut self.nodes[array.index()] {
            DefNode::Array(items) => {
                items.push(target);
                Ok(())
            }
            _ => Err(GraphError::NotAnArray(array.index())),
        }
    }

    /// Convert a subtree back to JSON. Shared acyclic members are duplicated;
    /// a cycle is an error since JSON cannot express it.
    pub fn to_json(&self, id: DefId) -> Result<Value, GraphError> {
        let mut on_path = Vec::new();
        self.to_json_inner(id, &mut on_path)
    }

    fn to_json_inner(&self, id: DefId, on_path: &mut Vec<DefId>) -> Result<Value, GraphError> {
        if on_path.contains(&id) {
            return Err(GraphError::Cycle(id.index()));
        }
        Ok(match self.get(id) {
            DefNode::Null => Value::Null,
            DefNode::Bool(b) => Value::Bool(*b),
            DefNode::Number(n) => Value::Number(n.clone()),
            DefNode::String(s) => Value::String(s.clone()),
            DefNode::Array(items) => {
                on_path.push(id);
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.to_json_inner(*item, on_path)?);
                }
                on_path.pop();
                Value::Array(out)
            }
            DefNode::Object(map) => {
                on_path.push(id);
                let mut out = Map::new();
                for (key, child) in map {
                    out.insert(key.clone(), self.to_json_inner(*child, on_path)?);
                }
                on_path.pop();
                Value::Object(out)
            }
        })
    }

    /// Copy a subtree of `source` into this graph, preserving sharing and cycles.
    pub fn import(&mut self, source: &DefinitionGraph, id: DefId) -> DefId {
        let mut copied = HashMap::new();
        self.import_inner(source, id, &mut copied)
    }

    fn import_inner(
        &mut self,
        source: &DefinitionGraph,
        id: DefId,
        copied: &mut HashMap<DefId, DefId>,
    ) -> DefId {
        if let Some(done) = copied.get(&id) {
            return *done;
        }
        match source.get(id) {
            DefNode::Array(items) => {
                let target = self.push(DefNode::Array(Vec::new()));
                copied.insert(id, target);
                let ids = items
                    .iter()
                    .map(|item| self.import_inner(source, *item, copied))
                    .collect();
                self.replace(target, DefNode::Array(ids));
                target
            }
            DefNode::Object(map) => {
                let target = self.push(DefNode::Object(IndexMap::new()));
                copied.insert(id, target);
                let entries = map
                    .iter()
                    .map(|(k, v)| (k.clone(), self.import_inner(source, *v, copied)))
                    .collect();
                self.replace(target, DefNode::Object(entries));
                target
            }
            scalar => {
                let target = self.push(scalar.clone());
                copied.insert(id, target);
                target
            }
        }
    }

    /// Replace every local `{"$ref": "#/..."}` object in the graph with a direct
    /// link to its target (pointers resolve against `root`), so recursive references become graph cycles.
    /// Returns the references that could not be resolved, in discovery order.
    pub fn resolve_local_refs(&mut self, root: DefId) -> Vec<String> {
        let mut unresolved = Vec::new();
        let mut targets: HashMap<DefId, DefId> = HashMap::new();
        for index in 0..self.nodes.len() {
            let id = DefId(index as u32);
            let Some(pointer) = self.ref_pointer(id) else {
                continue;
            };
            match self.follow_ref(root, id) {
                Some(target) => {
                    targets.insert(id, target);
                }
                None => unresolved.push(pointer.to_string()),
            }
        }
        if targets.is_empty() {
            return unresolved;
        }
        for node in &mut self.nodes {
            match node {
                DefNode::Array(items) => {
                    for item in items.iter_mut() {
                        if let Some(target) = targets.get(&*item) {
                            *item = *target;
                        }
                    }
                }
                DefNode::Object(map) => {
                    for child in map.values_mut() {
                        if let Some(target) = targets.get(&*child) {
                            *child = *target;
                        }
                    }
                }
                _ => {}
            }
        }
        unresolved
    }

    fn ref_pointer(&self, id: DefId) -> Option<&str> {
        match self.get(id) {
            DefNode::Object(map) if map.len() == 1 => match self.get(*map.get("$ref")?) {
                DefNode::String(pointer) => Some(pointer.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Follow a chain of references to the first node that is not itself a reference.
    fn follow_ref(&self, root: DefId, start: DefId) -> Option<DefId> {
        let mut seen = vec![start];
        let mut current = start;
        while let Some(pointer) = self.ref_pointer(current) {
            current = self.pointer(root, pointer)?;
            if seen.contains(&current) {
                return None;
            }
            seen.push(current);
        }
        Some(current)
    }

    /// Resolve a local JSON pointer (`#/a/b~1c`) against `root`.
    #[must_use]
    pub fn pointer(&self, root: DefId, pointer: &str) -> Option<DefId> {
        let path = pointer.strip_prefix('#')?;
        if path.is_empty() {
            return Some(root);
        }
        let mut current = root;
        for raw in path.strip_prefix('/')?.split('/') {
            let token = urlencoding::decode(raw).ok()?;
            let token = token.replace("~1", "/").replace("~0", "~");
            current = match self.get(current) {
                DefNode::Object(map) => *map.get(token.as_str())?,
                DefNode::Array(items) => *items.get(token.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Structural equality of two subtrees (possibly from different graphs).
    /// Pairs already under comparison are assumed equal, so cyclic inputs terminate.
    #[must_use]
    pub fn deep_eq(&self, a: DefId, other: &DefinitionGraph, b: DefId) -> bool {
        let mut assumed = Vec::new();
        self.deep_eq_inner(a, other, b, &mut assumed)
    }

    fn deep_eq_inner(
        &self,
        a: DefId,
        other: &DefinitionGraph,
        b: DefId,
        assumed: &mut Vec<(DefId, DefId)>,
    ) -> bool {
        if assumed.contains(&(a, b)) {
            return true;
        }
        match (self.get(a), other.get(b)) {
            (DefNode::Array(x), DefNode::Array(y)) => {
                if x.len() != y.len() {
                    return false;
                }
                assumed.push((a, b));
                let eq = x
                    .iter()
                    .zip(y)
                    .all(|(i, j)| self.deep_eq_inner(*i, other, *j, assumed));
                assumed.pop();
                eq
            }
            (DefNode::Object(x), DefNode::Object(y)) => {
                if x.len() != y.len() {
                    return false;
                }
                assumed.push((a, b));
                let eq = x.iter().all(|(k, i)| {
                    y.get(k)
                        .is_some_and(|j| self.deep_eq_inner(*i, other, *j, assumed))
                });
                assumed.pop();
                eq
            }
            (DefNode::Number(x), DefNode::Number(y)) => x.as_f64() == y.as_f64(),
            (x, y) => x == y,
        }
    }
}

/// Borrowed view of one node with typed accessors.
#[derive(Debug, Clone, Copy)]
pub struct DefRef<'g> {
    graph: &'g DefinitionGraph,
    id: DefId,
}

impl<'g> DefRef<'g> {
    #[must_use]
    pub fn id(&self) -> DefId {
        self.id
    }

    #[must_use]
    pub fn graph(&self) -> &'g DefinitionGraph {
        self.graph
    }

    #[must_use]
    pub fn node(&self) -> &'g DefNode {
        self.graph.get(self.id)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&'g str> {
        match self.node() {
            DefNode::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self.node() {
            DefNode::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self.node() {
            DefNode::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self.node() {
            DefNode::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self.node(), DefNode::Object(_))
    }

    #[must_use]
    pub fn property(&self, key: &str) -> Option<DefRef<'g>> {
        self.graph.property(self.id, key).map(|id| self.graph.view(id))
    }

    /// Array members; empty for non-arrays.
    pub fn items(&self) -> impl Iterator<Item = DefRef<'g>> + 'g {
        let graph = self.graph;
        let ids: &'g [DefId] = match graph.get(self.id) {
            DefNode::Array(items) => items.as_slice(),
            _ => &[],
        };
        ids.iter().map(move |id| graph.view(*id))
    }

    /// Object entries in insertion order; empty for non-objects.
    pub fn entries(&self) -> Box<dyn Iterator<Item = (&'g str, DefRef<'g>)> + 'g> {
        let graph = self.graph;
        match graph.get(self.id) {
            DefNode::Object(map) => {
                Box::new(map.iter().map(move |(k, id)| (k.as_str(), graph.view(*id))))
            }
            _ => Box::new(std::iter::empty()),
        }
    }

    /// JSON rendering; cyclic subtrees render as `null`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        self.graph.to_json(self.id).unwrap_or(Value::Null)
    }

    /// JSON rendering, or `None` when the subtree is cyclic.
    #[must_use]
    pub fn try_json(&self) -> Option<Value> {
        self.graph.to_json(self.id).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_round_trip_keeps_key_order() {
        let value = json!({"b": 1, "a": [true, null, "x"]});
        let (graph, root) = DefinitionGraph::from_json(&value);
        assert_eq!(graph.to_json(root).unwrap(), value);
        let keys: Vec<_> = graph.view(root).entries().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn cycles_are_reported_not_followed() {
        let (mut graph, root) = DefinitionGraph::from_json(&json!({"name": "loop"}));
        graph.set_property(root, "self", root).unwrap();
        assert_eq!(graph.to_json(root), Err(GraphError::Cycle(root.index())));
        assert!(graph.deep_eq(root, &graph, root));
    }

    #[test]
    fn import_preserves_cycles() {
        let (mut source, root) = DefinitionGraph::from_json(&json!({}));
        source.set_property(root, "again", root).unwrap();
        let mut target = DefinitionGraph::new();
        let copied = target.import(&source, root);
        assert_eq!(target.property(copied, "again"), Some(copied));
    }

    #[test]
    fn local_refs_become_links() {
        let (mut graph, root) = DefinitionGraph::from_json(&json!({
            "definitions": {
                "Node": {
                    "type": "object",
                    "properties": {"next": {"$ref": "#/definitions/Node"}}
                },
                "Alias": {"$ref": "#/definitions/Node"}
            },
            "use": {"$ref": "#/definitions/Alias"},
            "broken": {"$ref": "#/definitions/Missing"}
        }));
        let unresolved = graph.resolve_local_refs(root);
        assert_eq!(unresolved, vec!["#/definitions/Missing".to_string()]);

        let node = graph.pointer(root, "#/definitions/Node").unwrap();
        let next = graph.pointer(root, "#/definitions/Node/properties/next").unwrap();
        assert_eq!(next, node);
        assert_eq!(graph.property(root, "use"), Some(node));
        assert!(graph.to_json(node).is_err());
    }

    #[test]
    fn pointer_unescapes_tokens() {
        let (graph, root) = DefinitionGraph::from_json(&json!({"paths": {"/a/{id}": {"get": 1}}}));
        let get = graph.pointer(root, "#/paths/~1a~1%7Bid%7D/get").unwrap();
        assert_eq!(graph.view(get).as_u64(), Some(1));
        assert_eq!(graph.pointer(root, "#"), Some(root));
        assert_eq!(graph.pointer(root, "other.json#/x"), None);
    }
}
