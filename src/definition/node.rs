use super::graph::{DefId, DefNode, DefRef, DefinitionGraph};
use crate::report::ErrorNode;
use indexmap::IndexMap;
use serde_json::Value;

/// Stable index of a node inside a [`ValidatorSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValidatorId(u32);

/// Shape a validator node accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Object,
    Array,
    String,
    Number,
    /// A number without a fractional part.
    Integer,
    Boolean,
    /// Free-form: any value is accepted and copied through.
    Any,
}

impl ValueType {
    #[must_use]
    pub fn accepts(self, node: &DefNode) -> bool {
        match (self, node) {
            (ValueType::Any, _) => true,
            (ValueType::Object, DefNode::Object(_)) => true,
            (ValueType::Array, DefNode::Array(_)) => true,
            (ValueType::String, DefNode::String(_)) => true,
            (ValueType::Number, DefNode::Number(_)) => true,
            (ValueType::Integer, DefNode::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            (ValueType::Boolean, DefNode::Bool(_)) => true,
            _ => false,
        }
    }

    /// Type name with its article, as used in "Value must be ..." messages.
    #[must_use]
    pub fn described(self) -> &'static str {
        match self {
            ValueType::Object => "an object",
            ValueType::Array => "an array",
            ValueType::String => "a string",
            ValueType::Number => "a number",
            ValueType::Integer => "an integer",
            ValueType::Boolean => "a boolean",
            ValueType::Any => "a value",
        }
    }
}

/// Ambient state visible to rules: the specification major version and the
/// already-normalized siblings of the value being checked.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    major: u8,
    graph: &'a DefinitionGraph,
    siblings: Option<&'a IndexMap<String, DefId>>,
}

impl<'a> Context<'a> {
    #[must_use]
    pub fn new(
        major: u8,
        graph: &'a DefinitionGraph,
        siblings: Option<&'a IndexMap<String, DefId>>,
    ) -> Self {
        Self {
            major,
            graph,
            siblings,
        }
    }

    #[must_use]
    pub fn major(&self) -> u8 {
        self.major
    }

    #[must_use]
    pub fn sibling(&self, key: &str) -> Option<DefRef<'a>> {
        let id = self.siblings?.get(key)?;
        Some(self.graph.view(*id))
    }

    #[must_use]
    pub fn sibling_str(&self, key: &str) -> Option<&'a str> {
        self.sibling(key).and_then(|s| s.as_str())
    }

    #[must_use]
    pub fn sibling_bool(&self, key: &str) -> Option<bool> {
        self.sibling(key).and_then(|s| s.as_bool())
    }

    #[must_use]
    pub fn has_sibling(&self, key: &str) -> bool {
        self.siblings.is_some_and(|s| s.contains_key(key))
    }
}

/// Predicate over [`Context`] used for `required` and `allowed`.
#[derive(Debug, Clone)]
pub enum Rule {
    Always,
    Never,
    /// True when the document's major version equals the given one.
    Version(u8),
    SiblingEquals { key: String, value: Value },
    SiblingPresent(String),
    Not(Box<Rule>),
    All(Vec<Rule>),
    Any(Vec<Rule>),
    Custom(fn(&Context<'_>) -> bool),
}

impl Rule {
    pub fn sibling_equals(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Rule::SiblingEquals {
            key: key.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn negate(self) -> Self {
        Rule::Not(Box::new(self))
    }

    #[must_use]
    pub fn eval(&self, ctx: &Context<'_>) -> bool {
        match self {
            Rule::Always => true,
            Rule::Never => false,
            Rule::Version(major) => ctx.major == *major,
            Rule::SiblingEquals { key, value } => ctx
                .sibling(key)
                .and_then(|s| s.try_json())
                .is_some_and(|s| json_eq(&s, value)),
            Rule::SiblingPresent(key) => ctx.has_sibling(key),
            Rule::Not(inner) => !inner.eval(ctx),
            Rule::All(rules) => rules.iter().all(|r| r.eval(ctx)),
            Rule::Any(rules) => rules.iter().any(|r| r.eval(ctx)),
            Rule::Custom(f) => f(ctx),
        }
    }
}

/// Default applied when a property is absent and not required.
#[derive(Debug, Clone)]
pub enum DefaultValue {
    Literal(Value),
    Computed(fn(&Context<'_>) -> Option<Value>),
}

impl DefaultValue {
    #[must_use]
    pub fn resolve(&self, ctx: &Context<'_>) -> Option<Value> {
        match self {
            DefaultValue::Literal(v) => Some(v.clone()),
            DefaultValue::Computed(f) => f(ctx),
        }
    }
}

/// Policy for object keys that are not declared properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Additional {
    Forbidden,
    Any,
    Node(ValidatorId),
}

/// Extra checks run once the value passed its structural checks.
pub type ErrorsFn = fn(&Context<'_>, DefRef<'_>, &mut ErrorNode);

/// Declarative description of one definition field or object.
#[derive(Debug, Clone)]
pub struct ValidatorNode {
    pub value_type: ValueType,
    pub required: Rule,
    pub allowed: Rule,
    pub properties: IndexMap<String, ValidatorId>,
    pub additional_properties: Additional,
    pub items: Option<ValidatorId>,
    pub enum_values: Option<Vec<Value>>,
    pub default: Option<DefaultValue>,
    pub errors: Option<ErrorsFn>,
    /// Accept `x-` specification extensions on objects.
    pub extensions: bool,
    /// Also accept a bare boolean in place of the declared type
    /// (`additionalProperties: true`).
    pub or_boolean: bool,
}

impl ValidatorNode {
    #[must_use]
    pub fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            required: Rule::Never,
            allowed: Rule::Always,
            properties: IndexMap::new(),
            additional_properties: Additional::Forbidden,
            items: None,
            enum_values: None,
            default: None,
            errors: None,
            extensions: true,
            or_boolean: false,
        }
    }

    #[must_use]
    pub fn object() -> Self {
        Self::new(ValueType::Object)
    }

    #[must_use]
    pub fn array(items: ValidatorId) -> Self {
        Self::new(ValueType::Array).items(items)
    }

    #[must_use]
    pub fn string() -> Self {
        Self::new(ValueType::String)
    }

    #[must_use]
    pub fn number() -> Self {
        Self::new(ValueType::Number)
    }

    #[must_use]
    pub fn integer() -> Self {
        Self::new(ValueType::Integer)
    }

    #[must_use]
    pub fn boolean() -> Self {
        Self::new(ValueType::Boolean)
    }

    #[must_use]
    pub fn any() -> Self {
        Self::new(ValueType::Any)
    }

    /// Object whose every value follows `node`.
    #[must_use]
    pub fn map_of(node: ValidatorId) -> Self {
        Self::object().additional(Additional::Node(node))
    }

    #[must_use]
    pub fn property(mut self, name: impl Into<String>, node: ValidatorId) -> Self {
        self.properties.insert(name.into(), node);
        self
    }

    #[must_use]
    pub fn additional(mut self, additional: Additional) -> Self {
        self.additional_properties = additional;
        self
    }

    #[must_use]
    pub fn items(mut self, node: ValidatorId) -> Self {
        self.items = Some(node);
        self
    }

    #[must_use]
    pub fn required(mut self, rule: Rule) -> Self {
        self.required = rule;
        self
    }

    #[must_use]
    pub fn allowed(mut self, rule: Rule) -> Self {
        self.allowed = rule;
        self
    }

    #[must_use]
    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    #[must_use]
    pub fn default_with(mut self, f: fn(&Context<'_>) -> Option<Value>) -> Self {
        self.default = Some(DefaultValue::Computed(f));
        self
    }

    #[must_use]
    pub fn errors(mut self, f: ErrorsFn) -> Self {
        self.errors = Some(f);
        self
    }

    #[must_use]
    pub fn or_boolean(mut self) -> Self {
        self.or_boolean = true;
        self
    }

    #[must_use]
    pub fn extensions(mut self, allow: bool) -> Self {
        self.extensions = allow;
        self
    }
}

/// Arena of validator nodes. Nodes refer to each other by [`ValidatorId`], so a
/// node may reference an ancestor or itself.
#[derive(Debug, Clone, Default)]
pub struct ValidatorSet {
    nodes: Vec<ValidatorNode>,
}

impl ValidatorSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: ValidatorNode) -> ValidatorId {
        let id = ValidatorId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Allocate an id before its node is known, for self-referential definitions.
    pub fn reserve(&mut self) -> ValidatorId {
        self.add(ValidatorNode::any())
    }

    /// Fill in a node previously obtained from [`ValidatorSet::reserve`].
    pub fn define(&mut self, id: ValidatorId, node: ValidatorNode) {
        self.nodes[id.0 as usize] = node;
    }

    #[must_use]
    pub fn get(&self, id: ValidatorId) -> &ValidatorNode {
        &self.nodes[id.0 as usize]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Structural JSON equality where `1` and `1.0` compare equal.
#[must_use]
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(i, j)| json_eq(i, j))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| json_eq(v, w)))
        }
        _ => a == b,
    }
}
