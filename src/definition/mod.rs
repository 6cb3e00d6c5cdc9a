//! # Definition Module
//!
//! The definition module is the normalization engine. It walks a declarative
//! validator graph ([`ValidatorSet`]) in lock-step with a user-supplied definition
//! ([`DefinitionGraph`]) and produces a normalized graph plus an
//! [`ErrorNode`](crate::report::ErrorNode) tree.
//!
//! ## Arenas
//!
//! Both graphs are arenas addressed by stable ids, so either may be cyclic:
//!
//! - a Schema validator refers to itself for `items`, `properties` and
//!   `additionalProperties`
//! - a definition built at runtime may contain itself
//!
//! The normalizer tracks `(validator, value)` pairs on the active recursion path.
//! Revisiting a pair yields the output node already being built for it, so the
//! normalized graph mirrors the input's cycles and the walk always terminates.
//!
//! ## Example
//!
//! ```
//! use oas_enforcer::definition::{normalize_json, Rule, ValidatorNode, ValidatorSet};
//! use serde_json::json;
//!
//! let mut set = ValidatorSet::new();
//! let url = set.add(ValidatorNode::string().required(Rule::Always));
//! let doc = set.add(ValidatorNode::object().property("url", url));
//!
//! let (_, errors) = normalize_json(&set, doc, &json!({}), 3);
//! assert_eq!(errors.to_string(), "Missing required property: url");
//! ```

mod graph;
mod node;
mod normalize;

pub use graph::{DefId, DefNode, DefRef, DefinitionGraph, GraphError};
pub use node::{
    json_eq, Additional, Context, DefaultValue, ErrorsFn, Rule, ValidatorId, ValidatorNode,
    ValidatorSet, ValueType,
};
pub use normalize::{normalize, normalize_json, Normalized};
