//! # Error Reporter
//!
//! A tree of validation messages addressed by key path. Every validation pass in
//! this crate (definition normalization, path compilation, parameter decoding,
//! request enforcement) writes into an [`ErrorNode`] and keeps walking; the caller
//! decides afterwards whether the tree is clean.
//!
//! ```
//! use oas_enforcer::report::ErrorNode;
//!
//! let mut root = ErrorNode::new();
//! root.nest("paths").nest("/pets").push("Missing required property: get");
//! assert!(root.has_errors());
//! assert_eq!(root.to_string(), "paths > /pets: Missing required property: get");
//! ```

use indexmap::IndexMap;
use std::fmt;

/// One node of a path-addressed error tree.
///
/// A node holds its own messages plus children keyed by object key or array
/// index. A tree is clean iff no node in it holds a message, so an empty child
/// created by [`ErrorNode::nest`] does not make the tree dirty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorNode {
    messages: Vec<String>,
    children: IndexMap<String, ErrorNode>,
}

impl ErrorNode {
    /// An empty, clean tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a node holding one message.
    #[must_use]
    pub fn with_message(message: impl Into<String>) -> Self {
        let mut node = Self::new();
        node.push(message);
        node
    }

    /// Add a message at this level.
    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Get (or create) the child scope for `key`.
    pub fn nest(&mut self, key: impl Into<String>) -> &mut ErrorNode {
        self.children.entry(key.into()).or_default()
    }

    /// Merge a finished subtree under `key`, keeping any messages already there.
    pub fn attach(&mut self, key: impl Into<String>, child: ErrorNode) {
        if child.has_errors() {
            self.nest(key).absorb(child);
        }
    }

    /// Merge another tree into this node.
    pub fn absorb(&mut self, other: ErrorNode) {
        self.messages.extend(other.messages);
        for (key, child) in other.children {
            self.nest(key).absorb(child);
        }
    }

    /// Messages held directly by this node, excluding children.
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Child scope for `key`, if one was created.
    #[must_use]
    pub fn child(&self, key: &str) -> Option<&ErrorNode> {
        self.children.get(key)
    }

    /// Child scopes in insertion order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &ErrorNode)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// True if a message exists anywhere in this subtree.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.messages.is_empty() || self.children.values().any(ErrorNode::has_errors)
    }

    /// Total number of messages in this subtree.
    #[must_use]
    pub fn count(&self) -> usize {
        self.messages.len() + self.children.values().map(ErrorNode::count).sum::<usize>()
    }

    /// Every message with the key path leading to it, depth first in insertion order.
    #[must_use]
    pub fn flatten(&self) -> Vec<(Vec<String>, String)> {
        let mut out = Vec::new();
        self.collect(&mut Vec::new(), &mut out);
        out
    }

    fn collect(&self, path: &mut Vec<String>, out: &mut Vec<(Vec<String>, String)>) {
        for message in &self.messages {
            out.push((path.clone(), message.clone()));
        }
        for (key, child) in &self.children {
            path.push(key.clone());
            child.collect(path, out);
            path.pop();
        }
    }

    /// Turn the tree into a `Result`, `Err` when it holds any message.
    pub fn into_result<T>(self, value: T) -> Result<T, ErrorNode> {
        if self.has_errors() {
            Err(self)
        } else {
            Ok(value)
        }
    }
}

impl fmt::Display for ErrorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (path, message) in self.flatten() {
            if !first {
                writeln!(f)?;
            }
            first = false;
            if path.is_empty() {
                write!(f, "{message}")?;
            } else {
                write!(f, "{}: {message}", path.join(" > "))?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ErrorNode {}

/// Render a value the way error messages quote it: strings in double quotes,
/// everything else as compact JSON.
#[must_use]
pub fn quote(value: &serde_json::Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| String::from("<unprintable>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_children_are_clean() {
        let mut root = ErrorNode::new();
        root.nest("a").nest("b");
        assert!(!root.has_errors());
        assert_eq!(root.count(), 0);
    }

    #[test]
    fn deep_message_dirties_root() {
        let mut root = ErrorNode::new();
        root.nest("a").nest("0").push("bad");
        root.push("top");
        assert!(root.has_errors());
        assert_eq!(root.count(), 2);
        assert_eq!(root.to_string(), "top\na > 0: bad");
    }

    #[test]
    fn attach_skips_clean_subtrees() {
        let mut root = ErrorNode::new();
        root.attach("clean", ErrorNode::new());
        assert!(root.child("clean").is_none());
        root.attach("dirty", ErrorNode::with_message("x"));
        assert_eq!(root.child("dirty").map(|c| c.messages().len()), Some(1));
    }

    #[test]
    fn quote_matches_json_rendering() {
        assert_eq!(quote(&json!("abc")), "\"abc\"");
        assert_eq!(quote(&json!(5)), "5");
        assert_eq!(quote(&json!({"a": true})), "{\"a\":true}");
    }
}
