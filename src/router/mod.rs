//! # Router Module
//!
//! Path templates such as `/pets/{id}` are compiled once per document into
//! anchored regular expressions. Matching then works in two steps:
//!
//! 1. **Bucket**: the request path's segment count selects the candidate
//!    templates, so a lookup only inspects templates of the same length.
//! 2. **Match**: candidates are tried in declaration order and the first match
//!    wins, returning the raw captures keyed by variable name.
//!
//! Compilation also rejects structurally ambiguous templates (`/a/{x}/b` next to
//! `/a/{y}/b`) and cross-checks template variables against each operation's
//! declared path parameters.
//!
//! ## Example
//!
//! ```
//! use oas_enforcer::Document;
//! use serde_json::json;
//!
//! let doc = Document::from_value(&json!({
//!     "openapi": "3.0.3",
//!     "info": {"title": "Pets", "version": "1"},
//!     "paths": {
//!         "/pets/{id}": {
//!             "get": {
//!                 "parameters": [
//!                     {"name": "id", "in": "path", "required": true, "schema": {"type": "string"}}
//!                 ],
//!                 "responses": {"200": {"description": "ok"}}
//!             }
//!         }
//!     }
//! }))
//! .unwrap();
//!
//! let found = doc.router().find_match("/pets/42").unwrap();
//! assert_eq!(found.template, "/pets/{id}");
//! assert_eq!(found.param("id"), Some("42"));
//! assert!(doc.router().find_match("/pets").is_none());
//! ```

mod core;
#[cfg(test)]
mod tests;

pub use core::{ParamVec, PathMatch, PathRouter, MAX_INLINE_PARAMS};
