//! # Request Enforcer
//!
//! Routes a request to its operation, decodes every declared parameter with
//! the [codec](crate::codec), validates decoded values and the body against
//! their schemas, and returns either a typed [`EnforcedRequest`] or an error
//! carrying an HTTP status.
//!
//! ```
//! use http::Method;
//! use oas_enforcer::enforcer::{EnforceOptions, Request, RequestError};
//! use oas_enforcer::Document;
//! use serde_json::json;
//!
//! let doc = Document::from_value(&json!({
//!     "openapi": "3.0.0",
//!     "info": {"title": "pets", "version": "1"},
//!     "paths": {"/pets/{id}": {"get": {
//!         "parameters": [{
//!             "name": "id", "in": "path", "required": true,
//!             "schema": {"type": "integer"}
//!         }],
//!         "responses": {"200": {"description": "ok"}}
//!     }}}
//! }))
//! .unwrap();
//!
//! let opts = EnforceOptions::default();
//! let req = doc
//!     .enforce_request(&Request::new(Method::GET, "/pets/42"), &opts)
//!     .unwrap();
//! assert_eq!(req.path["id"], json!(42));
//!
//! let err = doc
//!     .enforce_request(&Request::new(Method::POST, "/pets/42"), &opts)
//!     .unwrap_err();
//! assert_eq!(err.status(), http::StatusCode::METHOD_NOT_ALLOWED);
//! if let RequestError::Routing(routing) = err {
//!     assert_eq!(routing.allow_header().as_deref(), Some("GET"));
//! }
//! ```

mod core;
mod error;
mod request;

pub use core::{EnforcedRequest, Route};
pub use error::{ConfigError, RequestError, RoutingError};
pub use request::{Body, EnforceOptions, Request};
