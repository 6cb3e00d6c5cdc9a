//! # oas-enforcer
//!
//! **oas-enforcer** normalizes OpenAPI 2 (Swagger) and OpenAPI 3 documents and
//! enforces incoming requests against them.
//!
//! ## Overview
//!
//! A document is loaded once, validated against a built-in catalogue of
//! definition rules, and compiled into a [`Document`]: a path router, typed
//! operations and a schema arena. At request time the document routes a
//! method and path, decodes every declared parameter from its wire format and
//! validates parameters and body against their schemas.
//!
//! Both build-time and request-time validation collect every problem into one
//! [`ErrorNode`] tree addressed by key path, instead of stopping at the first.
//!
//! ## Architecture
//!
//! - **[`report`]** - Error Reporter: path-addressed error trees
//! - **[`definition`]** - Definition Normalizer: arena graphs and the cycle-safe
//!   validator engine
//! - **[`spec`]** - Built-in definition catalogue, schema model and [`Document`]
//! - **[`router`]** - Path Router: template compilation, equivalency checks and
//!   length-bucketed matching
//! - **[`codec`]** - Parameter Codec: `style`/`explode`, `collectionFormat` and
//!   primitive coercion
//! - **[`enforcer`]** - Request Enforcer: routing errors and request validation
//! - **[`negotiate`]** - Content Negotiator: `Accept` ranking
//! - **[`runtime_config`]** / **[`logging`]** - environment configuration and
//!   `tracing` setup
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Caller
//!     participant Doc as Document
//!     participant Router as PathRouter
//!     participant Codec as codec
//!     participant Schema as SchemaArena
//!
//!     Caller->>Doc: enforce_request(request, options)
//!     Doc->>Router: find_match(path)
//!     alt No template matches
//!         Router-->>Caller: 404 NotFound
//!     else Method not declared
//!         Doc-->>Caller: 405 MethodNotAllowed (Allow)
//!     end
//!     loop every declared parameter
//!         Doc->>Codec: decode_value / decode_query
//!         Doc->>Schema: validate(decoded)
//!     end
//!     Doc->>Schema: validate(body)
//!     Doc-->>Caller: EnforcedRequest or 400 error tree
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use http::Method;
//! use oas_enforcer::{Document, EnforceOptions, Request};
//! use serde_json::json;
//!
//! let doc = Document::from_yaml_str(r#"
//! openapi: 3.0.3
//! info: {title: Pets, version: "1"}
//! paths:
//!   /pets:
//!     get:
//!       parameters:
//!         - name: limit
//!           in: query
//!           schema: {type: integer, maximum: 100}
//!       responses:
//!         "200":
//!           description: ok
//!           content:
//!             application/json: {}
//! "#).unwrap();
//!
//! let req = Request::new(Method::GET, "/pets?limit=10");
//! let enforced = doc.enforce_request(&req, &EnforceOptions::default()).unwrap();
//! assert_eq!(enforced.query["limit"], json!(10));
//!
//! let req = Request::new(Method::GET, "/pets?limit=500");
//! let err = doc.enforce_request(&req, &EnforceOptions::default()).unwrap_err();
//! assert_eq!(err.status(), http::StatusCode::BAD_REQUEST);
//!
//! let op = enforced.operation;
//! assert_eq!(op.negotiate_response("application/*", 200), Some("application/json"));
//! ```
//!
//! ## Concurrency
//!
//! A [`Document`] is immutable after construction and can be shared across
//! threads (for example behind an `Arc`). Request-time calls allocate only
//! request-local values.

pub mod codec;
pub mod definition;
pub mod enforcer;
pub mod logging;
pub mod negotiate;
pub mod report;
pub mod router;
pub mod runtime_config;
pub mod spec;

pub use enforcer::{
    Body, ConfigError, EnforceOptions, EnforcedRequest, Request, RequestError, Route,
    RoutingError,
};
pub use report::ErrorNode;
pub use router::{PathMatch, PathRouter};
pub use spec::{
    load_document, DefinitionError, Document, Operation, ParameterLocation, ParameterSpec,
    ParameterStyle, PathItem, SchemaArena,
};
