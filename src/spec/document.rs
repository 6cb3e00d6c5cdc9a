use super::build::{build_document, Built};
use super::catalog::catalog;
use super::schema::{SchemaArena, SchemaId};
use super::types::{Operation, PathItem, SpecVersion};
use crate::definition::{normalize, DefId, DefRef, DefinitionGraph, GraphError};
use crate::report::{quote, ErrorNode};
use crate::router::{PathMatch, PathRouter};
use anyhow::Context as _;
use http::Method;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// A document that failed normalization or semantic checks. The tree holds every
/// problem found, addressed from the document root.
#[derive(Debug, Clone, Error)]
pub enum DefinitionError {
    #[error("invalid definition:\n{0}")]
    Invalid(ErrorNode),
}

impl DefinitionError {
    /// Every problem found, addressed from the document root.
    #[must_use]
    pub fn errors(&self) -> &ErrorNode {
        match self {
            DefinitionError::Invalid(errors) => errors,
        }
    }
}

/// A normalized, immutable API description with its path router.
///
/// Build one with [`Document::from_value`] (or a string/file loader) and share it
/// across request handlers; nothing on it mutates after construction.
#[derive(Debug)]
pub struct Document {
    version: SpecVersion,
    graph: DefinitionGraph,
    root: DefId,
    base_path: String,
    schemas: SchemaArena,
    named_schemas: IndexMap<String, SchemaId>,
    paths: IndexMap<String, Arc<PathItem>>,
    router: PathRouter,
}

impl Document {
    /// Normalize a parsed document. Local `$ref`s are resolved first, so recursive
    /// schemas become cycles in the definition graph.
    pub fn from_value(value: &Value) -> Result<Self, DefinitionError> {
        let (mut graph, root) = DefinitionGraph::from_json(value);
        let unresolved = graph.resolve_local_refs(root);
        if !unresolved.is_empty() {
            let mut errors = ErrorNode::new();
            for pointer in unresolved {
                errors.push(format!("Cannot resolve reference: {pointer}"));
            }
            warn!(errors = errors.count(), "Document references could not be resolved");
            return Err(DefinitionError::Invalid(errors));
        }
        Self::from_graph(&graph, root)
    }

    /// Parse JSON text and normalize it.
    pub fn from_json_str(text: &str) -> anyhow::Result<Self> {
        let value: Value = serde_json::from_str(text).context("document is not valid JSON")?;
        Ok(Self::from_value(&value)?)
    }

    /// Parse YAML text and normalize it.
    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        let value: Value = serde_yaml::from_str(text).context("document is not valid YAML")?;
        Ok(Self::from_value(&value)?)
    }

    /// Normalize a definition graph that may already contain cycles.
    pub fn from_graph(graph: &DefinitionGraph, root: DefId) -> Result<Self, DefinitionError> {
        let version = detect_version(graph.view(root)).map_err(|errors| {
            warn!(errors = errors.count(), "Document version not recognised");
            DefinitionError::Invalid(errors)
        })?;

        let c = catalog();
        let normalized = normalize(&c.set, c.document, graph, root, version.major);
        let mut errors = normalized.errors;
        let Some(normalized_root) = normalized.root else {
            return Err(DefinitionError::Invalid(errors));
        };
        if errors.has_errors() {
            warn!(
                version = %version.raw,
                errors = errors.count(),
                "Document definition rejected"
            );
            return Err(DefinitionError::Invalid(errors));
        }

        let Built {
            schemas,
            named_schemas,
            paths,
            base_path,
        } = build_document(&version, normalized.graph.view(normalized_root), &mut errors);
        let (router, route_errors) = PathRouter::compile(&paths);
        errors.attach("paths", route_errors);
        if errors.has_errors() {
            warn!(
                version = %version.raw,
                errors = errors.count(),
                "Document definition rejected"
            );
            return Err(DefinitionError::Invalid(errors));
        }

        info!(
            version = %version.raw,
            base_path = %base_path,
            paths = paths.len(),
            operations = paths.values().map(|p| p.operations.len()).sum::<usize>(),
            schemas = named_schemas.len(),
            "Document loaded"
        );
        Ok(Self {
            version,
            graph: normalized.graph,
            root: normalized_root,
            base_path,
            schemas,
            named_schemas,
            paths,
            router,
        })
    }

    /// Version the document declares.
    #[must_use]
    pub fn version(&self) -> &SpecVersion {
        &self.version
    }

    /// The normalized definition graph and its root.
    #[must_use]
    pub fn normalized(&self) -> (&DefinitionGraph, DefId) {
        (&self.graph, self.root)
    }

    /// The normalized document as JSON; fails when it contains a cycle.
    pub fn to_json(&self) -> Result<Value, GraphError> {
        self.graph.to_json(self.root)
    }

    /// Path prefix stripped from request paths before matching (`""` for none).
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Compiled path items keyed by template, in declared order.
    #[must_use]
    pub fn paths(&self) -> &IndexMap<String, Arc<PathItem>> {
        &self.paths
    }

    /// Router compiled from [`Document::paths`].
    #[must_use]
    pub fn router(&self) -> &PathRouter {
        &self.router
    }

    /// Operation for `method` on the exact `template`.
    #[must_use]
    pub fn operation(&self, method: &Method, template: &str) -> Option<&Operation> {
        self.paths.get(template)?.operation(method)
    }

    /// Operation declaring `operationId: id`.
    #[must_use]
    pub fn operation_by_id(&self, id: &str) -> Option<&Operation> {
        self.paths
            .values()
            .flat_map(|item| item.operations.values())
            .find(|op| op.operation_id.as_deref() == Some(id))
    }

    /// Every schema the document compiled, parameters and bodies included.
    #[must_use]
    pub fn schemas(&self) -> &SchemaArena {
        &self.schemas
    }

    /// A named schema from `definitions` (version 2) or `components.schemas`.
    #[must_use]
    pub fn schema(&self, name: &str) -> Option<SchemaId> {
        self.named_schemas.get(name).copied()
    }

    /// Match a request path (base path included) against the document's templates.
    #[must_use]
    pub fn find_match(&self, path: &str) -> Option<PathMatch<'_>> {
        if self.base_path.is_empty() {
            return self.router.find_match(path);
        }
        let rest = path.strip_prefix(self.base_path.as_str())?;
        if rest.is_empty() || rest.starts_with(['/', '?', '#']) {
            self.router.find_match(rest)
        } else {
            None
        }
    }
}

fn detect_version(root: DefRef<'_>) -> Result<SpecVersion, ErrorNode> {
    if !root.is_object() {
        return Err(ErrorNode::with_message(format!(
            "Value must be an object. Received: {}",
            quote(&root.to_json())
        )));
    }
    let describe = |node: DefRef<'_>| match node.as_str() {
        Some(s) => s.to_string(),
        None => quote(&node.to_json()),
    };

    if let Some(swagger) = root.property("swagger") {
        return match swagger.as_str() {
            Some("2.0") => Ok(SpecVersion {
                major: 2,
                raw: "2.0".to_string(),
            }),
            _ => {
                let mut errors = ErrorNode::new();
                errors
                    .nest("swagger")
                    .push(format!("Unsupported Swagger version: {}", describe(swagger)));
                Err(errors)
            }
        };
    }
    if let Some(openapi) = root.property("openapi") {
        return match openapi.as_str() {
            Some(raw) if raw.starts_with("3.") => Ok(SpecVersion {
                major: 3,
                raw: raw.to_string(),
            }),
            _ => {
                let mut errors = ErrorNode::new();
                errors
                    .nest("openapi")
                    .push(format!("Unsupported OpenAPI version: {}", describe(openapi)));
                Err(errors)
            }
        };
    }
    Err(ErrorNode::with_message(
        "Missing required property: openapi or swagger",
    ))
}
