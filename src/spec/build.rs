use super::schema::{SchemaArena, SchemaId};
use super::types::{
    CollectionFormat, Operation, ParameterEncoding, ParameterLocation, ParameterSpec,
    ParameterStyle, PathItem, RequestBodySpec, ResponseSpec, SpecVersion, METHODS,
};
use crate::definition::{DefRef, DefinitionGraph};
use crate::report::ErrorNode;
use http::Method;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Media type assumed when a version 2 document declares no `consumes`/`produces`.
const DEFAULT_MEDIA_TYPE: &str = "application/json";

/// Everything derived from a normalized document root.
#[derive(Debug, Default)]
pub(crate) struct Built {
    pub schemas: SchemaArena,
    pub named_schemas: IndexMap<String, SchemaId>,
    pub paths: IndexMap<String, Arc<PathItem>>,
    pub base_path: String,
}

struct Builder<'g> {
    version: &'g SpecVersion,
    graph: &'g DefinitionGraph,
    schemas: SchemaArena,
    consumes: Vec<String>,
    produces: Vec<String>,
    operation_ids: IndexMap<String, (String, Method)>,
}

/// Build paths, operations and schemas from the normalized root.
///
/// Semantic problems the catalogue cannot see on its own (duplicate
/// `operationId`s) are written to `errors`, addressed from the document root.
pub(crate) fn build_document(
    version: &SpecVersion,
    root: DefRef<'_>,
    errors: &mut ErrorNode,
) -> Built {
    let mut builder = Builder {
        version,
        graph: root.graph(),
        schemas: SchemaArena::new(),
        consumes: strings(root.property("consumes")),
        produces: strings(root.property("produces")),
        operation_ids: IndexMap::new(),
    };

    let mut named_schemas = IndexMap::new();
    let holder = if version.is_v2() {
        root.property("definitions")
    } else {
        root.property("components")
            .and_then(|c| c.property("schemas"))
    };
    if let Some(holder) = holder {
        for (name, node) in holder.entries() {
            let id = builder.schemas.compile(builder.graph, node.id());
            named_schemas.insert(name.to_string(), id);
        }
    }

    let mut paths = IndexMap::new();
    if let Some(paths_node) = root.property("paths") {
        for (template, item_node) in paths_node.entries() {
            if template.starts_with("x-") {
                continue;
            }
            let item = builder.path_item(template, item_node, errors);
            paths.insert(template.to_string(), Arc::new(item));
        }
    }

    Built {
        schemas: builder.schemas,
        named_schemas,
        paths,
        base_path: base_path(version, root),
    }
}

impl Builder<'_> {
    fn path_item(&mut self, template: &str, node: DefRef<'_>, errors: &mut ErrorNode) -> PathItem {
        let shared: Vec<DefRef<'_>> = node
            .property("parameters")
            .map(|p| p.items().collect())
            .unwrap_or_default();

        let mut operations = IndexMap::new();
        for (key, method) in &METHODS {
            let Some(op_node) = node.property(key) else {
                continue;
            };
            if let Some(id) = op_node.property("operationId").and_then(|v| v.as_str()) {
                if self.operation_ids.contains_key(id) {
                    errors
                        .nest("paths")
                        .nest(template)
                        .nest(*key)
                        .nest("operationId")
                        .push(format!("Duplicate operationId: {id}"));
                } else {
                    self.operation_ids
                        .insert(id.to_string(), (template.to_string(), method.clone()));
                }
            }
            let operation = self.operation(template, method.clone(), &shared, op_node);
            operations.insert(method.clone(), operation);
        }

        debug!(template, operations = operations.len(), "Path item built");
        PathItem {
            template: template.to_string(),
            operations,
        }
    }

    fn operation<'n>(
        &mut self,
        template: &str,
        method: Method,
        shared: &[DefRef<'n>],
        node: DefRef<'n>,
    ) -> Operation {
        // Operation-level parameters replace path-level ones with the same name and location.
        let mut merged: Vec<DefRef<'n>> = shared.to_vec();
        if let Some(own) = node.property("parameters") {
            for param in own.items() {
                let key = parameter_key(param);
                match merged.iter_mut().find(|p| parameter_key(**p) == key) {
                    Some(slot) => *slot = param,
                    None => merged.push(param),
                }
            }
        }

        let consumes = non_empty_or(strings(node.property("consumes")), &self.consumes);
        let produces = non_empty_or(strings(node.property("produces")), &self.produces);

        let mut parameters = Vec::with_capacity(merged.len());
        let mut request_body = None;
        for param in merged {
            let Some(spec) = self.parameter(param) else {
                continue;
            };
            if spec.encoding == ParameterEncoding::Body {
                request_body = Some(RequestBodySpec {
                    required: spec.required,
                    content: consumes
                        .iter()
                        .map(|media| (media.clone(), spec.schema))
                        .collect(),
                });
                continue;
            }
            parameters.push(spec);
        }

        if !self.version.is_v2() {
            request_body = node.property("requestBody").map(|body| RequestBodySpec {
                required: body.property("required").and_then(|r| r.as_bool()) == Some(true),
                content: self.content(body.property("content")),
            });
        }

        let mut responses = IndexMap::new();
        if let Some(declared) = node.property("responses") {
            for (code, response) in declared.entries() {
                if code.starts_with("x-") {
                    continue;
                }
                let content = if self.version.is_v2() {
                    match response.property("schema") {
                        Some(schema) => {
                            let id = self.schemas.compile(self.graph, schema.id());
                            produces.iter().map(|m| (m.clone(), Some(id))).collect()
                        }
                        None => IndexMap::new(),
                    }
                } else {
                    self.content(response.property("content"))
                };
                responses.insert(code.to_string(), ResponseSpec { content });
            }
        }

        Operation {
            method,
            template: template.to_string(),
            operation_id: string(node.property("operationId")),
            summary: string(node.property("summary")),
            parameters,
            request_body,
            responses,
        }
    }

    fn parameter(&mut self, node: DefRef<'_>) -> Option<ParameterSpec> {
        let name = node.property("name")?.as_str()?.to_string();
        let location = ParameterLocation::parse(node.property("in")?.as_str()?)?;
        let flag = |key: &str| node.property(key).and_then(|v| v.as_bool());
        let required = flag("required").unwrap_or(location == ParameterLocation::Path);
        let allow_empty_value = flag("allowEmptyValue").unwrap_or(false);

        let (schema, encoding) = if self.version.is_v2() {
            if location == ParameterLocation::Body {
                let schema = node
                    .property("schema")
                    .map(|s| self.schemas.compile(self.graph, s.id()));
                (schema, ParameterEncoding::Body)
            } else {
                // The parameter's own type keywords form its schema.
                let format = node
                    .property("collectionFormat")
                    .and_then(|c| c.as_str())
                    .and_then(CollectionFormat::parse)
                    .unwrap_or(CollectionFormat::Csv);
                (
                    Some(self.schemas.compile(self.graph, node.id())),
                    ParameterEncoding::Collection(format),
                )
            }
        } else if let Some((media_type, media)) =
            node.property("content").and_then(|c| c.entries().next())
        {
            let schema = media
                .property("schema")
                .map(|s| self.schemas.compile(self.graph, s.id()));
            (
                schema,
                ParameterEncoding::Content {
                    media_type: media_type.to_string(),
                },
            )
        } else {
            let style = node
                .property("style")
                .and_then(|s| s.as_str())
                .and_then(ParameterStyle::parse)
                .or_else(|| ParameterStyle::allowed_for(location).first().copied())
                .unwrap_or(ParameterStyle::Simple);
            let explode = flag("explode").unwrap_or(style == ParameterStyle::Form);
            let schema = node
                .property("schema")
                .map(|s| self.schemas.compile(self.graph, s.id()));
            (schema, ParameterEncoding::Style { style, explode })
        };

        Some(ParameterSpec {
            name,
            location,
            required,
            allow_empty_value,
            schema,
            encoding,
        })
    }

    fn content(&mut self, node: Option<DefRef<'_>>) -> IndexMap<String, Option<SchemaId>> {
        let mut content = IndexMap::new();
        if let Some(node) = node {
            for (media_type, media) in node.entries() {
                let schema = media
                    .property("schema")
                    .map(|s| self.schemas.compile(self.graph, s.id()));
                content.insert(media_type.to_string(), schema);
            }
        }
        content
    }
}

fn parameter_key(node: DefRef<'_>) -> (Option<&str>, Option<&str>) {
    (
        node.property("name").and_then(|n| n.as_str()),
        node.property("in").and_then(|n| n.as_str()),
    )
}

fn string(node: Option<DefRef<'_>>) -> Option<String> {
    node.and_then(|n| n.as_str()).map(str::to_string)
}

fn strings(node: Option<DefRef<'_>>) -> Vec<String> {
    node.map(|n| {
        n.items()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect()
    })
    .unwrap_or_default()
}

fn non_empty_or(own: Vec<String>, inherited: &[String]) -> Vec<String> {
    if !own.is_empty() {
        own
    } else if !inherited.is_empty() {
        inherited.to_vec()
    } else {
        vec![DEFAULT_MEDIA_TYPE.to_string()]
    }
}

/// Path prefix every request path carries: version 2 `basePath` or the path of
/// the first version 3 server URL. Empty when the prefix is `/`.
fn base_path(version: &SpecVersion, root: DefRef<'_>) -> String {
    let raw = if version.is_v2() {
        string(root.property("basePath"))
    } else {
        root.property("servers")
            .and_then(|servers| servers.items().next())
            .and_then(server_path)
    };
    raw.map(|p| p.trim_end_matches('/').to_string())
        .unwrap_or_default()
}

fn server_path(server: DefRef<'_>) -> Option<String> {
    let mut url = server.property("url")?.as_str()?.to_string();
    if let Some(variables) = server.property("variables") {
        for (name, variable) in variables.entries() {
            if let Some(default) = variable.property("default").and_then(|d| d.as_str()) {
                url = url.replace(&format!("{{{name}}}"), default);
            }
        }
    }
    let base = Url::parse("http://localhost/").ok()?;
    let resolved = base.join(&url).ok()?;
    let path = urlencoding::decode(resolved.path()).ok()?;
    Some(path.into_owned())
}
