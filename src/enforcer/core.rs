use super::error::{RequestError, RoutingError};
use super::request::{Body, EnforceOptions, Request};
use crate::codec::{coerce, decode_query, decode_value, is_json_media_type, QueryString};
use crate::report::{quote, ErrorNode};
use crate::router::ParamVec;
use crate::spec::{Document, Operation, ParameterLocation, ParameterSpec, SchemaArena, SchemaId};
use http::Method;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

const FORM_MEDIA_TYPE: &str = "application/x-www-form-urlencoded";

/// An operation resolved from a method and path.
#[derive(Debug, Clone)]
pub struct Route<'d> {
    pub operation: &'d Operation,
    pub template: &'d str,
    /// Raw path captures in template order.
    pub params: ParamVec,
}

/// A request whose parameters and body were decoded and validated.
#[derive(Debug, Clone)]
pub struct EnforcedRequest<'d> {
    pub operation: &'d Operation,
    pub template: &'d str,
    pub path: Map<String, Value>,
    pub query: Map<String, Value>,
    pub header: Map<String, Value>,
    pub cookie: Map<String, Value>,
    /// Decoded body; version 2 `formData` parameters are gathered here as an object.
    pub body: Option<Value>,
}

type Missing<'o> = Vec<(ParameterLocation, &'o str)>;

impl Document {
    /// Resolve `method` and `path` to an operation.
    pub fn route(&self, method: &Method, path: &str) -> Result<Route<'_>, RoutingError> {
        let found = self.find_match(path).ok_or_else(|| RoutingError::NotFound {
            path: path.to_string(),
        })?;
        match found.item.operation(method) {
            Some(operation) => Ok(Route {
                operation,
                template: found.template,
                params: found.params,
            }),
            None => Err(RoutingError::MethodNotAllowed {
                method: method.clone(),
                allowed: found.item.allowed_methods(),
            }),
        }
    }

    /// Route a request, decode every declared parameter and validate the body.
    ///
    /// All parameters are attempted even after one fails; any problem anywhere
    /// yields [`RequestError::Invalid`] with the whole tree.
    pub fn enforce_request(
        &self,
        request: &Request,
        options: &EnforceOptions,
    ) -> Result<EnforcedRequest<'_>, RequestError> {
        if !request.path.starts_with('/') {
            return Err(RequestError::Precondition(format!(
                "request path must start with '/': {:?}",
                request.path
            )));
        }
        let route = self.route(&request.method, &request.path)?;
        let operation = route.operation;
        let schemas = self.schemas();
        let mut errors = ErrorNode::new();
        let mut missing: Missing<'_> = Vec::new();
        let mut enforced = EnforcedRequest {
            operation,
            template: route.template,
            path: Map::new(),
            query: Map::new(),
            header: Map::new(),
            cookie: Map::new(),
            body: None,
        };

        for param in operation.parameters_in(ParameterLocation::Path) {
            let raw = route
                .params
                .iter()
                .rfind(|(name, _)| name.as_ref() == param.name)
                .map(|(_, value)| value.as_str());
            match raw {
                Some(raw) => settle(
                    param,
                    schemas,
                    decode_value(param, schemas, raw),
                    &mut enforced.path,
                    &mut errors,
                ),
                None => missing.push((param.location, param.name.as_str())),
            }
        }

        let v3 = !self.version().is_v2();
        for param in operation.parameters_in(ParameterLocation::Header) {
            if v3 && is_reserved_header(&param.name) {
                continue;
            }
            match request.header(&param.name) {
                Some(raw) => settle(
                    param,
                    schemas,
                    decode_value(param, schemas, raw),
                    &mut enforced.header,
                    &mut errors,
                ),
                None if param.required => missing.push((param.location, param.name.as_str())),
                None => {}
            }
        }

        let cookies = request.cookies();
        for param in operation.parameters_in(ParameterLocation::Cookie) {
            match cookies.get(&param.name) {
                Some(raw) => settle(
                    param,
                    schemas,
                    decode_value(param, schemas, raw),
                    &mut enforced.cookie,
                    &mut errors,
                ),
                None if param.required => missing.push((param.location, param.name.as_str())),
                None => {}
            }
        }

        let query = QueryString::parse(&request.query);
        let query_params: Vec<&ParameterSpec> =
            operation.parameters_in(ParameterLocation::Query).collect();
        let consumed = enforce_pairs(
            &query_params,
            &query,
            schemas,
            &mut enforced.query,
            &mut errors,
            &mut missing,
        );
        let unexpected: Vec<&str> = query
            .keys()
            .into_iter()
            .filter(|key| !consumed.iter().any(|c| c.as_str() == *key))
            .collect();
        if options.allow_other_query_parameters {
            for key in unexpected {
                if let Some(value) = query.get(key) {
                    enforced
                        .query
                        .entry(key.to_string())
                        .or_insert_with(|| Value::String(value.to_string()));
                }
            }
        } else if !unexpected.is_empty() {
            errors
                .nest(ParameterLocation::Query.as_str())
                .push(listed("Unexpected parameter", &unexpected));
        }

        enforced.body = enforce_body(operation, request, schemas, &mut errors, &mut missing);

        report_missing(&mut errors, &missing);
        if errors.has_errors() {
            debug!(
                method = %request.method,
                template = route.template,
                errors = errors.count(),
                "Request rejected"
            );
            return Err(RequestError::Invalid(errors));
        }
        debug!(
            method = %request.method,
            template = route.template,
            path_params = enforced.path.len(),
            query_params = enforced.query.len(),
            "Request enforced"
        );
        Ok(enforced)
    }
}

/// Validate a decoded parameter and store it, or record why not.
fn settle(
    param: &ParameterSpec,
    schemas: &SchemaArena,
    decoded: Result<Value, ErrorNode>,
    target: &mut Map<String, Value>,
    errors: &mut ErrorNode,
) {
    let value = match decoded {
        Ok(value) => value,
        Err(problems) => {
            errors
                .nest(param.location.as_str())
                .attach(param.name.clone(), problems);
            return;
        }
    };
    if let Some(id) = param.schema {
        let problems = schemas.validate(id, &value);
        if problems.has_errors() {
            errors
                .nest(param.location.as_str())
                .attach(param.name.clone(), problems);
            return;
        }
    }
    target.insert(param.name.clone(), value);
}

/// Header parameters OpenAPI 3 ignores; the media type and security
/// machinery own these headers.
fn is_reserved_header(name: &str) -> bool {
    ["accept", "content-type", "authorization"]
        .iter()
        .any(|reserved| name.eq_ignore_ascii_case(reserved))
}

/// Decode query or form parameters from their pairs. Returns every key the
/// parameters accounted for.
fn enforce_pairs<'o>(
    params: &[&'o ParameterSpec],
    pairs: &QueryString,
    schemas: &SchemaArena,
    target: &mut Map<String, Value>,
    errors: &mut ErrorNode,
    missing: &mut Missing<'o>,
) -> Vec<String> {
    let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
    let mut consumed = Vec::new();
    for param in params {
        let occurrences = pairs.get_all(&param.name);
        if occurrences.iter().any(|raw| raw.is_empty()) {
            if !param.allow_empty_value {
                consumed.push(param.name.clone());
                errors
                    .nest(param.location.as_str())
                    .nest(param.name.clone())
                    .push("Empty value not allowed");
                continue;
            }
            if occurrences.iter().all(|raw| raw.is_empty()) {
                consumed.push(param.name.clone());
                target.insert(param.name.clone(), Value::String(String::new()));
                continue;
            }
        }
        let others: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| *name != param.name)
            .collect();
        match decode_query(param, schemas, pairs, &others) {
            Some(decoded) => {
                consumed.extend(decoded.consumed);
                settle(param, schemas, decoded.value, target, errors);
            }
            None if param.required => missing.push((param.location, param.name.as_str())),
            None => {}
        }
    }
    consumed
}

fn enforce_body<'o>(
    operation: &'o Operation,
    request: &Request,
    schemas: &SchemaArena,
    errors: &mut ErrorNode,
    missing: &mut Missing<'o>,
) -> Option<Value> {
    let form_params: Vec<&ParameterSpec> = operation
        .parameters_in(ParameterLocation::FormData)
        .collect();
    if !form_params.is_empty() {
        let pairs = match &request.body {
            Some(Body::Text(text)) => QueryString::parse(text),
            Some(Body::Json(Value::Object(fields))) => fields
                .iter()
                .map(|(key, value)| (key.clone(), plain_text(value)))
                .collect(),
            Some(Body::Json(other)) => {
                errors
                    .nest("body")
                    .push(format!("Expected form data. Received: {}", quote(other)));
                return None;
            }
            None => QueryString::default(),
        };
        let mut fields = Map::new();
        enforce_pairs(&form_params, &pairs, schemas, &mut fields, errors, missing);
        return Some(Value::Object(fields));
    }

    let Some(spec) = &operation.request_body else {
        return request.body.as_ref().map(raw_value);
    };
    let Some(body) = &request.body else {
        if spec.required {
            errors.push("Missing required request body");
        }
        return None;
    };
    if spec.content.is_empty() {
        return Some(raw_value(body));
    }

    let content_type = request.header("content-type").map(essence);
    let chosen = match content_type.as_deref() {
        Some(content_type) => select_media(&spec.content, content_type),
        None => spec
            .content
            .first()
            .map(|(media, schema)| (media.as_str(), *schema)),
    };
    let Some((media_type, schema)) = chosen else {
        errors.push(format!(
            "Content-Type not accepted: {}",
            content_type.unwrap_or_default()
        ));
        return None;
    };

    let json = is_json_media_type(media_type)
        || content_type.as_deref().is_some_and(is_json_media_type);
    let value = match body {
        Body::Json(value) => value.clone(),
        Body::Text(text) if json => match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                errors.nest("body").push(format!("Body is not valid JSON: {e}"));
                return None;
            }
        },
        Body::Text(text) if essence(media_type) == FORM_MEDIA_TYPE => {
            let fields = form_fields(text, schema, schemas);
            match fields {
                Ok(value) => value,
                Err(problems) => {
                    errors.attach("body", problems);
                    return None;
                }
            }
        }
        Body::Text(text) => Value::String(text.clone()),
    };
    if let Some(id) = schema {
        errors.attach("body", schemas.validate(id, &value));
    }
    Some(value)
}

/// Decode an urlencoded form body into an object, coercing each field by its
/// property schema.
fn form_fields(
    text: &str,
    schema: Option<SchemaId>,
    schemas: &SchemaArena,
) -> Result<Value, ErrorNode> {
    let spec = schema.map(|id| schemas.get(id));
    let mut errors = ErrorNode::new();
    let mut fields = Map::new();
    for (key, raw) in QueryString::parse(text).pairs() {
        let property = spec
            .and_then(|s| s.properties.get(key))
            .map(|id| schemas.get(*id));
        match coerce(property, raw) {
            Ok(value) => {
                fields.insert(key.clone(), value);
            }
            Err(message) => errors.nest(key.clone()).push(message),
        }
    }
    errors.into_result(Value::Object(fields))
}

/// Pick the declared media type for a request content type: exact match, then
/// `type/*`, then `*/*`.
fn select_media<'c>(
    content: &'c IndexMap<String, Option<SchemaId>>,
    content_type: &str,
) -> Option<(&'c str, Option<SchemaId>)> {
    let main_type = content_type.split('/').next().unwrap_or_default();
    let wildcard = format!("{main_type}/*");
    [content_type, wildcard.as_str(), "*/*"]
        .iter()
        .find_map(|wanted| {
            content
                .iter()
                .find(|(media, _)| essence(media) == *wanted)
        })
        .map(|(media, schema)| (media.as_str(), *schema))
}

fn essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn raw_value(body: &Body) -> Value {
    match body {
        Body::Text(text) => Value::String(text.clone()),
        Body::Json(value) => value.clone(),
    }
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn listed(label: &str, names: &[&str]) -> String {
    if names.len() == 1 {
        format!("{label}: {}", names[0])
    } else {
        format!("{label}s: {}", names.join(", "))
    }
}

fn report_missing(errors: &mut ErrorNode, missing: &Missing<'_>) {
    let mut locations: Vec<ParameterLocation> = Vec::new();
    for (location, _) in missing {
        if !locations.contains(location) {
            locations.push(*location);
        }
    }
    for location in locations {
        let names: Vec<&str> = missing
            .iter()
            .filter(|(l, _)| *l == location)
            .map(|(_, name)| *name)
            .collect();
        errors
            .nest(location.as_str())
            .push(listed("Missing required parameter", &names));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_selection_prefers_exact_then_wildcards() {
        let mut content = IndexMap::new();
        content.insert("*/*".to_string(), None);
        content.insert("text/*".to_string(), None);
        content.insert("application/json; charset=utf-8".to_string(), None);
        assert_eq!(
            select_media(&content, "application/json").map(|(m, _)| m),
            Some("application/json; charset=utf-8")
        );
        assert_eq!(select_media(&content, "text/plain").map(|(m, _)| m), Some("text/*"));
        assert_eq!(select_media(&content, "image/png").map(|(m, _)| m), Some("*/*"));

        content.shift_remove("*/*");
        assert!(select_media(&content, "image/png").is_none());
    }

    #[test]
    fn listed_switches_to_plural() {
        assert_eq!(listed("Unexpected parameter", &["a"]), "Unexpected parameter: a");
        assert_eq!(
            listed("Unexpected parameter", &["a", "b"]),
            "Unexpected parameters: a, b"
        );
    }
}
