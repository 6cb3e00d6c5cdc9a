//! Built-in validator catalogue for OpenAPI 2 (Swagger) and OpenAPI 3 documents.
//!
//! The catalogue is process-wide static data built once on first use. Version
//! specific fields are gated with [`Rule::Version`]; the Schema node is
//! self-referential.

use super::schema::SchemaArena;
use super::types::{CollectionFormat, ParameterLocation, ParameterStyle};
use crate::definition::{
    Additional, Context, DefRef, Rule, ValidatorId, ValidatorNode, ValidatorSet,
};
use crate::report::ErrorNode;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

/// Entry points into the built-in validator graph.
#[derive(Debug)]
pub struct Catalog {
    pub set: ValidatorSet,
    pub document: ValidatorId,
    pub info: ValidatorId,
    pub contact: ValidatorId,
    pub license: ValidatorId,
    pub external_docs: ValidatorId,
    pub server: ValidatorId,
    pub tag: ValidatorId,
    pub paths: ValidatorId,
    pub path_item: ValidatorId,
    pub operation: ValidatorId,
    pub parameter: ValidatorId,
    pub items: ValidatorId,
    pub request_body: ValidatorId,
    pub media_type: ValidatorId,
    pub response: ValidatorId,
    pub responses: ValidatorId,
    pub schema: ValidatorId,
    pub components: ValidatorId,
}

static CATALOG: Lazy<Catalog> = Lazy::new(Catalog::build);

/// The shared catalogue.
#[must_use]
pub fn catalog() -> &'static Catalog {
    &CATALOG
}

fn v2() -> Rule {
    Rule::Version(2)
}

fn v3() -> Rule {
    Rule::Version(3)
}

fn not_body() -> Rule {
    Rule::sibling_equals("in", "body").negate()
}

impl Catalog {
    fn build() -> Self {
        let mut set = ValidatorSet::new();

        let string = set.add(ValidatorNode::string());
        let required_string = set.add(ValidatorNode::string().required(Rule::Always));
        let boolean = set.add(ValidatorNode::boolean());
        let number = set.add(ValidatorNode::number());
        let non_negative = set.add(ValidatorNode::integer().errors(check_non_negative));
        let any = set.add(ValidatorNode::any());
        let free_map = set.add(ValidatorNode::object().additional(Additional::Any));
        let strings = set.add(ValidatorNode::array(string));
        let any_list = set.add(ValidatorNode::array(any));
        let pattern = set.add(ValidatorNode::string().errors(check_pattern));
        let v2_strings = set.add(ValidatorNode::array(string).allowed(v2()));
        let v2_any = set.add(ValidatorNode::any().allowed(v2()));
        let v3_any = set.add(ValidatorNode::any().allowed(v3()));
        let v3_string = set.add(ValidatorNode::string().allowed(v3()));
        let v3_boolean = set.add(ValidatorNode::boolean().allowed(v3()));
        let false_default = set.add(ValidatorNode::boolean().default_value(false));

        let external_docs = set.add(
            ValidatorNode::object()
                .property("description", string)
                .property("url", required_string),
        );
        let contact = set.add(
            ValidatorNode::object()
                .property("name", string)
                .property("url", string)
                .property("email", string),
        );
        let license = set.add(
            ValidatorNode::object()
                .property("name", required_string)
                .property("url", string),
        );
        let info = set.add(
            ValidatorNode::object()
                .required(Rule::Always)
                .property("title", required_string)
                .property("description", string)
                .property("termsOfService", string)
                .property("contact", contact)
                .property("license", license)
                .property("version", required_string),
        );
        let server = set.add(
            ValidatorNode::object()
                .property("url", required_string)
                .property("description", string)
                .property("variables", free_map),
        );
        let tag = set.add(
            ValidatorNode::object()
                .property("name", required_string)
                .property("description", string)
                .property("externalDocs", external_docs),
        );

        // Schema is recursive. Slots that need their own rules are clones of the
        // finished node, defined once it exists.
        let schema = set.reserve();
        let schema_items = set.reserve();
        let schema_additional = set.reserve();
        let schema_not = set.reserve();
        let schema_list = set.add(ValidatorNode::array(schema));
        let v3_schema_list = set.add(ValidatorNode::array(schema).allowed(v3()));
        let schema_map = set.add(ValidatorNode::map_of(schema));
        let schema_type = set.add(ValidatorNode::string().one_of([
            "array", "boolean", "integer", "number", "object", "string",
        ]));
        let schema_node = ValidatorNode::object()
            .property("type", schema_type)
            .property("format", string)
            .property("title", string)
            .property("description", string)
            .property("default", any)
            .property("enum", any_list)
            .property("multipleOf", number)
            .property("maximum", number)
            .property("exclusiveMaximum", boolean)
            .property("minimum", number)
            .property("exclusiveMinimum", boolean)
            .property("maxLength", non_negative)
            .property("minLength", non_negative)
            .property("pattern", pattern)
            .property("maxItems", non_negative)
            .property("minItems", non_negative)
            .property("uniqueItems", boolean)
            .property("maxProperties", non_negative)
            .property("minProperties", non_negative)
            .property("required", strings)
            .property("items", schema_items)
            .property("properties", schema_map)
            .property("additionalProperties", schema_additional)
            .property("allOf", schema_list)
            .property("anyOf", v3_schema_list)
            .property("oneOf", v3_schema_list)
            .property("not", schema_not)
            .property("nullable", v3_boolean)
            .property("discriminator", any)
            .property("readOnly", boolean)
            .property("writeOnly", v3_boolean)
            .property("xml", free_map)
            .property("externalDocs", external_docs)
            .property("example", any)
            .property("deprecated", v3_boolean)
            .errors(check_schema_node);
        set.define(
            schema_items,
            schema_node
                .clone()
                .required(Rule::sibling_equals("type", "array")),
        );
        set.define(schema_additional, schema_node.clone().or_boolean());
        set.define(schema_not, schema_node.clone().allowed(v3()));
        let parameter_schema = set.add(
            schema_node
                .clone()
                .allowed(Rule::Any(vec![v3(), Rule::sibling_equals("in", "body")]))
                .required(Rule::All(vec![v2(), Rule::sibling_equals("in", "body")])),
        );
        let response_schema = set.add(schema_node.clone().allowed(v2()));
        let definitions = set.add(ValidatorNode::map_of(schema).allowed(v2()));
        set.define(schema, schema_node);

        // Version 2 primitive keywords, shared by non-body parameters and items.
        let collection_format = set.add(
            ValidatorNode::string()
                .allowed(v2())
                .one_of(["csv", "ssv", "tsv", "pipes", "multi"])
                .default_with(default_collection_format),
        );
        let primitives = PrimitiveIds {
            string: set.add(ValidatorNode::string().allowed(v2())),
            number: set.add(ValidatorNode::number().allowed(v2())),
            boolean: set.add(ValidatorNode::boolean().allowed(v2())),
            non_negative: set.add(
                ValidatorNode::integer()
                    .allowed(v2())
                    .errors(check_non_negative),
            ),
            any: v2_any,
            any_list: set.add(ValidatorNode::array(any).allowed(v2())),
            pattern: set.add(ValidatorNode::string().allowed(v2()).errors(check_pattern)),
            collection_format,
        };

        let items = set.reserve();
        let nested_items = set.reserve();
        let items_type = set.add(
            ValidatorNode::string()
                .required(Rule::Always)
                .one_of(["array", "boolean", "integer", "number", "string"]),
        );
        let items_node = primitive_keywords(ValidatorNode::object(), &primitives)
            .property("type", items_type)
            .property("items", nested_items)
            .errors(check_items_node);
        set.define(
            nested_items,
            items_node
                .clone()
                .required(Rule::sibling_equals("type", "array")),
        );
        let parameter_items = set.add(
            items_node
                .clone()
                .allowed(Rule::All(vec![v2(), not_body()]))
                .required(Rule::All(vec![v2(), Rule::sibling_equals("type", "array")])),
        );
        set.define(items, items_node);

        let media_type = set.add(
            ValidatorNode::object()
                .property("schema", schema)
                .property("example", any)
                .property("examples", free_map)
                .property("encoding", free_map),
        );
        let required_content = set.add(ValidatorNode::map_of(media_type).required(Rule::Always));
        let v3_content = set.add(ValidatorNode::map_of(media_type).allowed(v3()));

        let location = set.add(
            ValidatorNode::string()
                .required(Rule::Always)
                .errors(check_location),
        );
        let allow_empty_value = set.add(
            ValidatorNode::boolean()
                .allowed(Rule::Any(vec![
                    Rule::sibling_equals("in", "query"),
                    Rule::sibling_equals("in", "formData"),
                ]))
                .default_value(false),
        );
        let style = set.add(
            ValidatorNode::string()
                .allowed(Rule::All(vec![v3(), Rule::SiblingPresent("in".into())]))
                .default_with(default_style),
        );
        let explode = set.add(
            ValidatorNode::boolean()
                .allowed(Rule::All(vec![v3(), Rule::SiblingPresent("in".into())]))
                .default_with(default_explode),
        );
        let parameter_type = set.add(
            ValidatorNode::string()
                .allowed(Rule::All(vec![v2(), not_body()]))
                .required(Rule::All(vec![v2(), not_body()]))
                .one_of(["array", "boolean", "file", "integer", "number", "string"]),
        );
        let parameter = set.add(
            primitive_keywords(ValidatorNode::object(), &primitives)
                .property("name", required_string)
                .property("in", location)
                .property("description", string)
                .property("required", false_default)
                .property("deprecated", v3_boolean)
                .property("allowEmptyValue", allow_empty_value)
                .property("style", style)
                .property("explode", explode)
                .property("allowReserved", v3_boolean)
                .property("schema", parameter_schema)
                .property("content", v3_content)
                .property("example", v3_any)
                .property("examples", v3_any)
                .property("type", parameter_type)
                .property("items", parameter_items)
                .errors(check_parameter),
        );
        let parameters = set.add(ValidatorNode::array(parameter));

        let header_map = set.add(ValidatorNode::map_of(free_map));
        let response = set.add(
            ValidatorNode::object()
                .property("description", required_string)
                .property("schema", response_schema)
                .property("headers", header_map)
                .property("examples", v2_any)
                .property("content", v3_content)
                .property("links", v3_any),
        );
        let responses = set.add(
            ValidatorNode::map_of(response)
                .required(Rule::Always)
                .errors(check_responses),
        );
        let request_body_node = ValidatorNode::object()
            .property("description", string)
            .property("content", required_content)
            .property("required", false_default);
        let v3_request_body = set.add(request_body_node.clone().allowed(v3()));
        let request_body = set.add(request_body_node);

        let servers = set.add(ValidatorNode::array(server).allowed(v3()));
        let v2_schemes = set.add(ValidatorNode::array(string).allowed(v2()));
        let operation_node = ValidatorNode::object()
            .property("tags", strings)
            .property("summary", string)
            .property("description", string)
            .property("externalDocs", external_docs)
            .property("operationId", string)
            .property("consumes", v2_strings)
            .property("produces", v2_strings)
            .property("parameters", parameters)
            .property("requestBody", v3_request_body)
            .property("responses", responses)
            .property("callbacks", v3_any)
            .property("deprecated", boolean)
            .property("security", any_list)
            .property("servers", servers)
            .property("schemes", v2_schemes);
        let trace = set.add(operation_node.clone().allowed(v3()));
        let operation = set.add(operation_node);

        let mut path_item_node = ValidatorNode::object()
            .property("summary", v3_string)
            .property("description", v3_string)
            .property("servers", servers)
            .property("parameters", parameters);
        for method in ["get", "put", "post", "delete", "options", "head", "patch"] {
            path_item_node = path_item_node.property(method, operation);
        }
        let path_item = set.add(path_item_node.property("trace", trace));
        let paths = set.add(ValidatorNode::map_of(path_item).required(Rule::Always));

        let response_map = set.add(ValidatorNode::map_of(response));
        let parameter_map = set.add(ValidatorNode::map_of(parameter));
        let request_body_map = set.add(ValidatorNode::map_of(request_body));
        let components_node = ValidatorNode::object()
            .property("schemas", schema_map)
            .property("responses", response_map)
            .property("parameters", parameter_map)
            .property("examples", free_map)
            .property("requestBodies", request_body_map)
            .property("headers", free_map)
            .property("securitySchemes", free_map)
            .property("links", free_map)
            .property("callbacks", free_map);
        let v3_components = set.add(components_node.clone().allowed(v3()));
        let components = set.add(components_node);

        let swagger = set.add(
            ValidatorNode::string()
                .allowed(v2())
                .required(v2())
                .one_of(["2.0"]),
        );
        let openapi = set.add(
            ValidatorNode::string()
                .allowed(v3())
                .required(v3())
                .errors(check_openapi_version),
        );
        let host = set.add(ValidatorNode::string().allowed(v2()));
        let base_path = set.add(
            ValidatorNode::string()
                .allowed(v2())
                .errors(check_base_path),
        );
        let scheme = set.add(ValidatorNode::string().one_of(["http", "https", "ws", "wss"]));
        let schemes = set.add(ValidatorNode::array(scheme).allowed(v2()));
        let v2_parameter_map = set.add(ValidatorNode::map_of(parameter).allowed(v2()));
        let v2_response_map = set.add(ValidatorNode::map_of(response).allowed(v2()));
        let security_definitions = set.add(
            ValidatorNode::object()
                .additional(Additional::Any)
                .allowed(v2()),
        );
        let tags = set.add(ValidatorNode::array(tag));

        let document = set.add(
            ValidatorNode::object()
                .property("swagger", swagger)
                .property("openapi", openapi)
                .property("info", info)
                .property("host", host)
                .property("basePath", base_path)
                .property("schemes", schemes)
                .property("consumes", v2_strings)
                .property("produces", v2_strings)
                .property("servers", servers)
                .property("paths", paths)
                .property("definitions", definitions)
                .property("parameters", v2_parameter_map)
                .property("responses", v2_response_map)
                .property("securityDefinitions", security_definitions)
                .property("components", v3_components)
                .property("security", any_list)
                .property("tags", tags)
                .property("externalDocs", external_docs),
        );

        Self {
            set,
            document,
            info,
            contact,
            license,
            external_docs,
            server,
            tag,
            paths,
            path_item,
            operation,
            parameter,
            items,
            request_body,
            media_type,
            response,
            responses,
            schema,
            components,
        }
    }
}

struct PrimitiveIds {
    string: ValidatorId,
    number: ValidatorId,
    boolean: ValidatorId,
    non_negative: ValidatorId,
    any: ValidatorId,
    any_list: ValidatorId,
    pattern: ValidatorId,
    collection_format: ValidatorId,
}

/// Version 2 primitive keywords shared by parameters and items.
fn primitive_keywords(node: ValidatorNode, ids: &PrimitiveIds) -> ValidatorNode {
    node.property("format", ids.string)
        .property("collectionFormat", ids.collection_format)
        .property("default", ids.any)
        .property("maximum", ids.number)
        .property("exclusiveMaximum", ids.boolean)
        .property("minimum", ids.number)
        .property("exclusiveMinimum", ids.boolean)
        .property("maxLength", ids.non_negative)
        .property("minLength", ids.non_negative)
        .property("pattern", ids.pattern)
        .property("maxItems", ids.non_negative)
        .property("minItems", ids.non_negative)
        .property("uniqueItems", ids.boolean)
        .property("enum", ids.any_list)
        .property("multipleOf", ids.number)
}

fn default_collection_format(ctx: &Context<'_>) -> Option<Value> {
    (ctx.major() == 2 && ctx.sibling_str("type") == Some("array")).then(|| json!("csv"))
}

fn default_style(ctx: &Context<'_>) -> Option<Value> {
    let location = ParameterLocation::parse(ctx.sibling_str("in")?)?;
    ParameterStyle::allowed_for(location)
        .first()
        .map(|style| json!(style.as_str()))
}

fn default_explode(ctx: &Context<'_>) -> Option<Value> {
    let style = ctx.sibling_str("style")?;
    Some(json!(style == "form"))
}

fn check_non_negative(_: &Context<'_>, value: DefRef<'_>, errors: &mut ErrorNode) {
    if value.as_f64().is_some_and(|n| n < 0.0) {
        errors.push("Value must be greater than or equal to 0");
    }
}

fn check_pattern(_: &Context<'_>, value: DefRef<'_>, errors: &mut ErrorNode) {
    if let Some(pattern) = value.as_str() {
        if let Err(err) = Regex::new(pattern) {
            errors.push(format!("Invalid regular expression: {err}"));
        }
    }
}

fn check_location(ctx: &Context<'_>, value: DefRef<'_>, errors: &mut ErrorNode) {
    let allowed = ParameterLocation::for_version(ctx.major());
    if let Some(location) = value.as_str() {
        if !allowed.contains(&location) {
            errors.push(format!("Value must be one of: {}", allowed.join(", ")));
        }
    }
}

fn check_openapi_version(_: &Context<'_>, value: DefRef<'_>, errors: &mut ErrorNode) {
    let raw = value.as_str().unwrap_or_default();
    let parts: Vec<&str> = raw.split('.').collect();
    let supported = parts.first() == Some(&"3")
        && (2..=3).contains(&parts.len())
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
    if !supported {
        errors.push(format!("Unsupported OpenAPI version: {raw}"));
    }
}

fn check_base_path(_: &Context<'_>, value: DefRef<'_>, errors: &mut ErrorNode) {
    if value.as_str().is_some_and(|p| !p.starts_with('/')) {
        errors.push("Value must start with a forward slash");
    }
}

fn check_responses(_: &Context<'_>, value: DefRef<'_>, errors: &mut ErrorNode) {
    for (code, _) in value.entries() {
        let valid = code == "default"
            || code.starts_with("x-")
            || (code.len() == 3
                && code.as_bytes()[0].is_ascii_digit()
                && (code[1..].bytes().all(|b| b.is_ascii_digit()) || &code[1..] == "XX"));
        if !valid {
            errors
                .nest(code)
                .push("Response code must be a three digit status code, a range like 2XX, or default");
        }
    }
}

fn check_bounds(value: DefRef<'_>, low: &str, high: &str, errors: &mut ErrorNode) {
    let low_value = value.property(low).and_then(|v| v.as_f64());
    let high_value = value.property(high).and_then(|v| v.as_f64());
    if let (Some(l), Some(h)) = (low_value, high_value) {
        if l > h {
            errors.push(format!("Property {low} must be less than or equal to {high}"));
        }
    }
}

fn check_schema_node(_: &Context<'_>, value: DefRef<'_>, errors: &mut ErrorNode) {
    check_bounds(value, "minimum", "maximum", errors);
    check_bounds(value, "minLength", "maxLength", errors);
    check_bounds(value, "minItems", "maxItems", errors);
    check_bounds(value, "minProperties", "maxProperties", errors);

    let flag = |key: &str| value.property(key).and_then(|v| v.as_bool()) == Some(true);
    if flag("readOnly") && flag("writeOnly") {
        errors.push("Cannot be both readOnly and writeOnly");
    }
    check_default(value, errors);
}

fn check_items_node(_: &Context<'_>, value: DefRef<'_>, errors: &mut ErrorNode) {
    check_bounds(value, "minimum", "maximum", errors);
    check_bounds(value, "minLength", "maxLength", errors);
    check_bounds(value, "minItems", "maxItems", errors);
    if value.property("collectionFormat").and_then(|c| c.as_str()) == Some("multi") {
        errors.push("Collection format multi is only allowed on query and formData parameters");
    }
}

/// `default` must satisfy the schema it sits in. Cyclic defaults have no JSON
/// form and are left unchecked.
fn check_default(value: DefRef<'_>, errors: &mut ErrorNode) {
    let Some(default) = value.property("default").and_then(|d| d.try_json()) else {
        return;
    };
    let mut arena = SchemaArena::new();
    let id = arena.compile(value.graph(), value.id());
    let problems = arena.validate(id, &default);
    errors.attach("default", problems);
}

fn check_parameter(ctx: &Context<'_>, value: DefRef<'_>, errors: &mut ErrorNode) {
    let Some(location) = value
        .property("in")
        .and_then(|l| l.as_str())
        .and_then(ParameterLocation::parse)
    else {
        return;
    };
    let name = value.property("name").and_then(|n| n.as_str()).unwrap_or_default();

    if location == ParameterLocation::Path
        && value.property("required").and_then(|r| r.as_bool()) != Some(true)
    {
        errors.push("Path parameters must be required");
    }

    if ctx.major() == 2 {
        check_v2_parameter(location, value, errors);
        return;
    }

    let has_schema = value.property("schema").is_some();
    let content = value.property("content");
    if has_schema == content.is_some() {
        errors.push("Must define either schema or content, but not both");
    }
    if let Some(content) = content {
        if content.entries().count() != 1 {
            errors.nest("content").push("Content must have exactly one media type");
        }
    }

    let Some(style) = value.property("style").and_then(|s| s.as_str()) else {
        return;
    };
    let Some(parsed) = ParameterStyle::parse(style) else {
        errors.nest("style").push(format!("Unknown style: {style}"));
        return;
    };
    if !ParameterStyle::allowed_for(location).contains(&parsed) {
        errors.nest("style").push(format!(
            "Style {style} is not allowed for {location} parameter {name}"
        ));
        return;
    }
    let schema_type = value
        .property("schema")
        .and_then(|s| s.property("type"))
        .and_then(|t| t.as_str());
    match (parsed, schema_type) {
        (ParameterStyle::DeepObject, Some(ty)) if ty != "object" => {
            errors
                .nest("style")
                .push("Style deepObject is only allowed for object schemas");
        }
        (ParameterStyle::SpaceDelimited | ParameterStyle::PipeDelimited, Some(ty))
            if ty != "array" && ty != "object" =>
        {
            errors.nest("style").push(format!(
                "Style {style} is only allowed for array and object schemas"
            ));
        }
        _ => {}
    }
}

fn check_v2_parameter(location: ParameterLocation, value: DefRef<'_>, errors: &mut ErrorNode) {
    let format = value
        .property("collectionFormat")
        .and_then(|c| c.as_str())
        .and_then(CollectionFormat::parse);
    if format == Some(CollectionFormat::Multi)
        && !matches!(
            location,
            ParameterLocation::Query | ParameterLocation::FormData
        )
    {
        errors.nest("collectionFormat").push(
            "Collection format multi is only allowed on query and formData parameters",
        );
    }
    if value.property("type").and_then(|t| t.as_str()) == Some("file")
        && location != ParameterLocation::FormData
    {
        errors
            .nest("type")
            .push("Type file is only allowed for formData parameters");
    }
    if location != ParameterLocation::Body {
        check_bounds(value, "minimum", "maximum", errors);
        check_bounds(value, "minLength", "maxLength", errors);
        check_bounds(value, "minItems", "maxItems", errors);
        check_default(value, errors);
    }
}
