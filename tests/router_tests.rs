#![allow(clippy::unwrap_used, clippy::expect_used)]

use http::Method;
use oas_enforcer::{Document, RoutingError};
use pretty_assertions::assert_eq;

fn example_spec() -> &'static str {
    r#"
openapi: 3.0.3
info:
  title: Verb Zoo
  version: "1.0.0"
paths:
  "/":
    get:
      operationId: root
      responses:
        "200": { description: OK }
  /zoo/animals:
    get:
      operationId: get_animals
      responses:
        "200": { description: OK }
    post:
      operationId: create_animal
      responses:
        "200": { description: OK }
  /zoo/animals/{id}:
    parameters:
      - { name: id, in: path, required: true, schema: { type: string } }
    get:
      operationId: get_animal
      responses:
        "200": { description: OK }
    put:
      operationId: update_animal
      responses:
        "200": { description: OK }
    patch:
      operationId: patch_animal
      responses:
        "200": { description: OK }
    delete:
      operationId: delete_animal
      responses:
        "200": { description: OK }
  /zoo/animals/{id}/toys/{toy_id}:
    parameters:
      - { name: id, in: path, required: true, schema: { type: string } }
      - { name: toy_id, in: path, required: true, schema: { type: string } }
    get:
      operationId: animal_toy
      responses:
        "200": { description: OK }
  /zoo/health:
    head:
      operationId: health_check
      responses:
        "200": { description: OK }
    options:
      operationId: supported_ops
      responses:
        "200": { description: OK }
    trace:
      operationId: trace_route
      responses:
        "200": { description: OK }
  /files/{name}.{ext}:
    parameters:
      - { name: name, in: path, required: true, schema: { type: string } }
      - { name: ext, in: path, required: true, schema: { type: string } }
    get:
      operationId: get_file
      responses:
        "200": { description: OK }
"#
}

fn document() -> Document {
    Document::from_yaml_str(example_spec()).unwrap()
}

fn assert_route(doc: &Document, method: Method, path: &str, operation_id: &str) {
    let route = doc.route(&method, path).unwrap();
    assert_eq!(
        route.operation.operation_id.as_deref(),
        Some(operation_id),
        "{method} {path}"
    );
}

#[test]
fn test_verb_zoo_routes() {
    let doc = document();
    assert_route(&doc, Method::GET, "/", "root");
    assert_route(&doc, Method::GET, "/zoo/animals", "get_animals");
    assert_route(&doc, Method::POST, "/zoo/animals", "create_animal");
    assert_route(&doc, Method::GET, "/zoo/animals/123", "get_animal");
    assert_route(&doc, Method::PUT, "/zoo/animals/123", "update_animal");
    assert_route(&doc, Method::PATCH, "/zoo/animals/123", "patch_animal");
    assert_route(&doc, Method::DELETE, "/zoo/animals/123", "delete_animal");
    assert_route(&doc, Method::GET, "/zoo/animals/1/toys/2", "animal_toy");
    assert_route(&doc, Method::HEAD, "/zoo/health", "health_check");
    assert_route(&doc, Method::OPTIONS, "/zoo/health", "supported_ops");
    assert_route(&doc, Method::TRACE, "/zoo/health", "trace_route");
}

#[test]
fn test_path_params_are_extracted() {
    let doc = document();
    let route = doc.route(&Method::GET, "/zoo/animals/7/toys/ball").unwrap();
    assert_eq!(route.template, "/zoo/animals/{id}/toys/{toy_id}");
    let params: Vec<(&str, &str)> = route
        .params
        .iter()
        .map(|(k, v)| (k.as_ref(), v.as_str()))
        .collect();
    assert_eq!(params, vec![("id", "7"), ("toy_id", "ball")]);

    let found = doc.find_match("/files/report.tar.gz").unwrap();
    assert_eq!(found.param("name"), Some("report"));
    assert_eq!(found.param("ext"), Some("tar.gz"));
}

#[test]
fn test_trailing_slash_and_query_are_ignored() {
    let doc = document();
    assert_route(&doc, Method::GET, "/zoo/animals/", "get_animals");
    assert_route(&doc, Method::GET, "/zoo/animals?limit=1", "get_animals");
}

#[test]
fn test_unknown_path_is_not_found() {
    let doc = document();
    let err = doc.route(&Method::GET, "/zoo/plants").unwrap_err();
    assert_eq!(
        err,
        RoutingError::NotFound {
            path: "/zoo/plants".to_string()
        }
    );
    assert_eq!(err.status().as_u16(), 404);
    assert!(doc.route(&Method::GET, "/zoo/animals/1/toys").is_err());
}

#[test]
fn test_wrong_method_lists_allowed_methods() {
    let doc = document();
    let err = doc.route(&Method::POST, "/zoo/animals/1").unwrap_err();
    assert_eq!(err.status().as_u16(), 405);
    assert_eq!(
        err.allow_header().as_deref(),
        Some("DELETE, GET, PATCH, PUT")
    );
}

#[test]
fn test_equivalent_templates_are_rejected() {
    let err = Document::from_yaml_str(
        r#"
openapi: 3.0.3
info: { title: t, version: "1" }
paths:
  /a/{x}/b:
    parameters: [{ name: x, in: path, required: true, schema: { type: string } }]
    get: { responses: { "200": { description: ok } } }
  /a/{y}/b:
    parameters: [{ name: y, in: path, required: true, schema: { type: string } }]
    get: { responses: { "200": { description: ok } } }
"#,
    )
    .unwrap_err();
    let errors = err
        .downcast_ref::<oas_enforcer::DefinitionError>()
        .unwrap()
        .errors()
        .to_string();
    assert_eq!(
        errors,
        "paths: Equivalent paths are not allowed: /a/{x}/b, /a/{y}/b"
    );
}

#[test]
fn test_template_parameters_must_be_declared() {
    let err = Document::from_yaml_str(
        r#"
openapi: 3.0.3
info: { title: t, version: "1" }
paths:
  /a/{x}:
    get:
      parameters: [{ name: y, in: path, required: true, schema: { type: string } }]
      responses: { "200": { description: ok } }
"#,
    )
    .unwrap_err();
    let errors = err
        .downcast_ref::<oas_enforcer::DefinitionError>()
        .unwrap()
        .errors()
        .to_string();
    assert!(
        errors.contains("paths > /a/{x} > get: Path missing defined parameters: y"),
        "{errors}"
    );
    assert!(
        errors.contains("paths > /a/{x} > get: Definition missing path parameters: x"),
        "{errors}"
    );
}
