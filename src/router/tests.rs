use super::core::{equivalency_key, PathRouter};
use crate::spec::{
    Operation, ParameterEncoding, ParameterLocation, ParameterSpec, ParameterStyle, PathItem,
};
use http::Method;
use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn path_param(name: &str) -> ParameterSpec {
    ParameterSpec {
        name: name.to_string(),
        location: ParameterLocation::Path,
        required: true,
        allow_empty_value: false,
        schema: None,
        encoding: ParameterEncoding::Style {
            style: ParameterStyle::Simple,
            explode: false,
        },
    }
}

fn item(template: &str, methods: &[(Method, &[&str])]) -> Arc<PathItem> {
    let operations = methods
        .iter()
        .map(|(method, params)| {
            let operation = Operation {
                method: method.clone(),
                template: template.to_string(),
                operation_id: None,
                summary: None,
                parameters: params.iter().map(|p| path_param(p)).collect(),
                request_body: None,
                responses: IndexMap::new(),
            };
            (method.clone(), operation)
        })
        .collect();
    Arc::new(PathItem {
        template: template.to_string(),
        operations,
    })
}

fn paths(entries: &[(&str, &[&str])]) -> IndexMap<String, Arc<PathItem>> {
    entries
        .iter()
        .map(|(template, params)| {
            (
                template.to_string(),
                item(template, &[(Method::GET, params)]),
            )
        })
        .collect()
}

#[test]
fn test_root_path() {
    let (re, params) = PathRouter::path_to_regex("/").unwrap();
    assert!(re.is_match("/"));
    assert!(params.is_empty());
}

#[test]
fn test_parameterized_path() {
    let (re, params) = PathRouter::path_to_regex("/items/{id}").unwrap();
    assert!(re.is_match("/items/123"));
    assert!(!re.is_match("/items/123/more"));
    assert_eq!(params, vec!["id"]);
}

#[test]
fn test_nested_path() {
    let (re, params) = PathRouter::path_to_regex("/a/{b}/c").unwrap();
    assert!(re.is_match("/a/1/c"));
    assert_eq!(params, vec!["b"]);
}

#[test]
fn literals_are_escaped_and_segments_can_mix() {
    let (re, params) = PathRouter::path_to_regex("/files/{name}.{ext}").unwrap();
    let caps = re.captures("/files/report.final.pdf").unwrap();
    assert_eq!(&caps[1], "report");
    assert_eq!(&caps[2], "final.pdf");
    assert_eq!(params, vec!["name", "ext"]);

    let (re, _) = PathRouter::path_to_regex("/v1.0/status").unwrap();
    assert!(!re.is_match("/v1x0/status"));
}

#[test]
fn equivalency_ignores_variable_names() {
    assert_eq!(equivalency_key("/a/{x}/b"), equivalency_key("/a/{y}/b"));
    assert_ne!(equivalency_key("/a/{x}"), equivalency_key("/b/{y}"));
    assert_ne!(equivalency_key("/ab"), equivalency_key("/a{x}"));
}

#[test]
fn equivalent_paths_are_rejected_together() {
    let (_, errors) = PathRouter::compile(&paths(&[
        ("/a/{x}/b", &["x"]),
        ("/other", &[]),
        ("/a/{y}/b", &["y"]),
    ]));
    assert_eq!(
        errors.to_string(),
        "Equivalent paths are not allowed: /a/{x}/b, /a/{y}/b"
    );

    let (_, errors) = PathRouter::compile(&paths(&[("/a/{x}", &["x"]), ("/b/{y}", &["y"])]));
    assert!(!errors.has_errors());
}

#[test]
fn templates_need_a_single_leading_slash() {
    let (router, errors) = PathRouter::compile(&paths(&[("pets", &[]), ("//pets", &[])]));
    assert_eq!(
        errors.to_string(),
        "pets: Path must begin with a single forward slash\n//pets: Path must begin with a single forward slash"
    );
    assert!(router.is_empty());
}

#[test]
fn path_parameters_are_cross_checked_per_method() {
    let mut map = IndexMap::new();
    map.insert(
        "/pets/{id}".to_string(),
        item(
            "/pets/{id}",
            &[(Method::GET, &["id"]), (Method::PUT, &["petId"])],
        ),
    );
    let (_, errors) = PathRouter::compile(&map);
    assert_eq!(
        errors.to_string(),
        "/pets/{id} > put: Path missing defined parameters: petId\n/pets/{id} > put: Definition missing path parameters: id"
    );
}

#[test]
fn find_match_extracts_params() {
    let (router, errors) = PathRouter::compile(&paths(&[
        ("/pets", &[]),
        ("/pets/{id}", &["id"]),
        ("/pets/{id}/toys/{toy}", &["id", "toy"]),
    ]));
    assert!(!errors.has_errors());

    let found = router.find_match("/pets/42").unwrap();
    assert_eq!(found.template, "/pets/{id}");
    assert_eq!(found.param("id"), Some("42"));
    assert_eq!(found.item.allowed_methods(), vec!["GET"]);

    let found = router.find_match("/pets/42/toys/ball").unwrap();
    assert_eq!(found.param("toy"), Some("ball"));

    assert_eq!(router.find_match("/pets").unwrap().template, "/pets");
    assert!(router.find_match("/dogs/1").is_none());
    assert!(router.find_match("/pets/1/2").is_none());
}

#[test]
fn request_paths_are_normalized() {
    let (router, _) = PathRouter::compile(&paths(&[("/", &[]), ("/pets/{id}", &["id"])]));
    assert_eq!(router.find_match("").unwrap().template, "/");
    assert_eq!(router.find_match("/?x=1").unwrap().template, "/");
    let found = router.find_match("//pets/7/?debug=true").unwrap();
    assert_eq!(found.param("id"), Some("7"));
}

#[test]
fn first_declared_template_wins_within_a_bucket() {
    let (router, errors) =
        PathRouter::compile(&paths(&[("/pets/mine", &[]), ("/pets/{id}", &["id"])]));
    assert!(!errors.has_errors());
    assert_eq!(router.find_match("/pets/mine").unwrap().template, "/pets/mine");
    assert_eq!(router.find_match("/pets/7").unwrap().template, "/pets/{id}");
}
