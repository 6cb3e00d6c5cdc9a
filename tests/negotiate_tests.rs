#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::fixtures::{petstore_v2, petstore_v3};
use oas_enforcer::negotiate::{best, rank};
use pretty_assertions::assert_eq;

#[test]
fn test_specific_entries_outrank_wildcards() {
    let candidates = ["text/plain", "application/json", "image/png"];
    assert_eq!(
        rank("*/*;q=0.5, application/*, text/plain;q=0.2", &candidates),
        vec!["text/plain", "application/json", "image/png"]
    );
    assert_eq!(rank("application/*", &candidates), vec!["application/json"]);
    assert_eq!(best("image/*, */*;q=0.1", &candidates), Some("image/png"));
}

#[test]
fn test_refused_and_unmatched_candidates_are_dropped() {
    let candidates = ["application/json", "application/xml"];
    assert_eq!(
        rank("application/*, application/xml;q=0", &candidates),
        vec!["application/json"]
    );
    assert!(rank("text/html", &candidates).is_empty());
    assert_eq!(rank("", &candidates), vec!["application/json", "application/xml"]);
}

#[test]
fn test_operation_response_negotiation() {
    let doc = petstore_v3();
    let list = doc.operation_by_id("listPets").unwrap();
    assert_eq!(
        list.response_media_types(200),
        vec!["application/json", "application/xml"]
    );
    assert_eq!(
        list.negotiate_response("application/xml, application/json;q=0.5", 200),
        Some("application/xml")
    );
    assert_eq!(list.negotiate_response("*/*", 200), Some("application/json"));

    // Undeclared statuses fall back to `default`.
    assert_eq!(
        list.negotiate_response("*/*", 500),
        Some("application/problem+json")
    );
    assert_eq!(list.negotiate_response("text/html", 200), None);

    let delete = doc.operation_by_id("deletePet").unwrap();
    assert_eq!(delete.negotiate_response("*/*", 204), None);
}

#[test]
fn test_v2_responses_use_produces() {
    let doc = petstore_v2();
    let list = doc.operation_by_id("listPets").unwrap();
    assert_eq!(list.negotiate_response("application/*", 200), Some("application/json"));
    assert_eq!(list.negotiate_response("text/*", 200), None);
}
