//! # Parameter Codec
//!
//! Turns wire-format parameter strings into typed JSON values.
//!
//! - Version 3 parameters follow their `style`/`explode` pair (see
//!   [`ParameterStyle`](crate::spec::ParameterStyle)).
//! - Version 2 parameters split on their `collectionFormat`.
//! - Every leaf token is then coerced to its schema's primitive type.
//!
//! Decoding never validates constraints such as `minimum` or `enum`; the
//! enforcer validates the decoded value against the schema afterwards.
//!
//! ```
//! use oas_enforcer::codec::decode_value;
//! use oas_enforcer::Document;
//! use serde_json::json;
//!
//! let doc = Document::from_value(&json!({
//!     "openapi": "3.0.0",
//!     "info": {"title": "t", "version": "1"},
//!     "paths": {"/items/{ids}": {"get": {
//!         "parameters": [{
//!             "name": "ids", "in": "path", "required": true,
//!             "schema": {"type": "array", "items": {"type": "integer"}}
//!         }],
//!         "responses": {"200": {"description": "ok"}}
//!     }}}
//! }))
//! .unwrap();
//! let op = doc.operation(&http::Method::GET, "/items/{ids}").unwrap();
//!
//! let value = decode_value(&op.parameters[0], doc.schemas(), "1,2,3").unwrap();
//! assert_eq!(value, json!([1, 2, 3]));
//! ```

mod collection;
mod primitive;
mod query;
mod style;

pub use primitive::coerce;
pub use query::QueryString;

use crate::report::ErrorNode;
use crate::spec::{
    CollectionFormat, ParameterEncoding, ParameterLocation, ParameterSpec, ParameterStyle,
    SchemaArena, SchemaSpec, SchemaType,
};
use serde_json::Value;
use style::Leaves;

pub(crate) const NOT_FORMATTED: &str = "The value is not formatted properly";

/// Structural shape a parameter decodes to.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Shape<'a> {
    Primitive,
    Array(&'a SchemaSpec),
    Object(&'a SchemaSpec),
}

impl<'a> Shape<'a> {
    pub(crate) fn of(spec: Option<&'a SchemaSpec>) -> Self {
        match spec {
            Some(s) if s.schema_type == Some(SchemaType::Array) => Shape::Array(s),
            Some(s) if s.schema_type == Some(SchemaType::Object) => Shape::Object(s),
            _ => Shape::Primitive,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Shape::Primitive => "primitive",
            Shape::Array(_) => "array",
            Shape::Object(_) => "object",
        }
    }
}

/// A query (or form body) parameter decoded from the pairs that belong to it.
#[derive(Debug, Clone)]
pub struct QueryDecode {
    pub value: Result<Value, ErrorNode>,
    /// Query keys this parameter accounted for.
    pub consumed: Vec<String>,
}

/// Decode a single wire string for `param`.
///
/// Path values are percent-decoded token by token; other locations arrive
/// already decoded (query pairs) or verbatim (headers, cookies).
pub fn decode_value(
    param: &ParameterSpec,
    schemas: &SchemaArena,
    raw: &str,
) -> Result<Value, ErrorNode> {
    let in_path = param.location == ParameterLocation::Path;
    match &param.encoding {
        ParameterEncoding::Style { style, explode } => {
            let leaves = Leaves {
                schemas,
                percent_decode: in_path,
            };
            style::decode_styled(&leaves, *style, *explode, &param.name, raw, param.schema)
        }
        ParameterEncoding::Collection(format) => {
            let text = if in_path { percent_decode(raw)? } else { raw.to_string() };
            collection::decode_collection(schemas, param.schema, *format, &text)
        }
        ParameterEncoding::Content { media_type } => {
            let text = if in_path { percent_decode(raw)? } else { raw.to_string() };
            if is_json_media_type(media_type) {
                serde_json::from_str(&text).map_err(|_| ErrorNode::with_message(NOT_FORMATTED))
            } else {
                Ok(Value::String(text))
            }
        }
        ParameterEncoding::Body => Ok(Value::String(raw.to_string())),
    }
}

/// Decode a query or form parameter from every pair that belongs to it.
///
/// `claimed` lists the names of the operation's other parameters in the same
/// location; an exploded `form` object without declared properties takes every
/// key not in it. Returns `None` when the parameter is absent.
#[must_use]
pub fn decode_query(
    param: &ParameterSpec,
    schemas: &SchemaArena,
    query: &QueryString,
    claimed: &[&str],
) -> Option<QueryDecode> {
    let leaves = Leaves {
        schemas,
        percent_decode: false,
    };
    let spec = param.schema.map(|id| schemas.get(id));
    let decoded = match (&param.encoding, Shape::of(spec)) {
        (
            ParameterEncoding::Style {
                style: ParameterStyle::DeepObject,
                ..
            },
            _,
        ) => style::decode_deep_object(&leaves, &param.name, param.schema, query)?,
        (
            ParameterEncoding::Style {
                style: ParameterStyle::Form,
                explode: true,
            },
            Shape::Object(spec),
        ) => style::decode_exploded_object(&leaves, spec, query, claimed)?,
        (
            ParameterEncoding::Style {
                style:
                    ParameterStyle::Form | ParameterStyle::SpaceDelimited | ParameterStyle::PipeDelimited,
                explode: true,
            },
            Shape::Array(spec),
        ) => {
            let values = query.get_all(&param.name);
            if values.is_empty() {
                return None;
            }
            (
                style::decode_exploded_array(&leaves, spec, &values),
                vec![param.name.clone()],
            )
        }
        (ParameterEncoding::Collection(CollectionFormat::Multi), _) => {
            let values = query.get_all(&param.name);
            if values.is_empty() {
                return None;
            }
            (
                collection::decode_multi(schemas, param.schema, &values),
                vec![param.name.clone()],
            )
        }
        _ => {
            let raw = query.get(&param.name)?;
            (
                decode_value(param, schemas, raw),
                vec![param.name.clone()],
            )
        }
    };
    let (value, consumed) = decoded;
    Some(QueryDecode { value, consumed })
}

/// `application/json` and any `+json` structured syntax suffix.
#[must_use]
pub fn is_json_media_type(media_type: &str) -> bool {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

fn percent_decode(raw: &str) -> Result<String, ErrorNode> {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .map_err(|_| ErrorNode::with_message(NOT_FORMATTED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::SchemaId;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Fixture {
        schemas: SchemaArena,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                schemas: SchemaArena::new(),
            }
        }

        fn typed(&mut self, ty: SchemaType) -> SchemaId {
            self.schemas.add(SchemaSpec {
                schema_type: Some(ty),
                ..SchemaSpec::default()
            })
        }

        fn array_of(&mut self, ty: SchemaType) -> SchemaId {
            let items = self.typed(ty);
            self.schemas.add(SchemaSpec {
                schema_type: Some(SchemaType::Array),
                items: Some(items),
                ..SchemaSpec::default()
            })
        }

        fn object(&mut self, props: &[(&str, SchemaType)]) -> SchemaId {
            let mut spec = SchemaSpec {
                schema_type: Some(SchemaType::Object),
                ..SchemaSpec::default()
            };
            for (name, ty) in props {
                let id = self.typed(*ty);
                spec.properties.insert((*name).to_string(), id);
            }
            self.schemas.add(spec)
        }
    }

    fn param(
        name: &str,
        location: ParameterLocation,
        schema: SchemaId,
        encoding: ParameterEncoding,
    ) -> ParameterSpec {
        ParameterSpec {
            name: name.to_string(),
            location,
            required: false,
            allow_empty_value: false,
            schema: Some(schema),
            encoding,
        }
    }

    fn styled(style: ParameterStyle, explode: bool) -> ParameterEncoding {
        ParameterEncoding::Style { style, explode }
    }

    #[test]
    fn simple_arrays_and_objects() {
        let mut f = Fixture::new();
        let list = f.array_of(SchemaType::String);
        let p = param("ids", ParameterLocation::Path, list, styled(ParameterStyle::Simple, false));
        assert_eq!(decode_value(&p, &f.schemas, "a,b,c").unwrap(), json!(["a", "b", "c"]));

        let obj = f.object(&[("role", SchemaType::String), ("age", SchemaType::Integer)]);
        let p = param("o", ParameterLocation::Header, obj, styled(ParameterStyle::Simple, false));
        assert_eq!(
            decode_value(&p, &f.schemas, "role,admin,age,3").unwrap(),
            json!({"role": "admin", "age": 3})
        );
        assert_eq!(
            decode_value(&p, &f.schemas, "role,admin,age").unwrap_err().to_string(),
            NOT_FORMATTED
        );

        let p = param("o", ParameterLocation::Header, obj, styled(ParameterStyle::Simple, true));
        assert_eq!(
            decode_value(&p, &f.schemas, "role=admin,age=3").unwrap(),
            json!({"role": "admin", "age": 3})
        );
    }

    #[test]
    fn label_and_matrix() {
        let mut f = Fixture::new();
        let list = f.array_of(SchemaType::Integer);
        let p = param("id", ParameterLocation::Path, list, styled(ParameterStyle::Label, false));
        assert_eq!(decode_value(&p, &f.schemas, ".3,4,5").unwrap(), json!([3, 4, 5]));
        let p = param("id", ParameterLocation::Path, list, styled(ParameterStyle::Label, true));
        assert_eq!(decode_value(&p, &f.schemas, ".3.4.5").unwrap(), json!([3, 4, 5]));
        assert_eq!(
            decode_value(&p, &f.schemas, "3.4").unwrap_err().to_string(),
            NOT_FORMATTED
        );

        let p = param("id", ParameterLocation::Path, list, styled(ParameterStyle::Matrix, true));
        assert_eq!(decode_value(&p, &f.schemas, ";id=3;id=4").unwrap(), json!([3, 4]));
        let p = param("id", ParameterLocation::Path, list, styled(ParameterStyle::Matrix, false));
        assert_eq!(decode_value(&p, &f.schemas, ";id=3,4").unwrap(), json!([3, 4]));

        let num = f.typed(SchemaType::Number);
        let p = param("x", ParameterLocation::Path, num, styled(ParameterStyle::Matrix, false));
        assert_eq!(decode_value(&p, &f.schemas, ";x=1.5").unwrap(), json!(1.5));

        let obj = f.object(&[("a", SchemaType::String)]);
        let p = param("o", ParameterLocation::Path, obj, styled(ParameterStyle::Matrix, false));
        assert_eq!(
            decode_value(&p, &f.schemas, ";o=a,1").unwrap_err().to_string(),
            "Style matrix is not supported for object values"
        );
    }

    #[test]
    fn path_tokens_are_percent_decoded_after_splitting() {
        let mut f = Fixture::new();
        let list = f.array_of(SchemaType::String);
        let p = param("ids", ParameterLocation::Path, list, styled(ParameterStyle::Simple, false));
        assert_eq!(
            decode_value(&p, &f.schemas, "a%2Cb,c%20d").unwrap(),
            json!(["a,b", "c d"])
        );
    }

    #[test]
    fn coercion_errors_are_addressed_by_index() {
        let mut f = Fixture::new();
        let list = f.array_of(SchemaType::Integer);
        let p = param("ids", ParameterLocation::Header, list, styled(ParameterStyle::Simple, false));
        assert_eq!(
            decode_value(&p, &f.schemas, "1,x,3").unwrap_err().to_string(),
            "1: Expected an integer. Received: \"x\""
        );
    }

    #[test]
    fn form_query_parameters() {
        let mut f = Fixture::new();
        let list = f.array_of(SchemaType::String);
        let q = QueryString::parse("color=blue&color=black&color=brown");
        let p = param("color", ParameterLocation::Query, list, styled(ParameterStyle::Form, true));
        let decoded = decode_query(&p, &f.schemas, &q, &[]).unwrap();
        assert_eq!(decoded.value.unwrap(), json!(["blue", "black", "brown"]));
        assert_eq!(decoded.consumed, vec!["color".to_string()]);

        let q = QueryString::parse("color=blue,black,brown");
        let p = param("color", ParameterLocation::Query, list, styled(ParameterStyle::Form, false));
        let decoded = decode_query(&p, &f.schemas, &q, &[]).unwrap();
        assert_eq!(decoded.value.unwrap(), json!(["blue", "black", "brown"]));

        assert!(decode_query(&p, &f.schemas, &QueryString::parse("other=1"), &[]).is_none());
    }

    #[test]
    fn exploded_form_objects_take_their_properties() {
        let mut f = Fixture::new();
        let obj = f.object(&[("R", SchemaType::Integer), ("G", SchemaType::Integer)]);
        let p = param("color", ParameterLocation::Query, obj, styled(ParameterStyle::Form, true));
        let q = QueryString::parse("R=100&G=200&limit=5");
        let decoded = decode_query(&p, &f.schemas, &q, &["limit"]).unwrap();
        assert_eq!(decoded.value.unwrap(), json!({"R": 100, "G": 200}));
        assert_eq!(decoded.consumed, vec!["R".to_string(), "G".to_string()]);
    }

    #[test]
    fn deep_object_and_delimited_styles() {
        let mut f = Fixture::new();
        let obj = f.object(&[("min", SchemaType::Integer), ("max", SchemaType::Integer)]);
        let p = param("range", ParameterLocation::Query, obj, styled(ParameterStyle::DeepObject, true));
        let q = QueryString::parse("range[min]=1&range[max]=9&x=1");
        let decoded = decode_query(&p, &f.schemas, &q, &[]).unwrap();
        assert_eq!(decoded.value.unwrap(), json!({"min": 1, "max": 9}));
        assert_eq!(
            decoded.consumed,
            vec!["range[min]".to_string(), "range[max]".to_string()]
        );

        let list = f.array_of(SchemaType::Integer);
        let p = param("n", ParameterLocation::Query, list, styled(ParameterStyle::SpaceDelimited, false));
        let q = QueryString::parse("n=1%202%203");
        assert_eq!(decode_query(&p, &f.schemas, &q, &[]).unwrap().value.unwrap(), json!([1, 2, 3]));
        let p = param("n", ParameterLocation::Query, list, styled(ParameterStyle::PipeDelimited, false));
        let q = QueryString::parse("n=1|2");
        assert_eq!(decode_query(&p, &f.schemas, &q, &[]).unwrap().value.unwrap(), json!([1, 2]));

        let p = param("o", ParameterLocation::Query, obj, styled(ParameterStyle::PipeDelimited, false));
        let q = QueryString::parse("o=min|1");
        assert_eq!(
            decode_query(&p, &f.schemas, &q, &[]).unwrap().value.unwrap_err().to_string(),
            "Style pipeDelimited is not supported for object values"
        );
    }

    #[test]
    fn collection_formats() {
        let mut f = Fixture::new();
        let list = f.array_of(SchemaType::Integer);
        for (format, raw) in [
            (CollectionFormat::Csv, "1,2,3"),
            (CollectionFormat::Ssv, "1 2 3"),
            (CollectionFormat::Tsv, "1\t2\t3"),
            (CollectionFormat::Pipes, "1|2|3"),
        ] {
            let p = param("n", ParameterLocation::Query, list, ParameterEncoding::Collection(format));
            assert_eq!(decode_value(&p, &f.schemas, raw).unwrap(), json!([1, 2, 3]));
        }

        let p = param(
            "n",
            ParameterLocation::Query,
            list,
            ParameterEncoding::Collection(CollectionFormat::Multi),
        );
        let q = QueryString::parse("n=1&n=2");
        assert_eq!(decode_query(&p, &f.schemas, &q, &[]).unwrap().value.unwrap(), json!([1, 2]));
    }

    #[test]
    fn nested_collection_formats_recurse() {
        let mut f = Fixture::new();
        let inner_items = f.typed(SchemaType::Integer);
        let inner = f.schemas.add(SchemaSpec {
            schema_type: Some(SchemaType::Array),
            items: Some(inner_items),
            collection_format: Some(CollectionFormat::Csv),
            ..SchemaSpec::default()
        });
        let outer = f.schemas.add(SchemaSpec {
            schema_type: Some(SchemaType::Array),
            items: Some(inner),
            ..SchemaSpec::default()
        });
        let p = param(
            "grid",
            ParameterLocation::Query,
            outer,
            ParameterEncoding::Collection(CollectionFormat::Pipes),
        );
        assert_eq!(
            decode_value(&p, &f.schemas, "1,2|3,4").unwrap(),
            json!([[1, 2], [3, 4]])
        );
    }

    #[test]
    fn json_content_parameters() {
        let mut f = Fixture::new();
        let obj = f.object(&[]);
        let p = param(
            "filter",
            ParameterLocation::Query,
            obj,
            ParameterEncoding::Content {
                media_type: "application/json".to_string(),
            },
        );
        assert_eq!(decode_value(&p, &f.schemas, r#"{"a":1}"#).unwrap(), json!({"a": 1}));
        assert!(decode_value(&p, &f.schemas, "{").is_err());
        assert!(is_json_media_type("application/problem+json; charset=utf-8"));
        assert!(!is_json_media_type("text/plain"));
    }
}
