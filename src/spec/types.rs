use super::schema::SchemaId;
use crate::negotiate;
use http::Method;
use indexmap::IndexMap;
use std::fmt;

/// Major specification version a document was written against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecVersion {
    pub major: u8,
    /// Version string as written (`"2.0"`, `"3.0.3"`, ...).
    pub raw: String,
}

impl SpecVersion {
    /// Swagger 2.0 document.
    #[must_use]
    pub fn is_v2(&self) -> bool {
        self.major == 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
    /// Version 2 only.
    Body,
    /// Version 2 only.
    FormData,
}

impl ParameterLocation {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "path" => ParameterLocation::Path,
            "query" => ParameterLocation::Query,
            "header" => ParameterLocation::Header,
            "cookie" => ParameterLocation::Cookie,
            "body" => ParameterLocation::Body,
            "formData" => ParameterLocation::FormData,
            _ => return None,
        })
    }

    /// Wire name, also the error-tree key for parameters in this location.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
            ParameterLocation::Body => "body",
            ParameterLocation::FormData => "formData",
        }
    }

    /// Locations valid for a specification major version.
    #[must_use]
    pub fn for_version(major: u8) -> &'static [&'static str] {
        if major == 2 {
            &["body", "formData", "header", "path", "query"]
        } else {
            &["cookie", "header", "path", "query"]
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Version 3 serialization style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterStyle {
    Matrix,
    Label,
    Form,
    Simple,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
}

impl ParameterStyle {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "matrix" => ParameterStyle::Matrix,
            "label" => ParameterStyle::Label,
            "form" => ParameterStyle::Form,
            "simple" => ParameterStyle::Simple,
            "spaceDelimited" => ParameterStyle::SpaceDelimited,
            "pipeDelimited" => ParameterStyle::PipeDelimited,
            "deepObject" => ParameterStyle::DeepObject,
            _ => return None,
        })
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ParameterStyle::Matrix => "matrix",
            ParameterStyle::Label => "label",
            ParameterStyle::Form => "form",
            ParameterStyle::Simple => "simple",
            ParameterStyle::SpaceDelimited => "spaceDelimited",
            ParameterStyle::PipeDelimited => "pipeDelimited",
            ParameterStyle::DeepObject => "deepObject",
        }
    }

    /// Styles a location accepts; the first one is its default.
    #[must_use]
    pub fn allowed_for(location: ParameterLocation) -> &'static [ParameterStyle] {
        match location {
            ParameterLocation::Path => &[
                ParameterStyle::Simple,
                ParameterStyle::Label,
                ParameterStyle::Matrix,
            ],
            ParameterLocation::Query => &[
                ParameterStyle::Form,
                ParameterStyle::SpaceDelimited,
                ParameterStyle::PipeDelimited,
                ParameterStyle::DeepObject,
            ],
            ParameterLocation::Header => &[ParameterStyle::Simple],
            ParameterLocation::Cookie => &[ParameterStyle::Form],
            ParameterLocation::Body | ParameterLocation::FormData => &[],
        }
    }
}

impl fmt::Display for ParameterStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Version 2 array serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionFormat {
    Csv,
    Ssv,
    Tsv,
    Pipes,
    /// One value per occurrence; only query and formData parameters.
    Multi,
}

impl CollectionFormat {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "csv" => CollectionFormat::Csv,
            "ssv" => CollectionFormat::Ssv,
            "tsv" => CollectionFormat::Tsv,
            "pipes" => CollectionFormat::Pipes,
            "multi" => CollectionFormat::Multi,
            _ => return None,
        })
    }

    /// Split delimiter; `multi` values arrive already separated.
    #[must_use]
    pub fn delimiter(self) -> Option<char> {
        match self {
            CollectionFormat::Csv => Some(','),
            CollectionFormat::Ssv => Some(' '),
            CollectionFormat::Tsv => Some('\t'),
            CollectionFormat::Pipes => Some('|'),
            CollectionFormat::Multi => None,
        }
    }
}

/// How a parameter's wire value is encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterEncoding {
    Style { style: ParameterStyle, explode: bool },
    Collection(CollectionFormat),
    /// Version 3 `content`: the value is a serialized document of this media type.
    Content { media_type: String },
    /// Version 2 body parameter.
    Body,
}

/// Normalized Parameter object.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub allow_empty_value: bool,
    /// `schema`, the single `content` media type's schema, or (version 2) a schema
    /// synthesized from the parameter's own type keywords.
    pub schema: Option<SchemaId>,
    pub encoding: ParameterEncoding,
}

impl ParameterSpec {
    /// Query/formData parameters gathered from every occurrence of their name.
    #[must_use]
    pub fn is_multi(&self) -> bool {
        matches!(
            self.encoding,
            ParameterEncoding::Collection(CollectionFormat::Multi)
                | ParameterEncoding::Style {
                    style: ParameterStyle::Form,
                    explode: true
                }
        )
    }
}

/// Request body declaration; version 2 `body` parameters are folded into this.
#[derive(Debug, Clone)]
pub struct RequestBodySpec {
    pub required: bool,
    /// Media type to schema, in declared order.
    pub content: IndexMap<String, Option<SchemaId>>,
}

/// Declared response; media type to schema (version 2 takes `produces`).
#[derive(Debug, Clone, Default)]
pub struct ResponseSpec {
    pub content: IndexMap<String, Option<SchemaId>>,
}

/// One operation of a path item, with path-level parameters merged in.
#[derive(Debug, Clone)]
pub struct Operation {
    pub method: Method,
    pub template: String,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub parameters: Vec<ParameterSpec>,
    pub request_body: Option<RequestBodySpec>,
    /// Keyed by status code string (`"200"`, `"4XX"`, `"default"`).
    pub responses: IndexMap<String, ResponseSpec>,
}

impl Operation {
    /// Parameters declared for `location`, in declared order.
    pub fn parameters_in(
        &self,
        location: ParameterLocation,
    ) -> impl Iterator<Item = &ParameterSpec> + '_ {
        self.parameters
            .iter()
            .filter(move |p| p.location == location)
    }

    /// The parameter named `name` in `location`.
    #[must_use]
    pub fn parameter(&self, location: ParameterLocation, name: &str) -> Option<&ParameterSpec> {
        self.parameters
            .iter()
            .find(|p| p.location == location && p.name == name)
    }

    /// The response declared for `status`: the exact code, then its class
    /// (`"4XX"`), then `"default"`.
    #[must_use]
    pub fn response(&self, status: u16) -> Option<&ResponseSpec> {
        let code = status.to_string();
        let class = format!("{}XX", status / 100);
        self.responses
            .get(&code)
            .or_else(|| {
                self.responses
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(&class))
                    .map(|(_, response)| response)
            })
            .or_else(|| self.responses.get("default"))
    }

    /// Media types the response for `status` may carry, in declared order.
    #[must_use]
    pub fn response_media_types(&self, status: u16) -> Vec<&str> {
        self.response(status)
            .map(|r| r.content.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Pick the response media type for `status` that `accept` prefers.
    #[must_use]
    pub fn negotiate_response(&self, accept: &str, status: u16) -> Option<&str> {
        let candidates = self.response_media_types(status);
        let position = *negotiate::rank_positions(accept, &candidates).first()?;
        Some(candidates[position])
    }
}

/// A path template and its operations.
#[derive(Debug, Clone)]
pub struct PathItem {
    pub template: String,
    pub operations: IndexMap<Method, Operation>,
}

impl PathItem {
    /// Operation bound to `method`.
    #[must_use]
    pub fn operation(&self, method: &Method) -> Option<&Operation> {
        self.operations.get(method)
    }

    /// Declared methods, upper-cased and sorted.
    #[must_use]
    pub fn allowed_methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self
            .operations
            .keys()
            .map(|m| m.as_str().to_ascii_uppercase())
            .collect();
        methods.sort();
        methods
    }
}

/// Methods a path item may declare, by definition key.
pub const METHODS: [(&str, Method); 8] = [
    ("get", Method::GET),
    ("put", Method::PUT),
    ("post", Method::POST),
    ("delete", Method::DELETE),
    ("options", Method::OPTIONS),
    ("head", Method::HEAD),
    ("patch", Method::PATCH),
    ("trace", Method::TRACE),
];
