use crate::report::ErrorNode;
use crate::spec::{ParameterLocation, PathItem};
use indexmap::IndexMap;
use regex::Regex;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Maximum number of path parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Captured path variables in template order. Names are shared with the
/// compiled entry; values are the raw (still percent-encoded) segments.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Result of matching a request path.
#[derive(Debug, Clone)]
pub struct PathMatch<'r> {
    pub params: ParamVec,
    pub item: &'r PathItem,
    /// The template that matched, usable as an identity key.
    pub template: &'r str,
}

impl PathMatch<'_> {
    /// Last capture named `name`.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
struct PathEntry {
    template: String,
    param_names: Vec<Arc<str>>,
    regex: Regex,
    item: Arc<PathItem>,
}

/// Path templates compiled into matchers, bucketed by segment count.
#[derive(Debug, Clone, Default)]
pub struct PathRouter {
    entries: Vec<PathEntry>,
    by_length: HashMap<usize, Vec<usize>>,
}

impl PathRouter {
    /// Compile every template. Problems are reported per template and per method;
    /// templates that fail to compile are left out of the router.
    #[must_use]
    pub fn compile(paths: &IndexMap<String, Arc<PathItem>>) -> (Self, ErrorNode) {
        let mut router = Self::default();
        let mut errors = ErrorNode::new();
        let mut equivalent: IndexMap<String, Vec<&str>> = IndexMap::new();

        for (template, item) in paths {
            if !template.starts_with('/') || template.starts_with("//") {
                errors
                    .nest(template.as_str())
                    .push("Path must begin with a single forward slash");
                continue;
            }

            let (regex, names) = match Self::path_to_regex(template) {
                Ok(compiled) => compiled,
                Err(err) => {
                    errors
                        .nest(template.as_str())
                        .push(format!("Path cannot be compiled: {err}"));
                    continue;
                }
            };
            check_path_parameters(template, &names, item, errors.nest(template.as_str()));

            equivalent
                .entry(equivalency_key(template))
                .or_default()
                .push(template.as_str());

            let index = router.entries.len();
            router
                .by_length
                .entry(segment_count(template))
                .or_default()
                .push(index);
            router.entries.push(PathEntry {
                template: template.clone(),
                param_names: names.into_iter().map(Arc::from).collect(),
                regex,
                item: Arc::clone(item),
            });
        }

        for group in equivalent.values().filter(|group| group.len() > 1) {
            errors.push(format!(
                "Equivalent paths are not allowed: {}",
                group.join(", ")
            ));
        }

        info!(
            entries = router.entries.len(),
            buckets = router.by_length.len(),
            "Path router compiled"
        );
        (router, errors)
    }

    /// Resolve a request path. The query string is ignored, leading slashes are
    /// collapsed and a trailing slash is dropped before matching.
    #[must_use]
    pub fn find_match(&self, path: &str) -> Option<PathMatch<'_>> {
        let path = normalize_request_path(path);
        let Some(bucket) = self.by_length.get(&segment_count(&path)) else {
            debug!(path = %path, "No path bucket for segment count");
            return None;
        };

        for index in bucket {
            let entry = &self.entries[*index];
            let Some(captures) = entry.regex.captures(&path) else {
                continue;
            };
            let params: ParamVec = entry
                .param_names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let value = captures.get(i + 1).map_or("", |m| m.as_str());
                    (Arc::clone(name), value.to_string())
                })
                .collect();
            debug!(path = %path, template = %entry.template, params = ?params, "Path matched");
            return Some(PathMatch {
                params,
                item: entry.item.as_ref(),
                template: &entry.template,
            });
        }

        debug!(path = %path, "No path matched");
        None
    }

    /// Compiled templates in declaration order.
    pub fn templates(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.template.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert a path template to an anchored regex and its ordered variable names.
    ///
    /// `/users/{id}` becomes `^/users/([^/]+)$`. A variable may share its segment
    /// with literal text (`/files/{name}.{ext}`); it then captures lazily.
    pub(crate) fn path_to_regex(template: &str) -> Result<(Regex, Vec<String>), regex::Error> {
        let trimmed = trim_trailing_slash(template);
        if trimmed == "/" {
            return Ok((Regex::new(r"^/$")?, Vec::new()));
        }

        let mut pattern = String::with_capacity(trimmed.len() + 8);
        pattern.push('^');
        let mut names = Vec::with_capacity(trimmed.matches('{').count());

        for segment in trimmed.split('/').skip(1) {
            pattern.push('/');
            let parts = split_segment(segment);
            let last = parts.len().saturating_sub(1);
            for (i, part) in parts.iter().enumerate() {
                match part {
                    Part::Literal(text) => pattern.push_str(&regex::escape(text)),
                    Part::Variable(name) => {
                        pattern.push_str(if i == last { "([^/]+)" } else { "([^/]+?)" });
                        names.push((*name).to_string());
                    }
                }
            }
        }

        pattern.push('$');
        Ok((Regex::new(&pattern)?, names))
    }
}

enum Part<'a> {
    Literal(&'a str),
    Variable(&'a str),
}

fn split_segment(segment: &str) -> Vec<Part<'_>> {
    let mut parts = Vec::new();
    let mut rest = segment;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|c| open + c) else {
            break;
        };
        if open > 0 {
            parts.push(Part::Literal(&rest[..open]));
        }
        parts.push(Part::Variable(&rest[open + 1..close]));
        rest = &rest[close + 1..];
    }
    if !rest.is_empty() {
        parts.push(Part::Literal(rest));
    }
    parts
}

/// Structural identity of a template: literal runs are length-prefixed and every
/// variable collapses to `{}`, so `/a/{x}/b` and `/a/{y}/b` share a key.
pub(crate) fn equivalency_key(template: &str) -> String {
    let trimmed = trim_trailing_slash(template);
    let mut key = String::with_capacity(trimmed.len());
    for segment in trimmed.split('/').skip(1) {
        key.push('/');
        for part in split_segment(segment) {
            match part {
                Part::Literal(text) => {
                    key.push_str(&text.len().to_string());
                    key.push(':');
                    key.push_str(text);
                }
                Part::Variable(_) => key.push_str("{}"),
            }
        }
    }
    key
}

fn check_path_parameters(
    template: &str,
    names: &[String],
    item: &PathItem,
    errors: &mut ErrorNode,
) {
    for (method, operation) in &item.operations {
        let declared: Vec<&str> = operation
            .parameters_in(ParameterLocation::Path)
            .map(|p| p.name.as_str())
            .collect();
        let missing_in_path: Vec<&str> = declared
            .iter()
            .copied()
            .filter(|d| !names.iter().any(|n| n == d))
            .collect();
        let mut missing_in_definition: Vec<&str> = Vec::new();
        for name in names {
            if !declared.contains(&name.as_str()) && !missing_in_definition.contains(&name.as_str())
            {
                missing_in_definition.push(name);
            }
        }
        if missing_in_path.is_empty() && missing_in_definition.is_empty() {
            continue;
        }
        let scope = errors.nest(method.as_str().to_ascii_lowercase());
        if !missing_in_path.is_empty() {
            scope.push(format!(
                "Path missing defined parameters: {}",
                missing_in_path.join(", ")
            ));
        }
        if !missing_in_definition.is_empty() {
            scope.push(format!(
                "Definition missing path parameters: {}",
                missing_in_definition.join(", ")
            ));
        }
        debug!(template, method = %method, "Path parameter mismatch");
    }
}

fn trim_trailing_slash(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

fn segment_count(path: &str) -> usize {
    let trimmed = trim_trailing_slash(path);
    if trimmed == "/" {
        0
    } else {
        trimmed.matches('/').count()
    }
}

fn normalize_request_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let body = path.trim_start_matches('/');
    let mut normalized = String::with_capacity(body.len() + 1);
    normalized.push('/');
    normalized.push_str(body);
    trim_trailing_slash(&normalized).to_string()
}
