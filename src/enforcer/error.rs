use crate::report::ErrorNode;
use http::{Method, StatusCode};
use thiserror::Error;

/// The request could not be matched to an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("no path matches {path}")]
    NotFound { path: String },
    #[error("method {method} is not allowed; allowed: {}", allowed.join(", "))]
    MethodNotAllowed {
        method: Method,
        /// Upper-cased and sorted.
        allowed: Vec<String>,
    },
}

impl RoutingError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            RoutingError::NotFound { .. } => StatusCode::NOT_FOUND,
            RoutingError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Value for the `Allow` response header of a 405.
    #[must_use]
    pub fn allow_header(&self) -> Option<String> {
        match self {
            RoutingError::MethodNotAllowed { allowed, .. } => Some(allowed.join(", ")),
            RoutingError::NotFound { .. } => None,
        }
    }
}

/// Why a request was not enforced.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    #[error(transparent)]
    Routing(#[from] RoutingError),
    /// Parameter or body problems, keyed by location and name.
    #[error("request is invalid:\n{0}")]
    Invalid(ErrorNode),
    /// The request descriptor itself is unusable; a caller bug, not bad input.
    #[error("request precondition failed: {0}")]
    Precondition(String),
}

impl RequestError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::Routing(routing) => routing.status(),
            RequestError::Invalid(_) => StatusCode::BAD_REQUEST,
            RequestError::Precondition(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The error tree of an invalid request.
    #[must_use]
    pub fn errors(&self) -> Option<&ErrorNode> {
        match self {
            RequestError::Invalid(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Misconfigured enforcement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid enforcement options: {0}")]
    InvalidOptions(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_not_allowed_renders_allow_header() {
        let err = RoutingError::MethodNotAllowed {
            method: Method::POST,
            allowed: vec!["DELETE".to_string(), "GET".to_string()],
        };
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.allow_header().as_deref(), Some("DELETE, GET"));
        assert_eq!(
            err.to_string(),
            "method POST is not allowed; allowed: DELETE, GET"
        );
    }

    #[test]
    fn request_error_statuses() {
        let not_found = RequestError::from(RoutingError::NotFound {
            path: "/x".to_string(),
        });
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.to_string(), "no path matches /x");
        let invalid = RequestError::Invalid(ErrorNode::with_message("bad"));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.errors().map(ErrorNode::count), Some(1));
    }
}
