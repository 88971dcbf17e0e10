//! GitHub API error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur when interacting with the GitHub API.
///
/// The variants form the boundary between recoverable and fatal conditions:
/// `RateLimited` is waited out or retried, `AlreadyExists` drives the
/// skip-or-continue policy during reconciliation, `NotFound` and
/// `ValidationFailed` are per-record recoverable during attach operations,
/// and everything else propagates to the caller.
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("rate limit exceeded")]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    #[error("team name already exists in the target organization")]
    AlreadyExists,

    #[error("not found: {resource}")]
    NotFound { resource: String },

    #[error("validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("authentication required")]
    AuthRequired,

    #[error("GraphQL error: {message}")]
    Graphql { message: String },

    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    #[error("network error: {message}")]
    Network { message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl GitHubError {
    /// Create a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a not found error.
    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a validation error.
    #[inline]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }

    /// Create a GraphQL error.
    #[inline]
    pub fn graphql(message: impl Into<String>) -> Self {
        Self::Graphql {
            message: message.into(),
        }
    }

    /// Create a network error.
    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create an internal error.
    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is a rate limit error (retryable).
    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// The message GitHub returns when a team with the same name already exists.
///
/// GitHub reports this condition only through the 422 error text, so the
/// check is necessarily a substring match. It is confined to this module: if
/// the upstream wording ever changes, only `classify_response` needs updating.
const NAME_EXISTS_MARKER: &str = "Name must be unique for this org";

/// Classify an octocrab error into a structured [`GitHubError`] kind.
///
/// Errors that carry a GitHub response are mapped by status code and message;
/// everything else is passed through as [`GitHubError::Api`].
pub fn classify_github_error(e: octocrab::Error) -> GitHubError {
    if let octocrab::Error::GitHub { source, .. } = &e {
        let errors_text = source
            .errors
            .as_ref()
            .and_then(|errors| serde_json::to_string(errors).ok())
            .unwrap_or_default();
        if let Some(classified) =
            classify_response(source.status_code.as_u16(), &source.message, &errors_text)
        {
            return classified;
        }
    }
    GitHubError::Api(e)
}

/// Map a GitHub response (status + message + serialized errors array) to a
/// structured error kind. Returns `None` when the response doesn't match any
/// recognized condition.
fn classify_response(status: u16, message: &str, errors_text: &str) -> Option<GitHubError> {
    if message.contains(NAME_EXISTS_MARKER) || errors_text.contains(NAME_EXISTS_MARKER) {
        return Some(GitHubError::AlreadyExists);
    }

    match status {
        404 => Some(GitHubError::not_found(message.to_string())),
        422 => Some(GitHubError::validation(message.to_string())),
        401 => Some(GitHubError::AuthRequired),
        403 | 429 => Some(GitHubError::RateLimited { reset_at: None }),
        _ => None,
    }
}
