//! Client construction and enterprise endpoint rewriting.
//!
//! Hostnames arrive as user configuration and may or may not carry a scheme
//! or trailing slashes; the rewriting functions normalize them into the
//! GraphQL and REST API base URLs GitHub Enterprise Server expects. A
//! hostname that cannot be parsed is a fatal configuration error.

use octocrab::Octocrab;
use url::Url;

use super::error::GitHubError;
use crate::config::SourceConfig;

/// User agent sent with raw HTTP requests.
pub(crate) const USER_AGENT: &str = "migrate-teams";

/// The GraphQL endpoint for GitHub.com.
const DEFAULT_GRAPHQL_ENDPOINT: &str = "https://api.github.com/graphql";

/// Normalize a configured enterprise hostname into `https://<host>`.
///
/// Strips trailing slashes and forces an `https://` scheme, then validates
/// that the result parses as a URL with a host.
fn normalize_hostname(hostname: &str) -> Result<String, GitHubError> {
    let trimmed = hostname.trim().trim_end_matches('/');
    let bare = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    if bare.is_empty() {
        return Err(GitHubError::config(format!(
            "invalid hostname {hostname:?}: no host"
        )));
    }

    let normalized = format!("https://{bare}");
    let parsed = Url::parse(&normalized)
        .map_err(|e| GitHubError::config(format!("invalid hostname {hostname:?}: {e}")))?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(GitHubError::config(format!(
            "invalid hostname {hostname:?}: no host"
        )));
    }

    Ok(normalized)
}

/// Resolve the GraphQL endpoint for an optional enterprise hostname.
///
/// Returns the GitHub.com endpoint when no hostname is configured.
pub fn graphql_endpoint(hostname: Option<&str>) -> Result<String, GitHubError> {
    match hostname {
        None | Some("") => Ok(DEFAULT_GRAPHQL_ENDPOINT.to_string()),
        Some(hostname) => Ok(format!("{}/api/graphql", normalize_hostname(hostname)?)),
    }
}

/// Resolve the REST base URL for an optional enterprise hostname.
///
/// Returns `None` when no hostname is configured, in which case the client
/// keeps its default GitHub.com base.
pub fn rest_endpoint(hostname: Option<&str>) -> Result<Option<String>, GitHubError> {
    match hostname {
        None | Some("") => Ok(None),
        Some(hostname) => Ok(Some(format!("{}/api/v3/", normalize_hostname(hostname)?))),
    }
}

/// Create an authenticated REST client for the source organization.
///
/// Used by the repository-scoped collector to list the teams with access to
/// a repository; everything else on the source side goes through GraphQL.
pub fn source_rest_client(config: &SourceConfig) -> Result<Octocrab, GitHubError> {
    let builder = Octocrab::builder().personal_token(config.token.clone());
    let builder = match rest_endpoint(config.hostname.as_deref())? {
        Some(base) => builder
            .base_uri(base)
            .map_err(|e| GitHubError::config(format!("invalid API base URL: {e}")))?,
        None => builder,
    };
    builder
        .build()
        .map_err(|e| GitHubError::internal(format!("failed to build GitHub client: {e}")))
}
