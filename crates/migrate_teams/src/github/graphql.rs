//! Cursor-paginated GraphQL query client with rate-limit guarding.
//!
//! Every query is preceded by a lightweight `rateLimit { remaining resetAt }`
//! check. When the quota is exhausted the client sleeps until the advertised
//! reset time and re-checks, so callers only ever observe added latency, never
//! a rate-limit failure.

use std::future::Future;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::client::{USER_AGENT, graphql_endpoint};
use super::error::GitHubError;
use crate::config::SourceConfig;

/// Quota check issued before every query.
const RATE_LIMIT_QUERY: &str = "query { rateLimit { remaining resetAt } }";

/// GraphQL response envelope.
#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphqlErrorEntry>>,
}

/// A single entry from a GraphQL `errors` array.
#[derive(Debug, Deserialize)]
struct GraphqlErrorEntry {
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// The remaining quota and reset time reported by the rate limit query.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitQuota {
    pub remaining: u32,
    #[serde(rename = "resetAt")]
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RateLimitData {
    #[serde(rename = "rateLimit")]
    rate_limit: RateLimitQuota,
}

/// Cursor state of a paginated connection.
///
/// Cursors are scoped to a single connection and never shared across entity
/// types; each fetcher drains its own connection to completion.
#[derive(Debug, Clone, Deserialize)]
pub struct PageInfo {
    #[serde(rename = "endCursor")]
    pub end_cursor: Option<String>,
    #[serde(rename = "hasNextPage")]
    pub has_next_page: bool,
}

/// Suspend until the rate limit quota allows another request.
///
/// `check` is invoked to read the current quota; when it reports zero
/// remaining, the task sleeps until the advertised reset time and checks
/// again. Returns once a check reports available quota, so the caller issues
/// exactly one query per successful guard pass.
pub(crate) async fn wait_for_quota<F, Fut>(mut check: F) -> Result<(), GitHubError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<RateLimitQuota, GitHubError>>,
{
    loop {
        let quota = check().await?;
        tracing::debug!(remaining = quota.remaining, "rate limit check");

        if quota.remaining > 0 {
            return Ok(());
        }

        let wait = (quota.reset_at - Utc::now()).to_std().unwrap_or_default();
        tracing::warn!(
            reset_at = %quota.reset_at,
            wait_secs = wait.as_secs(),
            "rate limit exhausted, sleeping until reset"
        );
        tokio::time::sleep(wait).await;
    }
}

/// Authenticated GraphQL client for the source organization.
pub struct QueryClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl QueryClient {
    /// Create a query client for the configured source.
    ///
    /// Fails with a configuration error when the enterprise hostname cannot
    /// be parsed.
    pub fn new(config: &SourceConfig) -> Result<Self, GitHubError> {
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: graphql_endpoint(config.hostname.as_deref())?,
            token: config.token.clone(),
        })
    }

    /// Execute a query after waiting out any quota exhaustion.
    pub async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, GitHubError> {
        wait_for_quota(|| self.rate_limit()).await?;
        self.execute(query, &variables).await
    }

    /// Read the current GraphQL rate limit quota.
    pub async fn rate_limit(&self) -> Result<RateLimitQuota, GitHubError> {
        let data: RateLimitData = self
            .execute(RATE_LIMIT_QUERY, &serde_json::Value::Null)
            .await?;
        Ok(data.rate_limit)
    }

    /// Issue a single GraphQL request without quota guarding.
    async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: &serde_json::Value,
    ) -> Result<T, GitHubError> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", USER_AGENT)
            .json(&body)
            .send()
            .await
            .map_err(|e| GitHubError::network(format!("GraphQL request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GitHubError::AuthRequired);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GitHubError::graphql(format!(
                "request failed with status {status}: {text}"
            )));
        }

        let envelope: GraphqlResponse<T> = response
            .json()
            .await
            .map_err(|e| GitHubError::internal(format!("failed to parse GraphQL response: {e}")))?;

        if let Some(errors) = envelope.errors
            && !errors.is_empty()
        {
            if errors
                .iter()
                .any(|e| e.kind.as_deref() == Some("RATE_LIMITED"))
            {
                return Err(GitHubError::RateLimited { reset_at: None });
            }
            let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
            return Err(GitHubError::graphql(messages.join(", ")));
        }

        envelope
            .data
            .ok_or_else(|| GitHubError::graphql("response missing data"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    fn quota(remaining: u32, reset_in: chrono::Duration) -> RateLimitQuota {
        RateLimitQuota {
            remaining,
            reset_at: Utc::now() + reset_in,
        }
    }

    #[tokio::test]
    async fn wait_for_quota_returns_immediately_with_remaining() {
        let checks = Arc::new(AtomicU32::new(0));
        let checks_capture = Arc::clone(&checks);

        wait_for_quota(move || {
            let checks_capture = Arc::clone(&checks_capture);
            async move {
                checks_capture.fetch_add(1, Ordering::SeqCst);
                Ok(quota(4999, chrono::Duration::minutes(30)))
            }
        })
        .await
        .unwrap();

        assert_eq!(checks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_quota_sleeps_until_reset_then_runs_query_once() {
        let checks = Arc::new(AtomicU32::new(0));
        let queries = Arc::new(AtomicU32::new(0));

        // First check reports an exhausted quota resetting in one minute;
        // the second reports quota available.
        let checks_capture = Arc::clone(&checks);
        let check = move || {
            let checks_capture = Arc::clone(&checks_capture);
            async move {
                let n = checks_capture.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Ok(quota(0, chrono::Duration::minutes(1)))
                } else {
                    Ok(quota(100, chrono::Duration::minutes(59)))
                }
            }
        };

        let started = tokio::time::Instant::now();
        wait_for_quota(check).await.unwrap();
        let queries_capture = Arc::clone(&queries);
        queries_capture.fetch_add(1, Ordering::SeqCst);

        // Paused time auto-advances through the sleep.
        assert!(started.elapsed() >= Duration::from_secs(59));
        assert_eq!(checks.load(Ordering::SeqCst), 2);
        assert_eq!(queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn wait_for_quota_propagates_check_errors() {
        let err = wait_for_quota(|| async { Err::<RateLimitQuota, _>(GitHubError::AuthRequired) })
            .await
            .unwrap_err();
        assert!(matches!(err, GitHubError::AuthRequired));
    }
}
