//! Target-side write API.
//!
//! [`TargetClient`] is the seam the reconciliation engine drives; the
//! [`GitHubTarget`] implementation talks to the target organization's REST
//! API. Rate-limited writes are retried with exponential backoff.

use async_trait::async_trait;
use jsonwebtoken::EncodingKey;
use octocrab::Octocrab;
use octocrab::models::{AppId, InstallationId};

use super::client::rest_endpoint;
use super::error::{GitHubError, classify_github_error};
use crate::config::{Credentials, TargetConfig};
use crate::retry::with_retry;
use crate::team::{RepoPermission, TeamPrivacy, TeamRole};

/// Payload for creating a team in the target organization.
#[derive(Debug, Clone)]
pub struct NewTeam {
    pub name: String,
    pub description: String,
    pub privacy: TeamPrivacy,
    /// Target-side numeric id of the parent team, when one was resolved.
    pub parent_team_id: Option<u64>,
}

/// Reference to a team created in the target organization.
#[derive(Debug, Clone)]
pub struct CreatedTeam {
    pub id: u64,
    pub slug: String,
}

/// Write operations against the target organization.
///
/// All mutating calls are idempotent from the caller's perspective: adding a
/// repository or member that is already attached succeeds.
#[async_trait]
pub trait TargetClient: Send + Sync {
    /// Create a team. Reports a duplicate name as
    /// [`GitHubError::AlreadyExists`].
    async fn create_team(&self, team: &NewTeam) -> Result<CreatedTeam, GitHubError>;

    /// Look up a team's numeric id by slug.
    async fn team_id_by_slug(&self, slug: &str) -> Result<u64, GitHubError>;

    /// Grant a repository to a team with the given permission.
    async fn add_repository(
        &self,
        team_slug: &str,
        repository: &str,
        permission: RepoPermission,
    ) -> Result<(), GitHubError>;

    /// Add (or update) a member's team membership with the given role.
    async fn add_member(
        &self,
        team_slug: &str,
        login: &str,
        role: TeamRole,
    ) -> Result<(), GitHubError>;

    /// Remove a member from a team.
    async fn remove_member(&self, team_slug: &str, login: &str) -> Result<(), GitHubError>;

    /// The login the target credentials act as, or `None` when the identity
    /// cannot be determined (e.g. an installation token without user scope).
    async fn authenticated_login(&self) -> Result<Option<String>, GitHubError>;
}

/// REST client for the target organization.
pub struct GitHubTarget {
    inner: Octocrab,
    organization: String,
}

impl GitHubTarget {
    /// Build an authenticated client for the target organization.
    ///
    /// A personal token authenticates directly; GitHub App credentials go
    /// through octocrab's installation-token source, which refreshes the
    /// short-lived token on its own.
    pub fn new(config: &TargetConfig) -> Result<Self, GitHubError> {
        let builder = Octocrab::builder();
        let builder = match rest_endpoint(config.hostname.as_deref())? {
            Some(base) => builder
                .base_uri(base)
                .map_err(|e| GitHubError::config(format!("invalid API base URL: {e}")))?,
            None => builder,
        };

        let builder = match &config.credentials {
            Credentials::Token(token) => builder.personal_token(token.clone()),
            Credentials::App {
                app_id,
                private_key,
                ..
            } => {
                let key = EncodingKey::from_rsa_pem(private_key.as_bytes()).map_err(|e| {
                    GitHubError::config(format!("invalid GitHub App private key: {e}"))
                })?;
                builder.app(AppId(*app_id), key)
            }
        };

        let client = builder
            .build()
            .map_err(|e| GitHubError::internal(format!("failed to build GitHub client: {e}")))?;

        let client = match &config.credentials {
            Credentials::App {
                installation_id, ..
            } => client
                .installation(InstallationId(*installation_id))
                .map_err(|e| {
                    GitHubError::internal(format!("failed to build installation client: {e}"))
                })?,
            Credentials::Token(_) => client,
        };

        Ok(Self {
            inner: client,
            organization: config.organization.clone(),
        })
    }

    /// The target organization this client writes to.
    pub fn organization(&self) -> &str {
        &self.organization
    }
}

#[async_trait]
impl TargetClient for GitHubTarget {
    async fn create_team(&self, team: &NewTeam) -> Result<CreatedTeam, GitHubError> {
        let route = format!("/orgs/{}/teams", self.organization);
        let mut body = serde_json::json!({
            "name": team.name,
            "description": team.description,
            "privacy": team.privacy.as_str(),
        });
        if let Some(parent_id) = team.parent_team_id {
            body["parent_team_id"] = serde_json::json!(parent_id);
        }

        let created: serde_json::Value = with_retry(
            || async {
                self.inner
                    .post(&route, Some(&body))
                    .await
                    .map_err(classify_github_error)
            },
            GitHubError::is_rate_limited,
            &format!("create team {}", team.name),
        )
        .await?;

        Ok(CreatedTeam {
            id: created.get("id").and_then(|v| v.as_u64()).unwrap_or(0),
            slug: created
                .get("slug")
                .and_then(|v| v.as_str())
                .unwrap_or(&team.name)
                .to_string(),
        })
    }

    async fn team_id_by_slug(&self, slug: &str) -> Result<u64, GitHubError> {
        let route = format!("/orgs/{}/teams/{}", self.organization, slug);
        let team: serde_json::Value = with_retry(
            || async {
                self.inner
                    .get(&route, None::<&()>)
                    .await
                    .map_err(classify_github_error)
            },
            GitHubError::is_rate_limited,
            &format!("look up team {slug}"),
        )
        .await?;

        team.get("id")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| GitHubError::internal(format!("team {slug} has no id")))
    }

    async fn add_repository(
        &self,
        team_slug: &str,
        repository: &str,
        permission: RepoPermission,
    ) -> Result<(), GitHubError> {
        let route = format!(
            "/orgs/{org}/teams/{team_slug}/repos/{org}/{repository}",
            org = self.organization
        );
        let body = serde_json::json!({ "permission": permission.as_str() });

        with_retry(
            || async {
                let response = self
                    .inner
                    ._put(&route, Some(&body))
                    .await
                    .map_err(classify_github_error)?;
                match response.status().as_u16() {
                    200..=299 => Ok(()),
                    404 => Err(GitHubError::not_found(format!(
                        "{}/{repository}",
                        self.organization
                    ))),
                    422 => Err(GitHubError::validation(format!(
                        "cannot add {repository} to team {team_slug}"
                    ))),
                    403 | 429 => Err(GitHubError::RateLimited { reset_at: None }),
                    status => Err(GitHubError::internal(format!(
                        "unexpected status {status} adding repository {repository}"
                    ))),
                }
            },
            GitHubError::is_rate_limited,
            &format!("add repository {repository} to {team_slug}"),
        )
        .await
    }

    async fn add_member(
        &self,
        team_slug: &str,
        login: &str,
        role: TeamRole,
    ) -> Result<(), GitHubError> {
        let route = format!(
            "/orgs/{}/teams/{team_slug}/memberships/{login}",
            self.organization
        );
        let body = serde_json::json!({ "role": role.as_str() });

        with_retry(
            || async {
                let response = self
                    .inner
                    ._put(&route, Some(&body))
                    .await
                    .map_err(classify_github_error)?;
                match response.status().as_u16() {
                    200..=299 => Ok(()),
                    404 => Err(GitHubError::not_found(format!("user {login}"))),
                    422 => Err(GitHubError::validation(format!(
                        "cannot add {login} to team {team_slug}"
                    ))),
                    403 | 429 => Err(GitHubError::RateLimited { reset_at: None }),
                    status => Err(GitHubError::internal(format!(
                        "unexpected status {status} adding member {login}"
                    ))),
                }
            },
            GitHubError::is_rate_limited,
            &format!("add member {login} to {team_slug}"),
        )
        .await
    }

    async fn remove_member(&self, team_slug: &str, login: &str) -> Result<(), GitHubError> {
        let route = format!(
            "/orgs/{}/teams/{team_slug}/memberships/{login}",
            self.organization
        );

        with_retry(
            || async {
                let response = self
                    .inner
                    ._delete(&route, None::<&()>)
                    .await
                    .map_err(classify_github_error)?;
                match response.status().as_u16() {
                    200..=299 => Ok(()),
                    404 => Err(GitHubError::not_found(format!(
                        "membership of {login} in {team_slug}"
                    ))),
                    403 | 429 => Err(GitHubError::RateLimited { reset_at: None }),
                    status => Err(GitHubError::internal(format!(
                        "unexpected status {status} removing member {login}"
                    ))),
                }
            },
            GitHubError::is_rate_limited,
            &format!("remove member {login} from {team_slug}"),
        )
        .await
    }

    async fn authenticated_login(&self) -> Result<Option<String>, GitHubError> {
        let result: Result<serde_json::Value, octocrab::Error> =
            self.inner.get("/user", None::<&()>).await;

        match result {
            Ok(user) => Ok(user
                .get("login")
                .and_then(|v| v.as_str())
                .map(String::from)),
            Err(e) => {
                // Installation tokens cannot act as a user; that is not an
                // error, the caller just skips the removal step.
                if let octocrab::Error::GitHub { source, .. } = &e
                    && source
                        .message
                        .contains("Resource not accessible by integration")
                {
                    return Ok(None);
                }
                Err(classify_github_error(e))
            }
        }
    }
}
