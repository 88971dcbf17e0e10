//! Team model types and source-side fetch composition.
//!
//! Source values arrive in GraphQL vocabulary (`SECRET`, `MAINTAINER`,
//! `ADMIN`) and are normalized here into the typed enums the target REST API
//! expects.

use serde::Serialize;

use crate::github::fetch::{MemberRecord, TeamRepositoryRecord};
use crate::github::{GitHubError, QueryClient, fetch};
use crate::sync::{ProgressCallback, SyncProgress, emit};

/// A team with its membership and repository grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    /// Source-side opaque identifier.
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub privacy: TeamPrivacy,
    /// Source-side parent team id, informational only.
    pub parent_team_id: Option<String>,
    /// Parent team reference by name, resolved to a target-side numeric id
    /// lazily at creation time.
    pub parent_team_name: Option<String>,
    pub members: Vec<Member>,
    pub repositories: Vec<RepositoryGrant>,
}

/// A team member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub login: String,
    pub email: String,
    pub role: TeamRole,
}

impl Member {
    pub(crate) fn from_record(record: MemberRecord) -> Self {
        Self {
            login: record.login,
            email: record.email,
            role: TeamRole::parse(&record.role),
        }
    }
}

/// A repository grant carried by a team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryGrant {
    pub name: String,
    pub permission: RepoPermission,
}

impl RepositoryGrant {
    /// Convert a fetched record, filtering out grants with an empty
    /// repository name.
    pub(crate) fn from_record(record: TeamRepositoryRecord) -> Option<Self> {
        if record.name.is_empty() {
            return None;
        }
        Some(Self {
            name: record.name,
            permission: RepoPermission::from_source(&record.permission),
        })
    }
}

/// Team visibility within an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamPrivacy {
    Secret,
    Closed,
}

impl TeamPrivacy {
    /// Parse a source-side privacy value. Anything that isn't `secret` is
    /// treated as `closed` (visible).
    pub fn from_source(value: &str) -> Self {
        if value.eq_ignore_ascii_case("secret") {
            Self::Secret
        } else {
            Self::Closed
        }
    }

    /// The value the target REST API expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Secret => "secret",
            Self::Closed => "closed",
        }
    }
}

/// A member's role on a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Member,
    Maintainer,
}

impl TeamRole {
    /// Parse a source-side role value case-insensitively; unrecognized
    /// values default to `member`.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("maintainer") {
            Self::Maintainer
        } else {
            Self::Member
        }
    }

    /// The lowercase value the target REST API expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Maintainer => "maintainer",
        }
    }
}

/// Target-side repository permission vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoPermission {
    Pull,
    Push,
    Admin,
}

impl RepoPermission {
    /// Normalize a source permission verb. `WRITE` maps to `push`, `ADMIN`
    /// to `admin`, and everything else (including `READ`, `TRIAGE`,
    /// `MAINTAIN`, and unrecognized values) to `pull`.
    pub fn from_source(value: &str) -> Self {
        match value {
            "WRITE" => Self::Push,
            "ADMIN" => Self::Admin,
            _ => Self::Pull,
        }
    }

    /// The value the target REST API expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pull => "pull",
            Self::Push => "push",
            Self::Admin => "admin",
        }
    }
}

/// Fetch every team in the source organization, with members and
/// repository grants.
///
/// Connections are drained sequentially, one team at a time, in the order
/// the organization reports them. Errors here abort the run; there is no
/// point reconciling against a partial view of the source.
pub async fn fetch_organization_teams(
    client: &QueryClient,
    org: &str,
    on_progress: Option<&ProgressCallback>,
) -> Result<Vec<Team>, GitHubError> {
    emit(
        on_progress,
        SyncProgress::FetchingTeams {
            organization: org.to_string(),
        },
    );

    let records = fetch::fetch_org_teams(client, org).await?;
    let mut teams = Vec::with_capacity(records.len());

    for record in records {
        emit(
            on_progress,
            SyncProgress::FetchingTeamDetail {
                slug: record.slug.clone(),
            },
        );

        let members = fetch::fetch_team_members(client, org, &record.slug)
            .await?
            .into_iter()
            .map(Member::from_record)
            .collect();
        let repositories = fetch::fetch_team_repositories(client, org, &record.slug)
            .await?
            .into_iter()
            .filter_map(RepositoryGrant::from_record)
            .collect();

        teams.push(Team {
            id: record.id,
            name: record.name,
            slug: record.slug,
            description: record.description,
            privacy: TeamPrivacy::from_source(&record.privacy),
            parent_team_id: record.parent_team_id,
            parent_team_name: record.parent_team_slug,
            members,
            repositories,
        });
    }

    emit(on_progress, SyncProgress::FetchedTeams { total: teams.len() });
    Ok(teams)
}
