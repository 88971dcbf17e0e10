//! Entity fetchers over the source organization.
//!
//! Each fetcher drains one cursor-paginated connection into a flat, ordered
//! sequence of records. A connection with zero results yields an empty
//! sequence; any non-rate-limit server error propagates to the caller (rate
//! limit exhaustion is absorbed inside [`QueryClient`]).

use octocrab::Octocrab;
use serde::Deserialize;

use super::error::{GitHubError, classify_github_error};
use super::graphql::{PageInfo, QueryClient};

/// Records fetched per page. GitHub caps connection pages at 100 nodes.
const PAGE_SIZE: u32 = 100;

/// A team as reported by the organization teams connection.
#[derive(Debug, Clone)]
pub struct TeamRecord {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub privacy: String,
    pub parent_team_id: Option<String>,
    pub parent_team_slug: Option<String>,
}

/// A member as reported by a team members connection.
#[derive(Debug, Clone)]
pub struct MemberRecord {
    pub login: String,
    pub email: String,
    pub role: String,
}

/// A repository grant as reported by a team repositories connection.
///
/// The permission carries the source vocabulary (`READ`, `WRITE`, `ADMIN`,
/// and richer verbs); normalization happens when the grant is converted to
/// the model type.
#[derive(Debug, Clone)]
pub struct TeamRepositoryRecord {
    pub name: String,
    pub permission: String,
}

/// A collaborator as reported by a repository collaborators connection.
#[derive(Debug, Clone)]
pub struct CollaboratorRecord {
    pub login: String,
    pub email: String,
    pub permission: String,
}

const ORG_TEAMS_QUERY: &str = r#"
query($login: String!, $first: Int!, $after: String) {
  organization(login: $login) {
    teams(first: $first, after: $after) {
      pageInfo { endCursor hasNextPage }
      edges {
        node {
          id
          name
          slug
          description
          privacy
          parentTeam { id slug }
        }
      }
    }
  }
}"#;

#[derive(Debug, Deserialize)]
struct OrgTeamsData {
    organization: Option<OrgTeams>,
}

#[derive(Debug, Deserialize)]
struct OrgTeams {
    teams: TeamConnection,
}

#[derive(Debug, Deserialize)]
struct TeamConnection {
    #[serde(rename = "pageInfo")]
    page_info: PageInfo,
    edges: Vec<TeamEdge>,
}

#[derive(Debug, Deserialize)]
struct TeamEdge {
    node: TeamNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamNode {
    id: String,
    name: String,
    slug: String,
    #[serde(default)]
    description: Option<String>,
    privacy: String,
    parent_team: Option<ParentTeamNode>,
}

#[derive(Debug, Deserialize)]
struct ParentTeamNode {
    id: String,
    slug: String,
}

/// List every team in the source organization.
pub async fn fetch_org_teams(
    client: &QueryClient,
    org: &str,
) -> Result<Vec<TeamRecord>, GitHubError> {
    let mut records = Vec::new();
    let mut after: Option<String> = None;

    loop {
        let variables = serde_json::json!({
            "login": org,
            "first": PAGE_SIZE,
            "after": after,
        });
        let data: OrgTeamsData = client.query(ORG_TEAMS_QUERY, variables).await?;
        let Some(org_data) = data.organization else {
            break;
        };

        let connection = org_data.teams;
        for edge in connection.edges {
            let node = edge.node;
            records.push(TeamRecord {
                id: node.id,
                name: node.name,
                slug: node.slug,
                description: node.description.unwrap_or_default(),
                privacy: node.privacy,
                parent_team_id: node.parent_team.as_ref().map(|p| p.id.clone()),
                parent_team_slug: node.parent_team.map(|p| p.slug),
            });
        }

        if !connection.page_info.has_next_page {
            break;
        }
        after = connection.page_info.end_cursor;
    }

    Ok(records)
}

const TEAM_MEMBERS_QUERY: &str = r#"
query($login: String!, $slug: String!, $first: Int!, $after: String) {
  organization(login: $login) {
    team(slug: $slug) {
      members(first: $first, after: $after) {
        pageInfo { endCursor hasNextPage }
        edges {
          role
          node { login email }
        }
      }
    }
  }
}"#;

#[derive(Debug, Deserialize)]
struct TeamMembersData {
    organization: Option<MembersOrganization>,
}

#[derive(Debug, Deserialize)]
struct MembersOrganization {
    team: Option<MembersTeam>,
}

#[derive(Debug, Deserialize)]
struct MembersTeam {
    members: MemberConnection,
}

#[derive(Debug, Deserialize)]
struct MemberConnection {
    #[serde(rename = "pageInfo")]
    page_info: PageInfo,
    edges: Vec<MemberEdge>,
}

#[derive(Debug, Deserialize)]
struct MemberEdge {
    role: String,
    node: MemberNode,
}

#[derive(Debug, Deserialize)]
struct MemberNode {
    login: String,
    #[serde(default)]
    email: Option<String>,
}

/// List the members of a team, with their role on that team.
pub async fn fetch_team_members(
    client: &QueryClient,
    org: &str,
    slug: &str,
) -> Result<Vec<MemberRecord>, GitHubError> {
    let mut records = Vec::new();
    let mut after: Option<String> = None;

    loop {
        let variables = serde_json::json!({
            "login": org,
            "slug": slug,
            "first": PAGE_SIZE,
            "after": after,
        });
        let data: TeamMembersData = client.query(TEAM_MEMBERS_QUERY, variables).await?;
        let Some(team) = data.organization.and_then(|o| o.team) else {
            break;
        };

        let connection = team.members;
        for edge in connection.edges {
            records.push(MemberRecord {
                login: edge.node.login,
                email: edge.node.email.unwrap_or_default(),
                role: edge.role,
            });
        }

        if !connection.page_info.has_next_page {
            break;
        }
        after = connection.page_info.end_cursor;
    }

    Ok(records)
}

const TEAM_REPOSITORIES_QUERY: &str = r#"
query($login: String!, $slug: String!, $first: Int!, $after: String) {
  organization(login: $login) {
    team(slug: $slug) {
      repositories(first: $first, after: $after) {
        pageInfo { endCursor hasNextPage }
        edges {
          permission
          node { name }
        }
      }
    }
  }
}"#;

#[derive(Debug, Deserialize)]
struct TeamRepositoriesData {
    organization: Option<RepositoriesOrganization>,
}

#[derive(Debug, Deserialize)]
struct RepositoriesOrganization {
    team: Option<RepositoriesTeam>,
}

#[derive(Debug, Deserialize)]
struct RepositoriesTeam {
    repositories: TeamRepositoryConnection,
}

#[derive(Debug, Deserialize)]
struct TeamRepositoryConnection {
    #[serde(rename = "pageInfo")]
    page_info: PageInfo,
    edges: Vec<TeamRepositoryEdge>,
}

#[derive(Debug, Deserialize)]
struct TeamRepositoryEdge {
    permission: String,
    node: RepositoryNameNode,
}

#[derive(Debug, Deserialize)]
struct RepositoryNameNode {
    name: String,
}

/// List the repositories granted to a team, with the granted permission.
pub async fn fetch_team_repositories(
    client: &QueryClient,
    org: &str,
    slug: &str,
) -> Result<Vec<TeamRepositoryRecord>, GitHubError> {
    let mut records = Vec::new();
    let mut after: Option<String> = None;

    loop {
        let variables = serde_json::json!({
            "login": org,
            "slug": slug,
            "first": PAGE_SIZE,
            "after": after,
        });
        let data: TeamRepositoriesData = client.query(TEAM_REPOSITORIES_QUERY, variables).await?;
        let Some(team) = data.organization.and_then(|o| o.team) else {
            break;
        };

        let connection = team.repositories;
        for edge in connection.edges {
            records.push(TeamRepositoryRecord {
                name: edge.node.name,
                permission: edge.permission,
            });
        }

        if !connection.page_info.has_next_page {
            break;
        }
        after = connection.page_info.end_cursor;
    }

    Ok(records)
}

const ORG_REPOSITORIES_QUERY: &str = r#"
query($login: String!, $first: Int!, $after: String) {
  organization(login: $login) {
    repositories(first: $first, after: $after) {
      pageInfo { endCursor hasNextPage }
      edges {
        node { name }
      }
    }
  }
}"#;

#[derive(Debug, Deserialize)]
struct OrgRepositoriesData {
    organization: Option<OrgRepositories>,
}

#[derive(Debug, Deserialize)]
struct OrgRepositories {
    repositories: OrgRepositoryConnection,
}

#[derive(Debug, Deserialize)]
struct OrgRepositoryConnection {
    #[serde(rename = "pageInfo")]
    page_info: PageInfo,
    edges: Vec<OrgRepositoryEdge>,
}

#[derive(Debug, Deserialize)]
struct OrgRepositoryEdge {
    node: RepositoryNameNode,
}

/// List the names of every repository in the source organization.
pub async fn fetch_org_repositories(
    client: &QueryClient,
    org: &str,
) -> Result<Vec<String>, GitHubError> {
    let mut names = Vec::new();
    let mut after: Option<String> = None;

    loop {
        let variables = serde_json::json!({
            "login": org,
            "first": PAGE_SIZE,
            "after": after,
        });
        let data: OrgRepositoriesData = client.query(ORG_REPOSITORIES_QUERY, variables).await?;
        let Some(org_data) = data.organization else {
            break;
        };

        let connection = org_data.repositories;
        for edge in connection.edges {
            names.push(edge.node.name);
        }

        if !connection.page_info.has_next_page {
            break;
        }
        after = connection.page_info.end_cursor;
    }

    Ok(names)
}

const REPOSITORY_COLLABORATORS_QUERY: &str = r#"
query($owner: String!, $name: String!, $first: Int!, $after: String) {
  repository(owner: $owner, name: $name) {
    collaborators(first: $first, after: $after) {
      pageInfo { endCursor hasNextPage }
      edges {
        permission
        node { login email }
      }
    }
  }
}"#;

#[derive(Debug, Deserialize)]
struct RepositoryCollaboratorsData {
    repository: Option<CollaboratorsRepository>,
}

#[derive(Debug, Deserialize)]
struct CollaboratorsRepository {
    collaborators: Option<CollaboratorConnection>,
}

#[derive(Debug, Deserialize)]
struct CollaboratorConnection {
    #[serde(rename = "pageInfo")]
    page_info: PageInfo,
    edges: Vec<CollaboratorEdge>,
}

#[derive(Debug, Deserialize)]
struct CollaboratorEdge {
    permission: String,
    node: MemberNode,
}

/// List the collaborators of a repository, with their permission.
///
/// Used by the CSV export only; reconciliation never touches collaborators.
pub async fn fetch_repository_collaborators(
    client: &QueryClient,
    org: &str,
    repository: &str,
) -> Result<Vec<CollaboratorRecord>, GitHubError> {
    let mut records = Vec::new();
    let mut after: Option<String> = None;

    loop {
        let variables = serde_json::json!({
            "owner": org,
            "name": repository,
            "first": PAGE_SIZE,
            "after": after,
        });
        let data: RepositoryCollaboratorsData = client
            .query(REPOSITORY_COLLABORATORS_QUERY, variables)
            .await?;
        let Some(connection) = data.repository.and_then(|r| r.collaborators) else {
            break;
        };

        for edge in connection.edges {
            records.push(CollaboratorRecord {
                login: edge.node.login,
                email: edge.node.email.unwrap_or_default(),
                permission: edge.permission,
            });
        }

        if !connection.page_info.has_next_page {
            break;
        }
        after = connection.page_info.end_cursor;
    }

    Ok(records)
}

/// A team with access to a repository, as reported by the REST API.
///
/// Carries the resolved parent team (id and name) when one is present.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryTeamRecord {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    pub privacy: String,
    #[serde(default)]
    pub parent: Option<ParentTeamRecord>,
}

/// Parent team reference embedded in a repository team record.
#[derive(Debug, Clone, Deserialize)]
pub struct ParentTeamRecord {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

/// List the teams with access to `owner/repo`.
pub async fn fetch_repository_teams(
    client: &Octocrab,
    owner: &str,
    repo: &str,
) -> Result<Vec<RepositoryTeamRecord>, GitHubError> {
    let mut all = Vec::new();
    let mut page = 1u32;

    loop {
        let route = format!("/repos/{owner}/{repo}/teams?per_page={PAGE_SIZE}&page={page}");
        let teams: Vec<RepositoryTeamRecord> = client
            .get(&route, None::<&()>)
            .await
            .map_err(classify_github_error)?;

        let count = teams.len();
        all.extend(teams);

        // Fewer than a full page means we've reached the end.
        if count < PAGE_SIZE as usize {
            break;
        }
        page += 1;
    }

    Ok(all)
}
