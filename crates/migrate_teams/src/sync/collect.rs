//! Repository-scoped team collection.
//!
//! Given a list of `owner/repo` references, discovers the teams with access
//! to them, deduplicated by team id with first-seen ordering, and supports
//! pruning a team's grants down to an explicit repository allow-list.

use std::collections::HashSet;
use std::path::Path;

use octocrab::Octocrab;
use thiserror::Error;
use url::Url;

use crate::github::fetch::{self, RepositoryTeamRecord};
use crate::github::{GitHubError, QueryClient};
use crate::mapping::{Mapper, Mapping};
use crate::sync::{ProgressCallback, SyncProgress, emit};
use crate::team::{Member, RepositoryGrant, Team, TeamPrivacy};

/// Errors reading the repository list file.
#[derive(Debug, Error)]
pub enum RepositoryListError {
    #[error("unable to read repository list: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse a repository list file into `owner/repo` references.
///
/// One reference per line: either a bare `owner/repo` path or a URL whose
/// path component (leading slash stripped) is that pair. Blank lines are
/// skipped; lines that don't yield a reference are logged and skipped.
/// An unreadable file is fatal.
pub fn parse_repository_list(path: &Path) -> Result<Vec<String>, RepositoryListError> {
    let contents = std::fs::read_to_string(path)?;

    let mut references = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_repository_reference(line) {
            Some(reference) => references.push(reference),
            None => {
                tracing::warn!(line = %line, "skipping unparseable repository reference");
            }
        }
    }

    Ok(references)
}

/// Parse one repository reference: a URL's path component or a bare path,
/// with any leading slash stripped.
pub fn parse_repository_reference(line: &str) -> Option<String> {
    let path = if line.contains("://") {
        let url = Url::parse(line).ok()?;
        url.path().to_string()
    } else {
        line.to_string()
    };

    let path = path.trim_start_matches('/').trim_end_matches('/');
    if path.is_empty() {
        return None;
    }
    Some(path.to_string())
}

/// Merge teams into the collection, keeping only the first sighting of each
/// team id. Later sightings are no-ops.
pub fn merge_collected_teams(
    collected: &mut Vec<Team>,
    seen: &mut HashSet<String>,
    teams: Vec<Team>,
) {
    for team in teams {
        if seen.insert(team.id.clone()) {
            collected.push(team);
        }
    }
}

/// Discover the teams with access to the listed repositories.
///
/// For each `owner/repo` reference the teams are fetched, their names
/// optionally rewritten through the team mapping (keyed `owner/team-name`),
/// and their members and grants filled in. A team seen via multiple
/// repositories is included exactly once. Per-repository fetch failures are
/// logged and the loop continues; the caller decides whether an empty
/// result is fatal.
pub async fn collect_repository_teams(
    graphql: &QueryClient,
    rest: &Octocrab,
    repositories: &[String],
    mapper: Option<&Mapper>,
    team_names: Option<&Mapping>,
    on_progress: Option<&ProgressCallback>,
) -> Vec<Team> {
    let mut collected: Vec<Team> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for reference in repositories {
        let Some((owner, repo)) = reference.split_once('/') else {
            tracing::warn!(repository = %reference, "expected owner/repo, skipping");
            continue;
        };

        emit(
            on_progress,
            SyncProgress::CollectingRepositoryTeams {
                repository: reference.clone(),
            },
        );
        tracing::info!(repository = %reference, "fetching teams for repository");

        let records = match fetch::fetch_repository_teams(rest, owner, repo).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(repository = %reference, error = %e, "unable to get repository teams");
                continue;
            }
        };

        let mut repo_teams = Vec::with_capacity(records.len());
        for record in records {
            let id = record.id.to_string();
            match build_team(graphql, owner, record, team_names).await {
                Ok(team) => {
                    let team = match mapper {
                        Some(mapper) => mapper.map_team(&team, owner),
                        None => team,
                    };
                    repo_teams.push(team);
                }
                Err(e) => {
                    tracing::warn!(
                        repository = %reference,
                        team = %id,
                        error = %e,
                        "unable to fetch team details"
                    );
                }
            }
        }

        merge_collected_teams(&mut collected, &mut seen, repo_teams);
    }

    let total_members: usize = collected.iter().map(|team| team.members.len()).sum();
    emit(
        on_progress,
        SyncProgress::RepositoryTeamsCollected {
            total_teams: collected.len(),
            total_members,
        },
    );
    tracing::info!(
        teams = collected.len(),
        members = total_members,
        "collected teams from repository list"
    );

    collected
}

/// Assemble a full [`Team`] from a repository team record, applying the
/// optional team-name mapping and filling members and grants from the
/// source organization.
async fn build_team(
    graphql: &QueryClient,
    owner: &str,
    record: RepositoryTeamRecord,
    team_names: Option<&Mapping>,
) -> Result<Team, GitHubError> {
    // Members and grants are fetched with the original slug; the mapping
    // only renames the team on the target side.
    let members: Vec<Member> = fetch::fetch_team_members(graphql, owner, &record.slug)
        .await?
        .into_iter()
        .map(Member::from_record)
        .collect();
    let repositories: Vec<RepositoryGrant> =
        fetch::fetch_team_repositories(graphql, owner, &record.slug)
            .await?
            .into_iter()
            .filter_map(RepositoryGrant::from_record)
            .collect();

    let (mut name, mut slug) = (record.name.clone(), record.slug.clone());
    if let Some(mapping) = team_names {
        let key = format!("{owner}/{}", record.name);
        let mapped = mapping.lookup(&key);
        if mapped != key {
            name = mapped.to_string();
            slug = mapped.to_string();
        }
    }

    Ok(Team {
        id: record.id.to_string(),
        name,
        slug,
        description: record.description.unwrap_or_default(),
        privacy: TeamPrivacy::from_source(&record.privacy),
        parent_team_id: record.parent.as_ref().map(|p| p.id.to_string()),
        parent_team_name: record.parent.map(|p| p.slug),
        members,
        repositories,
    })
}

/// Prune a team's grants down to repositories present in the allow-list.
///
/// Allow-list entries are `owner/repo` pairs; a grant is kept when its
/// repository name matches the repo component of an entry, case-sensitively.
/// Entries that are not exactly two segments are ignored. All non-grant
/// fields are returned unchanged; an empty allow-list yields empty grants.
pub fn filter_team_repositories(team: &Team, allowed: &[String]) -> Team {
    let mut keep: HashSet<&str> = HashSet::new();
    for entry in allowed {
        let mut segments = entry.split('/');
        if let (Some(_owner), Some(repo), None) =
            (segments.next(), segments.next(), segments.next())
        {
            keep.insert(repo);
        }
    }

    let repositories = team
        .repositories
        .iter()
        .filter(|grant| keep.contains(grant.name.as_str()))
        .cloned()
        .collect();

    Team {
        repositories,
        ..team.clone()
    }
}
