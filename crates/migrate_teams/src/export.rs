//! CSV export of teams, memberships, and repository grants.
//!
//! Output files are created fresh (write-create) and flushed before the
//! writing function returns.

use std::path::Path;

use thiserror::Error;

use crate::repository::Repository;
use crate::team::Team;

/// Errors writing an export file.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unable to write export file: {0}")]
    Csv(#[from] csv::Error),

    #[error("unable to write export file: {0}")]
    Io(#[from] std::io::Error),
}

/// Write one `team,login,email` row per team membership.
pub fn write_membership_csv(teams: &[Team], path: &Path) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["team", "login", "email"])?;

    for team in teams {
        for member in &team.members {
            writer.write_record([&team.name, &member.login, &member.email])?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// Write one `team,repository,permission` row per repository grant.
pub fn write_repository_csv(teams: &[Team], path: &Path) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["team", "repository", "permission"])?;

    for team in teams {
        for grant in &team.repositories {
            writer.write_record([
                team.name.as_str(),
                grant.name.as_str(),
                grant.permission.as_str(),
            ])?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// Write one `repository,login,email,permission` row per collaborator.
pub fn write_collaborator_csv(
    repositories: &[Repository],
    path: &Path,
) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["repository", "login", "email", "permission"])?;

    for repository in repositories {
        for collaborator in &repository.collaborators {
            writer.write_record([
                &repository.name,
                &collaborator.login,
                &collaborator.email,
                &collaborator.permission,
            ])?;
        }
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Collaborator;
    use crate::team::{Member, RepoPermission, RepositoryGrant, TeamPrivacy, TeamRole};

    fn sample_teams() -> Vec<Team> {
        vec![Team {
            id: "T_1".to_string(),
            name: "platform".to_string(),
            slug: "platform".to_string(),
            description: String::new(),
            privacy: TeamPrivacy::Closed,
            parent_team_id: None,
            parent_team_name: None,
            members: vec![Member {
                login: "alice".to_string(),
                email: "alice@example.com".to_string(),
                role: TeamRole::Maintainer,
            }],
            repositories: vec![RepositoryGrant {
                name: "api".to_string(),
                permission: RepoPermission::Admin,
            }],
        }]
    }

    #[test]
    fn test_membership_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("membership.csv");

        write_membership_csv(&sample_teams(), &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("team,login,email"));
        assert_eq!(lines.next(), Some("platform,alice,alice@example.com"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_repository_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repositories.csv");

        write_repository_csv(&sample_teams(), &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("platform,api,admin"));
    }

    #[test]
    fn test_collaborator_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collaborators.csv");

        let repositories = vec![Repository {
            name: "api".to_string(),
            collaborators: vec![Collaborator {
                login: "carol".to_string(),
                email: String::new(),
                permission: "WRITE".to_string(),
            }],
        }];
        write_collaborator_csv(&repositories, &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("api,carol,,WRITE"));
    }

    #[test]
    fn test_export_empty_teams_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("membership.csv");

        write_membership_csv(&[], &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), "team,login,email");
    }
}
