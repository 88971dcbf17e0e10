//! Repository and collaborator records for the CSV export.

use crate::github::{GitHubError, QueryClient, fetch};

/// A repository with its direct collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub name: String,
    pub collaborators: Vec<Collaborator>,
}

/// A repository collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collaborator {
    pub login: String,
    pub email: String,
    pub permission: String,
}

/// Fetch every repository in the source organization with its collaborators.
///
/// Used by the export command only; reconciliation works from team grants,
/// not collaborator lists.
pub async fn fetch_organization_repositories(
    client: &QueryClient,
    org: &str,
) -> Result<Vec<Repository>, GitHubError> {
    let names = fetch::fetch_org_repositories(client, org).await?;

    let mut repositories = Vec::with_capacity(names.len());
    for name in names {
        let collaborators = fetch::fetch_repository_collaborators(client, org, &name)
            .await?
            .into_iter()
            .map(|record| Collaborator {
                login: record.login,
                email: record.email,
                permission: record.permission,
            })
            .collect();
        repositories.push(Repository {
            name,
            collaborators,
        });
    }

    Ok(repositories)
}
