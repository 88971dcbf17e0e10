//! The export command: dump teams, membership, and grants to CSV files.

use console::style;

use migrate_teams::export::{write_collaborator_csv, write_membership_csv, write_repository_csv};
use migrate_teams::repository::fetch_organization_repositories;
use migrate_teams::team::fetch_organization_teams;
use migrate_teams::{QueryClient, SourceConfig};

use crate::config::Config;

/// Handle the export command.
///
/// Writes three CSVs next to the current directory:
/// `<prefix>-team-membership.csv`, `<prefix>-team-repository-permissions.csv`,
/// and `<prefix>-repository-collaborators.csv`.
pub async fn handle_export(
    organization: Option<String>,
    token: Option<String>,
    source_hostname: Option<String>,
    file_prefix: &str,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let organization = organization
        .or_else(|| config.source_organization.clone())
        .ok_or("missing organization; use --organization or GHMT_SOURCE_ORGANIZATION")?;
    let token = token
        .or_else(|| config.source_token.clone())
        .ok_or("missing token; use --token or GHMT_SOURCE_TOKEN")?;

    let source = SourceConfig {
        organization: organization.clone(),
        token,
        hostname: source_hostname.or_else(|| config.source_hostname.clone()),
    };

    let client = QueryClient::new(&source)?;

    let teams = fetch_organization_teams(&client, &organization, None).await?;
    println!("Found {} teams", teams.len());

    let membership_path = format!("{file_prefix}-team-membership.csv");
    write_membership_csv(&teams, membership_path.as_ref())?;
    println!("{} wrote {membership_path}", style("✓").green());

    let repository_path = format!("{file_prefix}-team-repository-permissions.csv");
    write_repository_csv(&teams, repository_path.as_ref())?;
    println!("{} wrote {repository_path}", style("✓").green());

    let repositories = fetch_organization_repositories(&client, &organization).await?;
    let collaborator_path = format!("{file_prefix}-repository-collaborators.csv");
    write_collaborator_csv(&repositories, collaborator_path.as_ref())?;
    println!("{} wrote {collaborator_path}", style("✓").green());

    Ok(())
}
