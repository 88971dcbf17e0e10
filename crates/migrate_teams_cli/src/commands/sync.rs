//! The sync command: reconcile source teams into the target organization.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use console::style;

use migrate_teams::sync::collect::{
    collect_repository_teams, filter_team_repositories, parse_repository_list,
};
use migrate_teams::team::fetch_organization_teams;
use migrate_teams::{
    Credentials, GitHubTarget, Mapper, Mapping, MappingColumn, MissingParentPolicy, QueryClient,
    SourceConfig, SyncEngine, SyncOptions, SyncSummary, TargetConfig, Team,
    github::source_rest_client,
};

use crate::config::Config;
use crate::progress::ProgressReporter;
use crate::{CommonSyncOptions, SyncAction};

/// Handle sync subcommands.
pub async fn handle_sync(
    action: SyncAction,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SyncAction::Org { sync_opts } => sync_org(&sync_opts, config).await,
        SyncAction::Repos {
            from_file,
            team_mapping_file,
            sync_opts,
        } => sync_repos(&from_file, team_mapping_file, &sync_opts, config).await,
    }
}

/// Sync every team in the source organization.
async fn sync_org(
    opts: &CommonSyncOptions,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = resolve_source(opts, config, true)?;
    let target = resolve_target(opts, config)?;
    let options = resolve_sync_options(opts, config);
    let mapper = build_mapper(opts, config);

    let reporter = Arc::new(ProgressReporter::new());
    let callback = reporter.as_callback();

    let query_client = QueryClient::new(&source)?;
    let teams = fetch_organization_teams(&query_client, &source.organization, Some(&callback))
        .await?;

    if teams.is_empty() {
        return Err(format!(
            "no teams found in source organization {}; check the organization name and token",
            source.organization
        )
        .into());
    }

    let teams: Vec<Team> = teams
        .iter()
        .map(|team| mapper.map_team(team, &source.organization))
        .collect();

    let summary = reconcile(teams, &target, options, &callback).await?;
    reporter.finish();
    print_summary(&summary);
    Ok(())
}

/// Sync the teams with access to the repositories in a list file.
async fn sync_repos(
    from_file: &Path,
    team_mapping_file: Option<PathBuf>,
    opts: &CommonSyncOptions,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = resolve_source(opts, config, false)?;
    let target = resolve_target(opts, config)?;
    let options = resolve_sync_options(opts, config);
    let mapper = build_mapper(opts, config);
    let team_names = team_mapping_file
        .or_else(|| config.team_mapping_file.clone())
        .and_then(|path| load_mapping(&path, "team mapping"));

    let repositories = parse_repository_list(from_file)?;
    tracing::info!(
        count = repositories.len(),
        "fetched repositories from the repository list"
    );

    let reporter = Arc::new(ProgressReporter::new());
    let callback = reporter.as_callback();

    let query_client = QueryClient::new(&source)?;
    let rest_client = source_rest_client(&source)?;

    let teams = collect_repository_teams(
        &query_client,
        &rest_client,
        &repositories,
        Some(&mapper),
        team_names.as_ref(),
        Some(&callback),
    )
    .await;

    if teams.is_empty() {
        return Err(
            "no teams fetched from source; check the values of org, repos, and tokens".into(),
        );
    }

    // Only carry grants for repositories that are actually in the list.
    let teams: Vec<Team> = teams
        .iter()
        .map(|team| filter_team_repositories(team, &repositories))
        .collect();

    let summary = reconcile(teams, &target, options, &callback).await?;
    reporter.finish();
    print_summary(&summary);
    Ok(())
}

/// Build the engine and reconcile all teams.
async fn reconcile(
    teams: Vec<Team>,
    target: &TargetConfig,
    options: SyncOptions,
    callback: &migrate_teams::ProgressCallback,
) -> Result<SyncSummary, Box<dyn std::error::Error>> {
    let target_client = GitHubTarget::new(target)?;
    let engine = SyncEngine::new(target_client, options);
    Ok(engine.reconcile_all(&teams, Some(callback)).await)
}

/// Resolve source connection settings from flags and config.
fn resolve_source(
    opts: &CommonSyncOptions,
    config: &Config,
    organization_required: bool,
) -> Result<SourceConfig, Box<dyn std::error::Error>> {
    let organization = opts
        .source_organization
        .clone()
        .or_else(|| config.source_organization.clone());
    let organization = if organization_required {
        organization.ok_or(
            "missing source organization; use --source-organization or GHMT_SOURCE_ORGANIZATION",
        )?
    } else {
        // Repos mode takes the owner from each repository reference.
        organization.unwrap_or_default()
    };

    let token = opts
        .source_token
        .clone()
        .or_else(|| config.source_token.clone())
        .ok_or("missing source token; use --source-token or GHMT_SOURCE_TOKEN")?;

    Ok(SourceConfig {
        organization,
        token,
        hostname: opts
            .source_hostname
            .clone()
            .or_else(|| config.source_hostname.clone()),
    })
}

/// Resolve target connection settings from flags and config.
///
/// Either a target token or the full GitHub App triple must be present.
fn resolve_target(
    opts: &CommonSyncOptions,
    config: &Config,
) -> Result<TargetConfig, Box<dyn std::error::Error>> {
    let organization = opts
        .target_organization
        .clone()
        .or_else(|| config.target_organization.clone())
        .ok_or("missing target organization; use --target-organization or GHMT_TARGET_ORGANIZATION")?;

    let token = opts
        .target_token
        .clone()
        .or_else(|| config.target_token.clone());

    let credentials = match (
        token,
        config.target_app_id,
        config.target_private_key.clone(),
        config.target_installation_id,
    ) {
        (Some(token), ..) => Credentials::Token(token),
        (None, Some(app_id), Some(private_key), Some(installation_id)) => Credentials::App {
            app_id,
            private_key,
            installation_id,
        },
        _ => {
            return Err(
                "please provide a target token or a target GitHub App id, private key, \
                 and installation id"
                    .into(),
            );
        }
    };

    Ok(TargetConfig {
        organization,
        credentials,
        hostname: config.target_hostname.clone(),
    })
}

/// Merge sync options from flags over config defaults.
fn resolve_sync_options(opts: &CommonSyncOptions, config: &Config) -> SyncOptions {
    let settle_seconds = opts.settle_seconds.unwrap_or(config.settle_seconds);
    let on_missing_parent = if opts.fail_on_missing_parent || config.fail_on_missing_parent {
        MissingParentPolicy::Fail
    } else {
        MissingParentPolicy::CreateWithoutParent
    };

    SyncOptions {
        skip_existing: opts.skip_existing || config.skip_existing,
        user_sync: if opts.no_user_sync {
            false
        } else {
            config.user_sync
        },
        settle_delay: Duration::from_secs(settle_seconds),
        on_missing_parent,
    }
}

/// Load the optional mapping files into a mapper.
///
/// Mapping files are optional: a configured path that doesn't exist or
/// can't be parsed is logged and skipped, matching their best-effort
/// contract.
fn build_mapper(opts: &CommonSyncOptions, config: &Config) -> Mapper {
    let mut mapper = Mapper::new();

    let member_file = opts
        .mapping_file
        .clone()
        .or_else(|| config.mapping_file.clone());
    if let Some(path) = member_file
        && let Some(mapping) = load_mapping(&path, "member mapping")
    {
        mapper = mapper.with_member_mapping(mapping);
    }

    let repo_file = opts
        .repo_mapping_file
        .clone()
        .or_else(|| config.repo_mapping_file.clone());
    if let Some(path) = repo_file
        && let Some(mapping) = load_mapping(&path, "repo mapping")
    {
        mapper = mapper.with_repository_mapping(mapping);
    }

    mapper
}

/// Load one mapping file, inferring the target column from the path.
fn load_mapping(path: &Path, kind: &str) -> Option<Mapping> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "{kind} file not found, skipping");
        return None;
    }
    match Mapping::load(path, MappingColumn::infer_from_path(path)) {
        Ok(mapping) => {
            tracing::info!(path = %path.display(), entries = mapping.len(), "loaded {kind}");
            Some(mapping)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unable to read {kind}");
            None
        }
    }
}

/// Print the final summary line.
fn print_summary(summary: &SyncSummary) {
    let line = format!(
        "{} created, {} skipped, {} failed",
        summary.created, summary.skipped, summary.failed
    );
    if summary.is_clean() {
        println!("{} {}", style("✓").green().bold(), line);
    } else {
        println!("{} {}", style("⚠").yellow().bold(), line);
        for error in &summary.errors {
            println!("  {} {}", style("✗").red(), error);
        }
    }
}
