//! migrate-teams CLI - migrates teams between GitHub organizations.

mod commands;
mod config;
mod progress;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "migrate-teams")]
#[command(version)]
#[command(about = "Migrate teams, membership, and repository grants between GitHub organizations")]
#[command(
    long_about = "migrate-teams recreates the team structure of a source GitHub organization \
inside a target organization: teams, parent/child hierarchy, member roles, and \
team repository permissions. Teams can be taken from the whole source \
organization or discovered from a list of repositories."
)]
#[command(after_long_help = r#"EXAMPLES
    Sync all teams from one organization to another:
        $ migrate-teams sync org -s source-org -t target-org -a $SOURCE_TOKEN -b $TARGET_TOKEN

    Sync only the teams touching the repositories in a list:
        $ migrate-teams sync repos -f repositories.txt -t target-org -a $SOURCE_TOKEN -b $TARGET_TOKEN

    Re-run a partial migration, skipping teams that already exist:
        $ migrate-teams sync org -s source-org -t target-org --skip-existing ...

    Export an organization's teams to CSV:
        $ migrate-teams export -o source-org -a $SOURCE_TOKEN -f acme

CONFIGURATION
    migrate-teams reads configuration from:
      1. ~/.config/migrate-teams/config.toml (or $XDG_CONFIG_HOME/migrate-teams/config.toml)
      2. ./migrate-teams.toml
      3. Environment variables (GHMT_ prefix, e.g., GHMT_SOURCE_TOKEN)
      4. .env file in current directory
    Command-line flags override all of the above.

ENVIRONMENT VARIABLES
    GHMT_SOURCE_ORGANIZATION      Source organization name
    GHMT_SOURCE_TOKEN             Source token (read:org, read:user, user:email)
    GHMT_SOURCE_HOSTNAME          GitHub Enterprise source hostname (optional)
    GHMT_TARGET_ORGANIZATION      Target organization name
    GHMT_TARGET_TOKEN             Target token (admin:org)
    GHMT_TARGET_APP_ID            Target GitHub App id (alternative to a token)
    GHMT_TARGET_PRIVATE_KEY       Target GitHub App private key (PEM)
    GHMT_TARGET_INSTALLATION_ID   Target GitHub App installation id
    GHMT_MAPPING_FILE             Member handle mapping file (CSV)
    GHMT_REPO_MAPPING_FILE        Repository name mapping file (CSV)
    GHMT_TEAM_MAPPING_FILE        Team name mapping file (CSV, repos mode)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recreate teams, membership, and repository grants in the target organization
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },
    /// Export an organization's teams, membership, and grants to CSV files
    Export {
        /// Organization to export
        #[arg(short = 'o', long)]
        organization: Option<String>,

        /// GitHub token for the organization
        #[arg(short = 'a', long)]
        token: Option<String>,

        /// GitHub Enterprise hostname (optional), e.g. https://github.example.com
        #[arg(short = 'u', long)]
        source_hostname: Option<String>,

        /// Output filename prefix
        #[arg(short = 'f', long)]
        file_prefix: String,
    },
}

#[derive(Subcommand)]
enum SyncAction {
    /// Sync every team in the source organization
    Org {
        #[command(flatten)]
        sync_opts: CommonSyncOptions,
    },
    /// Sync the teams with access to the repositories in a list file
    Repos {
        /// File with one repository per line (owner/repo or URL)
        #[arg(short = 'f', long, default_value = "repositories.txt")]
        from_file: PathBuf,

        /// Team name mapping file (owner/team-name,target-name)
        #[arg(long)]
        team_mapping_file: Option<PathBuf>,

        #[command(flatten)]
        sync_opts: CommonSyncOptions,
    },
}

/// Sync options shared by both sync modes.
#[derive(Debug, Clone, clap::Args)]
struct CommonSyncOptions {
    /// Source organization to sync teams from
    #[arg(short = 's', long)]
    source_organization: Option<String>,

    /// Target organization to sync teams to
    #[arg(short = 't', long)]
    target_organization: Option<String>,

    /// Source token. Scopes: read:org, read:user, user:email
    #[arg(short = 'a', long)]
    source_token: Option<String>,

    /// Target token. Scopes: admin:org
    #[arg(short = 'b', long)]
    target_token: Option<String>,

    /// Member handle mapping file (source,target[,gei-target])
    #[arg(short = 'm', long)]
    mapping_file: Option<PathBuf>,

    /// Repository name mapping file (source-org/repo,target-repo)
    #[arg(long)]
    repo_mapping_file: Option<PathBuf>,

    /// GitHub Enterprise source hostname (optional), e.g. https://github.example.com
    #[arg(short = 'u', long)]
    source_hostname: Option<String>,

    /// Skip member/repository attachment for teams that already exist
    #[arg(long)]
    skip_existing: bool,

    /// Don't sync team members (teams and repository grants only)
    #[arg(long)]
    no_user_sync: bool,

    /// Seconds to wait after creating a team before attaching to it
    #[arg(long)]
    settle_seconds: Option<u64>,

    /// Fail a team when its parent cannot be resolved instead of creating it parentless
    #[arg(long)]
    fail_on_missing_parent: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing for non-TTY mode (structured logging); interactive
    // runs get progress bars instead.
    if !Term::stdout().is_term() {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("migrate_teams=info,migrate_teams_cli=info"));

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    // Load configuration (config file -> env vars); flags override later.
    let config = config::Config::load();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync { action } => {
            commands::sync::handle_sync(action, &config).await?;
        }
        Commands::Export {
            organization,
            token,
            source_hostname,
            file_prefix,
        } => {
            commands::export::handle_export(
                organization,
                token,
                source_hostname,
                &file_prefix,
                &config,
            )
            .await?;
        }
    }

    Ok(())
}
