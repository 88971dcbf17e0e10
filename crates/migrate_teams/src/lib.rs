//! Replicates team taxonomy between GitHub organizations.
//!
//! Teams, their hierarchy, membership, and repository grants are read from a
//! source organization (or discovered from a list of repositories) and
//! recreated idempotently in a target organization. Each invocation performs
//! one bounded migration pass.
//!
//! # Example
//!
//! ```ignore
//! use migrate_teams::{GitHubTarget, QueryClient, SyncEngine, SyncOptions};
//! use migrate_teams::team::fetch_organization_teams;
//!
//! let source_client = QueryClient::new(&source)?;
//! let teams = fetch_organization_teams(&source_client, &source.organization, None).await?;
//!
//! let engine = SyncEngine::new(GitHubTarget::new(&target)?, SyncOptions::default());
//! let summary = engine.reconcile_all(&teams, None).await;
//! println!("created {} teams", summary.created);
//! ```

pub mod config;
pub mod export;
pub mod github;
pub mod mapping;
pub mod repository;
pub mod retry;
pub mod sync;
pub mod team;

pub use config::{Credentials, SourceConfig, TargetConfig};
pub use github::{GitHubError, GitHubTarget, QueryClient, TargetClient};
pub use mapping::{Mapper, Mapping, MappingColumn};
pub use sync::{
    MissingParentPolicy, ProgressCallback, SyncEngine, SyncOptions, SyncProgress, SyncSummary,
    TeamOutcome, emit,
};
pub use team::{Member, RepoPermission, RepositoryGrant, Team, TeamPrivacy, TeamRole};
