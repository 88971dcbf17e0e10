//! Reconciliation infrastructure.
//!
//! # Module Structure
//!
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`engine`] - The reconciliation engine: `SyncEngine`, `SyncOptions`
//! - [`collect`] - Repository-scoped team collection and grant filtering

pub mod collect;
pub mod engine;
mod progress;

pub use collect::{
    RepositoryListError, collect_repository_teams, filter_team_repositories,
    merge_collected_teams, parse_repository_list, parse_repository_reference,
};
pub use engine::{
    DEFAULT_SETTLE_DELAY, MissingParentPolicy, SyncEngine, SyncOptions, SyncSummary, TeamOutcome,
};
pub use progress::{ProgressCallback, SyncProgress, emit};
