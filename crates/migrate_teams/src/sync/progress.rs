//! Progress reporting for sync operations.
//!
//! The library emits [`SyncProgress`] events through an optional callback;
//! rendering (progress bars, structured logs) is the caller's concern.

/// Progress events emitted during fetch and reconciliation.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// Starting to fetch teams from the source organization.
    FetchingTeams {
        /// The source organization.
        organization: String,
    },

    /// Fetching members and repository grants for one team.
    FetchingTeamDetail {
        /// The team being fetched.
        slug: String,
    },

    /// Finished fetching all teams.
    FetchedTeams {
        /// Total number of teams fetched.
        total: usize,
    },

    /// Fetching the teams with access to a repository.
    CollectingRepositoryTeams {
        /// The `owner/repo` reference being collected.
        repository: String,
    },

    /// Finished collecting teams from the repository list.
    RepositoryTeamsCollected {
        /// Number of distinct teams collected.
        total_teams: usize,
        /// Total members across the collected teams.
        total_members: usize,
    },

    /// Starting to reconcile teams against the target organization.
    SyncingTeams {
        /// Number of teams to reconcile.
        count: usize,
    },

    /// Attempting to create a team.
    CreatingTeam { name: String },

    /// Team was created in the target organization.
    TeamCreated { name: String },

    /// Team already exists; proceeding with idempotent re-attach.
    TeamAlreadyExists { name: String },

    /// Team already exists and skip-existing is configured.
    TeamSkipped { name: String },

    /// Team creation failed; subsequent teams still proceed.
    TeamFailed { name: String, error: String },

    /// Parent team lookup failed during creation.
    ParentNotFound { team: String, parent: String },

    /// A repository grant was attached to a team.
    RepositoryAttached {
        team: String,
        repository: String,
        permission: String,
    },

    /// Failed to attach a repository grant (non-fatal).
    RepositoryAttachFailed {
        team: String,
        repository: String,
        permission: String,
        error: String,
    },

    /// A member was attached to a team.
    MemberAttached {
        team: String,
        login: String,
        role: String,
    },

    /// Failed to attach a member (non-fatal).
    MemberAttachFailed {
        team: String,
        login: String,
        error: String,
    },

    /// The authenticated user was removed from a team it migrated.
    MemberRemoved { team: String, login: String },

    /// Failed to remove the authenticated user (non-fatal).
    MemberRemoveFailed {
        team: String,
        login: String,
        error: String,
    },

    /// Reconciliation finished.
    SyncComplete {
        created: usize,
        skipped: usize,
        failed: usize,
    },

    /// Warning message (non-fatal).
    Warning { message: String },
}

/// Callback for progress updates during sync operations.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
