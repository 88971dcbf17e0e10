//! The reconciliation engine.
//!
//! Teams are reconciled one at a time, in fetch order, against the target
//! organization. Each team moves through create → settle → attach
//! repositories → attach members → authenticated-user reconciliation, and
//! lands in one of three terminal states. One team's failure never blocks
//! another's.

use std::time::Duration;

use crate::github::{GitHubError, NewTeam, TargetClient};
use crate::sync::{ProgressCallback, SyncProgress, emit};
use crate::team::Team;

/// Default settle delay after team creation.
///
/// Team visibility propagates asynchronously on the target side; attaching
/// repositories or members immediately after creation can race that
/// propagation. This is a bounded wait, not a retry loop; there is no
/// read-after-write signal to poll.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// What to do when a parent team cannot be resolved on the target side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingParentPolicy {
    /// Create the team without a parent (logged).
    #[default]
    CreateWithoutParent,
    /// Fail the team.
    Fail,
}

/// Options for a reconciliation run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Short-circuit member/repository attachment when the team already
    /// exists in the target organization.
    pub skip_existing: bool,
    /// Attach members (and reconcile the authenticated user). When false,
    /// only teams and repository grants are synced.
    pub user_sync: bool,
    /// Bounded delay between team creation and attach operations.
    pub settle_delay: Duration,
    /// Policy for parent teams that cannot be resolved.
    pub on_missing_parent: MissingParentPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            skip_existing: false,
            user_sync: true,
            settle_delay: DEFAULT_SETTLE_DELAY,
            on_missing_parent: MissingParentPolicy::default(),
        }
    }
}

/// Terminal state of one team's reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamOutcome {
    /// The team was created (or already existed and was re-attached).
    Created,
    /// The team already exists and skip-existing is configured.
    SkippedExisting,
    /// Team creation failed; nothing was attached.
    Failed { error: String },
}

/// Tally of a reconciliation run.
#[derive(Debug, Default)]
pub struct SyncSummary {
    /// Teams created or re-attached.
    pub created: usize,
    /// Teams skipped because they already exist.
    pub skipped: usize,
    /// Teams that failed to create.
    pub failed: usize,
    /// Error messages for failed teams, in team order.
    pub errors: Vec<String>,
}

impl SyncSummary {
    /// Whether every team reconciled without a creation failure.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Drives team creation, grant attachment, and membership reconciliation
/// against a target organization.
pub struct SyncEngine<T> {
    target: T,
    options: SyncOptions,
}

impl<T: TargetClient> SyncEngine<T> {
    /// Create an engine writing through the given target client.
    pub fn new(target: T, options: SyncOptions) -> Self {
        Self { target, options }
    }

    /// The target client this engine writes through.
    pub fn target(&self) -> &T {
        &self.target
    }

    /// Reconcile every team, sequentially, in the given order.
    pub async fn reconcile_all(
        &self,
        teams: &[Team],
        on_progress: Option<&ProgressCallback>,
    ) -> SyncSummary {
        emit(on_progress, SyncProgress::SyncingTeams { count: teams.len() });

        let mut summary = SyncSummary::default();
        for team in teams {
            match self.reconcile_team(team, on_progress).await {
                TeamOutcome::Created => summary.created += 1,
                TeamOutcome::SkippedExisting => summary.skipped += 1,
                TeamOutcome::Failed { error } => {
                    summary.failed += 1;
                    summary.errors.push(format!("{}: {}", team.name, error));
                }
            }
        }

        emit(
            on_progress,
            SyncProgress::SyncComplete {
                created: summary.created,
                skipped: summary.skipped,
                failed: summary.failed,
            },
        );
        summary
    }

    /// Reconcile a single team.
    pub async fn reconcile_team(
        &self,
        team: &Team,
        on_progress: Option<&ProgressCallback>,
    ) -> TeamOutcome {
        emit(
            on_progress,
            SyncProgress::CreatingTeam {
                name: team.name.clone(),
            },
        );

        let parent_team_id = match self.resolve_parent(team, on_progress).await {
            Ok(id) => id,
            Err(error) => {
                emit(
                    on_progress,
                    SyncProgress::TeamFailed {
                        name: team.name.clone(),
                        error: error.clone(),
                    },
                );
                return TeamOutcome::Failed { error };
            }
        };

        let new_team = NewTeam {
            name: team.name.clone(),
            description: team.description.clone(),
            privacy: team.privacy,
            parent_team_id,
        };

        match self.target.create_team(&new_team).await {
            Ok(_) => {
                tracing::info!(team = %team.name, "created team");
                emit(
                    on_progress,
                    SyncProgress::TeamCreated {
                        name: team.name.clone(),
                    },
                );
            }
            Err(GitHubError::AlreadyExists) if self.options.skip_existing => {
                tracing::info!(team = %team.name, "team already exists, skipping");
                emit(
                    on_progress,
                    SyncProgress::TeamSkipped {
                        name: team.name.clone(),
                    },
                );
                return TeamOutcome::SkippedExisting;
            }
            Err(GitHubError::AlreadyExists) => {
                tracing::info!(team = %team.name, "team already exists, re-attaching");
                emit(
                    on_progress,
                    SyncProgress::TeamAlreadyExists {
                        name: team.name.clone(),
                    },
                );
            }
            Err(e) => {
                tracing::warn!(team = %team.name, error = %e, "unable to create team");
                let error = e.to_string();
                emit(
                    on_progress,
                    SyncProgress::TeamFailed {
                        name: team.name.clone(),
                        error: error.clone(),
                    },
                );
                return TeamOutcome::Failed { error };
            }
        }

        // Let team visibility settle before attaching.
        if !self.options.settle_delay.is_zero() {
            tokio::time::sleep(self.options.settle_delay).await;
        }

        self.attach_repositories(team, on_progress).await;

        if self.options.user_sync {
            self.attach_members(team, on_progress).await;
            self.reconcile_authenticated_user(team, on_progress).await;
        }

        TeamOutcome::Created
    }

    /// Resolve the parent team's target-side id, applying the missing-parent
    /// policy on lookup failure.
    async fn resolve_parent(
        &self,
        team: &Team,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Option<u64>, String> {
        let Some(parent) = team.parent_team_name.as_deref().filter(|p| !p.is_empty()) else {
            return Ok(None);
        };

        match self.target.team_id_by_slug(parent).await {
            Ok(id) => Ok(Some(id)),
            Err(e) => {
                tracing::warn!(
                    team = %team.name,
                    parent = %parent,
                    error = %e,
                    "parent team not found in target organization"
                );
                emit(
                    on_progress,
                    SyncProgress::ParentNotFound {
                        team: team.name.clone(),
                        parent: parent.to_string(),
                    },
                );
                match self.options.on_missing_parent {
                    MissingParentPolicy::CreateWithoutParent => Ok(None),
                    MissingParentPolicy::Fail => {
                        Err(format!("parent team {parent} not found: {e}"))
                    }
                }
            }
        }
    }

    /// Attach every repository grant. Failures are logged per grant and
    /// never abort the team.
    async fn attach_repositories(&self, team: &Team, on_progress: Option<&ProgressCallback>) {
        for grant in &team.repositories {
            match self
                .target
                .add_repository(&team.slug, &grant.name, grant.permission)
                .await
            {
                Ok(()) => {
                    tracing::debug!(
                        team = %team.slug,
                        repository = %grant.name,
                        permission = grant.permission.as_str(),
                        "attached repository"
                    );
                    emit(
                        on_progress,
                        SyncProgress::RepositoryAttached {
                            team: team.slug.clone(),
                            repository: grant.name.clone(),
                            permission: grant.permission.as_str().to_string(),
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        team = %team.slug,
                        repository = %grant.name,
                        permission = grant.permission.as_str(),
                        error = %e,
                        "unable to attach repository"
                    );
                    emit(
                        on_progress,
                        SyncProgress::RepositoryAttachFailed {
                            team: team.slug.clone(),
                            repository: grant.name.clone(),
                            permission: grant.permission.as_str().to_string(),
                            error: e.to_string(),
                        },
                    );
                }
            }
        }
    }

    /// Attach every member with their role. Failures are logged per member
    /// and never abort the team.
    async fn attach_members(&self, team: &Team, on_progress: Option<&ProgressCallback>) {
        for member in &team.members {
            match self
                .target
                .add_member(&team.slug, &member.login, member.role)
                .await
            {
                Ok(()) => {
                    tracing::debug!(
                        team = %team.slug,
                        login = %member.login,
                        role = member.role.as_str(),
                        "attached member"
                    );
                    emit(
                        on_progress,
                        SyncProgress::MemberAttached {
                            team: team.slug.clone(),
                            login: member.login.clone(),
                            role: member.role.as_str().to_string(),
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        team = %team.slug,
                        login = %member.login,
                        error = %e,
                        "unable to attach member"
                    );
                    emit(
                        on_progress,
                        SyncProgress::MemberAttachFailed {
                            team: team.slug.clone(),
                            login: member.login.clone(),
                            error: e.to_string(),
                        },
                    );
                }
            }
        }
    }

    /// Remove the migrating credentials' own identity from the team unless
    /// it belongs to the member set.
    ///
    /// Creating a team adds the acting user to it; leaving that membership
    /// behind would grant the migration actor residual access.
    async fn reconcile_authenticated_user(
        &self,
        team: &Team,
        on_progress: Option<&ProgressCallback>,
    ) {
        let login = match self.target.authenticated_login().await {
            Ok(Some(login)) => login,
            // Identity cannot be determined (e.g. installation token):
            // nothing to reconcile.
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "unable to determine authenticated user");
                return;
            }
        };

        if team.members.iter().any(|m| m.login == login) {
            return;
        }

        match self.target.remove_member(&team.slug, &login).await {
            Ok(()) => {
                tracing::info!(
                    team = %team.slug,
                    login = %login,
                    "removed authenticated user, not part of the member list"
                );
                emit(
                    on_progress,
                    SyncProgress::MemberRemoved {
                        team: team.slug.clone(),
                        login,
                    },
                );
            }
            Err(e) => {
                tracing::warn!(
                    team = %team.slug,
                    login = %login,
                    error = %e,
                    "unable to remove authenticated user from team"
                );
                emit(
                    on_progress,
                    SyncProgress::MemberRemoveFailed {
                        team: team.slug.clone(),
                        login,
                        error: e.to_string(),
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::github::CreatedTeam;
    use crate::team::{Member, RepoPermission, RepositoryGrant, TeamPrivacy, TeamRole};

    /// Recording mock for the target organization.
    #[derive(Default)]
    struct MockTarget {
        /// Call log, e.g. `create:platform`, `repo:platform/api`.
        calls: Mutex<Vec<String>>,
        /// Team names that already exist in the target.
        existing: Mutex<Vec<String>>,
        /// Known parent slugs and their ids.
        parents: Vec<(String, u64)>,
        /// Repositories that report 404 when attached.
        missing_repos: Vec<String>,
        /// The login the target credentials act as.
        authenticated: Option<String>,
        /// Fail every create with an internal error.
        fail_creates: bool,
    }

    impl MockTarget {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl TargetClient for MockTarget {
        async fn create_team(&self, team: &NewTeam) -> Result<CreatedTeam, GitHubError> {
            if self.fail_creates {
                return Err(GitHubError::internal("create failed"));
            }
            let mut existing = self.existing.lock().unwrap();
            if existing.iter().any(|name| name == &team.name) {
                return Err(GitHubError::AlreadyExists);
            }
            existing.push(team.name.clone());
            drop(existing);

            self.record(format!(
                "create:{}:parent={:?}",
                team.name, team.parent_team_id
            ));
            Ok(CreatedTeam {
                id: 1,
                slug: team.name.clone(),
            })
        }

        async fn team_id_by_slug(&self, slug: &str) -> Result<u64, GitHubError> {
            self.parents
                .iter()
                .find(|(s, _)| s == slug)
                .map(|(_, id)| *id)
                .ok_or_else(|| GitHubError::not_found(format!("team {slug}")))
        }

        async fn add_repository(
            &self,
            team_slug: &str,
            repository: &str,
            _permission: RepoPermission,
        ) -> Result<(), GitHubError> {
            if self.missing_repos.iter().any(|r| r == repository) {
                return Err(GitHubError::not_found(repository.to_string()));
            }
            self.record(format!("repo:{team_slug}/{repository}"));
            Ok(())
        }

        async fn add_member(
            &self,
            team_slug: &str,
            login: &str,
            _role: TeamRole,
        ) -> Result<(), GitHubError> {
            self.record(format!("member:{team_slug}/{login}"));
            Ok(())
        }

        async fn remove_member(&self, team_slug: &str, login: &str) -> Result<(), GitHubError> {
            self.record(format!("remove:{team_slug}/{login}"));
            Ok(())
        }

        async fn authenticated_login(&self) -> Result<Option<String>, GitHubError> {
            Ok(self.authenticated.clone())
        }
    }

    fn test_options() -> SyncOptions {
        SyncOptions {
            settle_delay: Duration::ZERO,
            ..SyncOptions::default()
        }
    }

    fn test_team(name: &str) -> Team {
        Team {
            id: format!("id-{name}"),
            name: name.to_string(),
            slug: name.to_string(),
            description: "a team".to_string(),
            privacy: TeamPrivacy::Closed,
            parent_team_id: None,
            parent_team_name: None,
            members: vec![
                Member {
                    login: "alice".to_string(),
                    email: "alice@example.com".to_string(),
                    role: TeamRole::Maintainer,
                },
                Member {
                    login: "bob".to_string(),
                    email: String::new(),
                    role: TeamRole::Member,
                },
            ],
            repositories: vec![
                RepositoryGrant {
                    name: "api".to_string(),
                    permission: RepoPermission::Admin,
                },
                RepositoryGrant {
                    name: "web".to_string(),
                    permission: RepoPermission::Push,
                },
            ],
        }
    }

    #[tokio::test]
    async fn creates_team_then_attaches_grants_and_members() {
        let engine = SyncEngine::new(MockTarget::default(), test_options());
        let outcome = engine.reconcile_team(&test_team("platform"), None).await;

        assert_eq!(outcome, TeamOutcome::Created);
        assert_eq!(
            engine.target.calls(),
            vec![
                "create:platform:parent=None",
                "repo:platform/api",
                "repo:platform/web",
                "member:platform/alice",
                "member:platform/bob",
            ]
        );
    }

    #[tokio::test]
    async fn skip_existing_short_circuits_attachment() {
        let target = MockTarget {
            existing: Mutex::new(vec!["platform".to_string()]),
            ..MockTarget::default()
        };
        let options = SyncOptions {
            skip_existing: true,
            ..test_options()
        };
        let engine = SyncEngine::new(target, options);

        let outcome = engine.reconcile_team(&test_team("platform"), None).await;

        assert_eq!(outcome, TeamOutcome::SkippedExisting);
        assert!(engine.target.calls().is_empty());
    }

    #[tokio::test]
    async fn existing_team_without_skip_reattaches() {
        let target = MockTarget {
            existing: Mutex::new(vec!["platform".to_string()]),
            ..MockTarget::default()
        };
        let engine = SyncEngine::new(target, test_options());

        let outcome = engine.reconcile_team(&test_team("platform"), None).await;

        assert_eq!(outcome, TeamOutcome::Created);
        let calls = engine.target.calls();
        assert!(calls.contains(&"repo:platform/api".to_string()));
        assert!(calls.contains(&"member:platform/bob".to_string()));
        // No create call succeeded.
        assert!(!calls.iter().any(|c| c.starts_with("create:")));
    }

    #[tokio::test]
    async fn create_failure_does_not_block_other_teams() {
        let target = MockTarget {
            fail_creates: true,
            ..MockTarget::default()
        };
        let engine = SyncEngine::new(target, test_options());

        let teams = vec![test_team("one"), test_team("two")];
        let summary = engine.reconcile_all(&teams, None).await;

        assert_eq!(summary.failed, 2);
        assert_eq!(summary.created, 0);
        assert_eq!(summary.errors.len(), 2);
        assert!(summary.errors[0].starts_with("one:"));
        assert!(summary.errors[1].starts_with("two:"));
        // Nothing was attached for failed teams.
        assert!(engine.target.calls().is_empty());
    }

    #[tokio::test]
    async fn parent_resolved_to_target_id() {
        let target = MockTarget {
            parents: vec![("infra".to_string(), 42)],
            ..MockTarget::default()
        };
        let engine = SyncEngine::new(target, test_options());

        let mut team = test_team("platform");
        team.parent_team_name = Some("infra".to_string());

        let outcome = engine.reconcile_team(&team, None).await;
        assert_eq!(outcome, TeamOutcome::Created);
        assert_eq!(engine.target.calls()[0], "create:platform:parent=Some(42)");
    }

    #[tokio::test]
    async fn missing_parent_creates_without_parent_by_default() {
        let engine = SyncEngine::new(MockTarget::default(), test_options());

        let mut team = test_team("platform");
        team.parent_team_name = Some("infra".to_string());

        let outcome = engine.reconcile_team(&team, None).await;
        assert_eq!(outcome, TeamOutcome::Created);
        assert_eq!(engine.target.calls()[0], "create:platform:parent=None");
    }

    #[tokio::test]
    async fn missing_parent_fails_team_under_strict_policy() {
        let options = SyncOptions {
            on_missing_parent: MissingParentPolicy::Fail,
            ..test_options()
        };
        let engine = SyncEngine::new(MockTarget::default(), options);

        let mut team = test_team("platform");
        team.parent_team_name = Some("infra".to_string());

        let outcome = engine.reconcile_team(&team, None).await;
        assert!(matches!(outcome, TeamOutcome::Failed { .. }));
        assert!(engine.target.calls().is_empty());
    }

    #[tokio::test]
    async fn authenticated_user_removed_when_not_a_member() {
        let target = MockTarget {
            authenticated: Some("migrator".to_string()),
            ..MockTarget::default()
        };
        let engine = SyncEngine::new(target, test_options());

        engine.reconcile_team(&test_team("platform"), None).await;

        assert!(
            engine
                .target
                .calls()
                .contains(&"remove:platform/migrator".to_string())
        );
    }

    #[tokio::test]
    async fn authenticated_user_kept_when_a_member() {
        let target = MockTarget {
            authenticated: Some("alice".to_string()),
            ..MockTarget::default()
        };
        let engine = SyncEngine::new(target, test_options());

        engine.reconcile_team(&test_team("platform"), None).await;

        assert!(!engine.target.calls().iter().any(|c| c.starts_with("remove:")));
    }

    #[tokio::test]
    async fn unknown_identity_skips_removal() {
        // authenticated: None models an installation token with no user.
        let engine = SyncEngine::new(MockTarget::default(), test_options());

        engine.reconcile_team(&test_team("platform"), None).await;

        assert!(!engine.target.calls().iter().any(|c| c.starts_with("remove:")));
    }

    #[tokio::test]
    async fn disabled_user_sync_skips_members_and_removal() {
        let target = MockTarget {
            authenticated: Some("migrator".to_string()),
            ..MockTarget::default()
        };
        let options = SyncOptions {
            user_sync: false,
            ..test_options()
        };
        let engine = SyncEngine::new(target, options);

        engine.reconcile_team(&test_team("platform"), None).await;

        let calls = engine.target.calls();
        assert!(calls.contains(&"repo:platform/api".to_string()));
        assert!(!calls.iter().any(|c| c.starts_with("member:")));
        assert!(!calls.iter().any(|c| c.starts_with("remove:")));
    }

    #[tokio::test]
    async fn repository_attach_failure_is_not_fatal() {
        let target = MockTarget {
            missing_repos: vec!["api".to_string()],
            ..MockTarget::default()
        };
        let engine = SyncEngine::new(target, test_options());

        let outcome = engine.reconcile_team(&test_team("platform"), None).await;

        assert_eq!(outcome, TeamOutcome::Created);
        let calls = engine.target.calls();
        assert!(!calls.contains(&"repo:platform/api".to_string()));
        assert!(calls.contains(&"repo:platform/web".to_string()));
        assert!(calls.contains(&"member:platform/alice".to_string()));
    }

    #[tokio::test]
    async fn rerun_with_skip_existing_is_idempotent() {
        let options = SyncOptions {
            skip_existing: true,
            ..test_options()
        };
        let engine = SyncEngine::new(MockTarget::default(), options);
        let teams = vec![test_team("platform"), test_team("infra")];

        let first = engine.reconcile_all(&teams, None).await;
        assert_eq!(first.created, 2);
        let calls_after_first = engine.target.calls().len();

        // Second run: every team already exists, nothing is re-attached.
        let second = engine.reconcile_all(&teams, None).await;
        assert_eq!(second.skipped, 2);
        assert_eq!(second.created, 0);
        assert_eq!(engine.target.calls().len(), calls_after_first);
    }
}
