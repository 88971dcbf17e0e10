//! Integration tests for the reconciliation engine.
//!
//! These tests drive the full engine against a recording mock target and
//! ensure runs complete within a timeout (a hang here would point at the
//! settle delay or retry plumbing).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use migrate_teams::github::{CreatedTeam, NewTeam};
use migrate_teams::sync::filter_team_repositories;
use migrate_teams::{
    GitHubError, Mapper, Mapping, Member, MissingParentPolicy, ProgressCallback, RepoPermission,
    RepositoryGrant, SyncEngine, SyncOptions, SyncProgress, TargetClient, Team, TeamOutcome,
    TeamPrivacy, TeamRole,
};

/// Maximum time any reconciliation should take in tests.
const SYNC_TIMEOUT: Duration = Duration::from_secs(10);

/// A mock target organization that records every write.
#[derive(Default)]
struct RecordingTarget {
    /// Teams that exist in the target, by name.
    teams: Mutex<HashMap<String, u64>>,
    /// Attached (team, repository, permission) triples.
    grants: Mutex<Vec<(String, String, String)>>,
    /// Attached (team, login, role) triples.
    memberships: Mutex<Vec<(String, String, String)>>,
    /// Removed (team, login) pairs.
    removals: Mutex<Vec<(String, String)>>,
    /// The login the credentials act as.
    authenticated: Option<String>,
}

#[async_trait]
impl TargetClient for RecordingTarget {
    async fn create_team(&self, team: &NewTeam) -> Result<CreatedTeam, GitHubError> {
        let mut teams = self.teams.lock().unwrap();
        if teams.contains_key(&team.name) {
            return Err(GitHubError::AlreadyExists);
        }
        let id = teams.len() as u64 + 1;
        teams.insert(team.name.clone(), id);
        Ok(CreatedTeam {
            id,
            slug: team.name.clone(),
        })
    }

    async fn team_id_by_slug(&self, slug: &str) -> Result<u64, GitHubError> {
        self.teams
            .lock()
            .unwrap()
            .get(slug)
            .copied()
            .ok_or_else(|| GitHubError::not_found(format!("team {slug}")))
    }

    async fn add_repository(
        &self,
        team_slug: &str,
        repository: &str,
        permission: RepoPermission,
    ) -> Result<(), GitHubError> {
        self.grants.lock().unwrap().push((
            team_slug.to_string(),
            repository.to_string(),
            permission.as_str().to_string(),
        ));
        Ok(())
    }

    async fn add_member(
        &self,
        team_slug: &str,
        login: &str,
        role: TeamRole,
    ) -> Result<(), GitHubError> {
        self.memberships.lock().unwrap().push((
            team_slug.to_string(),
            login.to_string(),
            role.as_str().to_string(),
        ));
        Ok(())
    }

    async fn remove_member(&self, team_slug: &str, login: &str) -> Result<(), GitHubError> {
        self.removals
            .lock()
            .unwrap()
            .push((team_slug.to_string(), login.to_string()));
        Ok(())
    }

    async fn authenticated_login(&self) -> Result<Option<String>, GitHubError> {
        Ok(self.authenticated.clone())
    }
}

fn team(name: &str, members: &[&str], repos: &[&str]) -> Team {
    Team {
        id: format!("id-{name}"),
        name: name.to_string(),
        slug: name.to_string(),
        description: format!("{name} team"),
        privacy: TeamPrivacy::Closed,
        parent_team_id: None,
        parent_team_name: None,
        members: members
            .iter()
            .map(|login| Member {
                login: login.to_string(),
                email: format!("{login}@example.com"),
                role: TeamRole::Member,
            })
            .collect(),
        repositories: repos
            .iter()
            .map(|repo| RepositoryGrant {
                name: repo.to_string(),
                permission: RepoPermission::Push,
            })
            .collect(),
    }
}

fn fast_options() -> SyncOptions {
    SyncOptions {
        settle_delay: Duration::ZERO,
        ..SyncOptions::default()
    }
}

#[tokio::test]
async fn full_run_attaches_everything_once() {
    let teams = vec![
        team("platform", &["alice", "bob"], &["api", "web"]),
        team("infra", &["carol"], &["terraform"]),
    ];
    let engine = SyncEngine::new(RecordingTarget::default(), fast_options());

    let summary = tokio::time::timeout(SYNC_TIMEOUT, engine.reconcile_all(&teams, None))
        .await
        .expect("reconciliation timed out");

    assert_eq!(summary.created, 2);
    assert!(summary.is_clean());
}

#[tokio::test]
async fn second_run_with_skip_existing_adds_no_duplicates() {
    let teams = vec![
        team("platform", &["alice", "bob"], &["api"]),
        team("infra", &["carol"], &["terraform"]),
    ];
    let options = SyncOptions {
        skip_existing: true,
        ..fast_options()
    };
    let engine = SyncEngine::new(RecordingTarget::default(), options);

    let first = tokio::time::timeout(SYNC_TIMEOUT, engine.reconcile_all(&teams, None))
        .await
        .expect("first run timed out");
    assert_eq!(first.created, 2);

    let grants_after_first = engine_grants(&engine);
    let memberships_after_first = engine_memberships(&engine);

    let second = tokio::time::timeout(SYNC_TIMEOUT, engine.reconcile_all(&teams, None))
        .await
        .expect("second run timed out");
    assert_eq!(second.skipped, 2);
    assert_eq!(second.created, 0);

    // No duplicate grants or memberships from the re-run.
    assert_eq!(engine_grants(&engine), grants_after_first);
    assert_eq!(engine_memberships(&engine), memberships_after_first);
}

#[tokio::test]
async fn child_team_resolves_parent_created_earlier_in_the_pass() {
    // Parent first, child second: fetch order means the child can resolve
    // the parent's freshly created id.
    let parent = team("infra", &[], &[]);
    let mut child = team("infra-oncall", &["alice"], &[]);
    child.parent_team_name = Some("infra".to_string());

    let engine = SyncEngine::new(RecordingTarget::default(), fast_options());
    let summary = tokio::time::timeout(
        SYNC_TIMEOUT,
        engine.reconcile_all(&[parent, child], None),
    )
    .await
    .expect("reconciliation timed out");

    assert_eq!(summary.created, 2);
    assert!(summary.is_clean());
}

#[tokio::test]
async fn strict_parent_policy_fails_orphan_but_not_others() {
    let mut orphan = team("orphan", &[], &[]);
    orphan.parent_team_name = Some("ghost".to_string());
    let plain = team("plain", &["alice"], &[]);

    let options = SyncOptions {
        on_missing_parent: MissingParentPolicy::Fail,
        ..fast_options()
    };
    let engine = SyncEngine::new(RecordingTarget::default(), options);

    let summary = tokio::time::timeout(
        SYNC_TIMEOUT,
        engine.reconcile_all(&[orphan, plain], None),
    )
    .await
    .expect("reconciliation timed out");

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.created, 1);
    assert!(summary.errors[0].contains("ghost"));
}

#[tokio::test]
async fn migrating_actor_is_removed_from_teams_it_does_not_belong_to() {
    let target = RecordingTarget {
        authenticated: Some("migrator".to_string()),
        ..RecordingTarget::default()
    };
    let engine = SyncEngine::new(target, fast_options());

    let teams = vec![
        team("platform", &["alice"], &[]),
        team("bots", &["migrator"], &[]),
    ];
    tokio::time::timeout(SYNC_TIMEOUT, engine.reconcile_all(&teams, None))
        .await
        .expect("reconciliation timed out");

    let removals = removals(&engine);
    assert_eq!(
        removals,
        vec![("platform".to_string(), "migrator".to_string())]
    );
}

#[tokio::test]
async fn mapped_logins_flow_through_to_membership_calls() {
    // Mapping (alice -> alice2); bob is absent and passes through.
    let mapper = Mapper::new().with_member_mapping(Mapping::from_pairs([(
        "alice".to_string(),
        "alice2".to_string(),
    )]));
    let mapped: Vec<Team> = [team("platform", &["alice", "bob"], &[])]
        .iter()
        .map(|t| mapper.map_team(t, "octo-org"))
        .collect();

    let engine = SyncEngine::new(RecordingTarget::default(), fast_options());
    tokio::time::timeout(SYNC_TIMEOUT, engine.reconcile_all(&mapped, None))
        .await
        .expect("reconciliation timed out");

    let logins: Vec<String> = engine_memberships(&engine)
        .into_iter()
        .map(|(_, login, _)| login)
        .collect();
    assert_eq!(logins, vec!["alice2", "bob"]);
}

#[tokio::test]
async fn filtered_teams_only_attach_allowed_grants() {
    let full = team("platform", &["alice"], &["api", "web", "docs"]);
    let allowed = vec!["octo-org/api".to_string(), "octo-org/docs".to_string()];
    let filtered = filter_team_repositories(&full, &allowed);

    let engine = SyncEngine::new(RecordingTarget::default(), fast_options());
    tokio::time::timeout(
        SYNC_TIMEOUT,
        engine.reconcile_all(std::slice::from_ref(&filtered), None),
    )
    .await
    .expect("reconciliation timed out");

    let repos: Vec<String> = engine_grants(&engine)
        .into_iter()
        .map(|(_, repo, _)| repo)
        .collect();
    assert_eq!(repos, vec!["api", "docs"]);
}

#[tokio::test]
async fn progress_events_cover_every_failure_path() {
    // A target where creates always fail: every team must surface a
    // TeamFailed event, never a silent drop.
    struct FailingTarget;

    #[async_trait]
    impl TargetClient for FailingTarget {
        async fn create_team(&self, _team: &NewTeam) -> Result<CreatedTeam, GitHubError> {
            Err(GitHubError::internal("boom"))
        }
        async fn team_id_by_slug(&self, slug: &str) -> Result<u64, GitHubError> {
            Err(GitHubError::not_found(slug.to_string()))
        }
        async fn add_repository(
            &self,
            _: &str,
            _: &str,
            _: RepoPermission,
        ) -> Result<(), GitHubError> {
            Ok(())
        }
        async fn add_member(&self, _: &str, _: &str, _: TeamRole) -> Result<(), GitHubError> {
            Ok(())
        }
        async fn remove_member(&self, _: &str, _: &str) -> Result<(), GitHubError> {
            Ok(())
        }
        async fn authenticated_login(&self) -> Result<Option<String>, GitHubError> {
            Ok(None)
        }
    }

    let events: Arc<Mutex<Vec<SyncProgress>>> = Arc::new(Mutex::new(Vec::new()));
    let events_capture = Arc::clone(&events);
    let callback: ProgressCallback = Box::new(move |event| {
        events_capture.lock().unwrap().push(event);
    });

    let engine = SyncEngine::new(FailingTarget, fast_options());
    let teams = vec![team("one", &[], &[]), team("two", &[], &[])];
    let summary = tokio::time::timeout(
        SYNC_TIMEOUT,
        engine.reconcile_all(&teams, Some(&callback)),
    )
    .await
    .expect("reconciliation timed out");

    assert_eq!(summary.failed, 2);

    let events = events.lock().unwrap();
    let failed: Vec<&SyncProgress> = events
        .iter()
        .filter(|e| matches!(e, SyncProgress::TeamFailed { .. }))
        .collect();
    assert_eq!(failed.len(), 2);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, SyncProgress::SyncComplete { failed: 2, .. }))
    );
}

#[tokio::test]
async fn outcomes_are_reported_per_team() {
    let engine = SyncEngine::new(RecordingTarget::default(), fast_options());
    let platform = team("platform", &[], &[]);

    let outcome = engine.reconcile_team(&platform, None).await;
    assert_eq!(outcome, TeamOutcome::Created);

    // Reconciling again without skip-existing re-attaches.
    let outcome = engine.reconcile_team(&platform, None).await;
    assert_eq!(outcome, TeamOutcome::Created);
}

// Accessors for the recording target behind the engine.

fn engine_grants(engine: &SyncEngine<RecordingTarget>) -> Vec<(String, String, String)> {
    target_of(engine).grants.lock().unwrap().clone()
}

fn engine_memberships(engine: &SyncEngine<RecordingTarget>) -> Vec<(String, String, String)> {
    target_of(engine).memberships.lock().unwrap().clone()
}

fn removals(engine: &SyncEngine<RecordingTarget>) -> Vec<(String, String)> {
    target_of(engine).removals.lock().unwrap().clone()
}

fn target_of(engine: &SyncEngine<RecordingTarget>) -> &RecordingTarget {
    engine.target()
}
