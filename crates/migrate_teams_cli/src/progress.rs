//! Progress reporting for sync operations.
//!
//! Two modes:
//! - Interactive mode (TTY): animated progress bars using indicatif
//! - Logging mode (non-TTY): structured logging using tracing
//!
//! Bars are organized as a fetch spinner (teams or repository collection)
//! followed by a sync bar tracking per-team reconciliation.

use std::sync::{Arc, Mutex};

use console::Term;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use migrate_teams::{ProgressCallback, SyncProgress};

/// Progress reporter that handles both interactive and logging modes.
pub enum ProgressReporter {
    /// Interactive progress bars for TTY.
    Interactive(InteractiveReporter),
    /// Structured logging for non-TTY (CI, pipes).
    Logging(LoggingReporter),
}

impl ProgressReporter {
    /// Create a new progress reporter, auto-detecting TTY mode.
    pub fn new() -> Self {
        if Term::stdout().is_term() {
            Self::Interactive(InteractiveReporter::new())
        } else {
            Self::Logging(LoggingReporter::new())
        }
    }

    /// Handle a progress event.
    pub fn handle(&self, event: SyncProgress) {
        match self {
            Self::Interactive(r) => r.handle(event),
            Self::Logging(r) => r.handle(event),
        }
    }

    /// Convert to a ProgressCallback for the library.
    pub fn as_callback(self: &Arc<Self>) -> ProgressCallback {
        let reporter = Arc::clone(self);
        Box::new(move |event| {
            reporter.handle(event);
        })
    }

    /// Finish all progress bars (interactive mode only).
    pub fn finish(&self) {
        if let Self::Interactive(r) = self {
            r.finish();
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable bar state under a single lock.
#[derive(Default)]
struct ProgressState {
    /// Spinner for the fetch/collect phase.
    fetch_bar: Option<ProgressBar>,
    /// Bar for the reconcile phase.
    sync_bar: Option<ProgressBar>,
}

/// Interactive progress reporter using indicatif.
pub struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    /// Create a new interactive reporter.
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    /// Handle a progress event.
    pub fn handle(&self, event: SyncProgress) {
        let mut state = self.state.lock().unwrap();

        match event {
            SyncProgress::FetchingTeams { organization } => {
                let pb = self.fetch_spinner();
                pb.set_message(format!("Fetching teams from {organization}..."));
                state.fetch_bar = Some(pb);
            }

            SyncProgress::FetchingTeamDetail { slug } => {
                if let Some(ref pb) = state.fetch_bar {
                    pb.set_message(format!("Fetching team {slug}..."));
                }
            }

            SyncProgress::FetchedTeams { total } => {
                if let Some(ref pb) = state.fetch_bar {
                    pb.finish_with_message(format!("✓ {total} teams fetched"));
                }
            }

            SyncProgress::CollectingRepositoryTeams { repository } => {
                let pb = match state.fetch_bar.take() {
                    Some(pb) => pb,
                    None => self.fetch_spinner(),
                };
                pb.set_message(format!("Fetching teams for {repository}..."));
                state.fetch_bar = Some(pb);
            }

            SyncProgress::RepositoryTeamsCollected {
                total_teams,
                total_members,
            } => {
                if let Some(ref pb) = state.fetch_bar {
                    pb.finish_with_message(format!(
                        "✓ {total_teams} teams ({total_members} members) collected"
                    ));
                }
            }

            SyncProgress::SyncingTeams { count } => {
                let pb = self.multi.add(ProgressBar::new(count as u64));
                pb.set_style(Self::bar_style());
                pb.set_prefix(format!("{:12}", "Syncing"));
                pb.set_message("Creating teams in target organization...");
                state.sync_bar = Some(pb);
            }

            SyncProgress::CreatingTeam { name } => {
                if let Some(ref pb) = state.sync_bar {
                    pb.set_message(name);
                }
            }

            SyncProgress::TeamCreated { name } => {
                if let Some(ref pb) = state.sync_bar {
                    pb.inc(1);
                    pb.set_message(format!("✓ {name}"));
                }
            }

            SyncProgress::TeamAlreadyExists { name } => {
                if let Some(ref pb) = state.sync_bar {
                    pb.inc(1);
                    pb.set_message(format!("· {name} exists, re-attaching"));
                }
            }

            SyncProgress::TeamSkipped { name } => {
                if let Some(ref pb) = state.sync_bar {
                    pb.inc(1);
                    pb.set_message(format!("· {name} exists, skipped"));
                }
            }

            SyncProgress::TeamFailed { name, error } => {
                if let Some(ref pb) = state.sync_bar {
                    pb.inc(1);
                    pb.set_message(format!("✗ {name}: {error}"));
                }
            }

            SyncProgress::ParentNotFound { team, parent } => {
                drop(state);
                self.multi
                    .println(format!("⚠ {team}: parent team {parent} not found"))
                    .ok();
            }

            SyncProgress::RepositoryAttached {
                team, repository, ..
            } => {
                if let Some(ref pb) = state.sync_bar {
                    pb.set_message(format!("{team} ← {repository}"));
                }
            }

            SyncProgress::RepositoryAttachFailed {
                team,
                repository,
                permission,
                error,
            } => {
                drop(state);
                self.multi
                    .println(format!(
                        "⚠ {team}: could not add {repository} ({permission}): {error}"
                    ))
                    .ok();
            }

            SyncProgress::MemberAttached { team, login, .. } => {
                if let Some(ref pb) = state.sync_bar {
                    pb.set_message(format!("{team} ← {login}"));
                }
            }

            SyncProgress::MemberAttachFailed { team, login, error } => {
                drop(state);
                self.multi
                    .println(format!("⚠ {team}: could not add {login}: {error}"))
                    .ok();
            }

            SyncProgress::MemberRemoved { team, login } => {
                if let Some(ref pb) = state.sync_bar {
                    pb.set_message(format!("{team} − {login}"));
                }
            }

            SyncProgress::MemberRemoveFailed { team, login, error } => {
                drop(state);
                self.multi
                    .println(format!("⚠ {team}: could not remove {login}: {error}"))
                    .ok();
            }

            SyncProgress::SyncComplete {
                created,
                skipped,
                failed,
            } => {
                if let Some(ref pb) = state.sync_bar {
                    let msg = if failed > 0 {
                        format!("✓ {created} created, {skipped} skipped, {failed} failed")
                    } else {
                        format!("✓ {created} created, {skipped} skipped")
                    };
                    pb.finish_with_message(msg);
                }
            }

            SyncProgress::Warning { message } => {
                drop(state);
                self.multi.println(format!("⚠ {message}")).ok();
            }

            _ => {}
        }
    }

    /// Finish all progress bars.
    pub fn finish(&self) {
        let state = self.state.lock().unwrap();
        if let Some(ref pb) = state.fetch_bar
            && !pb.is_finished()
        {
            pb.finish();
        }
        if let Some(ref pb) = state.sync_bar
            && !pb.is_finished()
        {
            pb.finish();
        }
    }

    fn fetch_spinner(&self) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(Self::spinner_style());
        pb.set_prefix(format!("{:12}", "Fetching"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {msg}")
            .expect("Invalid template")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>3}/{len:3} {msg}")
            .expect("Invalid template")
            .progress_chars("█▓░")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    /// Create a new logging reporter.
    pub fn new() -> Self {
        Self
    }

    /// Handle a progress event.
    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::FetchingTeams { organization } => {
                tracing::info!(organization = %organization, "Fetching teams");
            }

            SyncProgress::FetchingTeamDetail { slug } => {
                tracing::debug!(team = %slug, "Fetching team detail");
            }

            SyncProgress::FetchedTeams { total } => {
                tracing::info!(total, "Fetch complete");
            }

            SyncProgress::CollectingRepositoryTeams { repository } => {
                tracing::info!(repository = %repository, "Fetching teams for repository");
            }

            SyncProgress::RepositoryTeamsCollected {
                total_teams,
                total_members,
            } => {
                tracing::info!(total_teams, total_members, "Collected teams");
            }

            SyncProgress::SyncingTeams { count } => {
                tracing::info!(count, "Creating teams in target organization");
            }

            SyncProgress::CreatingTeam { name } => {
                tracing::debug!(team = %name, "Creating team");
            }

            SyncProgress::TeamCreated { name } => {
                tracing::info!(team = %name, "Created team");
            }

            SyncProgress::TeamAlreadyExists { name } => {
                tracing::info!(team = %name, "Team exists, re-attaching");
            }

            SyncProgress::TeamSkipped { name } => {
                tracing::info!(team = %name, "Team exists, skipped");
            }

            SyncProgress::TeamFailed { name, error } => {
                tracing::warn!(team = %name, error = %error, "Failed to create team");
            }

            SyncProgress::ParentNotFound { team, parent } => {
                tracing::warn!(team = %team, parent = %parent, "Parent team not found");
            }

            SyncProgress::RepositoryAttached {
                team,
                repository,
                permission,
            } => {
                tracing::info!(team = %team, repository = %repository, permission = %permission, "Attached repository");
            }

            SyncProgress::RepositoryAttachFailed {
                team,
                repository,
                permission,
                error,
            } => {
                tracing::warn!(
                    team = %team,
                    repository = %repository,
                    permission = %permission,
                    error = %error,
                    "Failed to attach repository"
                );
            }

            SyncProgress::MemberAttached { team, login, role } => {
                tracing::info!(team = %team, login = %login, role = %role, "Attached member");
            }

            SyncProgress::MemberAttachFailed { team, login, error } => {
                tracing::warn!(team = %team, login = %login, error = %error, "Failed to attach member");
            }

            SyncProgress::MemberRemoved { team, login } => {
                tracing::info!(team = %team, login = %login, "Removed authenticated user from team");
            }

            SyncProgress::MemberRemoveFailed { team, login, error } => {
                tracing::warn!(team = %team, login = %login, error = %error, "Failed to remove member");
            }

            SyncProgress::SyncComplete {
                created,
                skipped,
                failed,
            } => {
                tracing::info!(created, skipped, failed, "Sync complete");
            }

            SyncProgress::Warning { message } => {
                tracing::warn!(message = %message, "Warning");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
