//! Release orchestrator — the port bundle shared by `setup`, `deploy`,
//! `rollback` and `status`, plus the recovery steps they have in common.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::application::ports::{
    ArtifactFetcher, ConfigStore, DeployHistory, DeployLocker, ManifestWriter, ProcessSupervisor,
    ProgressReporter, ReleaseStore,
};
use crate::application::services::process::start_release;
use crate::domain::history::{DeploymentLogEntry, Outcome};
use crate::domain::{AppLayout, AppName, ConfigError, DeployConfig, ProcessError, Release};

/// Scratch entries and staging trees older than this are swept.
pub const DEFAULT_HOUSEKEEPING_GRACE: Duration = Duration::from_secs(10 * 60);

/// Composes every port the orchestration use-cases need.
///
/// Fields are public so the presentation layer (and tests) can reach
/// individual ports, e.g. to ask the config store whether setup would
/// overwrite anything.
pub struct Orchestrator<C, F, R, P, M, H, L> {
    /// Directory holding one base directory per application.
    pub root: PathBuf,
    pub config: C,
    pub fetcher: F,
    pub releases: R,
    pub supervisor: P,
    pub manifests: M,
    pub history: H,
    pub locks: L,
    pub housekeeping_grace: Duration,
}

impl<C, F, R, P, M, H, L> Orchestrator<C, F, R, P, M, H, L>
where
    C: ConfigStore,
    F: ArtifactFetcher,
    R: ReleaseStore,
    P: ProcessSupervisor,
    M: ManifestWriter,
    H: DeployHistory,
    L: DeployLocker,
{
    /// Layout of `app` under this orchestrator's root.
    #[must_use]
    pub fn layout(&self, app: &AppName) -> AppLayout {
        AppLayout::new(&self.root, app)
    }

    /// Fail with `NotInitialized` unless `setup` has run for `layout`.
    ///
    /// Checked before the lock is taken: without a base directory there is
    /// nowhere to put the lock file or the history entry.
    pub(crate) fn require_initialized(&self, layout: &AppLayout) -> Result<()> {
        if self.config.exists(layout) {
            Ok(())
        } else {
            Err(ConfigError::NotInitialized {
                app: layout.name().to_string(),
            }
            .into())
        }
    }

    /// Append `entry` to the history. A write failure does not change the
    /// outcome of the operation it describes; it is surfaced as a warning.
    pub(crate) fn record(
        &self,
        layout: &AppLayout,
        entry: &DeploymentLogEntry,
        reporter: &impl ProgressReporter,
    ) {
        if let Err(e) = self.history.append(layout, entry) {
            tracing::warn!(app = %layout.name(), error = %e, "failed to append deployment history");
            reporter.warn(&format!("could not record deployment history: {e:#}"));
        }
    }

    /// Restart the previously current release after the pointer could not be
    /// moved. The pointer was never changed, so the old tree is still current.
    pub(crate) async fn resume_after_failed_promote(
        &self,
        layout: &AppLayout,
        config: &DeployConfig,
        old: Option<&Release>,
        was_running: bool,
        reporter: &impl ProgressReporter,
    ) {
        let Some(old) = old.filter(|_| was_running) else {
            return;
        };
        reporter.step(&format!("restarting release {}...", old.id));
        if let Err(e) =
            start_release(&self.supervisor, &self.manifests, layout, config, old).await
        {
            tracing::warn!(release = %old.id, error = %e, "restart after failed promote failed");
            reporter.warn(&format!("release {} could not be restarted: {e:#}", old.id));
        }
    }

    /// Repoint at `restore_to` and start it after `failed` would not start.
    ///
    /// Returns the error describing the terminal state: recovered
    /// ([`ProcessError::StartFailedRecovered`]) or down
    /// ([`ProcessError::RecoveryFailed`]).
    pub(crate) async fn recover_failed_start(
        &self,
        layout: &AppLayout,
        config: &DeployConfig,
        failed: &Release,
        restore_to: Option<&Release>,
        cause: &anyhow::Error,
        reporter: &impl ProgressReporter,
    ) -> anyhow::Error {
        let app = layout.name().to_string();
        let Some(target) = restore_to else {
            return ProcessError::RecoveryFailed {
                app,
                release: failed.id.to_string(),
                detail: format!("{cause:#}; no previous release to restore"),
            }
            .into();
        };

        reporter.warn(&format!(
            "release {} failed to start, restoring {}",
            failed.id, target.id
        ));
        tracing::warn!(failed = %failed.id, restore = %target.id, "automatic rollback");

        let restored = match self.releases.promote(layout, target) {
            Ok(()) => start_release(&self.supervisor, &self.manifests, layout, config, target).await,
            Err(e) => Err(e),
        };
        match restored {
            Ok(()) => ProcessError::StartFailedRecovered {
                release: failed.id.to_string(),
                restored: target.id.to_string(),
                cause: format!("{cause:#}"),
            }
            .into(),
            Err(e) => ProcessError::RecoveryFailed {
                app,
                release: failed.id.to_string(),
                detail: format!("{cause:#}; restoring {} failed: {e:#}", target.id),
            }
            .into(),
        }
    }
}

/// History outcome for an error that ended a `deploy` or `rollback`.
#[must_use]
pub fn failure_outcome(err: &anyhow::Error) -> Outcome {
    for cause in err.chain() {
        match cause.downcast_ref::<ProcessError>() {
            Some(ProcessError::StartFailedRecovered { .. }) => return Outcome::RolledBack,
            Some(ProcessError::RecoveryFailed { .. }) => return Outcome::Fatal,
            _ => {}
        }
    }
    Outcome::Failed
}
