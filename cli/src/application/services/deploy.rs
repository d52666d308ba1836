//! Application service — deploy use-case.
//!
//! Moves an application from its current release to a newly fetched one:
//! `Start → ConfigLoaded → Fetched → Installed → Stopped → Promoted →
//! Started → Logged`. Before `Promoted` the current pointer is untouched;
//! from `Promoted` on, a start failure triggers an automatic rollback.

use anyhow::Result;

use crate::application::ports::{
    ArtifactFetcher, ConfigStore, DeployHistory, DeployLocker, InstallOutcome, ManifestWriter,
    ProcessSupervisor, ProgressReporter, ReleaseStore,
};
use crate::application::services::housekeeping::{HousekeepingReport, housekeep};
use crate::application::services::orchestrator::{Orchestrator, failure_outcome};
use crate::application::services::process::{start_release, stop_app};
use crate::domain::deploy::{DeployRequest, DeployState, Stage, StageFailure, StateMachine};
use crate::domain::history::{Action, DeploymentLogEntry, Outcome};
use crate::domain::{AppLayout, Release, ReleaseError, ReleaseId};

/// Outcome of a successful `deploy`.
#[derive(Debug)]
pub enum DeployOutcome {
    /// The release is current and running.
    Deployed {
        release: Release,
        /// Release that was current before, if any.
        previous: Option<ReleaseId>,
        housekeeping: HousekeepingReport,
    },
    /// The requested release was already current; nothing changed.
    AlreadyCurrent { release: Release },
}

impl DeployOutcome {
    #[must_use]
    pub fn release(&self) -> &Release {
        match self {
            Self::Deployed { release, .. } | Self::AlreadyCurrent { release } => release,
        }
    }
}

type Step<T> = std::result::Result<T, StageFailure<DeployState>>;

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
    /// Deploy `req.release`, holding the application's deploy lock throughout.
    ///
    /// Every terminal outcome, success or failure, is appended to the
    /// deployment history.
    ///
    /// # Errors
    ///
    /// Returns a typed domain error describing the failed stage; see
    /// [`crate::domain::ErrorClass`] for how it is classified.
    pub async fn deploy(
        &self,
        req: &DeployRequest,
        reporter: &impl ProgressReporter,
    ) -> Result<DeployOutcome> {
        let layout = self.layout(&req.app);
        self.require_initialized(&layout)?;

        let _guard = match self.locks.acquire(&layout).await {
            Ok(guard) => guard,
            Err(e) => {
                let entry = DeploymentLogEntry::new(
                    Action::Deploy,
                    Some(req.release.as_str()),
                    Outcome::Failed,
                    &req.actor,
                )
                .with_failure("lock", format!("{e:#}"));
                self.record(&layout, &entry, reporter);
                return Err(e);
            }
        };

        let mut machine = StateMachine::<DeployState>::new();
        let result = self.run_deploy(&layout, req, &mut machine, reporter).await;

        match result {
            Ok(outcome) => {
                let recorded = match outcome {
                    DeployOutcome::Deployed { .. } => Outcome::Success,
                    DeployOutcome::AlreadyCurrent { .. } => Outcome::AlreadyCurrent,
                };
                let entry = DeploymentLogEntry::new(
                    Action::Deploy,
                    Some(req.release.as_str()),
                    recorded,
                    &req.actor,
                );
                self.record(&layout, &entry, reporter);
                if machine.attempting() == Some(DeployState::Logged) {
                    machine.advance(DeployState::Logged);
                }
                tracing::info!(app = %req.app, release = %req.release, outcome = %recorded, "deploy finished");
                Ok(outcome)
            }
            Err(StageFailure { stage, error }) => {
                let outcome = failure_outcome(&error);
                let entry = DeploymentLogEntry::new(
                    Action::Deploy,
                    Some(req.release.as_str()),
                    outcome,
                    &req.actor,
                )
                .with_failure(stage.label(), format!("{error:#}"));
                self.record(&layout, &entry, reporter);
                tracing::warn!(
                    app = %req.app,
                    release = %req.release,
                    stage = stage.label(),
                    %outcome,
                    "deploy failed"
                );
                Err(error)
            }
        }
    }

    async fn run_deploy(
        &self,
        layout: &AppLayout,
        req: &DeployRequest,
        machine: &mut StateMachine<DeployState>,
        reporter: &impl ProgressReporter,
    ) -> Step<DeployOutcome> {
        let id = &req.release;

        // ── Load config ──────────────────────────────────────────────────────
        let config = self.config.load(layout).map_err(|e| machine.fail(e))?;
        machine.advance(DeployState::ConfigLoaded);

        let current = self.releases.current(layout).map_err(|e| machine.fail(e))?;
        // A directory without installed metadata is left over from a failed
        // install; the store replaces it below.
        let existing = self
            .releases
            .find(layout, id)
            .map_err(|e| machine.fail(e))?
            .filter(Release::is_installed);
        if let Some(existing) = existing {
            if current.as_ref().is_some_and(|c| c.id == *id) {
                reporter.success(&format!("release {id} is already current"));
                return Ok(DeployOutcome::AlreadyCurrent { release: existing });
            }
            return Err(machine.fail(ReleaseError::AlreadyExists(id.to_string())));
        }

        // ── Fetch ────────────────────────────────────────────────────────────
        reporter.step(&format!("fetching {} {id}...", config.source));
        let artifact = self
            .fetcher
            .fetch(&config.source, id, &layout.scratch_dir())
            .await
            .map_err(|e| machine.fail(e))?;
        machine.advance(DeployState::Fetched);

        // ── Install ──────────────────────────────────────────────────────────
        reporter.step(&format!("installing release {id}..."));
        let installed = self
            .releases
            .install(layout, id, &artifact)
            .await
            .map_err(|e| machine.fail(e))?;
        drop(artifact);
        let release = match installed {
            InstallOutcome::Installed(release) => release,
            InstallOutcome::AlreadyCurrent(release) => {
                return Ok(DeployOutcome::AlreadyCurrent { release });
            }
        };
        machine.advance(DeployState::Installed);

        // ── Stop ─────────────────────────────────────────────────────────────
        reporter.step(&format!("stopping {}...", layout.name()));
        let was_running = stop_app(&self.supervisor, layout)
            .await
            .map_err(|e| machine.fail(e))?;
        machine.advance(DeployState::Stopped);

        // ── Promote ──────────────────────────────────────────────────────────
        if let Err(e) = self.releases.promote(layout, &release) {
            self.resume_after_failed_promote(layout, &config, current.as_ref(), was_running, reporter)
                .await;
            return Err(machine.fail(e));
        }
        machine.advance(DeployState::Promoted);

        // ── Start ────────────────────────────────────────────────────────────
        reporter.step(&format!("starting {} at {id}...", layout.name()));
        if let Err(cause) =
            start_release(&self.supervisor, &self.manifests, layout, &config, &release).await
        {
            let err = self
                .recover_failed_start(layout, &config, &release, current.as_ref(), &cause, reporter)
                .await;
            return Err(machine.fail(err));
        }
        machine.advance(DeployState::Started);
        reporter.success(&format!("{} is running release {id}", layout.name()));

        // ── Housekeeping ─────────────────────────────────────────────────────
        let housekeeping =
            match housekeep(&self.releases, layout, req.keep, self.housekeeping_grace) {
                Ok(report) => report,
                Err(e) => {
                    tracing::warn!(app = %layout.name(), error = %e, "housekeeping failed");
                    reporter.warn(&format!("housekeeping failed: {e:#}"));
                    HousekeepingReport::default()
                }
            };

        Ok(DeployOutcome::Deployed {
            release,
            previous: current.map(|c| c.id),
            housekeeping,
        })
    }
}
