//! Application service — rollback use-case.
//!
//! `Start → PriorFound → Stopped → Promoted → Started → Logged`. Nothing is
//! fetched or installed; the target must already be an installed release.

use anyhow::Result;

use crate::application::ports::{
    ArtifactFetcher, ConfigStore, DeployHistory, DeployLocker, ManifestWriter, ProcessSupervisor,
    ProgressReporter, ReleaseStore,
};
use crate::application::services::orchestrator::{Orchestrator, failure_outcome};
use crate::application::services::process::{start_release, stop_app};
use crate::domain::deploy::{RollbackRequest, RollbackState, Stage, StageFailure, StateMachine};
use crate::domain::history::{Action, DeploymentLogEntry, Outcome};
use crate::domain::{AppLayout, Release, ReleaseError, ReleaseId};

/// Outcome of a successful `rollback`.
#[derive(Debug)]
pub enum RollbackOutcome {
    /// `release` is now current and running.
    RolledBack {
        release: Release,
        /// Release that was current before, if any.
        from: Option<ReleaseId>,
    },
    /// The requested target was already current; nothing changed.
    AlreadyCurrent { release: Release },
}

impl RollbackOutcome {
    #[must_use]
    pub fn release(&self) -> &Release {
        match self {
            Self::RolledBack { release, .. } | Self::AlreadyCurrent { release } => release,
        }
    }
}

type Step<T> = std::result::Result<T, StageFailure<RollbackState>>;

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
    /// Re-activate the previous installed release (or `req.target`).
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::NoPriorRelease`] when there is nothing to roll
    /// back to, [`ReleaseError::NotInstalled`] for an unknown target, or a
    /// process error if the target does not start.
    pub async fn rollback(
        &self,
        req: &RollbackRequest,
        reporter: &impl ProgressReporter,
    ) -> Result<RollbackOutcome> {
        let layout = self.layout(&req.app);
        self.require_initialized(&layout)?;
        let requested = req.target.as_ref().map(ReleaseId::as_str);

        let _guard = match self.locks.acquire(&layout).await {
            Ok(guard) => guard,
            Err(e) => {
                let entry =
                    DeploymentLogEntry::new(Action::Rollback, requested, Outcome::Failed, &req.actor)
                        .with_failure("lock", format!("{e:#}"));
                self.record(&layout, &entry, reporter);
                return Err(e);
            }
        };

        let mut machine = StateMachine::<RollbackState>::new();
        let mut target_id = req.target.clone();
        let result = self
            .run_rollback(&layout, req, &mut machine, &mut target_id, reporter)
            .await;
        let logged_id = target_id.as_ref().map(ReleaseId::as_str);

        match result {
            Ok(outcome) => {
                let recorded = match &outcome {
                    RollbackOutcome::RolledBack { .. } => Outcome::Success,
                    RollbackOutcome::AlreadyCurrent { .. } => Outcome::AlreadyCurrent,
                };
                let entry =
                    DeploymentLogEntry::new(Action::Rollback, logged_id, recorded, &req.actor);
                self.record(&layout, &entry, reporter);
                if machine.attempting() == Some(RollbackState::Logged) {
                    machine.advance(RollbackState::Logged);
                }
                tracing::info!(app = %req.app, release = ?logged_id, outcome = %recorded, "rollback finished");
                Ok(outcome)
            }
            Err(StageFailure { stage, error }) => {
                let outcome = failure_outcome(&error);
                let entry =
                    DeploymentLogEntry::new(Action::Rollback, logged_id, outcome, &req.actor)
                        .with_failure(stage.label(), format!("{error:#}"));
                self.record(&layout, &entry, reporter);
                tracing::warn!(app = %req.app, stage = stage.label(), %outcome, "rollback failed");
                Err(error)
            }
        }
    }

    async fn run_rollback(
        &self,
        layout: &AppLayout,
        req: &RollbackRequest,
        machine: &mut StateMachine<RollbackState>,
        target_id: &mut Option<ReleaseId>,
        reporter: &impl ProgressReporter,
    ) -> Step<RollbackOutcome> {
        // ── Find prior ───────────────────────────────────────────────────────
        let config = self.config.load(layout).map_err(|e| machine.fail(e))?;
        let current = self.releases.current(layout).map_err(|e| machine.fail(e))?;

        let target = match &req.target {
            Some(id) => self
                .releases
                .find(layout, id)
                .map_err(|e| machine.fail(e))?
                .filter(Release::is_installed)
                .ok_or_else(|| machine.fail(ReleaseError::NotInstalled(id.to_string())))?,
            None => self.releases.previous(layout).map_err(|e| machine.fail(e))?,
        };
        *target_id = Some(target.id.clone());

        if current.as_ref().is_some_and(|c| c.id == target.id) {
            reporter.success(&format!("release {} is already current", target.id));
            return Ok(RollbackOutcome::AlreadyCurrent { release: target });
        }
        machine.advance(RollbackState::PriorFound);

        // ── Stop ─────────────────────────────────────────────────────────────
        reporter.step(&format!("stopping {}...", layout.name()));
        let was_running = stop_app(&self.supervisor, layout)
            .await
            .map_err(|e| machine.fail(e))?;
        machine.advance(RollbackState::Stopped);

        // ── Promote ──────────────────────────────────────────────────────────
        if let Err(e) = self.releases.promote(layout, &target) {
            self.resume_after_failed_promote(layout, &config, current.as_ref(), was_running, reporter)
                .await;
            return Err(machine.fail(e));
        }
        machine.advance(RollbackState::Promoted);

        // ── Start ────────────────────────────────────────────────────────────
        reporter.step(&format!("starting {} at {}...", layout.name(), target.id));
        if let Err(cause) =
            start_release(&self.supervisor, &self.manifests, layout, &config, &target).await
        {
            let err = self
                .recover_failed_start(layout, &config, &target, current.as_ref(), &cause, reporter)
                .await;
            return Err(machine.fail(err));
        }
        machine.advance(RollbackState::Started);
        reporter.success(&format!("{} is running release {}", layout.name(), target.id));

        Ok(RollbackOutcome::RolledBack {
            release: target,
            from: current.map(|c| c.id),
        })
    }
}
