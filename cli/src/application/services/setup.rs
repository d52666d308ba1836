//! Application service — setup use-case.
//!
//! Creates the application layout, persists its deploy configuration and
//! writes the initial process manifest. Re-running with the same
//! configuration is a no-op success.

use std::path::PathBuf;

use anyhow::Result;

use crate::application::ports::{
    ArtifactFetcher, ConfigStore, DeployHistory, DeployLocker, ManifestWriter, ProcessSupervisor,
    ProgressReporter, ReleaseStore,
};
use crate::application::services::orchestrator::Orchestrator;
use crate::application::services::process::write_manifest;
use crate::domain::ConfigError;
use crate::domain::deploy::SetupRequest;

/// Outcome of the `setup` use-case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// First-time setup.
    Created { manifest: PathBuf },
    /// An identical configuration was already present.
    Unchanged { manifest: PathBuf },
    /// A different configuration was overwritten.
    Replaced { manifest: PathBuf },
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
    /// Initialise an application.
    ///
    /// # Errors
    ///
    /// Returns an `InputError` for an incomplete config and
    /// [`ConfigError::AlreadyInitialized`] when a different config exists and
    /// `req.overwrite` is not set.
    pub async fn setup(
        &self,
        req: &SetupRequest,
        reporter: &impl ProgressReporter,
    ) -> Result<SetupOutcome> {
        req.config.validate()?;
        let layout = self.layout(&req.app);

        reporter.step(&format!("preparing {}...", layout.base().display()));
        let _guard = self.locks.acquire(&layout).await?;
        self.releases.ensure_layout(&layout)?;

        let existing = if self.config.exists(&layout) {
            match self.config.load(&layout) {
                Ok(existing) => Some(Some(existing)),
                // A corrupt config counts as "different": only --force replaces it.
                Err(e) => {
                    tracing::warn!(app = %req.app, error = %e, "existing config unreadable");
                    Some(None)
                }
            }
        } else {
            None
        };

        let unchanged = matches!(&existing, Some(Some(cfg)) if *cfg == req.config);
        if existing.is_some() && !unchanged && !req.overwrite {
            return Err(ConfigError::AlreadyInitialized {
                app: req.app.to_string(),
            }
            .into());
        }
        if !unchanged {
            self.config
                .initialize(&layout, &req.config, existing.is_some())?;
        }

        let current = self.releases.current(&layout)?;
        let cwd = current.map_or_else(|| layout.current_link(), |r| r.path);
        let manifest = write_manifest(&self.manifests, &layout, &req.config, &cwd)?;

        let outcome = match (existing.is_some(), unchanged) {
            (false, _) => SetupOutcome::Created { manifest },
            (true, true) => SetupOutcome::Unchanged { manifest },
            (true, false) => SetupOutcome::Replaced { manifest },
        };
        tracing::info!(app = %req.app, outcome = ?outcome, "setup complete");
        reporter.success(&format!("{} is set up", req.app));
        Ok(outcome)
    }
}
