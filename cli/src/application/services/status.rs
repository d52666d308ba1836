//! Application service — read-only status of one application.
//!
//! Takes no lock: a status read racing a deploy may see the old or the new
//! release, never a partial one.

use anyhow::Result;
use serde::Serialize;

use crate::application::ports::{
    ArtifactFetcher, ConfigStore, DeployHistory, DeployLocker, ManifestWriter, ProcessState,
    ProcessSupervisor, ReleaseStore,
};
use crate::application::services::orchestrator::Orchestrator;
use crate::domain::{AppName, Release, ReleaseId};

/// History lines included in a status report.
pub const STATUS_HISTORY_LINES: usize = 5;

/// Snapshot of an application.
#[derive(Debug, Clone, Serialize)]
pub struct AppStatus {
    pub app: String,
    pub source: String,
    pub script: String,
    pub current: Option<ReleaseId>,
    /// Installed releases, newest first.
    pub releases: Vec<Release>,
    pub process: ProcessState,
    /// Most recent deployment history lines, oldest first.
    pub history: Vec<String>,
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
    /// Collect the status of `app`.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` / `Corrupt` if the app has no usable config,
    /// or an error if the release directory cannot be read.
    pub async fn status(&self, app: &AppName) -> Result<AppStatus> {
        let layout = self.layout(app);
        self.require_initialized(&layout)?;
        let config = self.config.load(&layout)?;

        let current = self.releases.current(&layout)?.map(|r| r.id);
        let releases = self.releases.list(&layout)?;

        let process = match self.supervisor.status(app.as_str()).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(%app, error = %e, "supervisor status unavailable");
                ProcessState::Other("unknown".to_string())
            }
        };
        let history = self
            .history
            .tail(&layout, STATUS_HISTORY_LINES)
            .unwrap_or_else(|e| {
                tracing::warn!(%app, error = %e, "deployment history unreadable");
                Vec::new()
            });

        Ok(AppStatus {
            app: app.to_string(),
            source: config.source,
            script: config.script,
            current,
            releases,
            process,
            history,
        })
    }
}
