//! Process controller — stop and start the managed application through the
//! supervisor, regenerating the manifest before every start.

use anyhow::{Context, Result};

use crate::application::ports::{ManifestWriter, ProcessState, ProcessSupervisor};
use crate::domain::manifest::ProcessManifest;
use crate::domain::{AppLayout, DeployConfig, ProcessError, Release};

/// Stop the application if it is running; a no-op otherwise.
///
/// Returns whether a running process was stopped.
///
/// # Errors
///
/// Returns an error if the supervisor cannot be queried or refuses to stop.
pub async fn stop_app(supervisor: &impl ProcessSupervisor, layout: &AppLayout) -> Result<bool> {
    let name = layout.name().as_str();
    let state = supervisor
        .status(name)
        .await
        .with_context(|| format!("querying supervisor for '{name}'"))?;
    if state != ProcessState::Running {
        tracing::debug!(app = name, %state, "not running, nothing to stop");
        return Ok(false);
    }
    supervisor
        .stop(name)
        .await
        .with_context(|| format!("stopping '{name}'"))?;
    tracing::info!(app = name, "process stopped");
    Ok(true)
}

/// Write the process manifest for `cwd`, returning its path.
///
/// # Errors
///
/// Returns an error if the manifest cannot be written.
pub fn write_manifest(
    manifests: &impl ManifestWriter,
    layout: &AppLayout,
    config: &DeployConfig,
    cwd: &std::path::Path,
) -> Result<std::path::PathBuf> {
    let manifest = ProcessManifest::project(layout, config, cwd);
    manifests
        .write_manifest(layout, &manifest)
        .context("writing process manifest")
}

/// Start `release` with a freshly generated manifest and confirm it is
/// running.
///
/// # Errors
///
/// Returns [`ProcessError::StartFailed`] if the supervisor does not report
/// the process running afterwards, or the underlying error if the manifest
/// cannot be written or the supervisor cannot be invoked.
pub async fn start_release(
    supervisor: &impl ProcessSupervisor,
    manifests: &impl ManifestWriter,
    layout: &AppLayout,
    config: &DeployConfig,
    release: &Release,
) -> Result<()> {
    let name = layout.name().as_str();
    let manifest = write_manifest(manifests, layout, config, &release.path)?;
    supervisor
        .start(name, &manifest)
        .await
        .with_context(|| format!("starting '{name}' from {}", manifest.display()))?;

    let state = supervisor
        .status(name)
        .await
        .with_context(|| format!("querying supervisor for '{name}'"))?;
    if state != ProcessState::Running {
        return Err(ProcessError::StartFailed {
            app: name.to_string(),
            state: state.to_string(),
        }
        .into());
    }
    tracing::info!(app = name, release = %release.id, "process running");
    Ok(())
}
