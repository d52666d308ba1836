//! Infrastructure implementation of the `ProcessSupervisor` port using PM2.
//!
//! `Pm2Supervisor<R>` routes all pm2 CLI calls through a `CommandRunner`.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::application::ports::{CommandRunner, ProcessState, ProcessSupervisor};
use crate::infra::command_runner::{DEFAULT_CMD_TIMEOUT, TokioCommandRunner, output_tail};

/// Time a freshly started process gets before its status is checked.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Infrastructure adapter for the pm2 CLI.
///
/// Generic over `R: CommandRunner` so that tests can inject a mock runner
/// without spawning real processes.
pub struct Pm2Supervisor<R: CommandRunner> {
    runner: R,
    settle: Duration,
}

impl<R: CommandRunner> Pm2Supervisor<R> {
    pub fn new(runner: R, settle: Duration) -> Self {
        Self { runner, settle }
    }
}

impl Pm2Supervisor<TokioCommandRunner> {
    /// Convenience constructor for production use.
    #[must_use]
    pub fn default_runner() -> Self {
        Self::new(TokioCommandRunner::new(DEFAULT_CMD_TIMEOUT), DEFAULT_SETTLE_DELAY)
    }
}

#[derive(Debug, Deserialize)]
struct JlistEntry {
    name: String,
    #[serde(default)]
    pm2_env: Option<JlistEnv>,
}

#[derive(Debug, Deserialize)]
struct JlistEnv {
    #[serde(default)]
    status: Option<String>,
}

/// Parse `pm2 jlist` output and report the state of `name`.
///
/// pm2 may print banner lines before the JSON array; they are skipped.
///
/// # Errors
///
/// Returns an error if no JSON array can be parsed from `raw`.
pub fn parse_jlist(raw: &str, name: &str) -> Result<ProcessState> {
    let entries: Vec<JlistEntry> = raw
        .match_indices('[')
        .find_map(|(start, _)| serde_json::from_str(raw[start..].trim()).ok())
        .ok_or_else(|| anyhow::anyhow!("pm2 jlist printed no process list"))?;

    let Some(entry) = entries.into_iter().find(|e| e.name == name) else {
        return Ok(ProcessState::NotFound);
    };
    let status = entry.pm2_env.and_then(|env| env.status).unwrap_or_default();
    Ok(match status.as_str() {
        "online" => ProcessState::Running,
        "stopped" => ProcessState::Stopped,
        "errored" => ProcessState::Errored,
        other => ProcessState::Other(other.to_string()),
    })
}

impl<R: CommandRunner> ProcessSupervisor for Pm2Supervisor<R> {
    async fn status(&self, name: &str) -> Result<ProcessState> {
        let output = self.runner.run("pm2", &["jlist"]).await.context("pm2 jlist")?;
        anyhow::ensure!(
            output.status.success(),
            "pm2 jlist failed: {}",
            output_tail(&output)
        );
        parse_jlist(&String::from_utf8_lossy(&output.stdout), name)
    }

    async fn stop(&self, name: &str) -> Result<()> {
        let output = self
            .runner
            .run("pm2", &["stop", name])
            .await
            .context("pm2 stop")?;
        anyhow::ensure!(
            output.status.success(),
            "pm2 stop {name} failed: {}",
            output_tail(&output)
        );
        Ok(())
    }

    async fn start(&self, name: &str, manifest: &Path) -> Result<()> {
        // Deleting first drops the environment pm2 cached from the last start.
        match self.runner.run("pm2", &["delete", name]).await {
            Ok(out) if !out.status.success() => {
                tracing::debug!(name, "pm2 delete: {}", output_tail(&out));
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(name, error = %e, "pm2 delete failed"),
        }

        let manifest = manifest.to_string_lossy();
        let output = self
            .runner
            .run("pm2", &["start", manifest.as_ref(), "--update-env"])
            .await
            .context("pm2 start")?;
        anyhow::ensure!(
            output.status.success(),
            "pm2 start {manifest} failed: {}",
            output_tail(&output)
        );
        tokio::time::sleep(self.settle).await;
        Ok(())
    }
}
