//! `keel status` — read-only view of one application.

use anyhow::Result;
use clap::Args;
use owo_colors::OwoColorize as _;

use crate::app::AppContext;
use crate::application::ports::ProcessState;
use crate::application::services::status::AppStatus;
use crate::domain::AppName;
use crate::output::{OutputContext, json};

/// Arguments for the status command.
#[derive(Args)]
pub struct StatusArgs {
    /// Application name
    #[arg(long)]
    pub name: AppName,
}

/// Run `keel status`.
///
/// # Errors
///
/// Returns `NotInitialized` if the application was never set up.
pub async fn run(ctx: &AppContext, args: &StatusArgs) -> Result<()> {
    let status = ctx.orchestrator.status(&args.name).await?;
    if ctx.is_json() {
        return json::print(&status);
    }
    render(&ctx.output, &status);
    Ok(())
}

fn render(out: &OutputContext, status: &AppStatus) {
    out.header(&status.app);
    out.kv("source ", &status.source);
    out.kv("script ", &status.script);
    out.kv(
        "current",
        status.current.as_ref().map_or("none", |id| id.as_str()),
    );
    let process = status.process.to_string();
    let styled = match status.process {
        ProcessState::Running => process.style(out.styles.success).to_string(),
        ProcessState::Errored => process.style(out.styles.error).to_string(),
        _ => process.style(out.styles.warning).to_string(),
    };
    out.kv("process", &styled);

    if !status.releases.is_empty() {
        out.header("releases");
        for release in &status.releases {
            let marker = if status.current.as_ref() == Some(&release.id) {
                "*"
            } else {
                " "
            };
            let digest = release
                .artifact_sha256
                .as_deref()
                .map_or("-", |sha| sha.get(..12).unwrap_or(sha));
            out.kv(
                marker,
                &format!(
                    "{}  {}  sha256:{digest}",
                    release.id,
                    release.installed_at.format("%Y-%m-%d %H:%M:%S UTC")
                ),
            );
        }
    }

    if !status.history.is_empty() {
        out.header("recent deployments");
        for line in &status.history {
            out.kv(" ", line);
        }
    }
}
