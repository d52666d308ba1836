//! `keel deploy` — fetch, install and activate a release.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::deploy::DeployOutcome;
use crate::domain::deploy::DeployRequest;
use crate::domain::release::DEFAULT_KEEP_RELEASES;
use crate::domain::{AppName, ReleaseId};
use crate::output::json;

/// Arguments for the deploy command.
#[derive(Args)]
pub struct DeployArgs {
    /// Application name
    #[arg(long)]
    pub name: AppName,

    /// Release tag to deploy, e.g. `v1.2.3`
    #[arg(long)]
    pub release: ReleaseId,

    /// Installed releases to keep after a successful deploy (current included)
    #[arg(long, env = "KEEL_KEEP_RELEASES", default_value_t = DEFAULT_KEEP_RELEASES)]
    pub keep: usize,
}

/// Run `keel deploy`.
///
/// # Errors
///
/// Returns the typed error of the stage that failed.
pub async fn run(ctx: &AppContext, args: DeployArgs) -> Result<()> {
    let req = DeployRequest::new(args.name, args.release, args.keep, ctx.actor.clone())?;
    let outcome = ctx.orchestrator.deploy(&req, &ctx.reporter()).await?;

    if ctx.is_json() {
        let (label, previous, pruned) = match &outcome {
            DeployOutcome::Deployed {
                previous,
                housekeeping,
                ..
            } => ("deployed", previous.as_ref(), housekeeping.pruned.as_slice()),
            DeployOutcome::AlreadyCurrent { .. } => ("already_current", None, &[][..]),
        };
        return json::print(&serde_json::json!({
            "app": req.app.as_str(),
            "outcome": label,
            "release": outcome.release(),
            "previous": previous,
            "pruned": pruned,
        }));
    }

    if let DeployOutcome::Deployed {
        previous,
        housekeeping,
        ..
    } = &outcome
    {
        if let Some(previous) = previous {
            ctx.output.kv("previous", previous.as_str());
        }
        if !housekeeping.pruned.is_empty() {
            let pruned: Vec<&str> = housekeeping.pruned.iter().map(ReleaseId::as_str).collect();
            ctx.output.kv("pruned", &pruned.join(", "));
        }
    }
    if let Some(sha) = &outcome.release().artifact_sha256 {
        ctx.output.kv("sha256", sha);
    }
    Ok(())
}
