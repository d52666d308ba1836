//! `keel rollback` — re-activate an installed release.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::rollback::RollbackOutcome;
use crate::domain::deploy::RollbackRequest;
use crate::domain::{AppName, ReleaseId};
use crate::output::json;

/// Arguments for the rollback command.
#[derive(Args)]
pub struct RollbackArgs {
    /// Application name
    #[arg(long)]
    pub name: AppName,

    /// Activate this installed release instead of the previous one
    #[arg(long, value_name = "RELEASE")]
    pub to: Option<ReleaseId>,
}

/// Run `keel rollback`.
///
/// # Errors
///
/// Returns `NoPriorRelease` when there is nothing to roll back to, or the
/// typed error of the stage that failed.
pub async fn run(ctx: &AppContext, args: RollbackArgs) -> Result<()> {
    let req = RollbackRequest {
        app: args.name,
        target: args.to,
        actor: ctx.actor.clone(),
    };
    let outcome = ctx.orchestrator.rollback(&req, &ctx.reporter()).await?;

    let (label, from) = match &outcome {
        RollbackOutcome::RolledBack { from, .. } => ("rolled_back", from.as_ref()),
        RollbackOutcome::AlreadyCurrent { .. } => ("already_current", None),
    };
    if ctx.is_json() {
        return json::print(&serde_json::json!({
            "app": req.app.as_str(),
            "outcome": label,
            "release": outcome.release(),
            "from": from,
        }));
    }
    if let Some(from) = from {
        ctx.output.kv("from", from.as_str());
    }
    Ok(())
}
