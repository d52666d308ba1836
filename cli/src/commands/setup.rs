//! `keel setup` — prepare an application for deployments.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;
use crate::application::services::setup::SetupOutcome;
use crate::domain::config::{parse_env_assignment, parse_env_file};
use crate::domain::deploy::SetupRequest;
use crate::domain::{AppName, DeployConfig, InputError};
use crate::output::json;

/// Arguments for the setup command.
#[derive(Args)]
pub struct SetupArgs {
    /// Application name
    #[arg(long)]
    pub name: AppName,

    /// Artifact source, `<owner>/<repo>`
    #[arg(long)]
    pub source: String,

    /// Entry point relative to the release root, e.g. `server.js`
    #[arg(long)]
    pub script: String,

    /// Environment for the process: a dotenv file or `KEY=VALUE` (repeatable)
    #[arg(long = "env", value_name = "FILE|KEY=VALUE")]
    pub env: Vec<String>,

    /// Overwrite an existing, different configuration
    #[arg(long)]
    pub force: bool,
}

/// Run `keel setup`.
///
/// # Errors
///
/// Returns an error if the input is invalid, the application is already set
/// up differently (without `--force`), or a file cannot be written.
pub async fn run(ctx: &AppContext, args: SetupArgs) -> Result<()> {
    let config = DeployConfig {
        source: args.source,
        script: args.script,
        env: collect_env(&args.env)?,
    };
    config.validate()?;

    let orchestrator = &ctx.orchestrator;
    let layout = orchestrator.layout(&args.name);
    let mut overwrite = false;
    if args.force && orchestrator.config.exists(&layout) {
        let differs = orchestrator
            .config
            .load(&layout)
            .map_or(true, |existing| existing != config);
        if differs {
            let prompt = format!("Overwrite the existing configuration of '{}'?", args.name);
            if !(ctx.non_interactive || ctx.confirm(&prompt, false)?) {
                ctx.output.info("setup cancelled, configuration left unchanged");
                return Ok(());
            }
            overwrite = true;
        }
    }

    let req = SetupRequest {
        app: args.name,
        config,
        overwrite,
    };
    let outcome = orchestrator.setup(&req, &ctx.reporter()).await?;

    let (label, manifest) = match &outcome {
        SetupOutcome::Created { manifest } => ("created", manifest),
        SetupOutcome::Unchanged { manifest } => ("unchanged", manifest),
        SetupOutcome::Replaced { manifest } => ("replaced", manifest),
    };
    if ctx.is_json() {
        return json::print(&serde_json::json!({
            "app": req.app.as_str(),
            "outcome": label,
            "base": layout.base(),
            "manifest": manifest,
        }));
    }
    match outcome {
        SetupOutcome::Unchanged { .. } => ctx.output.info("configuration unchanged"),
        SetupOutcome::Replaced { .. } => ctx.output.warn("previous configuration replaced"),
        SetupOutcome::Created { .. } => {}
    }
    ctx.output.kv("base", &layout.base().display().to_string());
    ctx.output.kv("manifest", &manifest.display().to_string());
    Ok(())
}

/// Merge `--env` arguments in order; later values win.
///
/// An argument naming an existing file is read as a dotenv file; anything
/// else must be a `KEY=VALUE` assignment.
///
/// # Errors
///
/// Returns [`InputError::InvalidEnv`] for malformed entries, or an I/O error
/// if a file cannot be read.
pub fn collect_env(entries: &[String]) -> Result<BTreeMap<String, String>> {
    let mut env = BTreeMap::new();
    for entry in entries {
        let path = Path::new(entry);
        if path.is_file() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading env file {}", path.display()))?;
            let pairs = parse_env_file(&content)
                .with_context(|| format!("parsing env file {}", path.display()))?;
            env.extend(pairs);
        } else if entry.contains('=') {
            let (key, value) = parse_env_assignment(entry)?;
            env.insert(key, value);
        } else {
            return Err(InputError::InvalidEnv(entry.clone()).into());
        }
    }
    Ok(env)
}
