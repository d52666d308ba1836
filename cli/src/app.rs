//! Application context — unified state passed to every command handler.
//!
//! `AppContext` is built once per invocation from the global CLI flags and
//! owns the production orchestrator wired to its infrastructure adapters.

use std::path::PathBuf;

use anyhow::Result;

use crate::application::services::Orchestrator;
use crate::application::services::orchestrator::DEFAULT_HOUSEKEEPING_GRACE;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::YamlConfigStore;
use crate::infra::fetcher::HttpArtifactFetcher;
use crate::infra::history::FileDeployHistory;
use crate::infra::installer::NpmInstaller;
use crate::infra::lock::FileLocker;
use crate::infra::manifest::JsonManifestWriter;
use crate::infra::releases::FsReleaseStore;
use crate::infra::supervisor::Pm2Supervisor;
use crate::output::{OutputContext, TerminalReporter};

/// The orchestrator wired to real filesystem, HTTP, npm and pm2 adapters.
pub type ProductionOrchestrator = Orchestrator<
    YamlConfigStore,
    HttpArtifactFetcher,
    FsReleaseStore<NpmInstaller<TokioCommandRunner>>,
    Pm2Supervisor<TokioCommandRunner>,
    JsonManifestWriter,
    FileDeployHistory,
    FileLocker,
>;

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Skip interactive prompts (also set by `CI` / `KEEL_YES` env vars).
    pub yes: bool,
    /// Directory holding one base directory per application.
    pub root: Option<PathBuf>,
    /// Artifact host, e.g. `https://github.com`.
    pub artifact_base: String,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    pub output: OutputFlags,
    pub behaviour: BehaviourFlags,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Release orchestrator over the resolved root.
    pub orchestrator: ProductionOrchestrator,
    /// Who is running the command, for the deployment history.
    pub actor: String,
    /// When `true`, skip interactive prompts and use defaults.
    ///
    /// Set when `--yes` / `-y` is passed, or when the `CI` or `KEEL_YES`
    /// environment variables are present.
    pub non_interactive: bool,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if no root was given and the home directory cannot
    /// be determined.
    pub fn new(flags: &AppFlags) -> Result<Self> {
        let ci_env = std::env::var("CI").is_ok() || std::env::var("KEEL_YES").is_ok();
        let non_interactive = flags.behaviour.yes || ci_env;

        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };
        // JSON mode keeps stdout for the result document.
        let quiet = flags.output.quiet || flags.output.json;

        let root = resolve_root(flags.behaviour.root.clone())?;
        tracing::debug!(root = %root.display(), "resolved application root");

        Ok(Self {
            output: OutputContext::new(flags.output.no_color, quiet),
            mode,
            orchestrator: production_orchestrator(root, &flags.behaviour.artifact_base),
            actor: resolve_actor(|key| std::env::var(key).ok()),
            non_interactive,
        })
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Progress reporter for application services.
    #[must_use]
    pub fn reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` (CI, `--yes` flag, or `KEEL_YES` env),
    /// returns `default` immediately without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }
}

fn production_orchestrator(root: PathBuf, artifact_base: &str) -> ProductionOrchestrator {
    Orchestrator {
        root,
        config: YamlConfigStore,
        fetcher: HttpArtifactFetcher::new(artifact_base),
        releases: FsReleaseStore::new(NpmInstaller::new(TokioCommandRunner::default())),
        supervisor: Pm2Supervisor::default_runner(),
        manifests: JsonManifestWriter,
        history: FileDeployHistory,
        locks: FileLocker::default(),
        housekeeping_grace: DEFAULT_HOUSEKEEPING_GRACE,
    }
}

/// `--root` / `KEEL_ROOT`, else `~/apps`.
///
/// # Errors
///
/// Returns an error if no root was given and the home directory cannot be
/// determined.
pub fn resolve_root(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(root) = explicit {
        return Ok(root);
    }
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.join("apps"))
}

/// First non-empty of `KEEL_ACTOR`, `SUDO_USER`, `USER`, `USERNAME`; else
/// `unknown`. Whitespace is replaced so the value stays one history token.
pub fn resolve_actor(lookup: impl Fn(&str) -> Option<String>) -> String {
    ["KEEL_ACTOR", "SUDO_USER", "USER", "USERNAME"]
        .into_iter()
        .filter_map(&lookup)
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
        .map_or_else(
            || "unknown".to_string(),
            |v| v.split_whitespace().collect::<Vec<_>>().join("_"),
        )
}
