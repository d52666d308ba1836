//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` — never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use crate::domain::history::DeploymentLogEntry;
use crate::domain::manifest::ProcessManifest;
use crate::domain::{AppLayout, DeployConfig, Release, ReleaseId};

// ── Value Types ───────────────────────────────────────────────────────────────

/// A downloaded artifact sitting in scratch space.
///
/// `guard` owns the scratch directory; dropping it deletes the download.
pub struct FetchedArtifact {
    /// Path of the single downloaded archive.
    pub path: PathBuf,
    /// Lowercase hex SHA-256 of the archive.
    pub sha256: String,
    /// Keeps the scratch directory alive until the artifact is installed.
    pub guard: Box<dyn Any + Send>,
}

/// Result of [`ReleaseStore::install`].
#[derive(Debug, Clone)]
pub enum InstallOutcome {
    /// A new release was installed; it is not yet current.
    Installed(Release),
    /// The release was already installed and is the current one.
    AlreadyCurrent(Release),
}

/// Process state as reported by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Running,
    Stopped,
    Errored,
    /// The supervisor has no process with this name.
    NotFound,
    /// Any other supervisor-specific state, verbatim.
    Other(String),
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Stopped => f.write_str("stopped"),
            Self::Errored => f.write_str("errored"),
            Self::NotFound => f.write_str("not found"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

// ── Configuration Port ────────────────────────────────────────────────────────

/// Persists and loads per-application deploy configuration.
pub trait ConfigStore {
    /// Whether a configuration file exists (parseable or not).
    fn exists(&self, layout: &AppLayout) -> bool;
    /// Persist `config`. Refuses with `AlreadyInitialized` if a config
    /// exists and `overwrite` is false.
    fn initialize(&self, layout: &AppLayout, config: &DeployConfig, overwrite: bool)
    -> Result<()>;
    /// Load the configuration (`NotInitialized` / `Corrupt` on failure).
    fn load(&self, layout: &AppLayout) -> Result<DeployConfig>;
}

// ── Artifact Port ─────────────────────────────────────────────────────────────

/// Retrieves release artifacts from the artifact source.
#[allow(async_fn_in_trait)]
pub trait ArtifactFetcher {
    /// Probe for and download the artifact of `release` into a fresh
    /// directory under `scratch`.
    ///
    /// On failure nothing is left behind in `scratch`.
    async fn fetch(
        &self,
        source: &str,
        release: &ReleaseId,
        scratch: &Path,
    ) -> Result<FetchedArtifact>;
}

/// Installs runtime dependencies into an extracted release tree.
#[allow(async_fn_in_trait)]
pub trait DependencyInstaller {
    async fn install(&self, tree: &Path) -> Result<()>;
}

// ── Release Port ──────────────────────────────────────────────────────────────

/// Installed releases and the current pointer.
#[allow(async_fn_in_trait)]
pub trait ReleaseStore {
    /// Create the application directory skeleton. Idempotent.
    fn ensure_layout(&self, layout: &AppLayout) -> Result<()>;
    /// Extract, prepare and install `artifact` as release `id`.
    async fn install(
        &self,
        layout: &AppLayout,
        id: &ReleaseId,
        artifact: &FetchedArtifact,
    ) -> Result<InstallOutcome>;
    /// Look up an installed release.
    fn find(&self, layout: &AppLayout, id: &ReleaseId) -> Result<Option<Release>>;
    /// All installed releases, newest first.
    fn list(&self, layout: &AppLayout) -> Result<Vec<Release>>;
    /// The release the current pointer names, if any.
    fn current(&self, layout: &AppLayout) -> Result<Option<Release>>;
    /// Atomically repoint `current` at `release`.
    fn promote(&self, layout: &AppLayout, release: &Release) -> Result<()>;
    /// Most recently installed release other than the current one.
    fn previous(&self, layout: &AppLayout) -> Result<Release>;
    /// Delete releases so that `keep` remain; never the current one.
    fn prune(&self, layout: &AppLayout, keep: usize) -> Result<Vec<ReleaseId>>;
    /// Remove scratch entries and staging trees older than `grace`.
    fn sweep_stale(&self, layout: &AppLayout, grace: Duration) -> Result<usize>;
}

// ── Process Ports ─────────────────────────────────────────────────────────────

/// External process supervisor (start/stop/status by name).
#[allow(async_fn_in_trait)]
pub trait ProcessSupervisor {
    async fn status(&self, name: &str) -> Result<ProcessState>;
    async fn stop(&self, name: &str) -> Result<()>;
    /// Start `name` from `manifest`, discarding any environment cached from
    /// a previous start.
    async fn start(&self, name: &str, manifest: &Path) -> Result<()>;
}

/// Writes the generated process manifest.
pub trait ManifestWriter {
    /// Persist `manifest` and return its path.
    fn write_manifest(&self, layout: &AppLayout, manifest: &ProcessManifest) -> Result<PathBuf>;
}

// ── History and Locking Ports ─────────────────────────────────────────────────

/// Append-only deployment history.
pub trait DeployHistory {
    fn append(&self, layout: &AppLayout, entry: &DeploymentLogEntry) -> Result<()>;
    /// The last `lines` entries, oldest first.
    fn tail(&self, layout: &AppLayout, lines: usize) -> Result<Vec<String>>;
}

/// Per-application mutual exclusion for orchestration operations.
#[allow(async_fn_in_trait)]
pub trait DeployLocker {
    /// Held for the duration of an operation; releasing happens on drop.
    type Guard;
    /// Acquire the lock or fail with `DeploymentInProgress` after a bounded wait.
    async fn acquire(&self, layout: &AppLayout) -> Result<Self::Guard>;
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program with the instance's default timeout and capture output.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program in `dir` with an explicit timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_in(
        &self,
        dir: &Path,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait — no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
