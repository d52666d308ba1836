//! Fake port implementations for orchestration tests.
//!
//! The release store, config store, manifest writer, history and lock used in
//! tests are the real filesystem adapters; only the network, npm and pm2 are
//! replaced here.

#![allow(clippy::expect_used, dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use keel_cli::application::ports::{
    ArtifactFetcher, DependencyInstaller, FetchedArtifact, InstallOutcome, ProcessState,
    ProcessSupervisor, ProgressReporter, ReleaseStore,
};
use keel_cli::domain::manifest::ProcessManifest;
use keel_cli::domain::release::artifact_url;
use keel_cli::domain::{AppLayout, FetchError, Release, ReleaseId};
use keel_cli::infra::fs::sha256_file;

/// A file in a release tree that makes [`FakeInstaller`] fail.
pub const FAIL_INSTALL_MARKER: &str = "fail-install";
/// A file in a release tree that makes [`FakeSupervisor`] report `errored`.
pub const CRASH_MARKER: &str = "crash-on-start";

// ── Fetcher ───────────────────────────────────────────────────────────────────

/// Serves in-memory archives keyed by release id.
#[derive(Default)]
pub struct FakeFetcher {
    artifacts: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn publish(&self, id: &str, archive: Vec<u8>) {
        self.artifacts
            .lock()
            .expect("lock")
            .insert(id.to_string(), archive);
    }

    /// Release ids fetched so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }
}

impl ArtifactFetcher for FakeFetcher {
    async fn fetch(
        &self,
        source: &str,
        release: &ReleaseId,
        scratch: &Path,
    ) -> Result<FetchedArtifact> {
        self.calls.lock().expect("lock").push(release.to_string());
        let url = artifact_url("https://artifacts.test", source, release);
        let Some(bytes) = self
            .artifacts
            .lock()
            .expect("lock")
            .get(release.as_str())
            .cloned()
        else {
            return Err(FetchError::ArtifactNotFound { url }.into());
        };

        std::fs::create_dir_all(scratch)?;
        let dir = tempfile::Builder::new()
            .prefix("fetch-")
            .tempdir_in(scratch)?;
        let path = dir.path().join("artifact.tar.gz");
        std::fs::write(&path, bytes)?;
        let sha256 = sha256_file(&path)?;
        Ok(FetchedArtifact {
            path,
            sha256,
            guard: Box::new(dir),
        })
    }
}

// ── Dependency installer ──────────────────────────────────────────────────────

/// Succeeds unless the tree carries [`FAIL_INSTALL_MARKER`].
pub struct FakeInstaller;

impl DependencyInstaller for FakeInstaller {
    async fn install(&self, tree: &Path) -> Result<()> {
        if tree.join(FAIL_INSTALL_MARKER).exists() {
            bail!("npm ci exited with status 1: ERESOLVE unable to resolve dependency tree");
        }
        std::fs::create_dir_all(tree.join("node_modules"))?;
        Ok(())
    }
}

// ── Supervisor ────────────────────────────────────────────────────────────────

/// In-memory process table. A start is "running" unless the manifest's
/// working directory carries [`CRASH_MARKER`].
#[derive(Default)]
pub struct FakeSupervisor {
    states: Mutex<HashMap<String, ProcessState>>,
    calls: Mutex<Vec<String>>,
    unavailable: AtomicBool,
}

impl FakeSupervisor {
    pub fn set_state(&self, name: &str, state: ProcessState) {
        self.states
            .lock()
            .expect("lock")
            .insert(name.to_string(), state);
    }

    pub fn state(&self, name: &str) -> ProcessState {
        self.states
            .lock()
            .expect("lock")
            .get(name)
            .cloned()
            .unwrap_or(ProcessState::NotFound)
    }

    /// Make every call fail, as if pm2 were not installed.
    pub fn make_unavailable(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().expect("lock").clear();
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("pm2: command not found");
        }
        Ok(())
    }
}

impl ProcessSupervisor for FakeSupervisor {
    async fn status(&self, name: &str) -> Result<ProcessState> {
        self.check_available()?;
        Ok(self.state(name))
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.check_available()?;
        self.calls.lock().expect("lock").push(format!("stop {name}"));
        self.set_state(name, ProcessState::Stopped);
        Ok(())
    }

    async fn start(&self, name: &str, manifest: &Path) -> Result<()> {
        self.check_available()?;
        let doc: ProcessManifest = serde_json::from_slice(&std::fs::read(manifest)?)?;
        let app = doc.apps.iter().find(|a| a.name == name).expect("app in manifest");
        self.calls
            .lock()
            .expect("lock")
            .push(format!("start {name} {}", app.cwd.display()));
        let state = if app.cwd.join(CRASH_MARKER).exists() {
            ProcessState::Errored
        } else {
            ProcessState::Running
        };
        self.set_state(name, state);
        Ok(())
    }
}

// ── Release store decorator ───────────────────────────────────────────────────

/// Delegates to a real store but can be armed to fail pointer swaps.
pub struct FlakyPromote<R> {
    pub inner: R,
    armed: AtomicBool,
}

impl<R> FlakyPromote<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

impl<R: ReleaseStore> ReleaseStore for FlakyPromote<R> {
    fn ensure_layout(&self, layout: &AppLayout) -> Result<()> {
        self.inner.ensure_layout(layout)
    }

    async fn install(
        &self,
        layout: &AppLayout,
        id: &ReleaseId,
        artifact: &FetchedArtifact,
    ) -> Result<InstallOutcome> {
        self.inner.install(layout, id, artifact).await
    }

    fn find(&self, layout: &AppLayout, id: &ReleaseId) -> Result<Option<Release>> {
        self.inner.find(layout, id)
    }

    fn list(&self, layout: &AppLayout) -> Result<Vec<Release>> {
        self.inner.list(layout)
    }

    fn current(&self, layout: &AppLayout) -> Result<Option<Release>> {
        self.inner.current(layout)
    }

    fn promote(&self, layout: &AppLayout, release: &Release) -> Result<()> {
        if self.armed.load(Ordering::SeqCst) {
            bail!("rename of current pointer failed: read-only file system");
        }
        self.inner.promote(layout, release)
    }

    fn previous(&self, layout: &AppLayout) -> Result<Release> {
        self.inner.previous(layout)
    }

    fn prune(&self, layout: &AppLayout, keep: usize) -> Result<Vec<ReleaseId>> {
        self.inner.prune(layout, keep)
    }

    fn sweep_stale(&self, layout: &AppLayout, grace: Duration) -> Result<usize> {
        self.inner.sweep_stale(layout, grace)
    }
}

// ── Reporter ──────────────────────────────────────────────────────────────────

/// Captures progress events instead of printing them.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn warnings(&self) -> Vec<String> {
        self.events
            .lock()
            .expect("lock")
            .iter()
            .filter_map(|e| e.strip_prefix("warn: ").map(str::to_string))
            .collect()
    }
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, message: &str) {
        self.events.lock().expect("lock").push(format!("step: {message}"));
    }

    fn success(&self, message: &str) {
        self.events
            .lock()
            .expect("lock")
            .push(format!("success: {message}"));
    }

    fn warn(&self, message: &str) {
        self.events.lock().expect("lock").push(format!("warn: {message}"));
    }
}
