//! Infrastructure implementation of the `ReleaseStore` port.
//!
//! Releases live in `<base>/releases/<id>/`. An install is assembled under
//! `releases/.<id>.staging-<random>/` and only renamed to its final name once
//! extraction, dependency installation and metadata are complete, so a final
//! name always holds a complete release. The current pointer is a relative
//! symlink swapped with a single rename.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;

use crate::application::ports::{DependencyInstaller, FetchedArtifact, InstallOutcome, ReleaseStore};
use crate::domain::release::{
    METADATA_FILE, ReleaseMetadata, select_previous, select_prunable, sort_newest_first,
};
use crate::domain::{AppLayout, Release, ReleaseError, ReleaseId, ReleaseStatus};
use crate::infra::fs::{remove_path, write_atomic};

/// Marker in the names of in-flight install directories.
const STAGING_MARKER: &str = ".staging-";

/// Filesystem-backed `ReleaseStore`; dependency installation is delegated
/// to `D`.
pub struct FsReleaseStore<D> {
    installer: D,
}

impl<D: DependencyInstaller> FsReleaseStore<D> {
    #[must_use]
    pub fn new(installer: D) -> Self {
        Self { installer }
    }
}

impl<D: DependencyInstaller> ReleaseStore for FsReleaseStore<D> {
    fn ensure_layout(&self, layout: &AppLayout) -> Result<()> {
        for dir in layout.skeleton() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("creating directory {}", dir.display()))?;
        }
        Ok(())
    }

    async fn install(
        &self,
        layout: &AppLayout,
        id: &ReleaseId,
        artifact: &FetchedArtifact,
    ) -> Result<InstallOutcome> {
        if let Some(existing) = read_release(layout, id)? {
            let current = read_pointer(layout)?;
            if current.as_ref() == Some(id) {
                return Ok(InstallOutcome::AlreadyCurrent(existing));
            }
            if existing.is_installed() {
                return Err(ReleaseError::AlreadyExists(id.to_string()).into());
            }
            tracing::warn!(release = %id, "removing incomplete release directory");
            remove_path(&existing.path)?;
        }

        let releases_dir = layout.releases_dir();
        fs::create_dir_all(&releases_dir)
            .with_context(|| format!("creating directory {}", releases_dir.display()))?;
        // Dropping `staging` before the rename removes the partial tree.
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{id}{STAGING_MARKER}"))
            .tempdir_in(&releases_dir)
            .with_context(|| format!("creating staging directory in {}", releases_dir.display()))?;
        let staging_path = staging.path().to_path_buf();

        let mut metadata = ReleaseMetadata {
            id: id.clone(),
            installed_at: Utc::now(),
            status: ReleaseStatus::Installing,
            artifact_sha256: Some(artifact.sha256.clone()),
        };
        write_metadata(&staging_path, &metadata)?;

        // ── Extract ──────────────────────────────────────────────────────────
        let archive = artifact.path.clone();
        let target = staging_path.clone();
        tokio::task::spawn_blocking(move || extract(&archive, &target))
            .await
            .context("extract task panicked")?
            .map_err(|e| ReleaseError::ExtractFailed {
                release: id.to_string(),
                detail: format!("{e:#}"),
            })?;
        tracing::debug!(release = %id, path = %staging_path.display(), "artifact extracted");

        // ── Dependencies ─────────────────────────────────────────────────────
        self.installer
            .install(&staging_path)
            .await
            .map_err(|e| ReleaseError::DependencyInstallFailed {
                release: id.to_string(),
                detail: format!("{e:#}"),
            })?;

        // ── Finalize ─────────────────────────────────────────────────────────
        metadata.status = ReleaseStatus::Installed;
        metadata.installed_at = Utc::now();
        write_metadata(&staging_path, &metadata)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&staging_path, fs::Permissions::from_mode(0o755))
                .with_context(|| format!("setting permissions on {}", staging_path.display()))?;
        }

        let final_path = layout.release_dir(id);
        fs::rename(&staging_path, &final_path).with_context(|| {
            format!(
                "moving {} to {}",
                staging_path.display(),
                final_path.display()
            )
        })?;
        // The staging path no longer exists; the guard's cleanup is a no-op.
        drop(staging);
        tracing::info!(release = %id, path = %final_path.display(), "release installed");

        Ok(InstallOutcome::Installed(Release::from_metadata(
            metadata, final_path,
        )))
    }

    fn find(&self, layout: &AppLayout, id: &ReleaseId) -> Result<Option<Release>> {
        read_release(layout, id)
    }

    fn list(&self, layout: &AppLayout) -> Result<Vec<Release>> {
        let dir = layout.releases_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("reading {}", dir.display())),
        };

        let mut releases = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("reading {}", dir.display()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            let Ok(id) = ReleaseId::parse(name) else {
                tracing::debug!(name, "ignoring foreign entry in releases directory");
                continue;
            };
            if let Some(release) = read_release(layout, &id)? {
                releases.push(release);
            }
        }
        sort_newest_first(&mut releases);
        Ok(releases)
    }

    fn current(&self, layout: &AppLayout) -> Result<Option<Release>> {
        let Some(id) = read_pointer(layout)? else {
            return Ok(None);
        };
        match read_release(layout, &id)? {
            Some(release) if release.is_installed() => Ok(Some(release)),
            _ => {
                tracing::warn!(
                    app = %layout.name(),
                    release = %id,
                    "current pointer names a release that is not installed"
                );
                Ok(None)
            }
        }
    }

    fn promote(&self, layout: &AppLayout, release: &Release) -> Result<()> {
        let installed = read_release(layout, &release.id)?.is_some_and(|r| r.is_installed());
        if !installed {
            return Err(ReleaseError::NotInstalled(release.id.to_string()).into());
        }
        swap_pointer(layout, &release.id)?;
        tracing::info!(app = %layout.name(), release = %release.id, "current pointer moved");
        Ok(())
    }

    fn previous(&self, layout: &AppLayout) -> Result<Release> {
        let releases = self.list(layout)?;
        let current = read_pointer(layout)?;
        select_previous(&releases, current.as_ref())
            .cloned()
            .ok_or_else(|| ReleaseError::NoPriorRelease.into())
    }

    fn prune(&self, layout: &AppLayout, keep: usize) -> Result<Vec<ReleaseId>> {
        let releases = self.list(layout)?;
        let current = read_pointer(layout)?;
        let mut removed = Vec::new();
        for release in select_prunable(&releases, current.as_ref(), keep) {
            remove_path(&release.path)?;
            tracing::info!(release = %release.id, "release pruned");
            removed.push(release.id.clone());
        }
        Ok(removed)
    }

    fn sweep_stale(&self, layout: &AppLayout, grace: Duration) -> Result<usize> {
        let mut swept = sweep_dir(&layout.scratch_dir(), grace, |_| true)?;
        swept += sweep_dir(&layout.releases_dir(), grace, |name| {
            name.starts_with('.') && name.contains(STAGING_MARKER)
        })?;
        let pointer_tmp = format!(".{}.tmp.", crate::domain::layout::CURRENT_LINK);
        swept += sweep_dir(layout.base(), grace, |name| name.starts_with(&pointer_tmp))?;
        Ok(swept)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn write_metadata(dir: &Path, metadata: &ReleaseMetadata) -> Result<()> {
    let content = serde_json::to_string_pretty(metadata).context("serializing release metadata")?;
    write_atomic(&dir.join(METADATA_FILE), content.as_bytes())
}

/// Unpack a gzip-compressed tarball into `target`. Entries escaping
/// `target` are rejected by `tar`.
fn extract(archive: &Path, target: &Path) -> Result<()> {
    let file =
        fs::File::open(archive).with_context(|| format!("opening {}", archive.display()))?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    tar.set_preserve_permissions(true);
    tar.set_overwrite(true);
    tar.unpack(target)
        .with_context(|| format!("unpacking {}", archive.display()))?;

    let has_content = fs::read_dir(target)
        .with_context(|| format!("reading {}", target.display()))?
        .filter_map(Result::ok)
        .any(|e| e.file_name() != METADATA_FILE);
    anyhow::ensure!(has_content, "archive is empty");
    Ok(())
}

/// Read `releases/<id>` and its metadata. A directory without readable
/// metadata is reported as [`ReleaseStatus::Failed`].
fn read_release(layout: &AppLayout, id: &ReleaseId) -> Result<Option<Release>> {
    let path = layout.release_dir(id);
    let meta = match fs::symlink_metadata(&path) {
        Ok(meta) if meta.is_dir() => meta,
        Ok(_) => return Ok(None),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("inspecting {}", path.display())),
    };

    let parsed = fs::read_to_string(path.join(METADATA_FILE))
        .map_err(anyhow::Error::from)
        .and_then(|s| serde_json::from_str::<ReleaseMetadata>(&s).map_err(anyhow::Error::from));
    match parsed {
        Ok(metadata) if metadata.id == *id => Ok(Some(Release::from_metadata(metadata, path))),
        Ok(_) | Err(_) => {
            tracing::warn!(release = %id, "release metadata missing or invalid");
            let installed_at = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH);
            Ok(Some(Release {
                id: id.clone(),
                path,
                installed_at,
                status: ReleaseStatus::Failed,
                artifact_sha256: None,
            }))
        }
    }
}

/// Release id the current pointer names, without checking it exists.
fn read_pointer(layout: &AppLayout) -> Result<Option<ReleaseId>> {
    let link = layout.current_link();
    let target = match read_pointer_target(&link) {
        Ok(target) => target,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("reading pointer {}", link.display())),
    };
    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("pointer {} has no target", link.display()))?;
    match ReleaseId::parse(name) {
        Ok(id) => Ok(Some(id)),
        Err(_) => {
            tracing::warn!(target = %target.display(), "current pointer names no release");
            Ok(None)
        }
    }
}

#[cfg(unix)]
fn read_pointer_target(link: &Path) -> std::io::Result<PathBuf> {
    fs::read_link(link)
}

#[cfg(not(unix))]
fn read_pointer_target(link: &Path) -> std::io::Result<PathBuf> {
    fs::read_to_string(link).map(|s| PathBuf::from(s.trim()))
}

/// Replace `current` in a single rename.
#[cfg(unix)]
fn swap_pointer(layout: &AppLayout, id: &ReleaseId) -> Result<()> {
    let link = layout.current_link();
    let tmp = unique_temp_path(&link)?;
    std::os::unix::fs::symlink(AppLayout::pointer_target(id), &tmp)
        .with_context(|| format!("creating symlink {}", tmp.display()))?;
    if let Err(e) = fs::rename(&tmp, &link) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("replacing {}", link.display()));
    }
    if let Ok(dir) = fs::File::open(layout.base()) {
        let _ = dir.sync_all();
    }
    Ok(())
}

/// Pointer file variant: the relative target path, fsynced and renamed.
#[cfg(not(unix))]
fn swap_pointer(layout: &AppLayout, id: &ReleaseId) -> Result<()> {
    let target = AppLayout::pointer_target(id);
    write_atomic(&layout.current_link(), target.to_string_lossy().as_bytes())
}

#[cfg(unix)]
fn unique_temp_path(link: &Path) -> Result<PathBuf> {
    let parent = link
        .parent()
        .ok_or_else(|| anyhow::anyhow!("pointer path has no parent: {}", link.display()))?;
    let base = link
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("pointer path has no filename: {}", link.display()))?;

    for attempt in 0u32..1000 {
        let candidate = parent.join(format!(
            ".{}.tmp.{}.{attempt}",
            base.to_string_lossy(),
            std::process::id()
        ));
        if fs::symlink_metadata(&candidate).is_err() {
            return Ok(candidate);
        }
    }
    anyhow::bail!("failed to allocate a temp path for {}", link.display())
}

/// Remove entries of `dir` accepted by `select` and older than `grace`.
fn sweep_dir(dir: &Path, grace: Duration, select: impl Fn(&str) -> bool) -> Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e).with_context(|| format!("reading {}", dir.display())),
    };
    let now = SystemTime::now();
    let mut removed = 0;
    for entry in entries.filter_map(Result::ok) {
        let name = entry.file_name();
        if !select(&name.to_string_lossy()) {
            continue;
        }
        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age < grace {
            continue;
        }
        remove_path(&entry.path())?;
        tracing::debug!(path = %entry.path().display(), "stale entry removed");
        removed += 1;
    }
    Ok(removed)
}
