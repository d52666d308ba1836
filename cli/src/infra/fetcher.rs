//! Infrastructure implementation of the `ArtifactFetcher` port.
//!
//! Blocking `ureq` calls run inside `spawn_blocking`. The existence probe
//! (`HEAD`) and the transfer (`GET`) have independent timeouts; neither is
//! retried.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::{ArtifactFetcher, FetchedArtifact};
use crate::domain::release::{archive_name, artifact_url};
use crate::domain::{FetchError, ReleaseId};
use crate::infra::fs::sha256_file;

/// Default artifact host.
pub const DEFAULT_ARTIFACT_BASE: &str = "https://github.com";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(300);

/// Downloads `<base>/<source>/releases/download/<id>/<repo>-<id>.tar.gz`.
pub struct HttpArtifactFetcher {
    base: String,
    probe_timeout: Duration,
    transfer_timeout: Duration,
}

impl HttpArtifactFetcher {
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeouts(mut self, probe: Duration, transfer: Duration) -> Self {
        self.probe_timeout = probe;
        self.transfer_timeout = transfer;
        self
    }
}

impl ArtifactFetcher for HttpArtifactFetcher {
    async fn fetch(
        &self,
        source: &str,
        release: &ReleaseId,
        scratch: &Path,
    ) -> Result<FetchedArtifact> {
        let url = artifact_url(&self.base, source, release);
        let file_name = archive_name(source, release);
        let scratch = scratch.to_path_buf();
        let (probe, transfer) = (self.probe_timeout, self.transfer_timeout);
        tracing::info!(%url, "fetching artifact");
        tokio::task::spawn_blocking(move || download(&url, &file_name, &scratch, probe, transfer))
            .await
            .context("artifact download task panicked")?
    }
}

fn download(
    url: &str,
    file_name: &str,
    scratch: &Path,
    probe_timeout: Duration,
    transfer_timeout: Duration,
) -> Result<FetchedArtifact> {
    ureq::head(url)
        .timeout(probe_timeout)
        .call()
        .map_err(|e| classify(url, e))?;

    std::fs::create_dir_all(scratch)
        .with_context(|| format!("creating scratch directory {}", scratch.display()))?;
    // Dropping `dir` on any early return removes the partial download.
    let dir = tempfile::Builder::new()
        .prefix("fetch-")
        .tempdir_in(scratch)
        .with_context(|| format!("creating fetch directory in {}", scratch.display()))?;
    let path: PathBuf = dir.path().join(file_name);

    let response = ureq::get(url)
        .timeout(transfer_timeout)
        .call()
        .map_err(|e| classify(url, e))?;
    let mut file = std::fs::File::create(&path)
        .with_context(|| format!("creating {}", path.display()))?;
    let bytes = std::io::copy(&mut response.into_reader(), &mut file).map_err(|e| {
        FetchError::TransferFailed {
            url: url.to_string(),
            reason: e.to_string(),
        }
    })?;
    file.sync_all()
        .with_context(|| format!("syncing {}", path.display()))?;
    drop(file);

    let sha256 = sha256_file(&path)?;
    tracing::info!(%url, bytes, %sha256, "artifact downloaded");
    Ok(FetchedArtifact {
        path,
        sha256,
        guard: Box::new(dir),
    })
}

fn classify(url: &str, err: ureq::Error) -> anyhow::Error {
    match err {
        ureq::Error::Status(404 | 410, _) => FetchError::ArtifactNotFound {
            url: url.to_string(),
        }
        .into(),
        ureq::Error::Status(code, _) => FetchError::TransferFailed {
            url: url.to_string(),
            reason: format!("HTTP {code}"),
        }
        .into(),
        ureq::Error::Transport(t) => FetchError::TransferFailed {
            url: url.to_string(),
            reason: t.to_string(),
        }
        .into(),
    }
}
