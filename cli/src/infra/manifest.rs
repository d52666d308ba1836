//! Infrastructure implementation of the `ManifestWriter` port.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::ManifestWriter;
use crate::domain::AppLayout;
use crate::domain::manifest::ProcessManifest;
use crate::infra::fs::write_atomic;

/// Writes the PM2 ecosystem file as pretty-printed JSON.
pub struct JsonManifestWriter;

impl ManifestWriter for JsonManifestWriter {
    fn write_manifest(&self, layout: &AppLayout, manifest: &ProcessManifest) -> Result<PathBuf> {
        let path = layout.manifest_path();
        let content = serde_json::to_string_pretty(manifest).context("serializing manifest")?;
        write_atomic(&path, content.as_bytes())
            .with_context(|| format!("writing manifest {}", path.display()))?;
        tracing::debug!(path = %path.display(), "manifest written");
        Ok(path)
    }
}
