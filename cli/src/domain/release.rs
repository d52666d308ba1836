//! Release identity, metadata and the pure selection rules used by the
//! release store (previous release, retention).

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::InputError;

/// Metadata file written inside every release directory.
pub const METADATA_FILE: &str = ".keel-release.json";

/// Releases kept by housekeeping when no `--keep` is given.
pub const DEFAULT_KEEP_RELEASES: usize = 5;

static RELEASE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.+-]{0,127}$").expect("valid regex")
});

static SOURCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*/[A-Za-z0-9_.-]+$").expect("valid regex")
});

/// Externally supplied release tag. Opaque, but guaranteed to be a single
/// safe path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReleaseId(String);

impl ReleaseId {
    /// # Errors
    ///
    /// Returns [`InputError::InvalidReleaseId`] if the tag is not filesystem-safe.
    pub fn parse(id: &str) -> Result<Self, InputError> {
        if RELEASE_ID_RE.is_match(id) {
            Ok(Self(id.to_string()))
        } else {
            Err(InputError::InvalidReleaseId(id.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ReleaseId {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ReleaseId {
    type Error = InputError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ReleaseId> for String {
    fn from(id: ReleaseId) -> Self {
        id.0
    }
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a release directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseStatus {
    /// Being extracted and prepared under a staging name.
    Installing,
    /// Fully installed under its final name; immutable.
    Installed,
    /// Installation failed; the tree is scheduled for removal.
    Failed,
}

/// On-disk release metadata (`releases/<id>/.keel-release.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    pub id: ReleaseId,
    pub installed_at: DateTime<Utc>,
    pub status: ReleaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_sha256: Option<String>,
}

/// An installed release as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Release {
    pub id: ReleaseId,
    pub path: PathBuf,
    pub installed_at: DateTime<Utc>,
    pub status: ReleaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_sha256: Option<String>,
}

impl Release {
    #[must_use]
    pub fn from_metadata(meta: ReleaseMetadata, path: PathBuf) -> Self {
        Self {
            id: meta.id,
            path,
            installed_at: meta.installed_at,
            status: meta.status,
            artifact_sha256: meta.artifact_sha256,
        }
    }

    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.status == ReleaseStatus::Installed
    }
}

/// Validate an artifact source identity (`owner/repo`).
///
/// # Errors
///
/// Returns [`InputError::InvalidSource`] for anything else.
pub fn validate_source(source: &str) -> Result<(), InputError> {
    if SOURCE_RE.is_match(source) && !source.split('/').any(|p| p == "." || p == "..") {
        Ok(())
    } else {
        Err(InputError::InvalidSource(source.to_string()))
    }
}

/// Archive name for a release: `<repo>-<id>.tar.gz`.
#[must_use]
pub fn archive_name(source: &str, id: &ReleaseId) -> String {
    let repo = source.rsplit('/').next().unwrap_or(source);
    format!("{repo}-{id}.tar.gz")
}

/// Deterministic artifact URL:
/// `<base>/<source>/releases/download/<id>/<archive>`.
#[must_use]
pub fn artifact_url(base: &str, source: &str, id: &ReleaseId) -> String {
    format!(
        "{}/{source}/releases/download/{id}/{}",
        base.trim_end_matches('/'),
        archive_name(source, id)
    )
}

/// Newest first by install time, ties broken by id so ordering is total.
fn newest_first(a: &Release, b: &Release) -> Ordering {
    b.installed_at
        .cmp(&a.installed_at)
        .then_with(|| b.id.cmp(&a.id))
}

/// Sort releases newest first.
pub fn sort_newest_first(releases: &mut [Release]) {
    releases.sort_by(newest_first);
}

/// The most recently installed release other than `current`.
#[must_use]
pub fn select_previous<'a>(
    releases: &'a [Release],
    current: Option<&ReleaseId>,
) -> Option<&'a Release> {
    releases
        .iter()
        .filter(|r| r.is_installed() && Some(&r.id) != current)
        .min_by(|a, b| newest_first(a, b))
}

/// Releases housekeeping may delete so that `keep` remain.
///
/// The current release always survives and counts toward `keep`; the
/// remaining slots go to the newest other releases.
#[must_use]
pub fn select_prunable<'a>(
    releases: &'a [Release],
    current: Option<&ReleaseId>,
    keep: usize,
) -> Vec<&'a Release> {
    let mut others: Vec<&Release> = releases
        .iter()
        .filter(|r| r.is_installed() && Some(&r.id) != current)
        .collect();
    others.sort_by(|a, b| newest_first(a, b));

    let current_installed = current.is_some_and(|c| releases.iter().any(|r| &r.id == c));
    let slots = keep.saturating_sub(usize::from(current_installed));
    others.into_iter().skip(slots).collect()
}
