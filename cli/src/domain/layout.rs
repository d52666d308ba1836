//! Application naming and on-disk layout.
//!
//! Pure path arithmetic only. Nothing here touches the filesystem; the
//! infra layer creates and reads what these paths describe.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::error::InputError;
use crate::domain::release::ReleaseId;

/// Deploy configuration file, relative to the application base directory.
pub const CONFIG_FILE: &str = "config.yaml";
/// Generated process manifest consumed by the supervisor.
pub const MANIFEST_FILE: &str = "ecosystem.config.json";
/// Directory holding one sub-directory per installed release.
pub const RELEASES_DIR: &str = "releases";
/// The current-release indirection.
pub const CURRENT_LINK: &str = "current";
/// Scratch space for in-flight artifact downloads.
pub const SCRATCH_DIR: &str = "tmp";
/// Process stdout/stderr files.
pub const LOGS_DIR: &str = "logs";
/// Append-only deployment history.
pub const HISTORY_FILE: &str = "deploy.log";
/// Advisory lock file serialising orchestration operations.
pub const LOCK_FILE: &str = ".deploy.lock";

static APP_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,63}$").expect("valid regex")
});

/// Validated application name; safe to use as a path component and as the
/// supervisor process name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppName(String);

impl AppName {
    /// # Errors
    ///
    /// Returns [`InputError::InvalidAppName`] if the name is not a safe path
    /// component.
    pub fn parse(name: &str) -> Result<Self, InputError> {
        if APP_NAME_RE.is_match(name) && name != "." && name != ".." {
            Ok(Self(name.to_string()))
        } else {
            Err(InputError::InvalidAppName(name.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AppName {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Every path belonging to one application, rooted at `<root>/<name>`.
#[derive(Debug, Clone)]
pub struct AppLayout {
    name: AppName,
    base: PathBuf,
}

impl AppLayout {
    #[must_use]
    pub fn new(root: &Path, name: &AppName) -> Self {
        Self {
            name: name.clone(),
            base: root.join(name.as_str()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &AppName {
        &self.name
    }

    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.base.join(CONFIG_FILE)
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.base.join(MANIFEST_FILE)
    }

    #[must_use]
    pub fn releases_dir(&self) -> PathBuf {
        self.base.join(RELEASES_DIR)
    }

    #[must_use]
    pub fn release_dir(&self, id: &ReleaseId) -> PathBuf {
        self.releases_dir().join(id.as_str())
    }

    /// Target written into the current pointer. Relative, so the whole base
    /// directory can be moved without breaking the link.
    #[must_use]
    pub fn pointer_target(id: &ReleaseId) -> PathBuf {
        Path::new(RELEASES_DIR).join(id.as_str())
    }

    #[must_use]
    pub fn current_link(&self) -> PathBuf {
        self.base.join(CURRENT_LINK)
    }

    #[must_use]
    pub fn scratch_dir(&self) -> PathBuf {
        self.base.join(SCRATCH_DIR)
    }

    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.base.join(LOGS_DIR)
    }

    #[must_use]
    pub fn out_log(&self) -> PathBuf {
        self.logs_dir().join(format!("{}-out.log", self.name))
    }

    #[must_use]
    pub fn error_log(&self) -> PathBuf {
        self.logs_dir().join(format!("{}-error.log", self.name))
    }

    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.base.join(HISTORY_FILE)
    }

    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.base.join(LOCK_FILE)
    }

    /// Directories `setup` creates. Order matters: parents first.
    #[must_use]
    pub fn skeleton(&self) -> [PathBuf; 4] {
        [
            self.base.clone(),
            self.releases_dir(),
            self.scratch_dir(),
            self.logs_dir(),
        ]
    }
}
