//! Process manifest handed to the supervisor (PM2 ecosystem format).
//!
//! The manifest is a projection of [`DeployConfig`] plus application paths;
//! it is regenerated before every start and never edited in place.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::config::DeployConfig;
use crate::domain::layout::AppLayout;

/// Environment defaults applied before config-declared variables.
pub const DEFAULT_ENV: &[(&str, &str)] = &[("NODE_ENV", "production")];

/// Top-level ecosystem document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessManifest {
    pub apps: Vec<ManifestApp>,
}

/// One supervised process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestApp {
    pub name: String,
    /// Working directory: the release the current pointer names.
    pub cwd: PathBuf,
    pub script: String,
    pub out_file: PathBuf,
    pub error_file: PathBuf,
    pub merge_logs: bool,
    pub env: BTreeMap<String, String>,
}

impl ProcessManifest {
    /// Build the manifest for `layout` running out of `cwd`.
    #[must_use]
    pub fn project(layout: &AppLayout, config: &DeployConfig, cwd: &Path) -> Self {
        let mut env: BTreeMap<String, String> = DEFAULT_ENV
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        env.extend(config.env.clone());

        Self {
            apps: vec![ManifestApp {
                name: layout.name().to_string(),
                cwd: cwd.to_path_buf(),
                script: config.script.clone(),
                out_file: layout.out_log(),
                error_file: layout.error_log(),
                merge_logs: true,
                env,
            }],
        }
    }
}
