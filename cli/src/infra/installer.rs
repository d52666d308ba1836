//! Infrastructure implementation of the `DependencyInstaller` port using npm.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use crate::application::ports::{CommandRunner, DependencyInstaller};
use crate::infra::command_runner::output_tail;

/// Upper bound for a dependency install.
pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(600);

/// Installs production dependencies with `npm ci` (lockfile present) or
/// `npm install`. Trees without a `package.json` are left alone.
pub struct NpmInstaller<R: CommandRunner> {
    runner: R,
    timeout: Duration,
}

impl<R: CommandRunner> NpmInstaller<R> {
    #[must_use]
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            timeout: DEFAULT_INSTALL_TIMEOUT,
        }
    }
}

/// npm arguments for `tree`, or `None` when there is nothing to install.
#[must_use]
pub fn npm_args(tree: &Path) -> Option<&'static [&'static str]> {
    if !tree.join("package.json").is_file() {
        return None;
    }
    if tree.join("package-lock.json").is_file() {
        Some(&["ci", "--omit=dev"])
    } else {
        Some(&["install", "--omit=dev"])
    }
}

impl<R: CommandRunner> DependencyInstaller for NpmInstaller<R> {
    async fn install(&self, tree: &Path) -> Result<()> {
        let Some(args) = npm_args(tree) else {
            tracing::debug!(tree = %tree.display(), "no package.json, skipping dependencies");
            return Ok(());
        };
        tracing::info!(tree = %tree.display(), ?args, "installing dependencies");
        let output = self.runner.run_in(tree, "npm", args, self.timeout).await?;
        anyhow::ensure!(
            output.status.success(),
            "npm {} failed: {}",
            args.join(" "),
            output_tail(&output)
        );
        Ok(())
    }
}
