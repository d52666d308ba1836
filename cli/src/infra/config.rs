//! Infrastructure implementation of the `ConfigStore` port.

use anyhow::{Context, Result};

use crate::application::ports::ConfigStore;
use crate::domain::{AppLayout, ConfigError, DeployConfig};
use crate::infra::fs::write_atomic;

/// Production implementation of `ConfigStore` that uses `<base>/config.yaml`.
pub struct YamlConfigStore;

impl ConfigStore for YamlConfigStore {
    fn exists(&self, layout: &AppLayout) -> bool {
        layout.config_path().is_file()
    }

    fn initialize(
        &self,
        layout: &AppLayout,
        config: &DeployConfig,
        overwrite: bool,
    ) -> Result<()> {
        let path = layout.config_path();
        if !overwrite && self.exists(layout) {
            return Err(ConfigError::AlreadyInitialized {
                app: layout.name().to_string(),
            }
            .into());
        }
        config.validate()?;
        let content = serde_yaml::to_string(config).context("cannot serialize config")?;
        write_atomic(&path, content.as_bytes())
            .with_context(|| format!("cannot write {}", path.display()))?;
        tracing::info!(path = %path.display(), "config written");
        Ok(())
    }

    fn load(&self, layout: &AppLayout) -> Result<DeployConfig> {
        let path = layout.config_path();
        let app = layout.name().to_string();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotInitialized { app }.into());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("cannot read {}", path.display()));
            }
        };
        let config: DeployConfig =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Corrupt {
                app: app.clone(),
                reason: e.to_string(),
            })?;
        config.validate().map_err(|e| ConfigError::Corrupt {
            app,
            reason: e.to_string(),
        })?;
        Ok(config)
    }
}
