//! Infrastructure implementation of the `DeployHistory` port.
//!
//! One line per entry, appended with `O_APPEND` so concurrent readers never
//! see a partial line.

use std::io::Write;

use anyhow::{Context, Result};

use crate::application::ports::DeployHistory;
use crate::domain::AppLayout;
use crate::domain::history::DeploymentLogEntry;

/// Appends to `<base>/deploy.log`.
pub struct FileDeployHistory;

impl DeployHistory for FileDeployHistory {
    fn append(&self, layout: &AppLayout, entry: &DeploymentLogEntry) -> Result<()> {
        let path = layout.history_path();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        let line = format!("{entry}\n");
        file.write_all(line.as_bytes())
            .with_context(|| format!("appending to {}", path.display()))?;
        file.sync_data()
            .with_context(|| format!("syncing {}", path.display()))?;
        Ok(())
    }

    fn tail(&self, layout: &AppLayout, lines: usize) -> Result<Vec<String>> {
        let path = layout.history_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let all: Vec<&str> = content.lines().filter(|l| !l.is_empty()).collect();
        let start = all.len().saturating_sub(lines);
        Ok(all[start..].iter().map(|l| (*l).to_string()).collect())
    }
}
