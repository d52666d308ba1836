//! Retention policy — prune old releases and sweep stale scratch state.

use std::time::Duration;

use anyhow::Result;

use crate::application::ports::ReleaseStore;
use crate::domain::{AppLayout, ReleaseId};

/// What a housekeeping pass removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HousekeepingReport {
    pub pruned: Vec<ReleaseId>,
    /// Scratch entries and staging trees removed.
    pub swept: usize,
}

/// Prune releases beyond `keep`, then remove scratch entries and staging
/// trees older than `grace`.
///
/// The sweep runs even when pruning fails; the first error is returned
/// after both steps were attempted.
///
/// # Errors
///
/// Returns an error if either step fails.
pub fn housekeep(
    releases: &impl ReleaseStore,
    layout: &AppLayout,
    keep: usize,
    grace: Duration,
) -> Result<HousekeepingReport> {
    let pruned = releases.prune(layout, keep);
    let swept = releases.sweep_stale(layout, grace);
    let report = HousekeepingReport {
        pruned: pruned?,
        swept: swept?,
    };
    if !report.pruned.is_empty() || report.swept > 0 {
        tracing::info!(
            app = %layout.name(),
            pruned = report.pruned.len(),
            swept = report.swept,
            "housekeeping complete"
        );
    }
    Ok(report)
}
