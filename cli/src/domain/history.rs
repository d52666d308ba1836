//! Deployment history entries — one human-readable line per terminal
//! outcome of `deploy` or `rollback`.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

/// Orchestration operation that produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Deploy,
    Rollback,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Deploy => "deploy",
            Self::Rollback => "rollback",
        })
    }
}

/// Terminal outcome recorded for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The requested release is current and running.
    Success,
    /// The requested release was already current; nothing changed.
    AlreadyCurrent,
    /// Failed before promotion; the previous release is still current.
    Failed,
    /// The new release failed to start and the previous one was restored.
    RolledBack,
    /// Recovery failed; the application may be down.
    Fatal,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::AlreadyCurrent => "already-current",
            Self::Failed => "failed",
            Self::RolledBack => "rolled-back",
            Self::Fatal => "fatal",
        })
    }
}

/// One append-only history record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentLogEntry {
    pub timestamp: DateTime<Utc>,
    pub action: Action,
    /// Release id, or `-` when none could be determined.
    pub release: String,
    pub outcome: Outcome,
    pub actor: String,
    /// Stage that failed, for non-success outcomes.
    pub stage: Option<&'static str>,
    pub detail: Option<String>,
}

impl DeploymentLogEntry {
    #[must_use]
    pub fn new(action: Action, release: Option<&str>, outcome: Outcome, actor: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            release: release.unwrap_or("-").to_string(),
            outcome,
            actor: actor.to_string(),
            stage: None,
            detail: None,
        }
    }

    #[must_use]
    pub fn with_failure(mut self, stage: &'static str, detail: impl Into<String>) -> Self {
        self.stage = Some(stage);
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for DeploymentLogEntry {
    /// `2026-10-19T12:00:00Z deploy release=v1.0.1 outcome=failed actor=ops stage=install detail="..."`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} release={} outcome={} actor={}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.action,
            self.release,
            self.outcome,
            self.actor,
        )?;
        if let Some(stage) = self.stage {
            write!(f, " stage={stage}")?;
        }
        if let Some(detail) = &self.detail {
            // Debug formatting escapes newlines so every entry stays on one line.
            write!(f, " detail={detail:?}")?;
        }
        Ok(())
    }
}
