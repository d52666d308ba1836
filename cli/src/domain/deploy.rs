//! Orchestration requests and the deploy/rollback state machines.
//!
//! Each orchestration run owns a [`StateMachine`] value. Stages advance it
//! strictly in order; a failure captures the stage that was being attempted
//! so the history entry and the error report name it.

use std::fmt;

use crate::domain::config::DeployConfig;
use crate::domain::error::InputError;
use crate::domain::layout::AppName;
use crate::domain::release::ReleaseId;

// ── Requests ─────────────────────────────────────────────────────────────────

/// Input to `setup`.
#[derive(Debug, Clone)]
pub struct SetupRequest {
    pub app: AppName,
    pub config: DeployConfig,
    /// Replace an existing, different configuration.
    pub overwrite: bool,
}

/// Input to `deploy`.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub app: AppName,
    pub release: ReleaseId,
    /// Installed releases to retain after a successful deploy.
    pub keep: usize,
    pub actor: String,
}

impl DeployRequest {
    /// # Errors
    ///
    /// Returns [`InputError::InvalidKeep`] when `keep` is zero.
    pub fn new(
        app: AppName,
        release: ReleaseId,
        keep: usize,
        actor: impl Into<String>,
    ) -> Result<Self, InputError> {
        if keep == 0 {
            return Err(InputError::InvalidKeep(keep));
        }
        Ok(Self {
            app,
            release,
            keep,
            actor: actor.into(),
        })
    }
}

/// Input to `rollback`.
#[derive(Debug, Clone)]
pub struct RollbackRequest {
    pub app: AppName,
    /// Explicit release to activate; `None` means the previous one.
    pub target: Option<ReleaseId>,
    pub actor: String,
}

// ── State machines ───────────────────────────────────────────────────────────

/// A linear sequence of states with a stage label for each transition.
pub trait Stage: Copy + Eq + fmt::Debug {
    /// State every run begins in.
    const INITIAL: Self;

    /// The state that follows `self`, or `None` for the terminal state.
    fn next(self) -> Option<Self>;

    /// Short label for the action that reaches `self`.
    fn label(self) -> &'static str;
}

/// `Start → ConfigLoaded → Fetched → Installed → Stopped → Promoted → Started → Logged`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployState {
    Start,
    ConfigLoaded,
    Fetched,
    Installed,
    Stopped,
    Promoted,
    Started,
    Logged,
}

impl Stage for DeployState {
    const INITIAL: Self = Self::Start;

    fn next(self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::ConfigLoaded),
            Self::ConfigLoaded => Some(Self::Fetched),
            Self::Fetched => Some(Self::Installed),
            Self::Installed => Some(Self::Stopped),
            Self::Stopped => Some(Self::Promoted),
            Self::Promoted => Some(Self::Started),
            Self::Started => Some(Self::Logged),
            Self::Logged => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::ConfigLoaded => "load-config",
            Self::Fetched => "fetch",
            Self::Installed => "install",
            Self::Stopped => "stop",
            Self::Promoted => "promote",
            Self::Started => "start-process",
            Self::Logged => "log",
        }
    }
}

/// `Start → PriorFound → Stopped → Promoted → Started → Logged`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackState {
    Start,
    PriorFound,
    Stopped,
    Promoted,
    Started,
    Logged,
}

impl Stage for RollbackState {
    const INITIAL: Self = Self::Start;

    fn next(self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::PriorFound),
            Self::PriorFound => Some(Self::Stopped),
            Self::Stopped => Some(Self::Promoted),
            Self::Promoted => Some(Self::Started),
            Self::Started => Some(Self::Logged),
            Self::Logged => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::PriorFound => "find-prior",
            Self::Stopped => "stop",
            Self::Promoted => "promote",
            Self::Started => "start-process",
            Self::Logged => "log",
        }
    }
}

/// Tracks one run through a [`Stage`] sequence.
#[derive(Debug, Clone)]
pub struct StateMachine<S: Stage> {
    trail: Vec<S>,
}

impl<S: Stage> Default for StateMachine<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Stage> StateMachine<S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            trail: vec![S::INITIAL],
        }
    }

    /// The state most recently reached.
    #[must_use]
    pub fn current(&self) -> S {
        self.trail.last().copied().unwrap_or(S::INITIAL)
    }

    /// Every state reached so far, in order.
    #[must_use]
    pub fn trail(&self) -> &[S] {
        &self.trail
    }

    /// The state the next transition would reach.
    #[must_use]
    pub fn attempting(&self) -> Option<S> {
        self.current().next()
    }

    /// Record that `to` was reached.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `to` is not the direct successor of the
    /// current state; stages are called in a fixed order, so this is a
    /// programming error.
    pub fn advance(&mut self, to: S) {
        debug_assert_eq!(
            self.attempting(),
            Some(to),
            "illegal transition from {:?} to {to:?}",
            self.current()
        );
        tracing::debug!(state = ?to, "state reached");
        self.trail.push(to);
    }

    /// Wrap `error` with the stage that was being attempted.
    pub fn fail(&self, error: impl Into<anyhow::Error>) -> StageFailure<S> {
        StageFailure {
            stage: self.attempting().unwrap_or_else(|| self.current()),
            error: error.into(),
        }
    }
}

/// `Failed(stage, cause)`: the terminal failure of a run.
#[derive(Debug)]
pub struct StageFailure<S: Stage> {
    pub stage: S,
    pub error: anyhow::Error,
}
