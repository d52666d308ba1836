//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator. [`ErrorClass`] walks an `anyhow` chain to decide how
//! a failure is reported and which exit code the process ends with.

use thiserror::Error;

// ── Input errors ──────────────────────────────────────────────────────────────

/// Malformed command-line input. Raised before any lock is taken.
#[derive(Debug, Error)]
pub enum InputError {
    #[error(
        "Invalid application name '{0}': must match ^[A-Za-z0-9][A-Za-z0-9._-]{{0,63}}$"
    )]
    InvalidAppName(String),

    #[error("Invalid release id '{0}': use a filesystem-safe tag such as v1.2.3")]
    InvalidReleaseId(String),

    #[error("Invalid source '{0}': expected <owner>/<repo>")]
    InvalidSource(String),

    #[error("Invalid environment entry '{0}': expected KEY=VALUE")]
    InvalidEnv(String),

    #[error("Invalid entry point '{0}': must be a relative path inside the release")]
    InvalidScript(String),

    #[error("Invalid retention count {0}: at least one release must be kept")]
    InvalidKeep(usize),
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to the persisted per-application deploy configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "Application '{app}' is already set up with a different configuration. \
Re-run setup with --force to overwrite it."
    )]
    AlreadyInitialized { app: String },

    #[error("Application '{app}' is not set up. Run 'keel setup --name {app} ...' first.")]
    NotInitialized { app: String },

    #[error("Configuration for '{app}' is corrupt: {reason}. Re-run setup with --force.")]
    Corrupt { app: String, reason: String },
}

// ── Fetch errors ──────────────────────────────────────────────────────────────

/// Errors raised while retrieving a release artifact.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Release artifact not found: {url}")]
    ArtifactNotFound { url: String },

    #[error("Transfer of {url} failed: {reason}")]
    TransferFailed { url: String, reason: String },
}

// ── Release errors ────────────────────────────────────────────────────────────

/// Errors related to installed releases and the current pointer.
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error(
        "Release '{0}' is already installed. Activate it with: keel rollback --name <app> --to {0}"
    )]
    AlreadyExists(String),

    #[error("Release '{0}' is already current.")]
    AlreadyCurrent(String),

    #[error("Release '{0}' is not installed.")]
    NotInstalled(String),

    #[error("No prior release to roll back to.")]
    NoPriorRelease,

    #[error("Artifact for release '{release}' could not be extracted: {detail}")]
    ExtractFailed { release: String, detail: String },

    #[error("Dependency installation failed for release '{release}': {detail}")]
    DependencyInstallFailed { release: String, detail: String },
}

// ── Process errors ────────────────────────────────────────────────────────────

/// Errors raised by the process controller after promotion.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Process '{app}' failed to start (supervisor reports {state}).")]
    StartFailed { app: String, state: String },

    #[error(
        "Release '{release}' failed to start and was rolled back to '{restored}'. \
Cause: {cause}\nInspect the application logs before deploying again."
    )]
    StartFailedRecovered {
        release: String,
        restored: String,
        cause: String,
    },

    #[error(
        "Release '{release}' failed and automatic recovery was not possible: {detail}\n\
The application '{app}' is DOWN. Operator action required: inspect the \
supervisor logs, then run 'keel rollback --name {app}' or deploy a fixed release."
    )]
    RecoveryFailed {
        app: String,
        release: String,
        detail: String,
    },
}

// ── Lock errors ───────────────────────────────────────────────────────────────

/// Errors related to the per-application deploy lock.
#[derive(Debug, Error)]
pub enum LockError {
    #[error(
        "A deployment for '{app}' is already in progress (lock held on {path}). \
Wait for it to finish and retry."
    )]
    DeploymentInProgress { app: String, path: String },
}

// ── Classification ────────────────────────────────────────────────────────────

/// How a failure is reported and which exit code it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing or invalid CLI input. No state was touched.
    Usage,
    /// A precondition does not hold. No state was touched; safe to retry
    /// after fixing it.
    Precondition,
    /// Failed before promotion; the old release is still current.
    Transient,
    /// Failed after promotion; liveness could not be guaranteed.
    Critical,
    /// Anything not covered by a typed domain error.
    Internal,
}

impl ErrorClass {
    /// Classify an error by the first typed domain error found in its chain.
    #[must_use]
    pub fn of(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if cause.downcast_ref::<InputError>().is_some() {
                return Self::Usage;
            }
            if cause.downcast_ref::<ConfigError>().is_some()
                || cause.downcast_ref::<LockError>().is_some()
            {
                return Self::Precondition;
            }
            if cause.downcast_ref::<FetchError>().is_some() {
                return Self::Transient;
            }
            if let Some(e) = cause.downcast_ref::<ReleaseError>() {
                return match e {
                    ReleaseError::ExtractFailed { .. }
                    | ReleaseError::DependencyInstallFailed { .. } => Self::Transient,
                    _ => Self::Precondition,
                };
            }
            if cause.downcast_ref::<ProcessError>().is_some() {
                return Self::Critical;
            }
        }
        Self::Internal
    }

    /// Process exit code for this class.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Internal => 1,
            Self::Usage => 2,
            Self::Precondition => 3,
            Self::Transient => 4,
            Self::Critical => 5,
        }
    }
}

/// Stable machine-readable code for the `--json` error object.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<InputError>() {
            return match e {
                InputError::InvalidAppName(_) => "INVALID_APP_NAME",
                InputError::InvalidReleaseId(_) => "INVALID_RELEASE_ID",
                InputError::InvalidSource(_) => "INVALID_SOURCE",
                InputError::InvalidEnv(_) => "INVALID_ENV",
                InputError::InvalidScript(_) => "INVALID_SCRIPT",
                InputError::InvalidKeep(_) => "INVALID_KEEP",
            };
        }
        if let Some(e) = cause.downcast_ref::<ConfigError>() {
            return match e {
                ConfigError::AlreadyInitialized { .. } => "ALREADY_INITIALIZED",
                ConfigError::NotInitialized { .. } => "NOT_INITIALIZED",
                ConfigError::Corrupt { .. } => "CONFIG_CORRUPT",
            };
        }
        if let Some(e) = cause.downcast_ref::<FetchError>() {
            return match e {
                FetchError::ArtifactNotFound { .. } => "ARTIFACT_NOT_FOUND",
                FetchError::TransferFailed { .. } => "TRANSFER_FAILED",
            };
        }
        if let Some(e) = cause.downcast_ref::<ReleaseError>() {
            return match e {
                ReleaseError::AlreadyExists(_) => "RELEASE_ALREADY_EXISTS",
                ReleaseError::AlreadyCurrent(_) => "ALREADY_CURRENT",
                ReleaseError::NotInstalled(_) => "RELEASE_NOT_INSTALLED",
                ReleaseError::NoPriorRelease => "NO_PRIOR_RELEASE",
                ReleaseError::ExtractFailed { .. } => "EXTRACT_FAILED",
                ReleaseError::DependencyInstallFailed { .. } => "DEPENDENCY_INSTALL_FAILED",
            };
        }
        if let Some(e) = cause.downcast_ref::<ProcessError>() {
            return match e {
                ProcessError::StartFailed { .. } => "PROCESS_START_FAILED",
                ProcessError::StartFailedRecovered { .. } => "PROCESS_START_FAILED_ROLLED_BACK",
                ProcessError::RecoveryFailed { .. } => "RECOVERY_FAILED",
            };
        }
        if cause.downcast_ref::<LockError>().is_some() {
            return "DEPLOYMENT_IN_PROGRESS";
        }
    }
    "INTERNAL"
}
