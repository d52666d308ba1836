//! Rollback use-case: manual re-activation of an installed release.

#![allow(clippy::expect_used)]

use keel_cli::application::ports::ProcessState;
use keel_cli::application::services::rollback::RollbackOutcome;
use keel_cli::domain::{ConfigError, ErrorClass, ProcessError, ReleaseError};

use crate::fakes::CRASH_MARKER;
use crate::helpers::{APP, Harness, good_release, release};

async fn with_releases(ids: &[&str]) -> Harness {
    let h = Harness::new();
    h.setup().await;
    for id in ids {
        h.orch.fetcher.publish(id, good_release(id));
        h.deploy(id).await.expect("deploy");
    }
    h
}

#[tokio::test]
async fn test_rollback_activates_previous_release() {
    let h = with_releases(&["v1", "v2"]).await;
    h.orch.supervisor.clear_calls();

    let outcome = h.rollback(None).await.expect("rollback");

    let RollbackOutcome::RolledBack { release: rel, from } = outcome else {
        panic!("expected a rollback");
    };
    assert_eq!(rel.id, release("v1"));
    assert_eq!(from, Some(release("v2")));
    assert_eq!(h.current().as_deref(), Some("v1"));
    assert_eq!(h.orch.supervisor.state(APP), ProcessState::Running);
    assert_eq!(h.orch.supervisor.calls()[0], "stop demo");
    // Rollback never deletes releases.
    assert_eq!(h.installed(), vec!["v2", "v1"]);
    // No artifact is fetched again.
    assert_eq!(h.orch.fetcher.calls(), vec!["v1", "v2"]);

    let line = h.history().last().cloned().expect("entry");
    assert!(line.contains("rollback release=v1 outcome=success actor=ops"), "{line}");
}

#[tokio::test]
async fn test_rollback_to_explicit_release() {
    let h = with_releases(&["v1", "v2", "v3"]).await;

    h.rollback(Some("v1")).await.expect("rollback");

    assert_eq!(h.current().as_deref(), Some("v1"));
}

#[tokio::test]
async fn test_rollback_to_current_release_is_a_no_op() {
    let h = with_releases(&["v1", "v2"]).await;
    h.orch.supervisor.clear_calls();

    let outcome = h.rollback(Some("v2")).await.expect("no-op");

    assert!(matches!(outcome, RollbackOutcome::AlreadyCurrent { .. }));
    assert!(h.orch.supervisor.calls().is_empty());
    assert!(h.history().last().expect("entry").contains("outcome=already-current"));
}

#[tokio::test]
async fn test_rollback_to_unknown_release_is_refused() {
    let h = with_releases(&["v1", "v2"]).await;

    let err = h.rollback(Some("v7")).await.expect_err("unknown");

    assert!(matches!(
        err.downcast_ref::<ReleaseError>(),
        Some(ReleaseError::NotInstalled(_))
    ));
    assert_eq!(ErrorClass::of(&err).exit_code(), 3);
    assert_eq!(h.current().as_deref(), Some("v2"));
}

#[tokio::test]
async fn test_rollback_with_single_release_has_no_prior() {
    let h = with_releases(&["v1"]).await;
    h.orch.supervisor.clear_calls();

    let err = h.rollback(None).await.expect_err("nothing to roll back to");

    assert!(matches!(
        err.downcast_ref::<ReleaseError>(),
        Some(ReleaseError::NoPriorRelease)
    ));
    assert_eq!(h.current().as_deref(), Some("v1"));
    assert!(h.orch.supervisor.calls().is_empty());
    let line = h.history().last().cloned().expect("entry");
    assert!(line.contains("rollback release=- outcome=failed"), "{line}");
    assert!(line.contains("stage=find-prior"), "{line}");
}

#[tokio::test]
async fn test_rollback_before_setup_is_not_initialized() {
    let h = Harness::new();

    let err = h.rollback(None).await.expect_err("not set up");

    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::NotInitialized { .. })
    ));
}

#[tokio::test]
async fn test_rollback_target_that_crashes_restores_the_release_it_replaced() {
    let h = with_releases(&["v1", "v2"]).await;
    let v1 = h.layout().release_dir(&release("v1"));
    std::fs::write(v1.join(CRASH_MARKER), "").expect("marker");

    let err = h.rollback(None).await.expect_err("target crashes");

    assert!(matches!(
        err.downcast_ref::<ProcessError>(),
        Some(ProcessError::StartFailedRecovered { .. })
    ));
    assert_eq!(h.current().as_deref(), Some("v2"));
    assert_eq!(h.orch.supervisor.state(APP), ProcessState::Running);
    assert!(h.history().last().expect("entry").contains("outcome=rolled-back"));
}
