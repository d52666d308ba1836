//! Status reads: no lock, no side effects.

#![allow(clippy::expect_used)]

use keel_cli::application::ports::{DeployLocker, ProcessState};
use keel_cli::domain::ConfigError;

use crate::helpers::{APP, Harness, app, good_release, release};

#[tokio::test]
async fn test_status_reports_current_release_process_and_history() {
    let h = Harness::new();
    h.setup().await;
    for id in ["v1", "v2"] {
        h.orch.fetcher.publish(id, good_release(id));
        h.deploy(id).await.expect("deploy");
    }

    let status = h.orch.status(&app()).await.expect("status");

    assert_eq!(status.app, APP);
    assert_eq!(status.source, "acme/demo");
    assert_eq!(status.current, Some(release("v2")));
    let ids: Vec<&str> = status.releases.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["v2", "v1"]);
    assert_eq!(status.process, ProcessState::Running);
    assert_eq!(status.history.len(), 2);
    assert!(status.history[1].contains("release=v2"));
}

#[tokio::test]
async fn test_status_of_fresh_app_has_no_current_release() {
    let h = Harness::new();
    h.setup().await;

    let status = h.orch.status(&app()).await.expect("status");

    assert!(status.current.is_none());
    assert!(status.releases.is_empty());
    assert_eq!(status.process, ProcessState::NotFound);
    assert!(status.history.is_empty());

    let json = serde_json::to_value(&status).expect("json");
    assert_eq!(json["process"], "not_found");
    assert!(json["current"].is_null());
}

#[tokio::test]
async fn test_status_does_not_wait_for_a_running_deploy() {
    let h = Harness::new();
    h.setup().await;
    let _held = h.orch.locks.acquire(&h.layout()).await.expect("lock");

    h.orch.status(&app()).await.expect("status while locked");
}

#[tokio::test]
async fn test_status_survives_missing_supervisor() {
    let h = Harness::new();
    h.setup().await;
    h.orch.supervisor.make_unavailable();

    let status = h.orch.status(&app()).await.expect("status");

    assert_eq!(status.process, ProcessState::Other("unknown".to_string()));
}

#[tokio::test]
async fn test_status_of_unknown_app_is_not_initialized() {
    let h = Harness::new();

    let err = h.orch.status(&app()).await.expect_err("unknown app");

    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::NotInitialized { .. })
    ));
}
