//! Deploy use-case against the real filesystem adapters.

#![allow(clippy::expect_used)]

use keel_cli::application::ports::{DeployLocker, ProcessState};
use keel_cli::application::services::deploy::DeployOutcome;
use keel_cli::domain::manifest::ProcessManifest;
use keel_cli::domain::{
    ConfigError, ErrorClass, FetchError, LockError, ProcessError, ReleaseError,
};
use keel_cli::infra::releases::FsReleaseStore;

use crate::fakes::{FakeInstaller, FlakyPromote};
use crate::helpers::{
    APP, Harness, crashing_release, good_release, release, uninstallable_release,
};

async fn deployed(h: &Harness, ids: &[&str]) {
    for id in ids {
        h.orch.fetcher.publish(id, good_release(id));
        h.deploy(id).await.expect("deploy");
    }
}

fn last_line(h: &Harness) -> String {
    h.history().last().cloned().expect("history entry")
}

#[tokio::test]
async fn test_first_deploy_installs_promotes_and_starts() {
    let h = Harness::new();
    h.setup().await;
    h.orch.fetcher.publish("v1.0.0", good_release("v1.0.0"));

    let outcome = h.deploy("v1.0.0").await.expect("deploy");

    let DeployOutcome::Deployed {
        release: rel,
        previous,
        ..
    } = outcome
    else {
        panic!("expected a deployment, got {outcome:?}");
    };
    assert_eq!(rel.id, release("v1.0.0"));
    assert!(previous.is_none());
    assert!(rel.artifact_sha256.is_some());
    assert_eq!(h.current().as_deref(), Some("v1.0.0"));
    assert_eq!(h.orch.supervisor.state(APP), ProcessState::Running);
    assert!(rel.path.join("server.js").is_file());
    assert!(rel.path.join("node_modules").is_dir());

    let manifest: ProcessManifest = serde_json::from_slice(
        &std::fs::read(h.layout().manifest_path()).expect("manifest"),
    )
    .expect("json");
    assert_eq!(manifest.apps[0].cwd, h.layout().release_dir(&release("v1.0.0")));

    let line = last_line(&h);
    assert!(line.contains("deploy release=v1.0.0 outcome=success actor=ops"), "{line}");
}

#[tokio::test]
async fn test_second_deploy_stops_old_process_before_starting_new() {
    let h = Harness::new();
    h.setup().await;
    deployed(&h, &["v1"]).await;
    h.orch.supervisor.clear_calls();
    h.orch.fetcher.publish("v2", good_release("v2"));

    let outcome = h.deploy("v2").await.expect("deploy");

    let DeployOutcome::Deployed { previous, .. } = outcome else {
        panic!("expected a deployment");
    };
    assert_eq!(previous, Some(release("v1")));
    let calls = h.orch.supervisor.calls();
    assert_eq!(calls.len(), 2, "{calls:?}");
    assert_eq!(calls[0], "stop demo");
    assert!(calls[1].ends_with("releases/v2"), "{calls:?}");
    assert_eq!(h.installed(), vec!["v2", "v1"]);
}

#[tokio::test]
async fn test_deploy_before_setup_is_not_initialized_and_writes_nothing() {
    let h = Harness::new();
    h.orch.fetcher.publish("v1", good_release("v1"));

    let err = h.deploy("v1").await.expect_err("not set up");

    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::NotInitialized { .. })
    ));
    assert_eq!(ErrorClass::of(&err).exit_code(), 3);
    assert!(h.orch.fetcher.calls().is_empty());
    assert!(!h.layout().base().exists());
}

#[tokio::test]
async fn test_missing_artifact_leaves_current_release_running() {
    let h = Harness::new();
    h.setup().await;
    deployed(&h, &["v1"]).await;
    h.orch.supervisor.clear_calls();

    let err = h.deploy("v9").await.expect_err("no artifact");

    assert!(matches!(
        err.downcast_ref::<FetchError>(),
        Some(FetchError::ArtifactNotFound { .. })
    ));
    assert_eq!(ErrorClass::of(&err).exit_code(), 4);
    assert_eq!(h.current().as_deref(), Some("v1"));
    assert_eq!(h.orch.supervisor.state(APP), ProcessState::Running);
    assert!(h.orch.supervisor.calls().is_empty());
    assert_eq!(h.installed(), vec!["v1"]);

    let line = last_line(&h);
    assert!(line.contains("release=v9 outcome=failed"), "{line}");
    assert!(line.contains("stage=fetch"), "{line}");
}

#[tokio::test]
async fn test_dependency_failure_discards_the_partial_release() {
    let h = Harness::new();
    h.setup().await;
    deployed(&h, &["v1"]).await;
    h.orch.fetcher.publish("v2", uninstallable_release());

    let err = h.deploy("v2").await.expect_err("install fails");

    assert!(matches!(
        err.downcast_ref::<ReleaseError>(),
        Some(ReleaseError::DependencyInstallFailed { .. })
    ));
    assert_eq!(h.current().as_deref(), Some("v1"));
    assert_eq!(h.orch.supervisor.state(APP), ProcessState::Running);
    let leftovers: Vec<_> = std::fs::read_dir(h.layout().releases_dir())
        .expect("releases dir")
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(leftovers, vec!["v1"]);
    let scratch = std::fs::read_dir(h.layout().scratch_dir()).expect("scratch dir");
    assert_eq!(scratch.count(), 0);
    assert!(last_line(&h).contains("stage=install"));
}

#[tokio::test]
async fn test_crashing_release_is_rolled_back_automatically() {
    let h = Harness::new();
    h.setup().await;
    deployed(&h, &["v1"]).await;
    h.orch.fetcher.publish("v2", crashing_release());

    let err = h.deploy("v2").await.expect_err("start fails");

    match err.downcast_ref::<ProcessError>() {
        Some(ProcessError::StartFailedRecovered { release, restored, .. }) => {
            assert_eq!(release, "v2");
            assert_eq!(restored, "v1");
        }
        other => panic!("expected recovered start failure, got {other:?}"),
    }
    assert_eq!(ErrorClass::of(&err), ErrorClass::Critical);
    assert_eq!(h.current().as_deref(), Some("v1"));
    assert_eq!(h.orch.supervisor.state(APP), ProcessState::Running);

    let line = last_line(&h);
    assert!(line.contains("release=v2 outcome=rolled-back"), "{line}");
    assert!(line.contains("stage=start-process"), "{line}");
    assert!(!h.reporter.warnings().is_empty());
}

#[tokio::test]
async fn test_crashing_first_release_is_fatal() {
    let h = Harness::new();
    h.setup().await;
    h.orch.fetcher.publish("v1", crashing_release());

    let err = h.deploy("v1").await.expect_err("start fails");

    assert!(matches!(
        err.downcast_ref::<ProcessError>(),
        Some(ProcessError::RecoveryFailed { .. })
    ));
    assert!(format!("{err:#}").contains("Operator action required"));
    assert!(last_line(&h).contains("outcome=fatal"));
}

#[tokio::test]
async fn test_redeploying_current_release_is_a_no_op() {
    let h = Harness::new();
    h.setup().await;
    deployed(&h, &["v1"]).await;
    h.orch.supervisor.clear_calls();

    let outcome = h.deploy("v1").await.expect("idempotent");

    assert!(matches!(outcome, DeployOutcome::AlreadyCurrent { .. }));
    assert_eq!(h.orch.fetcher.calls(), vec!["v1"]);
    assert!(h.orch.supervisor.calls().is_empty());
    assert!(last_line(&h).contains("release=v1 outcome=already-current"));
}

#[tokio::test]
async fn test_redeploying_an_older_installed_release_points_to_rollback() {
    let h = Harness::new();
    h.setup().await;
    deployed(&h, &["v1", "v2"]).await;

    let err = h.deploy("v1").await.expect_err("already installed");

    assert!(matches!(
        err.downcast_ref::<ReleaseError>(),
        Some(ReleaseError::AlreadyExists(_))
    ));
    assert!(format!("{err}").contains("keel rollback"));
    assert_eq!(h.current().as_deref(), Some("v2"));
}

#[tokio::test]
async fn test_deploy_replaces_a_leftover_directory_without_metadata() {
    let h = Harness::new();
    h.setup().await;
    deployed(&h, &["v1"]).await;
    let leftover = h.layout().release_dir(&release("v2"));
    std::fs::create_dir_all(&leftover).expect("mkdir");
    std::fs::write(leftover.join("partial.js"), "").expect("write");
    h.orch.fetcher.publish("v2", good_release("v2"));

    let outcome = h.deploy("v2").await.expect("reinstall over leftover");

    assert!(matches!(outcome, DeployOutcome::Deployed { .. }));
    assert_eq!(h.current().as_deref(), Some("v2"));
    assert!(!leftover.join("partial.js").exists());
    assert_eq!(h.installed(), vec!["v2", "v1"]);
}

#[tokio::test]
async fn test_retention_keeps_newest_releases_including_current() {
    let h = Harness::new();
    h.setup().await;
    deployed(&h, &["v1", "v2", "v3"]).await;
    h.orch.fetcher.publish("v4", good_release("v4"));

    let outcome = h.deploy_keep("v4", 2).await.expect("deploy");

    let DeployOutcome::Deployed { housekeeping, .. } = outcome else {
        panic!("expected a deployment");
    };
    let mut pruned: Vec<String> = housekeeping.pruned.iter().map(ToString::to_string).collect();
    pruned.sort();
    assert_eq!(pruned, vec!["v1", "v2"]);
    assert_eq!(h.installed(), vec!["v4", "v3"]);
    assert_eq!(h.current().as_deref(), Some("v4"));
}

#[tokio::test]
async fn test_concurrent_deploy_is_refused_and_logged() {
    let h = Harness::new();
    h.setup().await;
    h.orch.fetcher.publish("v1", good_release("v1"));
    let _held = h.orch.locks.acquire(&h.layout()).await.expect("lock");

    let err = h.deploy("v1").await.expect_err("lock held");

    assert!(matches!(
        err.downcast_ref::<LockError>(),
        Some(LockError::DeploymentInProgress { .. })
    ));
    assert!(h.orch.fetcher.calls().is_empty());
    assert!(last_line(&h).contains("stage=lock"));
}

#[tokio::test]
async fn test_failed_pointer_swap_restarts_previous_release() {
    let h = Harness::with_store(|| FlakyPromote::new(FsReleaseStore::new(FakeInstaller)));
    h.setup().await;
    h.orch.fetcher.publish("v1", good_release("v1"));
    h.deploy("v1").await.expect("deploy v1");
    h.orch.releases.arm();
    h.orch.supervisor.clear_calls();
    h.orch.fetcher.publish("v2", good_release("v2"));

    let err = h.deploy("v2").await.expect_err("promote fails");

    assert!(format!("{err:#}").contains("read-only file system"));
    assert_eq!(h.current().as_deref(), Some("v1"));
    assert_eq!(h.orch.supervisor.state(APP), ProcessState::Running);
    let calls = h.orch.supervisor.calls();
    assert_eq!(calls[0], "stop demo");
    assert!(calls[1].ends_with("releases/v1"), "{calls:?}");
    assert!(h.history().last().expect("entry").contains("stage=promote"));
}
