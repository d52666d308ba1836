//! Setup use-case: layout, config and manifest.

#![allow(clippy::expect_used)]

use keel_cli::application::ports::{ConfigStore, DeployLocker};
use keel_cli::application::services::setup::SetupOutcome;
use keel_cli::domain::manifest::ProcessManifest;
use keel_cli::domain::{ConfigError, InputError, LockError};

use crate::helpers::{Harness, config, good_release, setup_request};

fn manifest(h: &Harness) -> ProcessManifest {
    serde_json::from_slice(&std::fs::read(h.layout().manifest_path()).expect("manifest"))
        .expect("json")
}

#[tokio::test]
async fn test_setup_creates_layout_config_and_manifest() {
    let h = Harness::new();

    let outcome = h
        .orch
        .setup(&setup_request(config(&[("PORT", "3000")]), false), &h.reporter)
        .await
        .expect("setup");

    assert!(matches!(outcome, SetupOutcome::Created { .. }));
    let layout = h.layout();
    for dir in layout.skeleton() {
        assert!(dir.is_dir(), "{} missing", dir.display());
    }
    assert_eq!(
        h.orch.config.load(&layout).expect("config"),
        config(&[("PORT", "3000")])
    );

    let doc = manifest(&h);
    let app = &doc.apps[0];
    assert_eq!(app.name, "demo");
    assert_eq!(app.script, "server.js");
    assert_eq!(app.cwd, layout.current_link());
    assert_eq!(app.env["PORT"], "3000");
    assert_eq!(app.env["NODE_ENV"], "production");
    // Setup does not record a deployment.
    assert!(h.history().is_empty());
}

#[tokio::test]
async fn test_setup_twice_with_same_config_is_unchanged() {
    let h = Harness::new();
    h.setup().await;

    let outcome = h
        .orch
        .setup(&setup_request(config(&[]), false), &h.reporter)
        .await
        .expect("idempotent");

    assert!(matches!(outcome, SetupOutcome::Unchanged { .. }));
}

#[tokio::test]
async fn test_setup_with_different_config_requires_overwrite() {
    let h = Harness::new();
    h.setup().await;
    let changed = config(&[("PORT", "8080")]);

    let err = h
        .orch
        .setup(&setup_request(changed.clone(), false), &h.reporter)
        .await
        .expect_err("refused");
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::AlreadyInitialized { .. })
    ));
    assert_eq!(h.orch.config.load(&h.layout()).expect("config"), config(&[]));

    let outcome = h
        .orch
        .setup(&setup_request(changed.clone(), true), &h.reporter)
        .await
        .expect("overwrite");
    assert!(matches!(outcome, SetupOutcome::Replaced { .. }));
    assert_eq!(h.orch.config.load(&h.layout()).expect("config"), changed);
}

#[tokio::test]
async fn test_corrupt_config_is_only_replaced_with_overwrite() {
    let h = Harness::new();
    h.setup().await;
    std::fs::write(h.layout().config_path(), "source: [unterminated").expect("corrupt");

    let err = h
        .orch
        .setup(&setup_request(config(&[]), false), &h.reporter)
        .await
        .expect_err("refused");
    assert!(err.downcast_ref::<ConfigError>().is_some());

    h.orch
        .setup(&setup_request(config(&[]), true), &h.reporter)
        .await
        .expect("overwrite");
    assert_eq!(h.orch.config.load(&h.layout()).expect("config"), config(&[]));
}

#[tokio::test]
async fn test_setup_after_deploy_points_manifest_at_current_release() {
    let h = Harness::new();
    h.setup().await;
    h.orch.fetcher.publish("v1", good_release("v1"));
    h.deploy("v1").await.expect("deploy");

    h.orch
        .setup(&setup_request(config(&[("PORT", "9000")]), true), &h.reporter)
        .await
        .expect("reconfigure");

    let doc = manifest(&h);
    assert!(doc.apps[0].cwd.ends_with("releases/v1"));
    assert_eq!(doc.apps[0].env["PORT"], "9000");
}

#[tokio::test]
async fn test_setup_rejects_incomplete_config_before_touching_disk() {
    let h = Harness::new();
    let mut bad = config(&[]);
    bad.script = "../escape.js".to_string();

    let err = h
        .orch
        .setup(&setup_request(bad, false), &h.reporter)
        .await
        .expect_err("invalid");

    assert!(matches!(
        err.downcast_ref::<InputError>(),
        Some(InputError::InvalidScript(_))
    ));
    assert!(!h.layout().base().exists());
}

#[tokio::test]
async fn test_setup_takes_the_lock_before_building_the_skeleton() {
    let h = Harness::new();
    let layout = h.layout();
    let _held = h.orch.locks.acquire(&layout).await.expect("lock");

    let err = h
        .orch
        .setup(&setup_request(config(&[]), false), &h.reporter)
        .await
        .expect_err("lock is held");

    assert!(matches!(
        err.downcast_ref::<LockError>(),
        Some(LockError::DeploymentInProgress { .. })
    ));
    assert!(!layout.releases_dir().exists());
    assert!(!layout.config_path().exists());
}
