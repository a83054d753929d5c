//! Core update scenarios: lock handling, maintenance bracketing, state
//! restoration, and metadata persistence.

mod common;

use common::{Harness, ScriptedRunner};
use drush_webapp::{set_maintenance, AppProfile, Error, Invoker, SiteLocation, UPDATE_LOCK_FILE};
use std::fs;

const STATUS_JSON: &str = r#"{"drupal-version":"8.9.19"}"#;

#[tokio::test]
async fn update_refuses_locked_instance_without_running_anything() {
    let harness = Harness::new(ScriptedRunner::new());
    let doc_root = harness.seed_legacy_site("example.com");
    fs::write(doc_root.join(UPDATE_LOCK_FILE), "").unwrap();

    let result = harness.manager.update("example.com", "", Some("8.9.20")).await;

    assert!(matches!(result, Err(Error::Locked { .. })));
    assert!(harness.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn update_applies_pinned_release_and_restores_htaccess() {
    let runner = ScriptedRunner::new()
        .on("status", 0, STATUS_JSON, "")
        .on("pm-update", 0, "updated to 8.9.20", "");
    let harness = Harness::with_feed(runner, &[]);
    let doc_root = harness.seed_legacy_site("example.com");
    fs::write(doc_root.join(".htaccess"), "# original rules\n").unwrap();

    harness
        .manager
        .update("example.com", "", Some("8.9.20"))
        .await
        .unwrap();

    let update = harness.args_of("pm-update").unwrap();
    assert!(update.contains(&"drupal-8.9.20".to_string()));

    // maintenance raised then lowered around the mutating step
    let calls = harness.calls.lock().unwrap();
    let modes: Vec<&String> = calls
        .iter()
        .filter(|c| c.args.iter().any(|a| a == "system.maintenance_mode"))
        .map(|c| c.args.last().unwrap())
        .collect();
    assert_eq!(modes, ["1", "0"]);
    drop(calls);

    // the saved .htaccess came back
    assert_eq!(
        fs::read_to_string(doc_root.join(".htaccess")).unwrap(),
        "# original rules\n"
    );
    assert!(!doc_root.join(".htaccess.bak").exists());

    let infos = harness.tracker.infos.lock().unwrap();
    assert_eq!(infos.len(), 1);
    assert!(!infos[0].1.failed);
}

#[tokio::test]
async fn failed_update_still_restores_state_and_records_failure() {
    let runner = ScriptedRunner::new()
        .on("status", 0, STATUS_JSON, "")
        .on("pm-update", 1, "", "update aborted");
    let harness = Harness::with_feed(runner, &[]);
    let doc_root = harness.seed_legacy_site("example.com");
    fs::write(doc_root.join(".htaccess"), "# original rules\n").unwrap();

    let result = harness.manager.update("example.com", "", Some("8.9.20")).await;

    assert!(matches!(result, Err(Error::CommandFailed { .. })));

    // maintenance mode was lowered and the .htaccess restored even so
    let calls = harness.calls.lock().unwrap();
    let modes: Vec<&String> = calls
        .iter()
        .filter(|c| c.args.iter().any(|a| a == "system.maintenance_mode"))
        .map(|c| c.args.last().unwrap())
        .collect();
    assert_eq!(modes, ["1", "0"]);
    drop(calls);
    assert_eq!(
        fs::read_to_string(doc_root.join(".htaccess")).unwrap(),
        "# original rules\n"
    );

    let infos = harness.tracker.infos.lock().unwrap();
    assert_eq!(infos.len(), 1);
    assert!(infos[0].1.failed);
    assert_eq!(infos[0].1.version.as_deref(), Some("8.9.19"));
}

#[tokio::test]
async fn runner_failure_during_update_still_unwinds() {
    let runner = ScriptedRunner::new()
        .on("status", 0, STATUS_JSON, "")
        // the update subprocess never even ran (spawn failure or timeout)
        .on_err("pm-update");
    let harness = Harness::with_feed(runner, &[]);
    let doc_root = harness.seed_legacy_site("example.com");
    fs::write(doc_root.join(".htaccess"), "# original rules\n").unwrap();

    let result = harness.manager.update("example.com", "", Some("8.9.20")).await;

    assert!(result.is_err());

    // maintenance lowered, .htaccess restored, metadata persisted anyway
    let calls = harness.calls.lock().unwrap();
    let modes: Vec<&String> = calls
        .iter()
        .filter(|c| c.args.iter().any(|a| a == "system.maintenance_mode"))
        .map(|c| c.args.last().unwrap())
        .collect();
    assert_eq!(modes, ["1", "0"]);
    drop(calls);
    assert_eq!(
        fs::read_to_string(doc_root.join(".htaccess")).unwrap(),
        "# original rules\n"
    );
    assert!(!doc_root.join(".htaccess.bak").exists());

    let infos = harness.tracker.infos.lock().unwrap();
    assert_eq!(infos.len(), 1);
    assert!(infos[0].1.failed);
}

#[tokio::test]
async fn update_without_pin_is_a_noop_when_already_current() {
    let runner = ScriptedRunner::new().on("status", 0, STATUS_JSON, "");
    let harness = Harness::with_feed(runner, &["8.9.18", "8.9.19"]);
    harness.seed_legacy_site("example.com");

    harness.manager.update("example.com", "", None).await.unwrap();

    assert!(!harness.invoked("pm-update"));
    assert!(!harness.invoked("system.maintenance_mode"));
}

#[tokio::test]
async fn update_refuses_to_cross_packaging_epoch() {
    let runner = ScriptedRunner::new().on("status", 0, STATUS_JSON, "");
    let harness = Harness::with_feed(runner, &[]);
    let doc_root = harness.seed_legacy_site("example.com");
    fs::write(doc_root.join(".htaccess"), "# original rules\n").unwrap();

    let result = harness.manager.update("example.com", "", Some("9.0.0")).await;

    assert!(matches!(result, Err(Error::Unsupported { .. })));
    // refused before any mutation
    assert!(!harness.invoked("system.maintenance_mode"));
    assert!(doc_root.join(".htaccess").exists());
    assert!(!doc_root.join(".htaccess.bak").exists());
}

#[tokio::test]
async fn update_all_persists_metadata_even_when_update_errors() {
    let harness = Harness::new(ScriptedRunner::new());
    // no site on disk at all

    let result = harness.manager.update_all("example.com", "", Some("8.9.20")).await;

    assert!(result.is_err());
    let infos = harness.tracker.infos.lock().unwrap();
    assert_eq!(infos.len(), 1);
    assert!(infos[0].1.failed);
    assert!(infos[0].1.version.is_none());
}

#[tokio::test]
async fn maintenance_toggle_reports_success_even_when_commands_fail() {
    let runner = ScriptedRunner::new()
        .on("system.maintenance_mode", 1, "", "not bootstrapped")
        .on("cr", 1, "", "not bootstrapped");
    let webroot = tempfile::tempdir().unwrap();
    let location = SiteLocation::resolve(webroot.path(), "example.com", "");
    let profile = AppProfile::drupal();
    let invoker = Invoker::new(&profile, &runner);

    assert!(set_maintenance(&invoker, &location, true, "8.x").await);
}
