//! End-to-end deployment runs against a temporary WordPress install

use std::sync::Arc;

use gitdeploy::models::deployment::{ChangeList, DeploymentStatus, OUTCOME_SOURCE};

use crate::common::{build_zip, deployer, github_zipball, FakeSource, Site};

fn changes(paths: &[&str]) -> ChangeList {
    ChangeList::from_paths(paths, "plugins/wp-gitdeploy")
}

#[tokio::test]
async fn test_setup_incomplete_reports_without_fetching() {
    let site = Site::new();
    let source = Arc::new(FakeSource::serving(github_zipball(&[("plugins/x.php", "x")])));
    let (deployer, config, history) = deployer(&site, false, source.clone());

    let outcome = deployer.deploy(changes(&["plugins/x.php"])).await;

    assert_eq!(outcome.status, DeploymentStatus::Failed);
    assert_eq!(outcome.reason, "setup of the plugin is not completed yet");
    assert_eq!(outcome.changes, "[]");
    assert_eq!(outcome.source, OUTCOME_SOURCE);
    assert_eq!(source.calls(), 0);
    assert!(!site.content("plugins/x.php").exists());

    assert_eq!(history.outcomes(), vec![outcome]);
    assert_eq!(config.in_progress_history(), vec![false]);
}

#[tokio::test]
async fn test_fetch_failure_leaves_no_artifacts() {
    let site = Site::new();
    let (deployer, config, history) = deployer(&site, true, Arc::new(FakeSource::failing()));

    let outcome = deployer.deploy(changes(&["plugins/x.php"])).await;

    assert_eq!(outcome.status, DeploymentStatus::Failed);
    assert_eq!(outcome.reason, "unable to get repository data");
    assert_eq!(outcome.changes, r#"["plugins/x.php"]"#);
    assert_eq!(site.pull_entries(), 0);
    assert!(!site.content("plugins/x.php").exists());
    assert_eq!(history.outcomes().len(), 1);
    assert!(!config.in_progress());
}

#[tokio::test]
async fn test_successful_deploy_copies_changed_file() {
    let site = Site::new();
    let zip = github_zipball(&[
        ("plugins/x.php", "<?php // x"),
        ("plugins/untouched.php", "<?php // not in the change list"),
        ("README.md", "# acme"),
    ]);
    let (deployer, _config, history) = deployer(&site, true, Arc::new(FakeSource::serving(zip)));

    let outcome = deployer.deploy(changes(&["plugins/x.php"])).await;

    assert!(outcome.is_success(), "unexpected failure: {}", outcome.reason);
    assert_eq!(outcome.reason, "");
    assert_eq!(outcome.changes, r#"["plugins/x.php"]"#);
    assert_eq!(
        std::fs::read_to_string(site.content("plugins/x.php")).unwrap(),
        "<?php // x"
    );
    assert!(!site.content("plugins/untouched.php").exists());
    assert_eq!(site.pull_entries(), 0);
    assert_eq!(history.outcomes().len(), 1);
}

#[tokio::test]
async fn test_file_missing_from_snapshot_is_deleted() {
    let site = Site::new();
    std::fs::create_dir_all(site.content("themes/t")).unwrap();
    std::fs::write(site.content("themes/t/old.css"), "body {}").unwrap();
    std::fs::write(site.content("themes/t/keep.css"), "p {}").unwrap();

    let zip = github_zipball(&[("themes/t/keep.css", "p { margin: 0 }")]);
    let (deployer, _config, _history) = deployer(&site, true, Arc::new(FakeSource::serving(zip)));

    let outcome = deployer.deploy(changes(&["themes/t/old.css"])).await;

    assert!(outcome.is_success(), "unexpected failure: {}", outcome.reason);
    assert!(!site.content("themes/t/old.css").exists());
    // Not in the change list, so left alone
    assert_eq!(std::fs::read_to_string(site.content("themes/t/keep.css")).unwrap(), "p {}");
}

#[tokio::test]
async fn test_unrecognized_paths_are_ignored() {
    let site = Site::new();
    let zip = github_zipball(&[
        ("README.md", "# acme"),
        ("uploads/photo.jpg", "jpg"),
        ("mu-plugins/loader.php", "<?php"),
    ]);
    let (deployer, _config, _history) = deployer(&site, true, Arc::new(FakeSource::serving(zip)));

    let outcome = deployer
        .deploy(changes(&["README.md", "uploads/photo.jpg", "mu-plugins/loader.php"]))
        .await;

    assert!(outcome.is_success(), "unexpected failure: {}", outcome.reason);
    assert!(site.content("mu-plugins/loader.php").exists());
    assert!(!site.content("README.md").exists());
    assert!(!site.tmp.path().join("README.md").exists());
    assert!(!site.content("uploads").exists());
}

#[tokio::test]
async fn test_new_plugin_directories_are_created() {
    let site = Site::new();
    let zip = github_zipball(&[("plugins/fresh/inc/setup.php", "<?php // setup")]);
    let (deployer, _config, _history) = deployer(&site, true, Arc::new(FakeSource::serving(zip)));

    let outcome = deployer.deploy(changes(&["plugins/fresh/inc/setup.php"])).await;

    assert!(outcome.is_success(), "unexpected failure: {}", outcome.reason);
    assert!(site.content("plugins/fresh/inc/setup.php").is_file());
}

#[tokio::test]
async fn test_empty_change_list_fails_without_mutation() {
    let site = Site::new();
    std::fs::write(site.content("plugins/existing.php"), "<?php").unwrap();
    let zip = github_zipball(&[("plugins/existing.php", "<?php // new")]);
    let (deployer, _config, history) = deployer(&site, true, Arc::new(FakeSource::serving(zip)));

    let outcome = deployer.deploy(ChangeList::default()).await;

    assert_eq!(outcome.status, DeploymentStatus::Failed);
    assert_eq!(outcome.reason, "no changed files found");
    assert_eq!(outcome.changes, "[]");
    assert_eq!(std::fs::read_to_string(site.content("plugins/existing.php")).unwrap(), "<?php");
    assert_eq!(site.pull_entries(), 0);
    assert_eq!(history.outcomes().len(), 1);
}

#[tokio::test]
async fn test_self_path_entries_never_deployed() {
    let site = Site::new();
    let zip = github_zipball(&[
        ("plugins/wp-gitdeploy/wp-gitdeploy.php", "<?php // self"),
        ("plugins/x.php", "<?php"),
    ]);
    let (deployer, _config, _history) = deployer(&site, true, Arc::new(FakeSource::serving(zip)));

    let outcome = deployer
        .deploy(changes(&["plugins/wp-gitdeploy/wp-gitdeploy.php", "plugins/x.php"]))
        .await;

    assert!(outcome.is_success(), "unexpected failure: {}", outcome.reason);
    assert_eq!(outcome.changes, r#"["plugins/x.php"]"#);
    assert!(!site.content("plugins/wp-gitdeploy").exists());
}

#[tokio::test]
async fn test_archive_without_root_directory_fails() {
    let site = Site::new();
    std::fs::write(site.content("plugins/x.php"), "<?php // live").unwrap();
    let zip = build_zip(&[("README.md", "# no wrapping directory")]);
    let (deployer, _config, _history) = deployer(&site, true, Arc::new(FakeSource::serving(zip)));

    let outcome = deployer.deploy(changes(&["plugins/x.php"])).await;

    assert_eq!(outcome.status, DeploymentStatus::Failed);
    assert_eq!(outcome.reason, "no repository data found");
    // Applying would have deleted it as missing from the snapshot
    assert!(site.content("plugins/x.php").exists());
    assert_eq!(site.pull_entries(), 0);
}

#[tokio::test]
async fn test_corrupt_archive_fails_extraction() {
    let site = Site::new();
    let (deployer, _config, _history) = deployer(
        &site,
        true,
        Arc::new(FakeSource::serving(b"<html>not a zip</html>".to_vec())),
    );

    let outcome = deployer.deploy(changes(&["plugins/x.php"])).await;

    assert_eq!(outcome.status, DeploymentStatus::Failed);
    assert_eq!(outcome.reason, "unable to extract repository data");
    assert_eq!(site.pull_entries(), 0);
}

#[tokio::test]
async fn test_each_run_records_exactly_one_outcome() {
    let site = Site::new();
    let zip = github_zipball(&[("plugins/x.php", "<?php")]);
    let (deployer, config, history) = deployer(&site, true, Arc::new(FakeSource::serving(zip)));

    deployer.deploy(changes(&["plugins/x.php"])).await;
    deployer.deploy(ChangeList::default()).await;

    let outcomes = history.outcomes();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].status, DeploymentStatus::Success);
    assert_eq!(outcomes[1].status, DeploymentStatus::Failed);
    assert_ne!(outcomes[0].id, outcomes[1].id);
    assert_eq!(config.in_progress_history(), vec![false, false]);
}
