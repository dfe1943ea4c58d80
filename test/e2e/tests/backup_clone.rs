//! Server backups and `satellite-clone`.
//!
//! Restoring a backup onto a second machine needs a fresh RHEL host and is
//! not covered here; these tests stop at the backup and the clone tool's
//! task listing.


use common::Harness;
use rstest::rstest;
use satrig_e2e::backup::{
    list_clone_tasks, run_backup, service, BackupKind, BackupOptions, ServiceAction,
    CLONE_INSTALL_COMMAND, CLONE_LIST_TASKS_COMMAND,
};
use satrig_e2e::catalog::MODULE_SYNCED_REPO;
use satrig_remote::Repository;

#[rstest]
#[case(BackupKind::Online, false)]
#[case(BackupKind::Online, true)]
#[case(BackupKind::Offline, false)]
#[case(BackupKind::Offline, true)]
#[tokio::test(start_paused = true)]
async fn test_positive_clone_backup(#[case] kind: BackupKind, #[case] skip_pulp: bool) {
    let mut h = Harness::new();
    let repo = h.value::<Repository>(MODULE_SYNCED_REPO).await;
    assert!(repo.content_count("rpm") > 0);

    service(&h.target, ServiceAction::Enable).await.unwrap();
    service(&h.target, ServiceAction::Start).await.unwrap();

    let backup_dir = h.target.settings().backup.dir.clone();
    let options = BackupOptions::new(kind, &backup_dir).skip_pulp_content(skip_pulp);
    let location = run_backup(&h.target, &options).await.unwrap();
    assert!(location.starts_with(&format!("{backup_dir}/satellite-backup-")));

    service(&h.target, ServiceAction::Stop).await.unwrap();
    service(&h.target, ServiceAction::Disable).await.unwrap();

    let executed = h.remote.executed();
    let backup = executed
        .iter()
        .find(|c| c.starts_with("satellite-maintain backup"))
        .unwrap();
    assert_eq!(*backup, options.command());
    assert_eq!(backup.contains("--skip-pulp-content"), skip_pulp);
    assert!(executed.ends_with(&[
        "satellite-maintain service stop".to_string(),
        "satellite-maintain service disable".to_string(),
    ]));

    service(&h.target, ServiceAction::Start).await.unwrap();
    h.finish().await;
}

#[tokio::test]
async fn test_negative_online_backup_needs_services() {
    let h = Harness::new();
    service(&h.target, ServiceAction::Stop).await.unwrap();

    let dir = h.target.settings().backup.dir.clone();
    let err = run_backup(&h.target, &BackupOptions::new(BackupKind::Online, &dir))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("online backup exited with 1"));
    assert!(service(&h.target, ServiceAction::Status).await.is_err());

    run_backup(&h.target, &BackupOptions::new(BackupKind::Offline, &dir))
        .await
        .unwrap();
    service(&h.target, ServiceAction::Start).await.unwrap();
    h.finish().await;
}

#[tokio::test]
async fn test_positive_list_tasks() {
    let h = Harness::new();

    let tasks = list_clone_tasks(&h.target).await.unwrap();
    assert!(!tasks.is_empty());
    assert!(tasks.iter().all(|t| t.starts_with("satellite-clone : ")));
    assert_eq!(
        h.remote.executed(),
        vec![CLONE_INSTALL_COMMAND, CLONE_LIST_TASKS_COMMAND]
    );
    h.finish().await;
}

#[tokio::test]
async fn test_negative_list_tasks_without_package() {
    let h = Harness::new();
    let result = h.target.execute(CLONE_LIST_TASKS_COMMAND).await.unwrap();
    assert_eq!(result.status, 127);
    h.finish().await;
}
