use std::fs;

use overlay_host::logging::build_subscriber;
use serial_test::serial;
use tempfile::tempdir;

#[test]
#[serial]
fn writes_log_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("overlay.log");

    let (subscriber, guard) = build_subscriber(true, Some(&path));
    assert!(guard.is_some());
    tracing::subscriber::with_default(subscriber, || {
        tracing::info!("overlay log test");
    });
    drop(guard);

    assert!(path.exists(), "log file was not created");
    let contents = fs::read_to_string(path).unwrap();
    assert!(contents.contains("overlay log test"));
}

#[test]
#[serial]
fn info_level_filters_debug_output() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("overlay.log");

    let (subscriber, guard) = build_subscriber(false, Some(&path));
    tracing::subscriber::with_default(subscriber, || {
        tracing::debug!("verbose detail");
        tracing::info!("startup summary");
    });
    drop(guard);

    let contents = fs::read_to_string(path).unwrap();
    assert!(contents.contains("startup summary"));
    assert!(!contents.contains("verbose detail"));
}

#[test]
#[serial]
fn subscriber_without_file_creates_no_log() {
    let dir = tempdir().unwrap();

    let (subscriber, guard) = build_subscriber(false, None);
    assert!(guard.is_none());
    tracing::subscriber::with_default(subscriber, || {
        tracing::info!("console only");
    });

    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}
