//! Command line behavior of the segment-dl binary

mod common;

use common::{ASSET, MockBackend, segment_payload};
use std::process::Command;

fn segment_dl() -> Command {
    Command::new(env!("CARGO_BIN_EXE_segment-dl"))
}

#[test]
fn invalid_asset_id_exits_before_creating_anything() {
    let temp_dir = tempfile::tempdir().unwrap();
    let download_dir = temp_dir.path().join("downloads");

    let output = segment_dl()
        .arg("too-short")
        .arg("--download-dir")
        .arg(&download_dir)
        // Nothing listens here; a network call would hang until timeout
        .args(["--backend-url", "http://127.0.0.1:9"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(!download_dir.exists(), "no directory may be created for an invalid id");
}

#[tokio::test]
async fn one_shot_run_prints_summary_and_combines() {
    let backend = MockBackend::start(&[0, 1], 2).await;
    let temp_dir = tempfile::tempdir().unwrap();
    let download_dir = temp_dir.path().join("downloads");
    let combined = temp_dir.path().join("combined.m4a");

    let output = tokio::process::Command::new(env!("CARGO_BIN_EXE_segment-dl"))
        .arg(ASSET)
        .args(["--backend-url", &backend.url()])
        .arg("--download-dir")
        .arg(&download_dir)
        .arg("--no-monitor")
        .arg("--no-remux")
        .arg("--combine")
        .arg(&combined)
        .output()
        .await
        .unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["asset_id"], ASSET);
    assert_eq!(summary["downloaded_count"], 2);
    assert_eq!(summary["downloaded"], serde_json::json!([0, 1]));
    assert!(summary.get("stop_reason").is_none());

    let mut expected = segment_payload(0);
    expected.extend(segment_payload(1));
    assert_eq!(std::fs::read(&combined).unwrap(), expected);
}

#[tokio::test]
async fn nothing_downloaded_exits_with_failure() {
    let backend = MockBackend::start(&[], 5).await;
    let temp_dir = tempfile::tempdir().unwrap();

    let output = tokio::process::Command::new(env!("CARGO_BIN_EXE_segment-dl"))
        .arg(ASSET)
        .args(["--backend-url", &backend.url()])
        .arg("--download-dir")
        .arg(temp_dir.path())
        .arg("--no-monitor")
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["downloaded_count"], 0);
}
