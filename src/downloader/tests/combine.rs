use crate::assembly::{Assembler, CombineMethod};
use crate::downloader::test_helpers::{
    create_test_downloader, mount_segment, sample_body, status_mock,
};
use crate::error::{AssemblyError, Error};
use wiremock::MockServer;

#[tokio::test]
async fn test_combine_after_monitor_concatenates_in_index_order() {
    let server = MockServer::start().await;
    status_mock(&[2, 0, 1], Some(3)).mount(&server).await;
    for index in 0..3 {
        mount_segment(&server, index, &sample_body(index)).await;
    }
    let (mut downloader, temp_dir) = create_test_downloader(&server).await;
    downloader.monitor().await;

    let output = temp_dir.path().join("combined.m4a");
    let report = downloader
        .combine_with(&Assembler::new(None), &output, false)
        .await
        .unwrap();

    let expected: Vec<u8> = (0..3).flat_map(sample_body).collect();
    assert_eq!(report.method, CombineMethod::Concat);
    assert_eq!(report.segments, vec![0, 1, 2]);
    assert_eq!(report.bytes, expected.len() as u64);
    assert_eq!(std::fs::read(&output).unwrap(), expected);

    // segment files are left in place
    for index in 0..3 {
        assert!(downloader.job().segment_path(index).exists());
    }
}

#[tokio::test]
async fn test_combine_only_uses_downloaded_segments() {
    let server = MockServer::start().await;
    mount_segment(&server, 1, b"one").await;
    let (mut downloader, temp_dir) = create_test_downloader(&server).await;
    downloader.dispatch([1]).await;

    // present on disk but never downloaded by this session
    std::fs::write(downloader.job().segment_path(0), b"stray").unwrap();

    let output = temp_dir.path().join("combined.m4a");
    let report = downloader
        .combine_with(&Assembler::default(), &output, false)
        .await
        .unwrap();

    assert_eq!(report.segments, vec![1]);
    assert_eq!(std::fs::read(&output).unwrap(), b"one");
}

#[tokio::test]
async fn test_combine_with_nothing_downloaded_fails() {
    let server = MockServer::start().await;
    let (downloader, temp_dir) = create_test_downloader(&server).await;
    let output = temp_dir.path().join("combined.m4a");

    let err = downloader
        .combine_with(&Assembler::default(), &output, true)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Assembly(AssemblyError::NoSegments)));
    assert!(!output.exists());
}
