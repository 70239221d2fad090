use std::time::Duration;

use crate::downloader::test_helpers::{
    create_test_downloader, create_test_downloader_with, fast_config, mount_segment, sample_body,
    status_mock,
};
use crate::types::{Event, StopReason};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// --- stopping criteria ---

#[tokio::test]
async fn test_monitor_stops_when_total_is_reached() {
    let server = MockServer::start().await;
    status_mock(&[0, 1], Some(2)).mount(&server).await;
    mount_segment(&server, 0, &sample_body(0)).await;
    mount_segment(&server, 1, &sample_body(1)).await;
    let (mut downloader, _temp_dir) = create_test_downloader(&server).await;

    let outcome = downloader.monitor().await;

    assert_eq!(outcome.reason, StopReason::AllComplete);
    assert_eq!(outcome.downloaded, vec![0, 1]);
    assert_eq!(outcome.cycles, 1, "completion is detected on the same cycle");
}

#[tokio::test]
async fn test_monitor_follows_progressive_availability() {
    let server = MockServer::start().await;
    status_mock(&[0], Some(3)).up_to_n_times(1).mount(&server).await;
    status_mock(&[0, 1], Some(3)).up_to_n_times(1).mount(&server).await;
    status_mock(&[0, 1, 2], Some(3)).mount(&server).await;
    for index in 0..3 {
        mount_segment(&server, index, &sample_body(index)).await;
    }
    let (mut downloader, _temp_dir) = create_test_downloader(&server).await;

    let outcome = downloader.monitor().await;

    assert_eq!(outcome.reason, StopReason::AllComplete);
    assert_eq!(outcome.downloaded, vec![0, 1, 2]);
    assert_eq!(outcome.cycles, 3);
}

#[tokio::test]
async fn test_monitor_zero_total_does_not_end_the_session() {
    let server = MockServer::start().await;
    // A backend still warming up reports no segments and a total of zero
    status_mock(&[], Some(0)).up_to_n_times(1).mount(&server).await;
    status_mock(&[0], Some(1)).mount(&server).await;
    mount_segment(&server, 0, &sample_body(0)).await;
    let (mut downloader, _temp_dir) = create_test_downloader(&server).await;

    let outcome = downloader.monitor().await;

    assert_eq!(outcome.reason, StopReason::AllComplete);
    assert_eq!(outcome.downloaded, vec![0]);
    assert_eq!(outcome.cycles, 2);
}

#[tokio::test]
async fn test_monitor_stagnation_stops_before_wall_clock() {
    let server = MockServer::start().await;
    status_mock(&[], None).mount(&server).await;
    let mut config = fast_config();
    config.download.stagnation_cycles = 3;
    config.download.max_wait = Duration::from_secs(60);
    let (mut downloader, _temp_dir) = create_test_downloader_with(&server, config).await;

    let outcome = downloader.monitor().await;

    assert_eq!(outcome.reason, StopReason::Stagnant);
    assert_eq!(outcome.cycles, 3);
    assert!(outcome.downloaded.is_empty());
    assert!(outcome.elapsed < Duration::from_secs(10));
}

#[tokio::test]
async fn test_monitor_stagnates_after_partial_progress() {
    let server = MockServer::start().await;
    // Backend claims 5 segments but only ever offers two
    status_mock(&[0, 1], Some(5)).mount(&server).await;
    mount_segment(&server, 0, b"a").await;
    mount_segment(&server, 1, b"b").await;
    let (mut downloader, _temp_dir) = create_test_downloader(&server).await;

    let outcome = downloader.monitor().await;

    assert_eq!(outcome.reason, StopReason::Stagnant);
    assert_eq!(outcome.downloaded, vec![0, 1]);
    // one productive cycle, then stagnation_cycles idle ones
    assert_eq!(outcome.cycles, 4);
}

#[tokio::test]
async fn test_monitor_treats_backend_errors_as_no_progress() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let (mut downloader, _temp_dir) = create_test_downloader(&server).await;

    let outcome = downloader.monitor().await;

    assert_eq!(outcome.reason, StopReason::Stagnant);
}

#[tokio::test]
async fn test_monitor_times_out() {
    let server = MockServer::start().await;
    status_mock(&[], None).mount(&server).await;
    let mut config = fast_config();
    config.download.max_wait = Duration::from_millis(150);
    config.download.stagnation_cycles = 10_000;
    let (mut downloader, _temp_dir) = create_test_downloader_with(&server, config).await;

    let outcome = downloader.monitor().await;

    assert_eq!(outcome.reason, StopReason::TimedOut);
    assert!(outcome.elapsed >= Duration::from_millis(150));
    assert!(outcome.elapsed < Duration::from_secs(5));
}

// --- cancellation ---

#[tokio::test]
async fn test_monitor_stops_on_cancel() {
    let server = MockServer::start().await;
    status_mock(&[], None).mount(&server).await;
    let mut config = fast_config();
    config.download.stagnation_cycles = 10_000;
    config.download.max_wait = Duration::from_secs(60);
    let (mut downloader, _temp_dir) = create_test_downloader_with(&server, config).await;

    let token = downloader.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let outcome = downloader.monitor().await;

    assert_eq!(outcome.reason, StopReason::UserCancelled);
    assert!(outcome.elapsed < Duration::from_secs(5));
}

#[tokio::test]
async fn test_monitor_cancelled_up_front_polls_nothing() {
    let server = MockServer::start().await;
    status_mock(&[0], Some(1)).expect(0).mount(&server).await;
    let (mut downloader, _temp_dir) = create_test_downloader(&server).await;
    downloader.cancel_token().cancel();

    let outcome = downloader.monitor().await;

    assert_eq!(outcome.reason, StopReason::UserCancelled);
    assert_eq!(outcome.cycles, 0);
    assert!(outcome.downloaded.is_empty());
}

// --- events ---

#[tokio::test]
async fn test_monitor_emits_stopped_event() {
    let server = MockServer::start().await;
    status_mock(&[0], Some(1)).mount(&server).await;
    mount_segment(&server, 0, b"only").await;
    let (mut downloader, _temp_dir) = create_test_downloader(&server).await;
    let mut events = downloader.subscribe();

    downloader.monitor().await;

    let mut last = None;
    while let Ok(event) = events.try_recv() {
        last = Some(event);
    }
    match last {
        Some(Event::MonitorStopped { reason, downloaded }) => {
            assert_eq!(reason, StopReason::AllComplete);
            assert_eq!(downloaded, 1);
        }
        other => panic!("expected MonitorStopped last, got {:?}", other),
    }
}
