//! Shared test helpers for creating SegmentDownloader instances against a mock backend.

use crate::config::Config;
use crate::downloader::SegmentDownloader;
use crate::types::{AssetId, Job, SegmentIndex};
use std::time::Duration;
use tempfile::tempdir;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Asset id every helper mock answers for
pub(crate) const TEST_ASSET: &str = "dQw4w9WgXcQ";

/// Configuration with millisecond-scale delays so retry and monitor tests run quickly.
pub(crate) fn fast_config() -> Config {
    let mut config = Config::default();
    config.backend.request_timeout = Duration::from_secs(5);
    config.download.poll_interval = Duration::from_millis(10);
    config.download.max_wait = Duration::from_secs(30);
    config.download.stagnation_cycles = 3;
    config.retry.max_attempts = 2;
    config.retry.initial_delay = Duration::from_millis(5);
    config.retry.max_delay = Duration::from_millis(20);
    config.retry.jitter = false;
    config
}

/// Create a downloader for [`TEST_ASSET`] talking to `server`, with default fast settings.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader(
    server: &MockServer,
) -> (SegmentDownloader, tempfile::TempDir) {
    create_test_downloader_with(server, fast_config()).await
}

/// Same as [`create_test_downloader`] with caller-supplied configuration.
/// The download directory and backend URL are always overridden.
pub(crate) async fn create_test_downloader_with(
    server: &MockServer,
    mut config: Config,
) -> (SegmentDownloader, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    config.download.download_dir = temp_dir.path().join("downloads");
    config.backend.url = server.uri();

    let job = Job::new(
        AssetId::parse(TEST_ASSET).unwrap(),
        Url::parse(&server.uri()).unwrap(),
        &config.download.download_dir,
        config.download.segment_extension.clone(),
    );

    let downloader = SegmentDownloader::new(job, config).await.unwrap();
    (downloader, temp_dir)
}

/// `/status` answer for [`TEST_ASSET`]
pub(crate) fn status_response(ready: &[SegmentIndex], total: Option<u32>) -> ResponseTemplate {
    let body = match total {
        Some(total) => serde_json::json!({ "ready": ready, "totalSegments": total }),
        None => serde_json::json!({ "ready": ready }),
    };
    ResponseTemplate::new(200).set_body_json(body)
}

/// Mock matching `/status` for [`TEST_ASSET`]
pub(crate) fn status_mock(ready: &[SegmentIndex], total: Option<u32>) -> Mock {
    Mock::given(method("GET"))
        .and(path("/status"))
        .and(query_param("v", TEST_ASSET))
        .respond_with(status_response(ready, total))
}

/// Mock builder matching `/stream` for one segment of [`TEST_ASSET`]
pub(crate) fn segment_request(index: SegmentIndex) -> wiremock::MockBuilder {
    Mock::given(method("GET"))
        .and(path("/stream"))
        .and(query_param("v", TEST_ASSET))
        .and(query_param("segment", index.to_string()))
}

/// 200 answer carrying `body` as an audio segment
pub(crate) fn segment_body(body: &[u8]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "audio/mp4")
        .set_body_bytes(body.to_vec())
}

/// Mount a segment that always answers with `body`
pub(crate) async fn mount_segment(server: &MockServer, index: SegmentIndex, body: &[u8]) {
    segment_request(index)
        .respond_with(segment_body(body))
        .mount(server)
        .await;
}

/// Body used for segment `index` in multi-segment tests
pub(crate) fn sample_body(index: SegmentIndex) -> Vec<u8> {
    format!("segment-{index}-payload").into_bytes()
}
