//! Test configuration helpers

use segment_dl::{AssetId, Config, Job, SegmentDownloader};
use std::path::Path;
use std::time::Duration;

use super::backend::ASSET;

/// Configuration pointed at `backend_url` with short delays
pub fn test_config(backend_url: &str, download_dir: &Path) -> Config {
    let mut config = Config::default();
    config.backend.url = backend_url.to_string();
    config.backend.request_timeout = Duration::from_secs(5);
    config.download.download_dir = download_dir.to_path_buf();
    config.download.poll_interval = Duration::from_millis(20);
    config.download.max_wait = Duration::from_secs(30);
    config.download.stagnation_cycles = 3;
    config.retry.max_attempts = 1;
    config.retry.initial_delay = Duration::from_millis(10);
    config.retry.max_delay = Duration::from_millis(50);
    config
}

/// Session for [`ASSET`] using `config`
pub async fn create_downloader(config: Config) -> SegmentDownloader {
    let job = Job::new(
        AssetId::parse(ASSET).unwrap(),
        config.backend_url().unwrap(),
        &config.download.download_dir,
        config.download.segment_extension.clone(),
    );
    SegmentDownloader::new(job, config).await.unwrap()
}
