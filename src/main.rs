//! segment-dl command line entry point
//!
//! Validates the asset id, downloads whatever the backend produces (continuously
//! or once), prints a JSON summary and optionally combines the segments.

use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use segment_dl::{
    AssetId, Config, Event, Job, ProgressSnapshot, Result, SegmentDownloader, StopReason,
};

/// Exit status for a session stopped by SIGINT/SIGTERM
const EXIT_INTERRUPTED: u8 = 130;

/// Download a media asset that a backend produces progressively in numbered segments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 11-character asset identifier
    asset_id: String,

    /// Base URL of the segmenting backend
    #[arg(long, value_name = "URL")]
    backend_url: Option<String>,

    /// Root directory for downloaded segments
    #[arg(long, value_name = "DIR")]
    download_dir: Option<PathBuf>,

    /// Maximum time to keep monitoring, in seconds
    #[arg(long, value_name = "SECS")]
    max_wait: Option<u64>,

    /// Download what is ready once instead of monitoring until complete
    #[arg(long)]
    no_monitor: bool,

    /// Combine downloaded segments into this file
    #[arg(long, value_name = "PATH")]
    combine: Option<PathBuf>,

    /// Use raw byte concatenation instead of an ffmpeg remux when combining
    #[arg(long)]
    no_remux: bool,

    /// Number of segments to download in parallel
    #[arg(long, value_name = "N")]
    concurrent: Option<usize>,

    /// JSON configuration file; flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Final report printed to stdout
#[derive(Debug, Serialize)]
struct Summary<'a> {
    asset_id: &'a AssetId,
    directory: &'a std::path::Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_reason: Option<StopReason>,
    #[serde(flatten)]
    progress: ProgressSnapshot,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "segment-dl failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };

    if let Some(url) = &args.backend_url {
        config.backend.url = url.clone();
    }
    if let Some(dir) = &args.download_dir {
        config.download.download_dir = dir.clone();
    }
    if let Some(secs) = args.max_wait {
        config.download.max_wait = Duration::from_secs(secs);
    }
    if let Some(width) = args.concurrent {
        config.download.max_concurrent_segments = width;
    }

    config.validate()?;
    Ok(config)
}

async fn run(args: Args) -> Result<ExitCode> {
    // Nothing touches the disk or the network before the id is known to be valid
    let asset_id = AssetId::parse(&args.asset_id)?;
    let config = load_config(&args)?;

    let job = Job::new(
        asset_id,
        config.backend_url()?,
        &config.download.download_dir,
        config.download.segment_extension.clone(),
    );
    let mut downloader = SegmentDownloader::new(job, config).await?;

    let cancel_token = downloader.cancel_token();
    tokio::spawn(segment_dl::cancel_on_signal(cancel_token.clone()));
    spawn_progress_display(&downloader);

    let stop_reason = if args.no_monitor {
        downloader.download_available().await;
        None
    } else {
        Some(downloader.monitor().await.reason)
    };

    let progress = downloader.snapshot();
    let summary = Summary {
        asset_id: downloader.job().asset_id(),
        directory: downloader.job().job_dir(),
        stop_reason,
        progress: progress.clone(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if cancel_token.is_cancelled() {
        tracing::warn!("Download interrupted by user");
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }

    if progress.downloaded.is_empty() {
        tracing::error!(asset_id = %downloader.job().asset_id(), "No segments were downloaded");
        return Ok(ExitCode::FAILURE);
    }

    if let Some(output) = &args.combine {
        match downloader.combine(output, !args.no_remux).await {
            Ok(report) => {
                tracing::info!(
                    output = %report.output.display(),
                    method = ?report.method,
                    segments = report.segments.len(),
                    bytes = report.bytes,
                    "Segments combined"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, output = %output.display(), "Failed to combine segments");
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Log session events as progress lines until the session ends.
fn spawn_progress_display(downloader: &SegmentDownloader) {
    let mut events = downloader.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Progress display fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn log_event(event: &Event) {
    match event {
        Event::StatusPolled { ready, total } => {
            tracing::debug!(ready, total = ?total, "Backend status");
        }
        Event::SegmentStarted { index, total_bytes } => {
            tracing::debug!(segment = index, total_bytes = ?total_bytes, "Receiving segment");
        }
        Event::SegmentDownloaded { index, bytes } => {
            tracing::debug!(segment = index, bytes, "Segment saved");
        }
        Event::SegmentFailed {
            index,
            error,
            attempts,
        } => {
            tracing::warn!(segment = index, attempts, error = %error, "Segment gave up");
        }
        Event::MonitorStopped { reason, downloaded } => {
            tracing::info!(reason = %reason, downloaded, "Monitor stopped");
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedOutput {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// What `log_event` prints under the binary's default `info` level
    fn logged_at_default_level(event: &Event) -> String {
        let captured = CapturedOutput::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("info"))
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || log_event(event));
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn failures_and_monitor_stop_are_visible_by_default() {
        let failed = logged_at_default_level(&Event::SegmentFailed {
            index: 4,
            error: "HTTP 500".to_string(),
            attempts: 3,
        });
        assert!(failed.contains("WARN"), "{failed}");
        assert!(failed.contains("Segment gave up"), "{failed}");

        let stopped = logged_at_default_level(&Event::MonitorStopped {
            reason: StopReason::Stagnant,
            downloaded: 2,
        });
        assert!(stopped.contains("INFO"), "{stopped}");
        assert!(stopped.contains("Monitor stopped"), "{stopped}");
    }

    #[test]
    fn per_request_chatter_stays_at_debug() {
        let started = logged_at_default_level(&Event::SegmentStarted {
            index: 0,
            total_bytes: Some(10),
        });
        assert!(started.is_empty(), "{started}");
    }
}
