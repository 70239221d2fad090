//! Single-segment fetch: existence short-circuit, streaming write, empty-body guard, retry.

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::Instrument;

use crate::error::{Error, Result};
use crate::retry::{RetryOutcome, download_with_retry_cancellable};
use crate::types::{Event, SegmentIndex, SegmentOutcome};
use crate::utils::{nonempty_file_len, remove_file_if_exists};

use super::FetchContext;

/// Fetch one segment, retrying transient failures with backoff.
///
/// On success the artifact is on disk with non-zero size; on failure no file for
/// this index is left behind. An artifact that already exists is reported as a
/// success without any request. Once the session is cancelled no new request is
/// started and the outcome is [`Error::Cancelled`].
pub(crate) async fn fetch_segment(ctx: &FetchContext, index: SegmentIndex) -> SegmentOutcome {
    let path = ctx.job.segment_path(index);

    if let Some(size) = nonempty_file_len(&path).await {
        tracing::info!(
            asset_id = %ctx.job.asset_id(),
            segment = index,
            bytes = size,
            "Segment already exists, skipping"
        );
        return SegmentOutcome {
            index,
            attempts: 0,
            result: Ok(size),
        };
    }

    // A zero-length leftover is not an artifact; it must not survive a failed fetch
    remove_file_if_exists(&path).await;

    if ctx.cancel_token.is_cancelled() {
        return SegmentOutcome {
            index,
            attempts: 0,
            result: Err(Error::Cancelled),
        };
    }

    let span = tracing::info_span!("segment", asset_id = %ctx.job.asset_id(), segment = index);
    let mut attempts = 0u32;
    let RetryOutcome { result, cancelled } =
        download_with_retry_cancellable(&ctx.config.retry, &ctx.cancel_token, || {
            attempts += 1;
            download_once(ctx, index)
        })
        .instrument(span)
        .await;

    // Backoff cut short: the retry budget was not spent, so the segment has not failed
    if cancelled {
        tracing::info!(
            asset_id = %ctx.job.asset_id(),
            segment = index,
            attempts,
            "Segment abandoned after cancellation"
        );
        return SegmentOutcome {
            index,
            attempts,
            result: Err(Error::Cancelled),
        };
    }

    match &result {
        Ok(bytes) => {
            tracing::info!(
                asset_id = %ctx.job.asset_id(),
                segment = index,
                bytes,
                attempts,
                "Successfully downloaded segment"
            );
            ctx.event_tx
                .send(Event::SegmentDownloaded {
                    index,
                    bytes: *bytes,
                })
                .ok();
        }
        Err(e) => {
            tracing::error!(
                asset_id = %ctx.job.asset_id(),
                segment = index,
                attempts,
                error = %e,
                "Failed to download segment"
            );
            ctx.event_tx
                .send(Event::SegmentFailed {
                    index,
                    error: e.to_string(),
                    attempts,
                })
                .ok();
        }
    }

    SegmentOutcome {
        index,
        attempts,
        result,
    }
}

/// One request: stream the body into the `.part` file, then move it into place.
async fn download_once(ctx: &FetchContext, index: SegmentIndex) -> Result<u64> {
    let response = ctx.client.open_segment(ctx.job.asset_id(), index).await?;
    ctx.event_tx
        .send(Event::SegmentStarted {
            index,
            total_bytes: response.content_length(),
        })
        .ok();

    let partial = ctx.job.partial_segment_path(index);
    let written = match write_body(response, &partial).await {
        Ok(written) => written,
        Err(e) => {
            remove_file_if_exists(&partial).await;
            return Err(e);
        }
    };

    if written == 0 {
        remove_file_if_exists(&partial).await;
        return Err(Error::EmptySegment { index });
    }

    let path = ctx.job.segment_path(index);
    if let Err(e) = tokio::fs::rename(&partial, &path).await {
        remove_file_if_exists(&partial).await;
        return Err(Error::Io(e));
    }
    Ok(written)
}

async fn write_body(response: reqwest::Response, partial: &std::path::Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(partial).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if chunk.is_empty() {
            continue;
        }
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}
