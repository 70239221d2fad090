//! HTTP client for the segmenting backend
//!
//! Two endpoints are used:
//! - `GET <backend>/status?v=<asset>` returns `{"ready": [int], "totalSegments": int?}`
//! - `GET <backend>/stream?v=<asset>&segment=<index>` returns the segment body

use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::types::{AssetId, BackendStatus, SegmentIndex};
use serde::Deserialize;
use std::collections::BTreeSet;
use url::Url;

/// Body of the `/status` endpoint
#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    ready: Vec<SegmentIndex>,
    #[serde(rename = "totalSegments", default)]
    total_segments: Option<u32>,
}

/// Shared HTTP client bound to one backend base URL
///
/// Every request carries the configured timeout; a request that exceeds it fails
/// like any other network error.
#[derive(Clone, Debug)]
pub struct BackendClient {
    http: reqwest::Client,
    base: Url,
}

impl BackendClient {
    /// Build a client for `config.url`
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let base = Url::parse(&config.url)
            .map_err(|e| Error::config("url", format!("invalid backend URL: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(Error::config("url", "backend URL cannot carry a path"));
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { http, base })
    }

    /// Base URL requests are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Build `<base>/<endpoint>?v=<asset>[&segment=<index>]`, keeping any path prefix of the base.
    fn endpoint(&self, name: &str, asset: &AssetId, segment: Option<SegmentIndex>) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::NotSupported(format!("backend URL {} has no path", self.base)))?
            .pop_if_empty()
            .push(name);
        {
            let mut query = url.query_pairs_mut();
            query.clear().append_pair("v", asset.as_str());
            if let Some(index) = segment {
                query.append_pair("segment", &index.to_string());
            }
        }
        Ok(url)
    }

    /// Ask the backend which segments are ready.
    ///
    /// Never fails: transport errors, non-2xx answers and malformed bodies are
    /// logged and reported as [`BackendStatus::unknown`].
    pub async fn probe(&self, asset: &AssetId) -> BackendStatus {
        match self.fetch_status(asset).await {
            Ok(status) => {
                tracing::debug!(
                    asset_id = %asset,
                    ready = status.ready.len(),
                    total = ?status.total,
                    "Status probe succeeded"
                );
                status
            }
            Err(e) => {
                tracing::error!(asset_id = %asset, error = %e, "Failed to get segment status");
                BackendStatus::unknown()
            }
        }
    }

    async fn fetch_status(&self, asset: &AssetId) -> Result<BackendStatus> {
        let url = self.endpoint("status", asset, None)?;
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = response.bytes().await?;
        let parsed: StatusResponse = serde_json::from_slice(&body)?;
        Ok(BackendStatus {
            ready: parsed.ready.into_iter().collect::<BTreeSet<_>>(),
            total: parsed.total_segments,
        })
    }

    /// Start streaming one segment. Non-2xx answers become [`Error::Http`].
    pub async fn open_segment(
        &self,
        asset: &AssetId,
        index: SegmentIndex,
    ) -> Result<reqwest::Response> {
        let url = self.endpoint("stream", asset, Some(index))?;
        tracing::debug!(asset_id = %asset, segment = index, url = %url, "Requesting segment");
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        if let Some(content_type) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            && !["audio", "video", "octet-stream"]
                .iter()
                .any(|ct| content_type.contains(ct))
        {
            tracing::warn!(
                asset_id = %asset,
                segment = index,
                content_type,
                "Unexpected content type for segment"
            );
        }
        Ok(response)
    }
}
