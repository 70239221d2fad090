//! Mock segmenting backend built on wiremock

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Asset id served by [`MockBackend`]
pub const ASSET: &str = "aBcDeFgHiJk";

/// Payload of segment `index`; distinct per index so ordering mistakes show up
pub fn segment_payload(index: u32) -> Vec<u8> {
    let mut payload = format!("[segment {index}]").into_bytes();
    payload.extend(std::iter::repeat_n(b'a' + (index % 26) as u8, 64));
    payload
}

/// A backend that already finished producing `total` segments
pub struct MockBackend {
    pub server: MockServer,
    pub total: u32,
}

impl MockBackend {
    /// Start a backend whose status lists `ready` and whose total is `total`
    pub async fn start(ready: &[u32], total: u32) -> Self {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/status"))
            .and(query_param("v", ASSET))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ready": ready,
                "totalSegments": total,
            })))
            .mount(&server)
            .await;

        for &index in ready {
            Mock::given(method("GET"))
                .and(path("/stream"))
                .and(query_param("v", ASSET))
                .and(query_param("segment", index.to_string()))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("content-type", "audio/mp4")
                        .set_body_bytes(segment_payload(index)),
                )
                .mount(&server)
                .await;
        }

        Self { server, total }
    }

    /// Base URL to hand to the downloader
    pub fn url(&self) -> String {
        self.server.uri()
    }
}
