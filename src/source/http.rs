// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tagwatch-rs

//! HTTP snapshot source

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::{
    ActivityLogSnapshot, ItemSearchResponse, LiveSummaryResponse, ReaderSnapshot, SnapshotSource,
    TagSnapshot,
};
use crate::activity::DateRange;
use crate::config::SourceConfig;
use crate::error::{ConfigError, Result, TransportError};

/// Pulls snapshots from the tracking backend's JSON API
pub struct HttpSource {
    client: Client,
    config: SourceConfig,
}

impl HttpSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let base = config.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::BaseUrl(config.base_url.clone()).into());
        }

        let client = Client::builder()
            .user_agent(concat!("tagwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        info!("HTTP snapshot source at {}", base);
        Ok(Self { client, config })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.config.endpoint(path);
        debug!("GET {} {:?}", url, query);

        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url,
                status: status.as_u16(),
            }
            .into());
        }

        let body = response.text().await?;
        let decoded = serde_json::from_str(&body).map_err(TransportError::from)?;
        Ok(decoded)
    }
}

#[async_trait]
impl SnapshotSource for HttpSource {
    fn name(&self) -> &str {
        &self.config.base_url
    }

    async fn live_tags(&self) -> Result<TagSnapshot> {
        self.get_json(&self.config.live_tags_path, &[]).await
    }

    async fn reader_status(&self) -> Result<ReaderSnapshot> {
        self.get_json(&self.config.reader_status_path, &[]).await
    }

    async fn activity_logs(&self, range: &DateRange) -> Result<ActivityLogSnapshot> {
        self.get_json(&self.config.activity_logs_path, &range.query_pairs()).await
    }

    async fn search_item(&self, query: &str) -> Result<ItemSearchResponse> {
        let params = [("q", query.to_string())];
        match self.get_json(&self.config.item_search_path, &params).await {
            Err(crate::error::TrackError::Transport(TransportError::Status { status, .. }))
                if status == StatusCode::NOT_FOUND.as_u16() =>
            {
                Ok(ItemSearchResponse::default())
            }
            other => other,
        }
    }

    async fn live_summary(&self) -> Result<LiveSummaryResponse> {
        self.get_json(&self.config.live_summary_path, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// One-shot HTTP server answering every request with `status` and `body`
    async fn serve(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        format!("http://{}", addr)
    }

    fn source(base_url: String) -> HttpSource {
        HttpSource::new(SourceConfig {
            base_url,
            ..SourceConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let config = SourceConfig {
            base_url: "ftp://example".into(),
            ..SourceConfig::default()
        };
        assert!(HttpSource::new(config).is_err());
    }

    #[tokio::test]
    async fn test_fetch_live_tags() {
        let base = serve("200 OK", r#"{"tags": [{"epc": "E1", "lastSeen": "2026-03-14T10:00:00Z"}]}"#).await;
        let snapshot = source(base).live_tags().await.unwrap();
        assert_eq!(snapshot.tags.len(), 1);
        assert_eq!(snapshot.tags[0].epc, "E1");
    }

    #[tokio::test]
    async fn test_http_error_is_transport_failure() {
        let base = serve("500 Internal Server Error", r#"{"error": "boom"}"#).await;
        let err = source(base).reader_status().await.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[tokio::test]
    async fn test_item_not_found_is_not_an_error() {
        let base = serve("404 Not Found", r#"{"found": false}"#).await;
        let response = source(base).search_item("nothing").await.unwrap();
        assert!(!response.found);
    }

    #[tokio::test]
    async fn test_garbage_body_is_decode_error() {
        let base = serve("200 OK", "<html>login</html>").await;
        let err = source(base).live_tags().await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::TrackError::Transport(TransportError::Decode(_))
        ));
    }
}
