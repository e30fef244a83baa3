// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Wire access to the legacy service.
//!
//! [`UpstreamTransport`] is the seam between the resilience layer and the
//! network. Production uses [`HttpTransport`]; tests inject fakes.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::error::UpstreamError;

/// Longest response body kept on a [`UpstreamError::Status`]
const MAX_ERROR_BODY: usize = 512;

#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    /// `GET {base}{path}` and return the decoded JSON body.
    ///
    /// 404 maps to [`UpstreamError::NotFound`], any other non-2xx to
    /// [`UpstreamError::Status`].
    async fn get_json(&self, path: &str) -> Result<Value, UpstreamError>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    #[must_use]
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl UpstreamTransport for HttpTransport {
    async fn get_json(&self, path: &str) -> Result<Value, UpstreamError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "GET legacy");

        let res = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| UpstreamError::Transport {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        match res.status() {
            s if s.is_success() => res.json::<Value>().await.map_err(|e| UpstreamError::Decode {
                path: path.to_string(),
                message: e.to_string(),
            }),
            StatusCode::NOT_FOUND => Err(UpstreamError::NotFound {
                path: path.to_string(),
            }),
            s => {
                let mut body = res.text().await.unwrap_or_default();
                if body.len() > MAX_ERROR_BODY {
                    let mut cut = MAX_ERROR_BODY;
                    while !body.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    body.truncate(cut);
                }
                Err(UpstreamError::Status {
                    path: path.to_string(),
                    status: s.as_u16(),
                    body,
                })
            }
        }
    }
}
