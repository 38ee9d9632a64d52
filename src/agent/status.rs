//! HTTP client for the tunneling agent's local status API.
//!
//! [`StatusClient`] wraps `reqwest::Client` and issues a single
//! `GET <status_url>` per call. The agent answers with
//!
//! ```json
//! { "tunnels": [ { "name": "web", "public_url": "https://abc.ngrok.io", "proto": "https", ... } ],
//!   "uri": "/api/tunnels" }
//! ```
//!
//! Only `name`, `public_url` and `proto` are read; everything else is ignored
//! so newer agent versions keep working.
//!
//! ## Error handling
//!
//! Connection failures, non-2xx statuses and malformed payloads map to the
//! three [`StatusError`] variants. There is no retry here; the caller decides.

use std::fmt::Write;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::StatusError;

/// Reply text when the agent reports an empty tunnel list.
pub const NO_TUNNELS: &str = "No tunnels available";

/// One active tunnel, as reported by the agent. Never cached.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TunnelEndpoint {
    pub name: String,
    pub public_url: String,
    #[serde(rename = "proto", default)]
    pub protocol: String,
}

#[derive(Deserialize)]
struct TunnelList {
    tunnels: Vec<TunnelEndpoint>,
}

/// Client for a single agent status endpoint.
#[derive(Clone)]
pub struct StatusClient {
    http: reqwest::Client,
    url: String,
    verbose: bool,
}

impl StatusClient {
    pub fn new(url: impl Into<String>, verbose: bool) -> Self {
        // The builder only fails when the TLS backend cannot initialize;
        // a plain client is good enough for a localhost endpoint.
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            url: url.into(),
            verbose,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// `GET <status_url>` — list the agent's active tunnels.
    pub async fn fetch_status(&self) -> Result<Vec<TunnelEndpoint>, StatusError> {
        let resp = self.http.get(&self.url).send().await.map_err(|e| {
            warn!("Failed to request tunnel status: {e}");
            StatusError::Request(e)
        })?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            warn!("Tunnel status endpoint returned HTTP {status}");
            return Err(StatusError::Http {
                status: status.as_u16(),
                body,
            });
        }

        match serde_json::from_str::<TunnelList>(&body) {
            Ok(list) => {
                debug!("Agent reports {} tunnel(s)", list.tunnels.len());
                Ok(list.tunnels)
            }
            Err(e) => {
                if self.verbose {
                    warn!("Failed to parse tunnel status: {body}");
                } else {
                    warn!("Failed to parse tunnel status: {e}");
                }
                Err(StatusError::Protocol(e.to_string()))
            }
        }
    }
}

/// Render endpoints as one `▸ name: url` line each, or [`NO_TUNNELS`].
pub fn format_report(endpoints: &[TunnelEndpoint]) -> String {
    if endpoints.is_empty() {
        return NO_TUNNELS.to_string();
    }
    let mut report = String::new();
    for endpoint in endpoints {
        let _ = writeln!(report, "▸ {}: {}", endpoint.name, endpoint.public_url);
    }
    report
}
