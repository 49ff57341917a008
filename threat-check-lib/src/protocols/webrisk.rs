//! Google Web Risk `uris:search` implementation.
//!
//! One GET per URL:
//! `{endpoint}/v1/uris:search?key=..&uri=..&threatTypes=MALWARE&threatTypes=..`.
//! An empty JSON object means no list matched; otherwise
//! `threat.threatTypes` names the matching lists.

use super::{SourceError, VerdictSource};
use crate::error::ThreatCheckError;
use crate::types::ThreatCategory;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Production Web Risk endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://webrisk.googleapis.com";

const SEARCH_PATH: &str = "/v1/uris:search";

/// HTTP client for the Web Risk lookup API.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone)]
pub struct WebRiskClient {
    /// HTTP client for making search requests
    http_client: reqwest::Client,
    /// Full search URL (endpoint + path)
    search_url: String,
    /// API key sent as the `key` query parameter
    api_key: String,
}

impl std::fmt::Debug for WebRiskClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebRiskClient")
            .field("search_url", &self.search_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl WebRiskClient {
    /// Create a client for the production endpoint.
    pub fn new<K: Into<String>>(api_key: K) -> Result<Self, ThreatCheckError> {
        Self::with_config(api_key, DEFAULT_ENDPOINT, Duration::from_secs(10))
    }

    /// Create a client with a custom endpoint and request timeout.
    ///
    /// The HTTP-level timeout gets a small buffer on top of `timeout` so the
    /// pool's own per-lookup deadline fires first.
    pub fn with_config<K: Into<String>, E: AsRef<str>>(
        api_key: K,
        endpoint: E,
        timeout: Duration,
    ) -> Result<Self, ThreatCheckError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ThreatCheckError::config(
                "Web Risk API key must be provided (TC_API_KEY or GOOGLE_API_KEY)",
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout.saturating_add(Duration::from_secs(2)))
            .user_agent(concat!("threat-check/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ThreatCheckError::internal(format!("Failed to create Web Risk HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            search_url: format!("{}{}", endpoint.as_ref().trim_end_matches('/'), SEARCH_PATH),
            api_key,
        })
    }

    /// The URL requests are sent to.
    pub fn search_url(&self) -> &str {
        &self.search_url
    }
}

#[async_trait]
impl VerdictSource for WebRiskClient {
    async fn check(
        &self,
        url: &str,
        categories: &[ThreatCategory],
    ) -> Result<Vec<ThreatCategory>, SourceError> {
        let mut query: Vec<(&str, &str)> = Vec::with_capacity(categories.len() + 2);
        query.push(("key", self.api_key.as_str()));
        query.push(("uri", url));
        for category in categories {
            query.push(("threatTypes", category.as_str()));
        }

        let response = self
            .http_client
            .get(&self.search_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| SourceError::Unclassified(format!("Request failed: {}", e)))?;

        let status = response.status();
        debug!(%url, %status, "web risk response");

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Unclassified(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }

        parse_search_response(&body)
    }
}

/// Body of a successful `uris:search` call.
#[derive(Debug, Deserialize, Default)]
struct SearchUrisResponse {
    #[serde(default)]
    threat: Option<ThreatUri>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ThreatUri {
    #[serde(default)]
    threat_types: Vec<String>,
}

/// Google API error envelope: `{"error": {"code": 400, "message": "..", "status": "INVALID_ARGUMENT"}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Parse a successful response into matched categories.
///
/// Unknown threat type names are treated as an unclassified fault: the
/// verdict cannot be represented faithfully.
fn parse_search_response(body: &str) -> Result<Vec<ThreatCategory>, SourceError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let parsed: SearchUrisResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::Unclassified(format!("Malformed Web Risk response: {}", e)))?;

    parsed
        .threat
        .unwrap_or_default()
        .threat_types
        .iter()
        .map(|name| {
            name.parse::<ThreatCategory>()
                .map_err(|_| SourceError::Unclassified(format!("Unknown threat type '{}'", name)))
        })
        .collect()
}

/// Map a failed response to a fault class.
///
/// The canonical `error.status` string wins when present; the HTTP status is
/// the fallback.
fn classify_error(status: StatusCode, body: &str) -> SourceError {
    let (message, canonical) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.status),
        Err(_) => (body.trim().to_string(), None),
    };
    let message = if message.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, message)
    };

    match canonical.as_deref() {
        Some("INVALID_ARGUMENT") => return SourceError::InvalidArgument(message),
        Some("PERMISSION_DENIED") => return SourceError::PermissionDenied(message),
        Some("NOT_FOUND") => return SourceError::NotFound(message),
        Some("INTERNAL") => return SourceError::Internal(message),
        Some(_) => return SourceError::Unclassified(message),
        None => {}
    }

    match status {
        StatusCode::BAD_REQUEST => SourceError::InvalidArgument(message),
        StatusCode::FORBIDDEN => SourceError::PermissionDenied(message),
        StatusCode::NOT_FOUND => SourceError::NotFound(message),
        StatusCode::INTERNAL_SERVER_ERROR => SourceError::Internal(message),
        _ => SourceError::Unclassified(message),
    }
}
