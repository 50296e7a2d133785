//! HTTP transport to the transform service.
//!
//! [`TransformAdaptor`] owns the service endpoint and the shared
//! `reqwest::Client`, and exposes the two calls the orchestration core
//! needs: submitting a transform request and fetching one status snapshot.
//! Polling cadence lives in [`crate::status`], not here.

use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};
use crate::types::{RequestId, StatusSnapshot};

/// Transport adaptor for one transform service endpoint
///
/// Cheap to clone; the underlying `reqwest::Client` connection pool is
/// shared across clones, so many in-flight requests reuse connections.
#[derive(Clone, Debug)]
pub struct TransformAdaptor {
    endpoint: Url,
    client: reqwest::Client,
}

/// Submit response body on success
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    request_id: String,
}

/// Error response body shape shared by submit and status endpoints
#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Status response body
///
/// The service is inconsistent about field types: counts arrive as JSON
/// numbers or as numeric strings depending on the service version. The
/// `files-skipped` field carries the failed-file count.
#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(rename = "files-remaining", default, deserialize_with = "lenient_count")]
    files_remaining: Option<u64>,
    #[serde(rename = "files-processed", default, deserialize_with = "lenient_count")]
    files_processed: Option<u64>,
    #[serde(rename = "files-skipped", default, deserialize_with = "lenient_count")]
    files_skipped: Option<u64>,
}

/// Deserialize an optional count that may be a number or a numeric string
fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        Text(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::Text(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl TransformAdaptor {
    /// Create an adaptor for the given service endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid URL.
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        Ok(Self {
            endpoint,
            client: reqwest::Client::new(),
        })
    }

    /// Submit a transform request and return the id assigned by the service
    ///
    /// The payload is the full JSON submission body built by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SubmitFailed`] (carrying the HTTP status code and the
    /// body's `message`) on any non-2xx response. Submit errors are never
    /// retried.
    pub async fn submit_query(&self, payload: &serde_json::Value) -> Result<RequestId> {
        let url = self.route("transformation");
        let response = self.client.post(url).json(payload).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = parse_message(&body);
            tracing::error!(status = status.as_u16(), message = %message, "Submit rejected");
            return Err(Error::SubmitFailed {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: SubmitResponse = serde_json::from_str(&body)?;
        tracing::debug!(request_id = %parsed.request_id, "Transform request submitted");
        Ok(RequestId(parsed.request_id))
    }

    /// Fetch one status snapshot for a request
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRequestId`] when the response is a 404 or the
    /// body message says the id is unknown, and [`Error::RequestFailed`] for
    /// any other non-2xx response. Status errors are never retried.
    pub async fn get_transform_status(&self, request_id: &RequestId) -> Result<StatusSnapshot> {
        let url = self.route(&format!("transformation/{}/status", request_id));
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = parse_message(&body);
            if status == reqwest::StatusCode::NOT_FOUND
                || message.to_ascii_lowercase().contains("unknown")
            {
                return Err(Error::UnknownRequestId(request_id.to_string()));
            }
            return Err(Error::RequestFailed {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: StatusResponse = serde_json::from_str(&body)?;
        let snapshot = StatusSnapshot {
            files_remaining: parsed.files_remaining,
            files_processed: parsed.files_processed.unwrap_or(0),
            files_failed: parsed.files_skipped.unwrap_or(0),
        };
        tracing::trace!(
            request_id = %request_id,
            remaining = ?snapshot.files_remaining,
            processed = snapshot.files_processed,
            failed = snapshot.files_failed,
            "Status snapshot"
        );
        Ok(snapshot)
    }

    /// Base endpoint this adaptor talks to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Shared HTTP client, reused by the default object store
    pub(crate) fn http_client(&self) -> reqwest::Client {
        self.client.clone()
    }

    /// Build a service route under the endpoint, tolerating a trailing slash
    fn route(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.as_str().trim_end_matches('/'), path)
    }
}

/// Pull the `message` field out of an error body, falling back to the raw body
fn parse_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|r| r.message)
        .unwrap_or_else(|| body.to_string())
}
