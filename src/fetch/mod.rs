//! HTTP access to the fleet backend.
//!
//! Every backend response is a `{success, data | message}` envelope. Any
//! transport failure, non-2xx status, malformed body or rejected envelope
//! surfaces as [`FetchError::FetchFailed`]. Nothing here retries; that is left
//! to the caller.

mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchCause {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("rejected by server: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch failed for {endpoint}: {cause}")]
    FetchFailed {
        endpoint: String,
        #[source]
        cause: FetchCause,
    },
}

impl FetchError {
    pub fn new(endpoint: &str, cause: impl Into<FetchCause>) -> Self {
        FetchError::FetchFailed {
            endpoint: endpoint.to_string(),
            cause: cause.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            FetchError::FetchFailed { endpoint, .. } => endpoint,
        }
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

/// GETs `url` and returns the raw body of a 2xx response.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Vec<u8>, FetchError> {
    let parsed = url
        .parse::<reqwest::Url>()
        .map_err(|e| FetchError::new(url, FetchCause::InvalidUrl(e.to_string())))?;
    let req = reqwest::Request::new(reqwest::Method::GET, parsed);

    let resp = client.execute(req).await.map_err(|e| FetchError::new(url, e))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::new(url, FetchCause::Status(status)));
    }

    let bytes = resp.bytes().await.map_err(|e| FetchError::new(url, e))?;
    Ok(bytes.to_vec())
}

/// GETs `url` and unwraps the `data` payload of its envelope.
pub async fn fetch_json<C, T>(client: &C, url: &str) -> Result<T, FetchError>
where
    C: HttpClient + ?Sized,
    T: DeserializeOwned,
{
    let bytes = fetch_bytes(client, url).await?;
    decode_envelope(url, &bytes)
}

/// Decodes an envelope body, turning `success: false` into
/// [`FetchCause::Rejected`] with the server's message.
pub fn decode_envelope<T: DeserializeOwned>(endpoint: &str, body: &[u8]) -> Result<T, FetchError> {
    let envelope: Envelope<T> =
        serde_json::from_slice(body).map_err(|e| FetchError::new(endpoint, e))?;

    match envelope {
        Envelope {
            success: true,
            data: Some(data),
            ..
        } => Ok(data),
        Envelope { success: true, .. } => Err(FetchError::new(
            endpoint,
            FetchCause::Rejected("response carried no data".to_string()),
        )),
        Envelope { message, .. } => Err(FetchError::new(
            endpoint,
            FetchCause::Rejected(message.unwrap_or_else(|| "unspecified error".to_string())),
        )),
    }
}
