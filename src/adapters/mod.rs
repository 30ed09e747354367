//! Concrete implementations of the domain ports: the AI and map HTTP clients
//! and the on-disk image store.

pub mod gemini;
pub mod perplexity;
pub mod static_map;
pub mod storage;

pub use gemini::GeminiClient;
pub use perplexity::PerplexityClient;
pub use static_map::StaticMapClient;
pub use storage::LocalImageStore;

use crate::utils::error::{GreenwardError, Result};
use reqwest::Response;

const MAX_ERROR_BODY_CHARS: usize = 500;

/// Turns a non-2xx response into an `UpstreamError` carrying (part of) its body.
pub(crate) async fn ensure_success(service: &str, response: Response) -> Result<Response> {
    let status = response.status();
    tracing::debug!(service, status = status.as_u16(), "Upstream response received");
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
    tracing::warn!(service, status = status.as_u16(), "Upstream request failed");
    Err(GreenwardError::UpstreamError {
        service: service.to_string(),
        status: status.as_u16(),
        body,
    })
}
