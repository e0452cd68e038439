pub mod arxiv;
pub mod brave;
pub mod duckduckgo;
pub mod generic_json;
pub mod google_cse;
pub mod qwant;
pub mod stackexchange;
pub mod wikipedia;
pub mod yacy;

use std::time::Duration;

use deepsearch_core::CoreError;
use reqwest::Client;

/// Shared GET-and-parse-JSON helper used by the simpler adapters. Folds
/// every failure mode (timeout, transport, non-2xx, malformed body) into
/// `CoreError` so adapters stay total per the registry's contract.
pub(crate) async fn get_json(
    client: &Client,
    url: reqwest::Url,
    timeout: Duration,
) -> Result<serde_json::Value, CoreError> {
    let response = tokio::time::timeout(timeout, client.get(url).send())
        .await
        .map_err(|_| CoreError::ProviderTimeout("request timed out".into()))?
        .map_err(|e| CoreError::ProviderUnavailable(e.to_string()))?;

    if !response.status().is_success() {
        return Err(CoreError::ProviderProtocolError(format!(
            "unexpected status {}",
            response.status()
        )));
    }

    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| CoreError::ProviderProtocolError(e.to_string()))
}

/// Like `get_json`, but with a single extra header — for back-ends (Brave)
/// that take their API key as a header rather than a query parameter.
pub(crate) async fn get_json_with_header(
    client: &Client,
    url: reqwest::Url,
    timeout: Duration,
    header_name: &str,
    header_value: &str,
) -> Result<serde_json::Value, CoreError> {
    let response = tokio::time::timeout(timeout, client.get(url).header(header_name, header_value).send())
        .await
        .map_err(|_| CoreError::ProviderTimeout("request timed out".into()))?
        .map_err(|e| CoreError::ProviderUnavailable(e.to_string()))?;

    if !response.status().is_success() {
        return Err(CoreError::ProviderProtocolError(format!(
            "unexpected status {}",
            response.status()
        )));
    }

    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| CoreError::ProviderProtocolError(e.to_string()))
}

/// Shared GET-and-read-text helper for XML/text-bodied back-ends (arXiv).
pub(crate) async fn get_text(
    client: &Client,
    url: reqwest::Url,
    timeout: Duration,
) -> Result<String, CoreError> {
    let response = tokio::time::timeout(timeout, client.get(url).send())
        .await
        .map_err(|_| CoreError::ProviderTimeout("request timed out".into()))?
        .map_err(|e| CoreError::ProviderUnavailable(e.to_string()))?;

    if !response.status().is_success() {
        return Err(CoreError::ProviderProtocolError(format!(
            "unexpected status {}",
            response.status()
        )));
    }

    response
        .text()
        .await
        .map_err(|e| CoreError::ProviderProtocolError(e.to_string()))
}
