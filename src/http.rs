//! Shared HTTP client construction and response checks

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Response;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};

use crate::TripPlannerError;
use crate::telemetry;

const USER_AGENT: &str = concat!("TripPlanner/", env!("CARGO_PKG_VERSION"));

/// Client that retries transient failures with exponential backoff
pub fn build_client(timeout: Duration, max_retries: u32) -> Result<ClientWithMiddleware> {
    let inner = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .with_context(|| "Failed to create HTTP client")?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);

    Ok(ClientBuilder::new(inner)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

/// Turn a non-success response of a third party API into an error
pub async fn check_api_response(service: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    telemetry::record_request(service, status.is_success());
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match status.as_u16() {
        401 | 403 => format!("{service} rejected the API key"),
        429 => format!("{service} rate limit exceeded"),
        _ => format!("{service} returned {status}: {}", truncate(&body, 200)),
    };
    Err(TripPlannerError::api(message).into())
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
