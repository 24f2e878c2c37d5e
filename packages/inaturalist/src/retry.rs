//! HTTP retry helpers for transient errors.
//!
//! Every iNaturalist request goes through [`send_json`], [`send_json_with`]
//! or [`send`] instead of calling `reqwest::RequestBuilder::send()`
//! directly, so connection failures, timeouts, rate limiting, and server
//! errors are retried with exponential backoff. Requests that must not be
//! repeated use [`RetryPolicy::ONCE`].
//!
//! # Usage
//!
//! ```ignore
//! let page: ObservationPage = retry::send_json(|| client.get(&url).query(&params)).await?;
//! let created: Vec<Created> =
//!     retry::send_json_with(RetryPolicy::ONCE, || client.post(&url).json(&body)).await?;
//! ```

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::InatError;

/// Maximum number of retry attempts for transient HTTP errors.
///
/// With exponential backoff (2s, 4s, 8s, 16s) the total wait before giving
/// up is 30 seconds.
const MAX_RETRIES: u32 = 4;

/// Maximum number of full re-fetch attempts when the body cannot be decoded.
const MAX_BODY_RETRIES: u32 = 2;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// How often a request may be re-sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Re-sends after transient errors, 429 or 5xx.
    pub max_retries: u32,
    /// Re-fetches after an undecodable body.
    pub max_body_retries: u32,
}

impl RetryPolicy {
    /// Reads and idempotent writes.
    pub const STANDARD: Self = Self {
        max_retries: MAX_RETRIES,
        max_body_retries: MAX_BODY_RETRIES,
    };

    /// A single attempt.
    pub const ONCE: Self = Self {
        max_retries: 0,
        max_body_retries: 0,
    };
}

/// Sends a request with [`RetryPolicy::STANDARD`] and decodes the JSON
/// response body into `T`.
///
/// The `build_request` closure is called on each attempt, since builders are
/// consumed by `.send()`. Truncated or garbled bodies trigger a re-fetch
/// up to [`MAX_BODY_RETRIES`] times. HTTP 4xx other than 429 is permanent.
///
/// # Errors
///
/// Returns [`InatError`] if the request fails after all retries, the server
/// returns a non-retryable status, or the body never decodes.
#[allow(clippy::future_not_send)]
pub async fn send_json<T, F>(build_request: F) -> Result<T, InatError>
where
    T: DeserializeOwned,
    F: Fn() -> reqwest::RequestBuilder,
{
    send_json_with(RetryPolicy::STANDARD, build_request).await
}

/// Like [`send_json`], with an explicit retry budget.
///
/// # Errors
///
/// Returns [`InatError`] if the request fails within the budget, the server
/// returns a non-retryable status, or the body never decodes.
#[allow(clippy::future_not_send)]
pub async fn send_json_with<T, F>(policy: RetryPolicy, build_request: F) -> Result<T, InatError>
where
    T: DeserializeOwned,
    F: Fn() -> reqwest::RequestBuilder,
{
    let max_body_retries = policy.max_body_retries;
    let mut body_attempt = 0;

    loop {
        let response = send_inner(&build_request, policy.max_retries).await?;
        let url = response.url().to_string();
        let status = response.status();

        let error = match response.text().await {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(value) => return Ok(value),
                Err(json_err) => {
                    let preview: String = text.chars().take(BODY_PREVIEW_LEN).collect();
                    log::warn!(
                        "JSON decode failed\n  url: {url}\n  status: {status}\n  \
                         error: {json_err}\n  body preview: {preview}"
                    );
                    InatError::Json(json_err)
                }
            },
            Err(e) => {
                log::warn!("Response body read failed\n  url: {url}\n  error: {e}");
                InatError::Http(e)
            }
        };

        if body_attempt >= max_body_retries {
            log::error!("Giving up on {url} after {max_body_retries} body retries");
            return Err(error);
        }

        body_attempt += 1;
        let delay = Duration::from_secs(1u64 << body_attempt);
        log::warn!("  body retry {body_attempt}/{max_body_retries} in {delay:?}...");
        tokio::time::sleep(delay).await;
    }
}

/// Sends a request whose response body is not needed.
///
/// # Errors
///
/// Returns [`InatError`] if the request fails after all retries or the
/// server returns a non-retryable status.
#[allow(clippy::future_not_send)]
pub async fn send<F>(build_request: F) -> Result<(), InatError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    send_inner(&build_request, MAX_RETRIES).await?;
    Ok(())
}

/// Core retry loop shared by [`send_json`] and [`send`].
///
/// Returns the successful [`reqwest::Response`] (status 2xx or 3xx).
#[allow(clippy::future_not_send)]
async fn send_inner<F>(build_request: &F, max_retries: u32) -> Result<reqwest::Response, InatError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = Duration::from_secs(1u64 << attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    attempt += 1;
                    continue;
                }
                return Err(InatError::Http(e));
            }
            Ok(response) => {
                let status = response.status();

                if is_retryable_status(status) {
                    if attempt < max_retries {
                        log::warn!("  HTTP {status}");
                        attempt += 1;
                        continue;
                    }
                    return Err(InatError::Status {
                        status: status.as_u16(),
                        message: format!("still failing after {max_retries} retries"),
                    });
                }

                if status.is_client_error() {
                    let body = response.text().await.unwrap_or_default();
                    let preview: String = body.chars().take(BODY_PREVIEW_LEN).collect();
                    return Err(InatError::Status {
                        status: status.as_u16(),
                        message: preview,
                    });
                }

                return Ok(response);
            }
        }
    }
}

/// Rate limiting and server errors are worth retrying; other statuses are not.
fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_rate_limits_and_server_errors_only() {
        assert!(is_retryable_status(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(reqwest::StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(reqwest::StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(reqwest::StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(reqwest::StatusCode::OK));
    }

    #[tokio::test]
    async fn single_attempt_fails_without_backing_off() {
        let client = reqwest::Client::new();
        let started = std::time::Instant::now();

        let result: Result<serde_json::Value, _> =
            send_json_with(RetryPolicy::ONCE, || client.post("http://127.0.0.1:1/")).await;

        assert!(matches!(result, Err(InatError::Http(_))));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
