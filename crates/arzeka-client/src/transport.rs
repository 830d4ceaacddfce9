//! Authenticated JSON POSTs to the gateway
//!
//! Retries 429/500/502/503/504 responses and connection failures with
//! exponential backoff. Any other non-success status becomes
//! `Error::Api { status, body }` on the first attempt.

use std::time::Duration;

use arzeka_auth::{ACCEPT_LANGUAGE, Token, USER_AGENT, endpoint_url};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// HTTP transport bound to one gateway root.
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl Transport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Http(format!("building HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            timeout: config.timeout(),
            max_retries: config.max_retries,
            backoff: config.retry_backoff(),
        })
    }

    /// Underlying client, shared with the token endpoint.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    /// POST `body` to `endpoint` with the token's Authorization header.
    ///
    /// A success body that is not JSON is returned as
    /// `{"raw_response": "<text>"}`.
    pub async fn post_json(&self, endpoint: &str, token: &Token, body: &Value) -> Result<Value> {
        let url = endpoint_url(&self.base_url, endpoint);
        let mut attempt: u32 = 0;

        loop {
            debug!(url, attempt, "sending POST");
            let result = self
                .http
                .post(&url)
                .header(reqwest::header::AUTHORIZATION, token.authorization_header())
                .header(reqwest::header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE)
                .json(body)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if is_retryable(status) && attempt < self.max_retries {
                        warn!(url, status = status.as_u16(), attempt, "retryable status, backing off");
                        tokio::time::sleep(self.delay(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return read_response(&url, response).await;
                }
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < self.max_retries => {
                    warn!(url, error = %e, attempt, "request failed, backing off");
                    tokio::time::sleep(self.delay(attempt)).await;
                    attempt += 1;
                }
                Err(e) if e.is_timeout() => {
                    return Err(Error::Http(format!(
                        "request timeout after {} seconds",
                        self.timeout.as_secs()
                    )));
                }
                Err(e) => {
                    return Err(Error::Http(format!("failed to connect to Arzeka API: {e}")));
                }
            }
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(1u32 << attempt.min(16))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

async fn read_response(url: &str, response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| Error::Http(format!("reading response body: {e}")))?;

    if !status.is_success() {
        warn!(url, status = status.as_u16(), "API request failed");
        return Err(Error::Api {
            status: status.as_u16(),
            body: text,
        });
    }

    info!(url, status = status.as_u16(), "request successful");
    Ok(serde_json::from_str(&text).unwrap_or_else(|_| serde_json::json!({ "raw_response": text })))
}
