// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP POST with bounded retries and exponential backoff.
//!
//! Connection and read failures are retried, as are the statuses listed in
//! [`RetryConfig::retryable_status_codes`]. Every other status, 4xx included,
//! is returned to the caller untouched after a single attempt.

use crate::config::RetryConfig;
use crate::errors::TransportError;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Outcome of a request that got a final, non-retryable answer.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub status: StatusCode,
    pub attempts: u32,
    pub body: String,
}

impl Delivery {
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

#[derive(Debug, Clone)]
pub struct RetryingTransport {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl RetryingTransport {
    #[must_use]
    pub fn new(client: reqwest::Client, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    #[must_use]
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub async fn post(
        &self,
        uri: &str,
        body: String,
        headers: HeaderMap,
    ) -> Result<Delivery, TransportError> {
        let mut attempts = 0;

        loop {
            let time = Instant::now();
            attempts += 1;
            let resp = self
                .client
                .post(uri)
                .headers(headers.clone())
                .body(body.clone())
                .send()
                .await;
            let elapsed = time.elapsed();
            let exhausted = attempts > self.retry.max_retries;

            match resp {
                Ok(resp) => {
                    let status = resp.status();
                    if !self.retry.is_retryable(status.as_u16()) {
                        let body = resp.text().await.unwrap_or_default();
                        debug!(
                            "HEC | {status} in {} ms after {attempts} attempts",
                            elapsed.as_millis()
                        );
                        return Ok(Delivery {
                            status,
                            attempts,
                            body,
                        });
                    }
                    if exhausted {
                        error!(
                            "HEC | Giving up after {attempts} attempts, last status {status}: {:?}",
                            resp.text().await.unwrap_or_default()
                        );
                        return Err(TransportError::RetriesExhausted { status, attempts });
                    }
                    warn!("HEC | Retryable status {status} (attempt {attempts})");
                }
                Err(e) => {
                    if exhausted || !is_retryable_error(&e) {
                        error!(
                            "HEC | Failed to send request after {} ms and {} attempts: {:?}",
                            elapsed.as_millis(),
                            attempts,
                            e
                        );
                        return Err(TransportError::Network {
                            source: e,
                            attempts,
                        });
                    }
                    warn!("HEC | Network error (attempt {attempts}): {e}");
                }
            }

            tokio::time::sleep(self.retry.backoff(attempts)).await;
        }
    }
}

fn is_retryable_error(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout() || e.is_request() || e.is_body()
}
