// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Default limits for the collector.

use std::time::Duration;

/// Largest serialized batch before it is rotated onto the dispatch queue.
pub const MAX_BATCH_BYTES: usize = 100_000;

/// Number of workers delivering batches concurrently.
pub const WORKER_COUNT: usize = 10;

/// Dispatch queue slots per worker.
pub const QUEUE_SLOTS_PER_WORKER: usize = 10;

/// Retries after the first attempt before a batch is dropped.
pub const MAX_RETRIES: u32 = 3;

/// Seconds; the delay before retry `n` is `factor * 2^(n - 1)`.
pub const BACKOFF_FACTOR: f64 = 0.3;

/// Upper bound on the delay between two attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Statuses worth another attempt. 503 means the indexers are busy and
/// 408 comes from proxies such as HAProxy.
pub const RETRYABLE_STATUS_CODES: [u16; 5] = [408, 500, 502, 503, 504];

/// Per request, in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_HEC_PORT: u16 = 8088;

pub const COLLECTOR_PATH: &str = "/services/collector";

pub const AUTHORIZATION_SCHEME: &str = "Splunk";

pub const CHANNEL_HEADER: &str = "X-Splunk-Request-Channel";

/// Separator placed between serialized events in one request body.
pub const EVENT_SEPARATOR: &str = " ";
