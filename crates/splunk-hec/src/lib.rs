// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batching client for the Splunk HTTP Event Collector.
//!
//! Events are serialized as they are submitted and accumulated into batches
//! bounded by a byte budget. Full batches go onto a bounded dispatch queue
//! that a fixed pool of workers drains, posting each batch as one request
//! with retry and exponential backoff on transient failures.
//!
//! - [`collector`]: the [`HttpEventCollector`] engine and its lifecycle
//! - [`accumulator`]: byte-bounded batch rotation
//! - [`dispatch_queue`]: bounded FIFO with a drain signal
//! - [`worker_pool`]: delivery workers
//! - [`transport`]: HTTP POST with retries
//!
//! ```no_run
//! use splunk_hec::{HecConfig, HecEndpoint, HttpEventCollector};
//!
//! # async fn run() -> Result<(), splunk_hec::HecError> {
//! let config = HecConfig::new("00000000-0000-0000-0000-000000000000", HecEndpoint::new("splunk.example.com"));
//! let mut collector = HttpEventCollector::start(config)?;
//! collector
//!     .batch_event(serde_json::json!({"event": {"action": "login"}}), None)
//!     .await?;
//! collector.flush_now().await?;
//! collector.stop().await;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod accumulator;
pub mod collector;
pub mod config;
pub mod constants;
pub mod dispatch_queue;
pub mod endpoint;
pub mod errors;
pub mod event;
pub mod hostname;
pub mod http;
pub mod stats;
pub mod transport;
pub mod worker_pool;

pub use collector::HttpEventCollector;
pub use config::{HecConfig, InputType, RetryConfig, SubmissionMode};
pub use endpoint::HecEndpoint;
pub use errors::{HecError, TransportError};
pub use event::{HecEvent, Payload};
pub use stats::{DeliveryFailure, FailureCallback, StatsSnapshot};
