// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The engine callers talk to.
//!
//! `HttpEventCollector` owns the batch accumulator and the producer side of
//! the dispatch queue, and keeps the worker pool alive between `start` and
//! `stop`. Events go in through [`HttpEventCollector::submit`] (or the two
//! explicit paths it dispatches to) and come out of the workers as HTTP
//! requests.

use crate::accumulator::{Batch, BatchAccumulator};
use crate::config::{HecConfig, InputType, SubmissionMode};
use crate::constants::{AUTHORIZATION_SCHEME, CHANNEL_HEADER};
use crate::dispatch_queue::DispatchQueue;
use crate::errors::{HecError, TransportError};
use crate::event::{EventSerializer, Payload};
use crate::hostname::get_hostname;
use crate::http::build_client;
use crate::stats::{DeliveryStats, FailureCallback, StatsSnapshot};
use crate::transport::RetryingTransport;
use crate::worker_pool::{WorkerContext, WorkerPool};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct HttpEventCollector {
    input_type: InputType,
    submission_mode: SubmissionMode,
    serializer: EventSerializer,
    accumulator: BatchAccumulator,
    queue: DispatchQueue,
    ctx: Arc<WorkerContext>,
    pool: Option<WorkerPool>,
}

impl HttpEventCollector {
    /// Validates `config`, builds the HTTP client and starts the workers.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn start(config: HecConfig) -> Result<Self, HecError> {
        Self::start_inner(config, None)
    }

    /// Like [`HttpEventCollector::start`], with `on_failure` invoked for
    /// every batch the workers drop.
    pub fn start_with_failure_callback(
        config: HecConfig,
        on_failure: FailureCallback,
    ) -> Result<Self, HecError> {
        Self::start_inner(config, Some(on_failure))
    }

    fn start_inner(
        config: HecConfig,
        on_failure: Option<FailureCallback>,
    ) -> Result<Self, HecError> {
        config.validate()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(HecError::NoRuntime);
        }

        let client = build_client(&config).map_err(|e| HecError::Client(e.to_string()))?;
        let headers = auth_headers(&config.token)?;
        let server_uri = config.endpoint.server_uri(config.input_type);
        let host = config.host.clone().unwrap_or_else(get_hostname);

        let queue = DispatchQueue::new(config.queue_capacity);
        let ctx = Arc::new(WorkerContext {
            queue: queue.clone(),
            transport: RetryingTransport::new(client, config.retry.clone()),
            server_uri,
            headers,
            stats: Arc::new(DeliveryStats::default()),
            on_failure,
        });
        let pool = WorkerPool::start(config.worker_count, Arc::clone(&ctx));

        info!(
            "HEC | Instance ready: server_uri={} input_type={} workers={} queue_capacity={} max_batch_bytes={}",
            ctx.server_uri,
            config.input_type,
            config.worker_count,
            config.queue_capacity,
            config.max_batch_bytes
        );

        Ok(Self {
            input_type: config.input_type,
            submission_mode: config.submission_mode,
            serializer: EventSerializer::new(config.input_type, host, config.pop_null_fields),
            accumulator: BatchAccumulator::new(config.max_batch_bytes),
            queue,
            ctx,
            pool: Some(pool),
        })
    }

    /// Submits one event using the configured [`SubmissionMode`].
    pub async fn submit(
        &mut self,
        payload: impl Into<Payload>,
        event_time: Option<f64>,
    ) -> Result<(), HecError> {
        match self.submission_mode {
            SubmissionMode::Batched => self.batch_event(payload, event_time).await,
            SubmissionMode::Synchronous => self.send_event(payload, event_time).await,
        }
    }

    /// Adds an event to the current batch.
    ///
    /// Returns once the event is buffered. When it would push the batch past
    /// `max_batch_bytes` the batch accumulated so far is enqueued first, which
    /// waits only if the dispatch queue is full.
    pub async fn batch_event(
        &mut self,
        payload: impl Into<Payload>,
        event_time: Option<f64>,
    ) -> Result<(), HecError> {
        self.ensure_running()?;
        let event = self.serializer.serialize(payload.into(), event_time)?;
        if let Some(batch) = self.accumulator.push(event) {
            debug!(
                "HEC | Batch size limit reached, rotating {} events ({} bytes)",
                batch.len(),
                batch.byte_len()
            );
            self.enqueue(batch).await?;
        }
        Ok(())
    }

    /// Sends one event as its own batch and waits until the queue drains.
    ///
    /// Bypasses the accumulator, so events already buffered by
    /// [`HttpEventCollector::batch_event`] stay where they are.
    pub async fn send_event(
        &mut self,
        payload: impl Into<Payload>,
        event_time: Option<f64>,
    ) -> Result<(), HecError> {
        self.ensure_running()?;
        let event = self.serializer.serialize(payload.into(), event_time)?;
        self.enqueue(Batch::single(event)).await?;
        self.queue.drain_wait().await;
        Ok(())
    }

    /// Enqueues whatever is buffered and waits for every queued batch to get
    /// a final delivery outcome.
    pub async fn flush_now(&mut self) -> Result<(), HecError> {
        self.ensure_running()?;
        if let Some(batch) = self.accumulator.take() {
            debug!(
                "HEC | Flushing {} events ({} bytes)",
                batch.len(),
                batch.byte_len()
            );
            self.enqueue(batch).await?;
        }
        self.queue.drain_wait().await;
        debug!("HEC | Flush complete");
        Ok(())
    }

    /// Stops the workers and waits for them to exit.
    ///
    /// Does not flush. Buffered events and batches still queued are lost;
    /// call [`HttpEventCollector::flush_now`] first to deliver them. Calling
    /// `stop` twice is a no-op.
    pub async fn stop(&mut self) {
        let Some(pool) = self.pool.take() else {
            return;
        };
        let buffered = self.accumulator.pending_events();
        let queued = self.queue.queued();
        if buffered > 0 || queued > 0 {
            warn!("HEC | Stopping with {buffered} buffered events and {queued} queued batches undelivered");
        }
        pool.stop().await;
        info!("HEC | Instance stopped");
    }

    /// Posts an empty body to the collector to check it is reachable.
    ///
    /// Goes through the same retry policy as event delivery. A 400, 401 or
    /// 403 still proves the collector is up: it rejected the empty payload or
    /// the token. A 500 or 503 that outlasts the retries means it is up but
    /// unhealthy.
    pub async fn check_connectivity(&self) -> bool {
        let mut headers = self.ctx.headers.clone();
        if let Ok(channel) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
            headers.insert(CHANNEL_HEADER, channel);
        }

        match self
            .ctx
            .transport
            .post(&self.ctx.server_uri, String::new(), headers)
            .await
        {
            Ok(delivery) => {
                let status = delivery.status;
                match status.as_u16() {
                    200..=299 => {
                        info!("HEC | Connectivity check passed: {status}");
                        true
                    }
                    400 | 401 | 403 => {
                        warn!(
                            "HEC | Collector reachable but rejected the probe: {status} {}",
                            delivery.body
                        );
                        true
                    }
                    _ => {
                        error!(
                            "HEC | Connectivity check failed: {status} {}",
                            delivery.body
                        );
                        false
                    }
                }
            }
            Err(TransportError::RetriesExhausted { status, attempts })
                if matches!(status.as_u16(), 500 | 503) =>
            {
                warn!("HEC | Collector health warning: {status} after {attempts} attempts");
                false
            }
            Err(e) => {
                error!("HEC | Connectivity check failed: {e}");
                false
            }
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.pool.is_some()
    }

    #[must_use]
    pub fn server_uri(&self) -> &str {
        &self.ctx.server_uri
    }

    #[must_use]
    pub fn input_type(&self) -> InputType {
        self.input_type
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.ctx.stats.snapshot()
    }

    /// Batches enqueued but not yet acknowledged by a worker.
    #[must_use]
    pub fn pending_batches(&self) -> usize {
        self.queue.pending()
    }

    /// Events held by the accumulator, not yet enqueued.
    #[must_use]
    pub fn buffered_events(&self) -> usize {
        self.accumulator.pending_events()
    }

    fn ensure_running(&self) -> Result<(), HecError> {
        if self.pool.is_some() {
            Ok(())
        } else {
            Err(HecError::NotRunning)
        }
    }

    async fn enqueue(&self, batch: Batch) -> Result<(), HecError> {
        let slot = self.queue.reserve().await.ok_or(HecError::NotRunning)?;
        // Counted before any worker can see the batch.
        self.ctx.stats.record_enqueued();
        slot.send(batch);
        Ok(())
    }
}

fn auth_headers(token: &str) -> Result<HeaderMap, HecError> {
    let mut value = HeaderValue::from_str(&format!("{AUTHORIZATION_SCHEME} {token}"))
        .map_err(|_| HecError::InvalidConfig("token is not a valid header value".to_string()))?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::endpoint::HecEndpoint;
    use tracing_test::traced_test;

    fn config() -> HecConfig {
        HecConfig {
            worker_count: 2,
            queue_capacity: 4,
            ..HecConfig::new("abc", HecEndpoint::from_uri("http://127.0.0.1:1/services/collector/event"))
        }
    }

    #[test]
    fn test_auth_header() {
        let headers = auth_headers("abc-123").unwrap();
        assert_eq!(headers[AUTHORIZATION], "Splunk abc-123");
        assert!(headers[AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn test_auth_header_rejects_control_characters() {
        assert!(matches!(
            auth_headers("abc\n123"),
            Err(HecError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_start_requires_runtime() {
        assert!(matches!(
            HttpEventCollector::start(config()),
            Err(HecError::NoRuntime)
        ));
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let config = HecConfig {
            worker_count: 0,
            ..config()
        };
        assert!(matches!(
            HttpEventCollector::start(config),
            Err(HecError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_flush_on_idle_collector() {
        let mut collector = HttpEventCollector::start(config()).unwrap();
        assert!(collector.is_running());
        assert!(logs_contain("HEC | Instance ready"));
        collector.flush_now().await.unwrap();
        collector.flush_now().await.unwrap();
        assert_eq!(collector.stats().batches_enqueued, 0);
        collector.stop().await;
        assert!(logs_contain("HEC | Instance stopped"));
    }

    #[tokio::test]
    async fn test_batch_event_buffers_until_full() {
        let mut collector = HttpEventCollector::start(config()).unwrap();
        collector
            .batch_event(serde_json::json!({"event": "a"}), Some(1.0))
            .await
            .unwrap();
        collector
            .batch_event(serde_json::json!({"event": "b"}), Some(2.0))
            .await
            .unwrap();

        assert_eq!(collector.buffered_events(), 2);
        assert_eq!(collector.pending_batches(), 0);
        collector.stop().await;
    }

    #[tokio::test]
    async fn test_payload_errors_are_returned() {
        let mut collector = HttpEventCollector::start(config()).unwrap();
        let result = collector
            .batch_event(serde_json::json!({"no_event": true}), None)
            .await;
        assert!(matches!(result, Err(HecError::InvalidPayload(_))));
        assert_eq!(collector.buffered_events(), 0);
        collector.stop().await;
    }

    #[tokio::test]
    async fn test_stopped_collector_rejects_work() {
        let mut collector = HttpEventCollector::start(config()).unwrap();
        collector.stop().await;
        collector.stop().await;

        assert!(!collector.is_running());
        assert!(matches!(
            collector.submit("late", None).await,
            Err(HecError::NotRunning)
        ));
        assert!(matches!(
            collector.flush_now().await,
            Err(HecError::NotRunning)
        ));
    }
}
