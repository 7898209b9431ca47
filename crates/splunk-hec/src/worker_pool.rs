// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fixed pool of delivery workers.
//!
//! Each worker loops: take a batch off the dispatch queue, join it into one
//! request body, post it through the retrying transport, acknowledge it. A
//! batch that still fails after its retries is reported and dropped, never
//! re-queued.

use crate::accumulator::Batch;
use crate::constants::CHANNEL_HEADER;
use crate::dispatch_queue::DispatchQueue;
use crate::stats::{DeliveryFailure, DeliveryStats, FailureCallback};
use crate::transport::RetryingTransport;
use reqwest::header::{HeaderMap, HeaderValue};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use uuid::Uuid;

/// Everything a worker needs, shared by the whole pool.
pub struct WorkerContext {
    pub queue: DispatchQueue,
    pub transport: RetryingTransport,
    pub server_uri: String,
    pub headers: HeaderMap,
    pub stats: Arc<DeliveryStats>,
    pub on_failure: Option<FailureCallback>,
}

impl WorkerContext {
    async fn deliver(&self, worker_id: usize, batch: Batch) {
        let events = batch.len();
        let bytes = batch.byte_len();
        let body = batch.into_body();

        let mut headers = self.headers.clone();
        if let Ok(channel) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
            headers.insert(CHANNEL_HEADER, channel);
        }

        debug!("HEC | Worker {worker_id} sending {events} events ({bytes} bytes)");

        let failure = match self.transport.post(&self.server_uri, body, headers).await {
            Ok(delivery) if delivery.status.is_success() => {
                debug!(
                    "HEC | Worker {worker_id} delivered {events} events: http_status_code={} http_message={}",
                    delivery.status, delivery.body
                );
                self.stats.record_delivered(delivery.retries());
                return;
            }
            Ok(delivery) => {
                error!(
                    "HEC | {}: Collector rejected batch of {events} events, dropping it: {}",
                    delivery.status, delivery.body
                );
                self.stats.record_failed(delivery.retries());
                DeliveryFailure {
                    events,
                    bytes,
                    status: Some(delivery.status),
                    attempts: delivery.attempts,
                    message: delivery.body,
                }
            }
            Err(e) => {
                error!("HEC | Dropping batch of {events} events: {e}");
                self.stats.record_failed(e.attempts().saturating_sub(1));
                DeliveryFailure {
                    events,
                    bytes,
                    status: e.status(),
                    attempts: e.attempts(),
                    message: e.to_string(),
                }
            }
        };

        if let Some(on_failure) = &self.on_failure {
            if panic::catch_unwind(AssertUnwindSafe(|| on_failure(&failure))).is_err() {
                error!("HEC | Failure callback panicked for a batch of {events} events");
            }
        }
    }
}

/// Acknowledges a dequeued batch when dropped, even if delivery unwinds.
struct Ack<'a>(&'a DispatchQueue);

impl Drop for Ack<'_> {
    fn drop(&mut self) {
        self.0.mark_done();
    }
}

pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Spawns `size` workers on the current tokio runtime.
    ///
    /// Dropping the pool without calling [`WorkerPool::stop`] detaches the
    /// workers; they keep serving the queue for the lifetime of the runtime.
    #[must_use]
    pub fn start(size: usize, ctx: Arc<WorkerContext>) -> Self {
        let cancel = CancellationToken::new();
        let workers = (0..size)
            .map(|worker_id| {
                tokio::spawn(run_worker(worker_id, Arc::clone(&ctx), cancel.clone()))
            })
            .collect();
        debug!("HEC | Started {size} workers");
        WorkerPool { workers, cancel }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Signals every worker and waits for them to exit.
    ///
    /// A worker in the middle of a delivery finishes it first. Batches still
    /// in the queue are left undelivered.
    pub async fn stop(self) {
        self.cancel.cancel();
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!("HEC | Worker task failed: {e}");
            }
        }
        debug!("HEC | All workers stopped");
    }
}

async fn run_worker(worker_id: usize, ctx: Arc<WorkerContext>, cancel: CancellationToken) {
    loop {
        let batch = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            batch = ctx.queue.dequeue() => match batch {
                Some(batch) => batch,
                None => break,
            },
        };

        let _ack = Ack(&ctx.queue);
        ctx.deliver(worker_id, batch).await;
    }
    debug!("HEC | Worker {worker_id} stopped");
}
