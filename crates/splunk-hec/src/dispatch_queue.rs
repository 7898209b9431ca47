// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded FIFO between the producer and the worker pool.
//!
//! Besides the channel itself, the queue tracks how many batches were handed
//! in but not yet acknowledged by a worker. `drain_wait` resolves only once
//! that count reaches zero, which covers batches enqueued after the wait
//! started as well.

use crate::accumulator::Batch;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DispatchQueue {
    tx: mpsc::Sender<Batch>,
    rx: Arc<Mutex<mpsc::Receiver<Batch>>>,
    pending: Arc<watch::Sender<usize>>,
    capacity: usize,
}

impl DispatchQueue {
    /// # Panics
    ///
    /// Panics if `capacity` is zero; configuration validation rejects that
    /// before a queue is ever built.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let (pending, _) = watch::channel(0);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            pending: Arc::new(pending),
            capacity,
        }
    }

    /// Adds a batch, waiting for a free slot when the queue is full.
    ///
    /// Returns the batch back if the receiving side is gone.
    /// Cancel safe: dropping the future while it waits for a slot leaves
    /// neither the queue nor the pending count touched.
    pub async fn enqueue(&self, batch: Batch) -> Result<(), Batch> {
        match self.reserve().await {
            Some(slot) => {
                slot.send(batch);
                Ok(())
            }
            None => Err(batch),
        }
    }

    /// Waits for a free slot without handing anything to the workers yet.
    ///
    /// `None` if the receiving side is gone. Dropping the slot unused frees
    /// it again.
    pub async fn reserve(&self) -> Option<Slot<'_>> {
        let permit = self.tx.reserve().await.ok()?;
        Some(Slot {
            permit,
            queue: self,
        })
    }

    /// Next batch in FIFO order. `None` once the queue is closed and empty.
    pub async fn dequeue(&self) -> Option<Batch> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }

    /// Acknowledges one finished delivery attempt.
    pub fn mark_done(&self) {
        self.pending.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Waits until every enqueued batch has been acknowledged.
    pub async fn drain_wait(&self) {
        let mut rx = self.pending.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Batches sitting in the channel or reserved for it, not counting those
    /// being delivered.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A reserved place in the queue.
pub struct Slot<'a> {
    permit: mpsc::Permit<'a, Batch>,
    queue: &'a DispatchQueue,
}

impl Slot<'_> {
    pub fn send(self, batch: Batch) {
        // Counted before it becomes visible to workers.
        self.queue.pending.send_modify(|n| *n += 1);
        self.permit.send(batch);
        debug!(
            "HEC | Batch enqueued, {} pending, {} free slots",
            self.queue.pending(),
            self.queue.tx.capacity()
        );
    }
}
