// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Called by a worker for every batch it had to drop.
pub type FailureCallback = Arc<dyn Fn(&DeliveryFailure) + Send + Sync>;

/// A batch that was dropped after its final delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub events: usize,
    pub bytes: usize,
    /// Last HTTP status seen, if the collector answered at all.
    pub status: Option<StatusCode>,
    pub attempts: u32,
    pub message: String,
}

/// Counters shared between the collector and its workers.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub batches_enqueued: u64,
    pub batches_delivered: u64,
    pub batches_failed: u64,
    pub retries: u64,
}

impl DeliveryStats {
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self, retries: u32) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        self.retries.fetch_add(u64::from(retries), Ordering::Relaxed);
    }

    pub fn record_failed(&self, retries: u32) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.retries.fetch_add(u64::from(retries), Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            batches_enqueued: self.enqueued.load(Ordering::Relaxed),
            batches_delivered: self.delivered.load(Ordering::Relaxed),
            batches_failed: self.failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}
