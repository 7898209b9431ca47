// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Byte-bounded batching of serialized events.
//!
//! Events are appended to the current batch until the next one would push it
//! past `max_bytes`. At that point the current batch is sealed and handed back
//! to the caller for enqueueing, and the new event starts the next batch.
//!
//! An event larger than `max_bytes` is never rejected or truncated: it simply
//! ends up alone in its own batch.

use crate::constants::EVENT_SEPARATOR;
use std::mem;

/// A sealed group of serialized events delivered in one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    events: Vec<String>,
    byte_len: usize,
}

impl Batch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A batch holding exactly one event, used by synchronous submission.
    #[must_use]
    pub fn single(event: String) -> Self {
        let mut batch = Self::new();
        batch.push(event);
        batch
    }

    fn push(&mut self, event: String) {
        self.byte_len += event.len();
        self.events.push(event);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Sum of the serialized event lengths, separators excluded.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    #[must_use]
    pub fn events(&self) -> &[String] {
        &self.events
    }

    /// Joins the events into a request body, one space between events.
    #[must_use]
    pub fn into_body(self) -> String {
        self.events.join(EVENT_SEPARATOR)
    }
}

/// Holds the batch currently being filled.
#[derive(Debug)]
pub struct BatchAccumulator {
    current: Batch,
    max_bytes: usize,
}

impl BatchAccumulator {
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self {
            current: Batch::new(),
            max_bytes,
        }
    }

    /// Appends an event, returning the previous batch if it had to be rotated.
    ///
    /// Rotation happens when `current + len > max` or when the remaining room
    /// `max - current` is smaller than `len`. A rotation that would produce an
    /// empty batch (an oversized first event) yields nothing.
    pub fn push(&mut self, event: String) -> Option<Batch> {
        let len = event.len();
        let current = self.current.byte_len();
        let overflows = current.saturating_add(len) > self.max_bytes
            || self.max_bytes.saturating_sub(current) < len;

        let rotated = if overflows { self.take() } else { None };

        self.current.push(event);
        rotated
    }

    /// Seals the current batch. Returns `None` when nothing is pending.
    pub fn take(&mut self) -> Option<Batch> {
        if self.current.is_empty() {
            return None;
        }
        Some(mem::take(&mut self.current))
    }

    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.current.byte_len()
    }

    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.current.len()
    }

    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}
