// ABOUTME: Bounded in-memory FIFO used when the on-disk journal cannot be created.
// ABOUTME: Drops the oldest entry when full; contents do not survive a restart.

use std::collections::VecDeque;

use crate::backend::{BackendKind, CacheBackend, RawEntry};

/// A bounded FIFO of escaped line pairs.
#[derive(Debug)]
pub struct FallbackQueue {
    entries: VecDeque<(String, String)>,
    capacity: usize,
    closed: bool,
}

impl FallbackQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            closed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl CacheBackend for FallbackQueue {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn has_content(&mut self) -> bool {
        !self.closed && !self.entries.is_empty()
    }

    fn ready_count(&self) -> usize {
        self.entries.len()
    }

    fn write(&mut self, destination: &str, body: &str) -> bool {
        if self.closed {
            return false;
        }
        if self.entries.len() >= self.capacity
            && let Some((dropped, _)) = self.entries.pop_front()
        {
            tracing::warn!(
                destination = %dropped,
                capacity = self.capacity,
                "in-memory cache full, dropping oldest entry"
            );
        }
        self.entries
            .push_back((destination.to_string(), body.to_string()));
        true
    }

    fn peek(&mut self) -> Option<RawEntry> {
        if self.closed {
            return None;
        }
        self.entries.front().map(|(destination, body)| RawEntry {
            destination: destination.as_bytes().to_vec(),
            body: body.as_bytes().to_vec(),
        })
    }

    fn pop(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.entries.pop_front().is_some()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn fill_ratio(&self) -> f64 {
        (self.entries.len() as f64 / self.capacity as f64).min(1.0)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
