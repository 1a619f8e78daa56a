//! Deferred callbacks on a single cooperative clock.
//!
//! Entries fire in due-time order; entries due at the same instant fire in
//! scheduling order. The clock only moves when the owner calls
//! [`Timeline::advance`], so a suspended owner simply stops advancing it.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

#[derive(Debug)]
struct Entry<T> {
    due_ms: u64,
    seq: u64,
    payload: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due_ms == other.due_ms && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due_ms
            .cmp(&other.due_ms)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Min-heap of payloads keyed by due time.
#[derive(Debug)]
pub struct Timeline<T> {
    now_ms: u64,
    seq: u64,
    queue: BinaryHeap<Reverse<Entry<T>>>,
}

impl<T> Default for Timeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Timeline<T> {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            seq: 0,
            queue: BinaryHeap::new(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Schedule `payload` to fire `delay_ms` after the current instant.
    pub fn schedule_in(&mut self, delay_ms: u64, payload: T) {
        let due_ms = self.now_ms.saturating_add(delay_ms);
        self.queue.push(Reverse(Entry {
            due_ms,
            seq: self.seq,
            payload,
        }));
        self.seq += 1;
    }

    /// Move the clock forward.
    pub fn advance(&mut self, elapsed_ms: u64) {
        self.now_ms = self.now_ms.saturating_add(elapsed_ms);
    }

    /// Pop the next entry that is due at or before the current instant.
    pub fn pop_due(&mut self) -> Option<T> {
        let due = self.queue.peek()?.0.due_ms;
        if due > self.now_ms {
            return None;
        }
        self.queue.pop().map(|Reverse(e)| e.payload)
    }

    /// Due time of the earliest pending entry.
    pub fn next_due(&self) -> Option<u64> {
        self.queue.peek().map(|Reverse(e)| e.due_ms)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
