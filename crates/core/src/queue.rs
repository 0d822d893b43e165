//! Ordered delivery queue with single-pass drain bookkeeping.
//!
//! The queue only tracks state. Deciding what a drain step delivers is the
//! orchestrator's job, see [`crate::bot`].

use crate::record::ResponseRecord;
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct DeliveryQueue {
    records: VecDeque<ResponseRecord>,
    /// A pass is suspended waiting on the caller (video playback).
    draining: bool,
    /// A drain was requested while `draining` was set.
    pending_restart: bool,
    /// Bumped on every flush so completions of a flushed pass can be told apart.
    generation: u64,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ResponseRecord) {
        self.records.push_back(record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = ResponseRecord>) {
        self.records.extend(records);
    }

    pub fn front(&self) -> Option<&ResponseRecord> {
        self.records.front()
    }

    pub fn pop_front(&mut self) -> Option<ResponseRecord> {
        self.records.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Asks to start a drain pass. Returns `false` and records a pending
    /// restart when a pass is already in progress.
    pub fn request_drain(&mut self) -> bool {
        if self.draining {
            self.pending_restart = true;
            false
        } else {
            true
        }
    }

    /// Suspends the current pass until [`DeliveryQueue::resume`] is called.
    pub fn suspend(&mut self) {
        self.draining = true;
    }

    /// Ends a suspended pass started in `generation`. Returns whether the
    /// pass is still current and whether a restart was requested meanwhile.
    pub fn resume(&mut self, generation: u64) -> Option<bool> {
        if !self.draining || generation != self.generation {
            return None;
        }
        self.draining = false;
        Some(std::mem::take(&mut self.pending_restart))
    }

    /// Removes every pending record and abandons any suspended pass.
    pub fn flush(&mut self) -> Vec<ResponseRecord> {
        self.draining = false;
        self.pending_restart = false;
        self.generation += 1;
        self.records.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str) -> ResponseRecord {
        ResponseRecord {
            text: text.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_preserves_arrival_order() {
        let mut queue = DeliveryQueue::new();
        queue.push(record("a"));
        queue.extend([record("b"), record("c")]);
        queue.push(record("d"));

        let texts: Vec<_> = std::iter::from_fn(|| queue.pop_front())
            .map(|r| r.text)
            .collect();
        assert_eq!(texts, ["a", "b", "c", "d"]);
    }

    #[test]
    fn test_request_while_draining_is_coalesced() {
        let mut queue = DeliveryQueue::new();
        assert!(queue.request_drain());

        queue.suspend();
        assert!(!queue.request_drain());
        assert!(!queue.request_drain());

        let generation = queue.generation();
        assert_eq!(queue.resume(generation), Some(true));
        assert!(!queue.is_draining());
        assert!(queue.request_drain());
    }

    #[test]
    fn test_resume_without_restart_request() {
        let mut queue = DeliveryQueue::new();
        queue.suspend();
        assert_eq!(queue.resume(queue.generation()), Some(false));
    }

    #[test]
    fn test_flush_invalidates_suspended_pass() {
        let mut queue = DeliveryQueue::new();
        queue.extend([record("video"), record("after")]);
        queue.suspend();
        let stale = queue.generation();

        let flushed = queue.flush();
        assert_eq!(flushed.len(), 2);
        assert!(queue.is_empty());
        assert!(!queue.is_draining());
        assert_eq!(queue.resume(stale), None);
    }
}
