//! Dedup store — a time-bounded set of already-forwarded event
//! identifiers. Presence blocks re-delivery until the window expires.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// The dedup window is independent of (and in practice numerically
/// different from) the attribution window.
pub struct DedupStore {
    sent: DashMap<String, Instant>,
    window: Duration,
}

impl DedupStore {
    pub fn new(window: Duration) -> Self {
        Self {
            sent: DashMap::new(),
            window,
        }
    }

    /// True if a non-expired record exists for `event_id`.
    pub fn has_been_sent(&self, event_id: &str) -> bool {
        let Some(at) = self.sent.get(event_id) else {
            return false;
        };
        if at.elapsed() <= self.window {
            return true;
        }
        drop(at);
        self.sent.remove(event_id);
        false
    }

    /// Record the current time under `event_id`. Idempotent.
    pub fn mark_sent(&self, event_id: &str) {
        self.sent.insert(event_id.to_string(), Instant::now());
    }

    /// Atomically claim `event_id` for delivery. Returns false when a live
    /// record already holds it, so two racing webhooks cannot both pass a
    /// check-then-mark sequence.
    pub fn claim(&self, event_id: &str) -> bool {
        match self.sent.entry(event_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().elapsed() > self.window {
                    occupied.insert(Instant::now());
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Instant::now());
                true
            }
        }
    }

    /// Undo a claim after a failed delivery so a later retry can send.
    pub fn release(&self, event_id: &str) {
        self.sent.remove(event_id);
    }

    /// Remove expired entries. Suitable for a periodic background sweep.
    pub fn evict_expired(&self) -> usize {
        let before = self.sent.len();
        self.sent.retain(|_, at| at.elapsed() <= self.window);
        before - self.sent.len()
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}
