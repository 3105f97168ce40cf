//! Per-identity join and message counters.
//!
//! Each counter is a queue of event times; entries older than the window are
//! dropped whenever the counter is touched, so the count is always the number
//! of events within the trailing window.

use crate::config::AntispamConfig;

use parking_lot::Mutex;
use tokio::time::Instant;

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinVerdict {
    Allowed,
    LimitExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageVerdict {
    Allowed,
    Warn,
    Ban,
}

#[derive(Debug, Default)]
struct Counters {
    joins: VecDeque<Instant>,
    messages: VecDeque<Instant>,
}

impl Counters {
    fn is_empty(&self) -> bool {
        self.joins.is_empty() && self.messages.is_empty()
    }
}

fn prune(events: &mut VecDeque<Instant>, window: Duration, now: Instant) {
    while let Some(front) = events.front() {
        if now.duration_since(*front) >= window {
            events.pop_front();
        } else {
            break;
        }
    }
}

#[derive(Debug)]
pub struct RateTracker {
    limits: AntispamConfig,
    counters: Mutex<HashMap<String, Counters>>,
}

impl RateTracker {
    pub fn new(limits: AntispamConfig) -> Self {
        Self {
            limits,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Record a join for `fingerprint`, returning the number of joins
    /// inside the window including this one.
    pub fn record_join(&self, fingerprint: &str) -> usize {
        let now = Instant::now();
        let mut counters = self.counters.lock();
        let entry = counters.entry(fingerprint.to_owned()).or_default();
        prune(&mut entry.joins, self.limits.join_window(), now);
        entry.joins.push_back(now);
        entry.joins.len()
    }

    /// Record a message for `fingerprint`, returning the number of messages
    /// inside the window including this one.
    pub fn record_message(&self, fingerprint: &str) -> usize {
        let now = Instant::now();
        let mut counters = self.counters.lock();
        let entry = counters.entry(fingerprint.to_owned()).or_default();
        prune(&mut entry.messages, self.limits.message_window(), now);
        entry.messages.push_back(now);
        entry.messages.len()
    }

    pub fn check_join(&self, fingerprint: &str) -> JoinVerdict {
        if self.record_join(fingerprint) > self.limits.join_limit {
            JoinVerdict::LimitExceeded
        } else {
            JoinVerdict::Allowed
        }
    }

    pub fn check_message(&self, fingerprint: &str) -> MessageVerdict {
        let count = self.record_message(fingerprint);
        if count >= self.limits.message_ban {
            MessageVerdict::Ban
        } else if count >= self.limits.message_warn {
            MessageVerdict::Warn
        } else {
            MessageVerdict::Allowed
        }
    }

    /// Current counts for `fingerprint` as `(joins, messages)`.
    pub fn counts(&self, fingerprint: &str) -> (usize, usize) {
        let now = Instant::now();
        let mut counters = self.counters.lock();
        let Some(entry) = counters.get_mut(fingerprint) else {
            return (0, 0);
        };
        prune(&mut entry.joins, self.limits.join_window(), now);
        prune(&mut entry.messages, self.limits.message_window(), now);
        let counts = (entry.joins.len(), entry.messages.len());
        if entry.is_empty() {
            counters.remove(fingerprint);
        }
        counts
    }

    /// Drop identities whose counters have fully decayed.
    pub fn purge_idle(&self) {
        let now = Instant::now();
        let join_window = self.limits.join_window();
        let message_window = self.limits.message_window();
        self.counters.lock().retain(|_, entry| {
            prune(&mut entry.joins, join_window, now);
            prune(&mut entry.messages, message_window, now);
            !entry.is_empty()
        });
    }
}
