//! Thread-safe dispatch and publish counters
//!
//! Each client owns one [`DispatchMetrics`]; counters are plain atomics bumped
//! from both the caller's thread and the broker's callback thread. Dropped
//! messages are never surfaced as errors, so these counters are how an
//! operator notices them.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Why an incoming message did not reach a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Topic or payload could not be parsed
    Malformed,
    /// Parsed fine but no specific or catch-all handler was registered
    Unhandled,
    /// Topic matched none of the dispatch table patterns
    Unrouted,
}

/// Per-client atomic counters
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    messages_received: AtomicU64,
    messages_dispatched: AtomicU64,
    messages_unhandled: AtomicU64,
    messages_malformed: AtomicU64,
    messages_unrouted: AtomicU64,
    handler_failures: AtomicU64,
    messages_published: AtomicU64,
    publish_failures: AtomicU64,
    connections_established: AtomicU64,
    connection_failures: AtomicU64,
    subscribe_failures: AtomicU64,
    disconnections: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_dispatched(&self) {
        self.messages_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_dropped(&self, reason: DropReason) {
        let counter = match reason {
            DropReason::Malformed => &self.messages_malformed,
            DropReason::Unhandled => &self.messages_unhandled,
            DropReason::Unrouted => &self.messages_unrouted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_failed(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_published(&self) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn publish_failed(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_established(&self) {
        self.connections_established.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_failed(&self) {
        self.connection_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A base subscription request was rejected by the broker client
    pub fn subscribe_failed(&self) {
        self.subscribe_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn disconnected(&self) {
        self.disconnections.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_dispatched: self.messages_dispatched.load(Ordering::Relaxed),
            messages_unhandled: self.messages_unhandled.load(Ordering::Relaxed),
            messages_malformed: self.messages_malformed.load(Ordering::Relaxed),
            messages_unrouted: self.messages_unrouted.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            messages_published: self.messages_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            connections_established: self.connections_established.load(Ordering::Relaxed),
            connection_failures: self.connection_failures.load(Ordering::Relaxed),
            subscribe_failures: self.subscribe_failures.load(Ordering::Relaxed),
            disconnections: self.disconnections.load(Ordering::Relaxed),
        }
    }
}

/// Serializable view of [`DispatchMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub messages_dispatched: u64,
    pub messages_unhandled: u64,
    pub messages_malformed: u64,
    pub messages_unrouted: u64,
    pub handler_failures: u64,
    pub messages_published: u64,
    pub publish_failures: u64,
    pub connections_established: u64,
    pub connection_failures: u64,
    /// Non-zero while connected means some messages cannot arrive
    pub subscribe_failures: u64,
    pub disconnections: u64,
}

impl MetricsSnapshot {
    /// Messages that arrived but reached no handler
    pub fn messages_dropped(&self) -> u64 {
        self.messages_unhandled + self.messages_malformed + self.messages_unrouted
    }
}
