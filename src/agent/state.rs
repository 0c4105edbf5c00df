//! Connection state tracking shared between caller and network threads
//!
//! The state lives in a `watch` channel: any thread reads it without
//! blocking, and only the connect/disconnect acknowledgment callbacks write it.

use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Connection state of an agent client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial state, and the state after every disconnect acknowledgment
    Disconnected,
    /// Connect acknowledged and base topics subscribed
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connected => f.write_str("connected"),
        }
    }
}

/// Network events that drive state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Connect acknowledgment carrying the broker's return code
    ConnAck(u8),
    /// Disconnect acknowledgment, clean or not
    Disconnected(u8),
}

/// Pure transition function
///
/// Only `Disconnected -> Connected` (successful ConnAck) and
/// `Connected -> Disconnected` change the state; a refused connect leaves
/// the client disconnected.
pub fn next_state(current: ConnectionState, event: ConnectionEvent) -> ConnectionState {
    match (current, event) {
        (ConnectionState::Disconnected, ConnectionEvent::ConnAck(0)) => ConnectionState::Connected,
        (ConnectionState::Connected, ConnectionEvent::Disconnected(_)) => {
            ConnectionState::Disconnected
        }
        (state, _) => state,
    }
}

/// Owner of the authoritative connection flag
#[derive(Debug)]
pub struct ConnectionTracker {
    state_tx: watch::Sender<ConnectionState>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self { state_tx }
    }

    /// Current state, non-blocking
    pub fn current(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.current() == ConnectionState::Connected
    }

    /// Apply a network event; returns the new state if it changed
    pub fn apply(&self, event: ConnectionEvent) -> Option<ConnectionState> {
        let mut transitioned = None;
        self.state_tx.send_if_modified(|state| {
            let next = next_state(*state, event);
            if next == *state {
                return false;
            }
            *state = next;
            transitioned = Some(next);
            true
        });

        match transitioned {
            Some(state) => info!(%state, ?event, "Connection state changed"),
            None => debug!(state = %self.current(), ?event, "Connection event left state unchanged"),
        }
        transitioned
    }

    /// Receiver for callers that want to observe changes
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Wait until the state reaches `target` or the timeout elapses
    pub async fn wait_for(&self, target: ConnectionState, timeout: Duration) -> bool {
        let mut state_rx = self.subscribe();
        let waited = tokio::time::timeout(timeout, async {
            loop {
                if *state_rx.borrow_and_update() == target {
                    return true;
                }
                // The sender lives as long as `self`, so this only fails on teardown
                if state_rx.changed().await.is_err() {
                    return false;
                }
            }
        })
        .await;

        match waited {
            Ok(reached) => reached,
            Err(_) => {
                warn!(?target, ?timeout, "Timed out waiting for connection state");
                false
            }
        }
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}
