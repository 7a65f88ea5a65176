//! Connection lifecycle tracker
//!
//! With a real listening socket the server would simply accept the next
//! connection. Here there is exactly one dialed-out pipe at a time, so the
//! agent has to notice when that pipe is spent and ask for a replacement.
//! A connection counts as spent once it leaves the `New` state: the driver
//! has started using it, or it was dropped before any request arrived.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use tta_core::traits::ConnStateHook;
use tta_core::{ConnId, ConnState};

use crate::tunnel::NeedConn;

/// Registry of connections still in the `New` state.
///
/// Fires the need-connection signal each time the registry drains from
/// non-empty to empty.
pub struct ConnTracker {
    fresh: Mutex<HashSet<ConnId>>,
    need_conn: NeedConn,
}

impl ConnTracker {
    /// Create a tracker that raises `need_conn` on every drain
    pub fn new(need_conn: NeedConn) -> Self {
        Self {
            fresh: Mutex::new(HashSet::new()),
            need_conn,
        }
    }

    /// Record a state transition.
    ///
    /// Returns `true` if this transition drained the registry.
    pub fn observe(&self, conn: ConnId, state: ConnState) -> bool {
        let mut fresh = self.fresh.lock().unwrap_or_else(PoisonError::into_inner);
        let before = fresh.len();
        match state {
            ConnState::New => {
                fresh.insert(conn);
            }
            _ => {
                fresh.remove(&conn);
            }
        }

        let drained = before != 0 && fresh.is_empty();
        let signaled = drained && self.need_conn.notify();
        drop(fresh);

        if drained {
            tracing::debug!(%conn, %state, signaled, "no fresh connections left");
        }
        drained
    }

    /// Number of connections still in the `New` state
    pub fn len(&self) -> usize {
        self.fresh.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no connection is in the `New` state
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConnStateHook for ConnTracker {
    fn on_state(&self, conn: ConnId, state: ConnState) {
        self.observe(conn, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tunnel::need_conn_channel;
    use std::sync::Arc;

    #[test]
    fn test_new_then_active_signals_once() {
        let (tx, mut rx) = need_conn_channel();
        let tracker = ConnTracker::new(tx);

        assert!(!tracker.observe(ConnId(1), ConnState::New));
        assert_eq!(tracker.len(), 1);
        assert!(!rx.take_pending());

        assert!(tracker.observe(ConnId(1), ConnState::Active));
        assert!(tracker.is_empty());
        assert!(rx.take_pending());

        // Later transitions of an untracked connection change nothing.
        assert!(!tracker.observe(ConnId(1), ConnState::Idle));
        assert!(!tracker.observe(ConnId(1), ConnState::Closed));
        assert!(!rx.take_pending());
    }

    #[test]
    fn test_closed_without_request_signals() {
        let (tx, mut rx) = need_conn_channel();
        let tracker = ConnTracker::new(tx);

        tracker.observe(ConnId(4), ConnState::New);
        assert!(tracker.observe(ConnId(4), ConnState::Closed));
        assert!(rx.take_pending());
    }

    #[test]
    fn test_signal_only_when_last_fresh_leaves() {
        let (tx, mut rx) = need_conn_channel();
        let tracker = ConnTracker::new(tx);

        tracker.observe(ConnId(1), ConnState::New);
        tracker.observe(ConnId(2), ConnState::New);
        assert!(!tracker.observe(ConnId(1), ConnState::Active));
        assert!(!rx.take_pending());

        assert!(tracker.observe(ConnId(2), ConnState::Closed));
        assert!(rx.take_pending());
    }

    #[test]
    fn test_empty_set_never_signals() {
        let (tx, mut rx) = need_conn_channel();
        let tracker = ConnTracker::new(tx);

        assert!(!tracker.observe(ConnId(9), ConnState::Closed));
        assert!(!rx.take_pending());
    }

    #[test]
    fn test_drains_before_consumption_coalesce() {
        let (tx, mut rx) = need_conn_channel();
        let tracker = ConnTracker::new(tx);

        for id in 0..3 {
            tracker.observe(ConnId(id), ConnState::New);
            assert!(tracker.observe(ConnId(id), ConnState::Active));
        }
        assert!(rx.take_pending());
        assert!(!rx.take_pending());
    }

    #[test]
    fn test_concurrent_connections_each_drain_counted() {
        let (tx, _rx) = need_conn_channel();
        let tracker = Arc::new(ConnTracker::new(tx));

        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for i in 0..100u64 {
                        let id = ConnId(t * 1000 + i);
                        tracker.observe(id, ConnState::New);
                        tracker.observe(id, ConnState::Active);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(tracker.is_empty());
    }
}
