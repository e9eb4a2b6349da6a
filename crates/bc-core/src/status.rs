//! Session status fan-out to registered clients.
//!
//! Clients (a UI, a log tailer, a test) register to receive every status
//! change of a capture session. A client that has gone away is pruned the
//! next time a status is broadcast.

use bc_common::SessionId;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Lifecycle status of a capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum SessionStatus {
    Connecting,
    Connected,
    /// No device is paired with this host.
    NotPaired,
    /// A device is paired but the connection attempt failed.
    NotConnected,
    Streaming,
    Stopped,
    Error(String),
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Connecting => write!(f, "connecting"),
            SessionStatus::Connected => write!(f, "connected"),
            SessionStatus::NotPaired => write!(f, "not paired"),
            SessionStatus::NotConnected => write!(f, "not connected"),
            SessionStatus::Streaming => write!(f, "streaming"),
            SessionStatus::Stopped => write!(f, "stopped"),
            SessionStatus::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

/// One status message as delivered to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusUpdate {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub status: SessionStatus,
    pub at: String,
}

/// Handle identifying a registered client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

/// Registry of status listeners for one session.
#[derive(Debug)]
pub struct StatusHub {
    session_id: SessionId,
    clients: Mutex<Vec<(ClientId, Sender<StatusUpdate>)>>,
    next_id: AtomicU64,
    last: Mutex<Option<SessionStatus>>,
}

impl StatusHub {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            clients: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            last: Mutex::new(None),
        }
    }

    /// Register a listener; it receives every status broadcast from now on.
    pub fn register(&self) -> (ClientId, Receiver<StatusUpdate>) {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel();
        lock(&self.clients).push((id, tx));
        debug!(client = id.0, "status client registered");
        (id, rx)
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unregister(&self, id: ClientId) -> bool {
        let mut clients = lock(&self.clients);
        let before = clients.len();
        clients.retain(|(client, _)| *client != id);
        clients.len() != before
    }

    /// Send `status` to every client, dropping clients whose receiver is gone.
    ///
    /// Returns the number of clients that received it.
    pub fn broadcast(&self, status: SessionStatus) -> usize {
        info!(session_id = %self.session_id, status = %status, "session status");
        *lock(&self.last) = Some(status.clone());

        let update = StatusUpdate {
            session_id: self.session_id.clone(),
            status,
            at: chrono::Utc::now().to_rfc3339(),
        };
        let mut clients = lock(&self.clients);
        clients.retain(|(id, tx)| {
            let alive = tx.send(update.clone()).is_ok();
            if !alive {
                debug!(client = id.0, "status client gone; removed");
            }
            alive
        });
        clients.len()
    }

    pub fn client_count(&self) -> usize {
        lock(&self.clients).len()
    }

    /// Most recent status broadcast, if any.
    pub fn last_status(&self) -> Option<SessionStatus> {
        lock(&self.last).clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_reaches_all_clients() {
        let hub = StatusHub::new(SessionId::new());
        let (_a, rx_a) = hub.register();
        let (_b, rx_b) = hub.register();

        assert_eq!(hub.broadcast(SessionStatus::Connecting), 2);
        assert_eq!(rx_a.recv().unwrap().status, SessionStatus::Connecting);
        assert_eq!(rx_b.recv().unwrap().status, SessionStatus::Connecting);
        assert_eq!(hub.last_status(), Some(SessionStatus::Connecting));
    }

    #[test]
    fn test_dead_clients_are_pruned() {
        let hub = StatusHub::new(SessionId::new());
        let (_a, rx_a) = hub.register();
        let (_b, rx_b) = hub.register();
        drop(rx_b);

        assert_eq!(hub.broadcast(SessionStatus::Streaming), 1);
        assert_eq!(hub.client_count(), 1);
        assert_eq!(rx_a.recv().unwrap().status, SessionStatus::Streaming);
    }

    #[test]
    fn test_unregister() {
        let hub = StatusHub::new(SessionId::new());
        let (id, rx) = hub.register();
        assert!(hub.unregister(id));
        assert!(!hub.unregister(id));
        assert_eq!(hub.broadcast(SessionStatus::Stopped), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_update_json_shape() {
        let hub = StatusHub::new(SessionId("cap-20260101-000000-abcdef".into()));
        let (_id, rx) = hub.register();
        hub.broadcast(SessionStatus::Error("band offline".into()));

        let json = serde_json::to_value(rx.recv().unwrap()).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "band offline");
        assert_eq!(json["session_id"], "cap-20260101-000000-abcdef");
    }
}
