//! Session hub - routes outbound messages to connected sessions

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::game::{Outbox, SessionId};
use crate::ws::protocol::ServerMsg;

/// Outbound queue depth per session
pub const SESSION_QUEUE_CAPACITY: usize = 64;

/// Connected sessions and their outbound queues
#[derive(Default)]
pub struct SessionHub {
    sessions: DashMap<SessionId, mpsc::Sender<ServerMsg>>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session (called when the WebSocket connects).
    /// Returns the receiving end the session's writer drains.
    pub fn register(&self, session_id: SessionId) -> mpsc::Receiver<ServerMsg> {
        let (tx, rx) = mpsc::channel(SESSION_QUEUE_CAPACITY);
        self.sessions.insert(session_id, tx);
        rx
    }

    pub fn unregister(&self, session_id: SessionId) {
        self.sessions.remove(&session_id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    fn push(session_id: SessionId, tx: &mpsc::Sender<ServerMsg>, msg: ServerMsg) {
        match tx.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(session_id = %session_id, "Session lagging, dropping outbound message");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(session_id = %session_id, "Session queue closed");
            }
        }
    }
}

impl Outbox for SessionHub {
    fn send_to(&self, session_id: SessionId, msg: ServerMsg) {
        if let Some(tx) = self.sessions.get(&session_id) {
            Self::push(session_id, tx.value(), msg);
        }
    }

    fn broadcast(&self, msg: ServerMsg) {
        for entry in self.sessions.iter() {
            Self::push(*entry.key(), entry.value(), msg.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn hit(health: i32) -> ServerMsg {
        ServerMsg::Hit {
            health,
            by: Uuid::nil(),
        }
    }

    #[test]
    fn test_send_to_reaches_only_target() {
        let hub = SessionHub::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut rx_a = hub.register(a);
        let mut rx_b = hub.register(b);

        hub.send_to(a, hit(75));
        assert_eq!(rx_a.try_recv().ok(), Some(hit(75)));
        assert!(rx_b.try_recv().is_err());

        // Unknown sessions are ignored
        hub.send_to(Uuid::new_v4(), hit(10));
    }

    #[test]
    fn test_broadcast_and_unregister() {
        let hub = SessionHub::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut rx_a = hub.register(a);
        let mut rx_b = hub.register(b);
        assert_eq!(hub.len(), 2);

        hub.broadcast(hit(50));
        assert_eq!(rx_a.try_recv().ok(), Some(hit(50)));
        assert_eq!(rx_b.try_recv().ok(), Some(hit(50)));

        hub.unregister(b);
        hub.broadcast(hit(40));
        assert_eq!(rx_a.try_recv().ok(), Some(hit(40)));
        assert!(rx_b.try_recv().is_err());
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn test_full_queue_drops_for_that_session_only() {
        let hub = SessionHub::new();
        let slow = Uuid::new_v4();
        let fast = Uuid::new_v4();
        let mut rx_slow = hub.register(slow);
        let mut rx_fast = hub.register(fast);

        for i in 0..SESSION_QUEUE_CAPACITY + 5 {
            hub.broadcast(hit(i as i32));
            assert!(rx_fast.try_recv().is_ok());
        }

        let mut queued = 0;
        while rx_slow.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, SESSION_QUEUE_CAPACITY);
    }
}
