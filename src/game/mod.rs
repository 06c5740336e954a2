//! Game simulation modules

pub mod arena;
pub mod combat;
pub mod physics;
pub mod projectile;
pub mod registry;
pub mod snapshot;
pub mod vec3;
pub mod weapons;

pub use arena::{Arena, ArenaHandle, ArenaLoop};
pub use registry::SessionId;

use std::sync::Arc;

use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Work items for the arena task, one per network event
#[derive(Debug, Clone)]
pub enum ArenaCommand {
    /// A connection opened
    Join { session_id: SessionId, name: String },
    /// A parsed client message
    Input {
        session_id: SessionId,
        msg: ClientMsg,
        received_at: u64,
    },
    /// A connection closed
    Leave { session_id: SessionId },
}

/// An outbound message and who receives it
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    To(SessionId, ServerMsg),
    All(ServerMsg),
}

/// Session multiplexer the simulation hands its outbound events to
pub trait Outbox {
    fn send_to(&self, session_id: SessionId, msg: ServerMsg);

    fn broadcast(&self, msg: ServerMsg);

    fn deliver(&self, dispatches: Vec<Dispatch>) {
        for dispatch in dispatches {
            match dispatch {
                Dispatch::To(session_id, msg) => self.send_to(session_id, msg),
                Dispatch::All(msg) => self.broadcast(msg),
            }
        }
    }
}

impl<T: Outbox + ?Sized> Outbox for Arc<T> {
    fn send_to(&self, session_id: SessionId, msg: ServerMsg) {
        (**self).send_to(session_id, msg)
    }

    fn broadcast(&self, msg: ServerMsg) {
        (**self).broadcast(msg)
    }
}
