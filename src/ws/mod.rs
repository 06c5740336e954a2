//! WebSocket gateway: upgrade handling, session fan-out and wire types

pub mod handler;
pub mod hub;
pub mod protocol;

pub use hub::SessionHub;
