//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::ArenaHandle;
use crate::ws::SessionHub;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Outbound queues of every connected session
    pub hub: Arc<SessionHub>,
    /// Command channel into the arena task
    pub arena: ArenaHandle,
}

impl AppState {
    pub fn new(config: Config, hub: Arc<SessionHub>, arena: ArenaHandle) -> Self {
        Self {
            config: Arc::new(config),
            hub,
            arena,
        }
    }
}
