use netsync_shared::ConnectionId;

use crate::{client_config::PingConfig, connection::ping_manager::PingManager};

/// Client-side state of the link to the server
pub struct Connection {
    /// Transport-level id of the server
    pub server: ConnectionId,
    /// Id the server assigned to this client in the EnterGame response
    pub assigned_id: Option<ConnectionId>,
    pub scene_name: Option<String>,
    pub ping_manager: PingManager,
    entered: bool,
    ready: bool,
    ready_pending: bool,
}

impl Connection {
    pub fn new(server: ConnectionId, ping_config: &PingConfig) -> Self {
        Self {
            server,
            assigned_id: None,
            scene_name: None,
            ping_manager: PingManager::new(ping_config),
            entered: false,
            ready: false,
            ready_pending: false,
        }
    }

    pub fn has_entered(&self) -> bool {
        self.entered
    }

    pub fn set_entered(&mut self, assigned_id: ConnectionId, scene_name: String) {
        self.entered = true;
        self.assigned_id = Some(assigned_id);
        self.scene_name = Some(scene_name);
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
        self.ready_pending = false;
    }

    /// A ClientReady request is awaiting its response
    pub fn is_ready_pending(&self) -> bool {
        self.ready_pending
    }

    pub fn set_ready_pending(&mut self) {
        self.ready_pending = true;
    }
}
