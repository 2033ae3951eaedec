use std::{mem, vec::IntoIter};

use netsync_shared::{ConnectionId, DestroyReason, ObjectId, ServerErrorMessage};

use crate::NetsyncClientError;

/// Everything that happened during one call to `Client::receive`
pub struct Events {
    connections: Vec<ConnectionId>,
    disconnections: Vec<ConnectionId>,
    enter_games: Vec<(ConnectionId, String)>,
    readies: Vec<()>,
    spawns: Vec<ObjectId>,
    despawns: Vec<(ObjectId, DestroyReason)>,
    owner_changes: Vec<(ObjectId, Option<ConnectionId>)>,
    scene_changes: Vec<String>,
    server_errors: Vec<ServerErrorMessage>,
    errors: Vec<NetsyncClientError>,

    empty: bool,
}

impl Default for Events {
    fn default() -> Self {
        Self::new()
    }
}

impl Events {
    pub(crate) fn new() -> Self {
        Self {
            connections: Vec::new(),
            disconnections: Vec::new(),
            enter_games: Vec::new(),
            readies: Vec::new(),
            spawns: Vec::new(),
            despawns: Vec::new(),
            owner_changes: Vec::new(),
            scene_changes: Vec::new(),
            server_errors: Vec::new(),
            errors: Vec::new(),

            empty: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn read<V: Event>(&mut self) -> V::Iter {
        V::iter(self)
    }

    pub fn has<V: Event>(&self) -> bool {
        V::has(self)
    }

    pub(crate) fn push_connection(&mut self, server: ConnectionId) {
        self.connections.push(server);
        self.empty = false;
    }

    pub(crate) fn push_disconnection(&mut self, server: ConnectionId) {
        self.disconnections.push(server);
        self.empty = false;
    }

    pub(crate) fn push_enter_game(&mut self, assigned_id: ConnectionId, scene_name: String) {
        self.enter_games.push((assigned_id, scene_name));
        self.empty = false;
    }

    pub(crate) fn push_ready(&mut self) {
        self.readies.push(());
        self.empty = false;
    }

    pub(crate) fn push_spawn(&mut self, object_id: ObjectId) {
        self.spawns.push(object_id);
        self.empty = false;
    }

    pub(crate) fn push_despawn(&mut self, object_id: ObjectId, reason: DestroyReason) {
        self.despawns.push((object_id, reason));
        self.empty = false;
    }

    pub(crate) fn push_owner_change(&mut self, object_id: ObjectId, owner: Option<ConnectionId>) {
        self.owner_changes.push((object_id, owner));
        self.empty = false;
    }

    pub(crate) fn push_scene_change(&mut self, scene_name: String) {
        self.scene_changes.push(scene_name);
        self.empty = false;
    }

    pub(crate) fn push_server_error(&mut self, message: ServerErrorMessage) {
        self.server_errors.push(message);
        self.empty = false;
    }

    pub(crate) fn push_error(&mut self, error: NetsyncClientError) {
        self.errors.push(error);
        self.empty = false;
    }
}

// Event Trait
pub trait Event {
    type Iter;

    fn iter(events: &mut Events) -> Self::Iter;

    fn has(events: &Events) -> bool;
}

macro_rules! client_event {
    ($(#[$meta:meta])* $name:ident, $field:ident, $item:ty) => {
        $(#[$meta])*
        pub struct $name;
        impl Event for $name {
            type Iter = IntoIter<$item>;

            fn iter(events: &mut Events) -> Self::Iter {
                mem::take(&mut events.$field).into_iter()
            }

            fn has(events: &Events) -> bool {
                !events.$field.is_empty()
            }
        }
    };
}

client_event!(
    /// The transport connected to a server
    ConnectEvent, connections, ConnectionId
);
client_event!(DisconnectEvent, disconnections, ConnectionId);
client_event!(
    /// EnterGame succeeded. Yields the id the server assigned and its scene.
    EnterGameEvent, enter_games, (ConnectionId, String)
);
client_event!(
    /// The server acknowledged ClientReady
    ReadyEvent, readies, ()
);
client_event!(SpawnEntityEvent, spawns, ObjectId);
client_event!(DespawnEntityEvent, despawns, (ObjectId, DestroyReason));
client_event!(OwnerChangeEvent, owner_changes, (ObjectId, Option<ConnectionId>));
client_event!(
    /// The server moved to another scene. Replicated entities were cleared;
    /// place the new scene's static entities, then call `send_ready`.
    SceneChangeEvent, scene_changes, String
);
client_event!(ServerErrorEvent, server_errors, ServerErrorMessage);
client_event!(
    /// A protocol error that was logged and dropped, or a failed handshake
    ErrorEvent, errors, NetsyncClientError
);
