use std::{mem, vec::IntoIter};

use netsync_shared::{ConnectionId, ObjectId};

use crate::NetsyncServerError;

/// Everything that happened during one call to `Server::receive`
pub struct Events {
    connections: Vec<ConnectionId>,
    disconnections: Vec<ConnectionId>,
    enter_games: Vec<ConnectionId>,
    readies: Vec<ConnectionId>,
    not_readies: Vec<ConnectionId>,
    despawns: Vec<(ConnectionId, ObjectId)>,
    errors: Vec<NetsyncServerError>,

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
            not_readies: Vec::new(),
            despawns: Vec::new(),
            errors: Vec::new(),

            empty: true,
        }
    }

    // Public

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn read<V: Event>(&mut self) -> V::Iter {
        V::iter(self)
    }

    pub fn has<V: Event>(&self) -> bool {
        V::has(self)
    }

    // Crate-public

    pub(crate) fn push_connection(&mut self, connection: ConnectionId) {
        self.connections.push(connection);
        self.empty = false;
    }

    pub(crate) fn push_disconnection(&mut self, connection: ConnectionId) {
        self.disconnections.push(connection);
        self.empty = false;
    }

    pub(crate) fn push_enter_game(&mut self, connection: ConnectionId) {
        self.enter_games.push(connection);
        self.empty = false;
    }

    pub(crate) fn push_ready(&mut self, connection: ConnectionId) {
        self.readies.push(connection);
        self.empty = false;
    }

    pub(crate) fn push_not_ready(&mut self, connection: ConnectionId) {
        self.not_readies.push(connection);
        self.empty = false;
    }

    pub(crate) fn push_despawn(&mut self, owner: ConnectionId, object_id: ObjectId) {
        self.despawns.push((owner, object_id));
        self.empty = false;
    }

    pub(crate) fn push_error(&mut self, error: NetsyncServerError) {
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

// ConnectEvent
/// A transport connection opened, or a local client was attached
pub struct ConnectEvent;
impl Event for ConnectEvent {
    type Iter = IntoIter<ConnectionId>;

    fn iter(events: &mut Events) -> Self::Iter {
        mem::take(&mut events.connections).into_iter()
    }

    fn has(events: &Events) -> bool {
        !events.connections.is_empty()
    }
}

// DisconnectEvent
pub struct DisconnectEvent;
impl Event for DisconnectEvent {
    type Iter = IntoIter<ConnectionId>;

    fn iter(events: &mut Events) -> Self::Iter {
        mem::take(&mut events.disconnections).into_iter()
    }

    fn has(events: &Events) -> bool {
        !events.disconnections.is_empty()
    }
}

// EnterGameEvent
/// A connection completed the EnterGame handshake
pub struct EnterGameEvent;
impl Event for EnterGameEvent {
    type Iter = IntoIter<ConnectionId>;

    fn iter(events: &mut Events) -> Self::Iter {
        mem::take(&mut events.enter_games).into_iter()
    }

    fn has(events: &Events) -> bool {
        !events.enter_games.is_empty()
    }
}

// ReadyEvent
pub struct ReadyEvent;
impl Event for ReadyEvent {
    type Iter = IntoIter<ConnectionId>;

    fn iter(events: &mut Events) -> Self::Iter {
        mem::take(&mut events.readies).into_iter()
    }

    fn has(events: &Events) -> bool {
        !events.readies.is_empty()
    }
}

// NotReadyEvent
pub struct NotReadyEvent;
impl Event for NotReadyEvent {
    type Iter = IntoIter<ConnectionId>;

    fn iter(events: &mut Events) -> Self::Iter {
        mem::take(&mut events.not_readies).into_iter()
    }

    fn has(events: &Events) -> bool {
        !events.not_readies.is_empty()
    }
}

// DespawnEntityEvent
/// An entity was destroyed because its owning connection went away or
/// stopped being ready. Yields the former owner and the entity.
pub struct DespawnEntityEvent;
impl Event for DespawnEntityEvent {
    type Iter = IntoIter<(ConnectionId, ObjectId)>;

    fn iter(events: &mut Events) -> Self::Iter {
        mem::take(&mut events.despawns).into_iter()
    }

    fn has(events: &Events) -> bool {
        !events.despawns.is_empty()
    }
}

// ErrorEvent
/// A protocol error that was logged and dropped
pub struct ErrorEvent;
impl Event for ErrorEvent {
    type Iter = IntoIter<NetsyncServerError>;

    fn iter(events: &mut Events) -> Self::Iter {
        mem::take(&mut events.errors).into_iter()
    }

    fn has(events: &Events) -> bool {
        !events.errors.is_empty()
    }
}
