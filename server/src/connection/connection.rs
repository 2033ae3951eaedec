use std::collections::HashSet;

use netsync_shared::{ConnectionId, ObjectId};

/// Server-side state of one client connection
pub struct Connection {
    pub id: ConnectionId,
    /// Served in-process by a combined host; never sent bytes
    pub is_local: bool,
    entered: bool,
    ready: bool,
    subscriptions: HashSet<ObjectId>,
}

impl Connection {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            is_local: false,
            entered: false,
            ready: false,
            subscriptions: HashSet::new(),
        }
    }

    pub fn new_local(id: ConnectionId) -> Self {
        Self {
            id,
            is_local: true,
            entered: true,
            ready: true,
            subscriptions: HashSet::new(),
        }
    }

    pub fn has_entered(&self) -> bool {
        self.entered
    }

    pub fn set_entered(&mut self) {
        self.entered = true;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn is_subscribed(&self, object_id: &ObjectId) -> bool {
        self.subscriptions.contains(object_id)
    }

    /// Returns false if the connection was subscribed already
    pub fn subscribe(&mut self, object_id: ObjectId) -> bool {
        self.subscriptions.insert(object_id)
    }

    pub fn unsubscribe(&mut self, object_id: &ObjectId) -> bool {
        self.subscriptions.remove(object_id)
    }

    pub fn subscriptions(&self) -> &HashSet<ObjectId> {
        &self.subscriptions
    }

    /// Subscribed ids, ascending
    pub fn sorted_subscriptions(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.subscriptions.iter().copied().collect();
        ids.sort();
        ids
    }
}
