use std::collections::HashMap;

use netsync_shared::{ConnectionId, Entity, EntityRegistry, ObjectId};

use crate::connection::connection::Connection;

/// Decides whether a ready connection should see an entity. Owners always see
/// their own entities, whatever the rule says.
pub trait VisibilityRule {
    fn is_visible(&self, connection: &ConnectionId, entity: &Entity) -> bool;
}

impl<F> VisibilityRule for F
where
    F: Fn(&ConnectionId, &Entity) -> bool,
{
    fn is_visible(&self, connection: &ConnectionId, entity: &Entity) -> bool {
        self(connection, entity)
    }
}

/// Every ready connection sees every live entity
pub struct VisibleToAll;

impl VisibilityRule for VisibleToAll {
    fn is_visible(&self, _: &ConnectionId, _: &Entity) -> bool {
        true
    }
}

/// Connections see only what they own
pub struct OwnedOnly;

impl VisibilityRule for OwnedOnly {
    fn is_visible(&self, _: &ConnectionId, _: &Entity) -> bool {
        false
    }
}

/// Entities one connection has to start or stop observing
#[derive(Debug, PartialEq, Eq)]
pub struct InterestDiff {
    pub connection: ConnectionId,
    pub entering: Vec<ObjectId>,
    pub leaving: Vec<ObjectId>,
}

/// Holds the visibility rule and computes subscription changes when something
/// that affects visibility happened
pub struct InterestManager {
    rule: Box<dyn VisibilityRule>,
    dirty: bool,
}

impl InterestManager {
    pub fn new(rule: Box<dyn VisibilityRule>) -> Self {
        Self { rule, dirty: false }
    }

    pub fn set_rule(&mut self, rule: Box<dyn VisibilityRule>) {
        self.rule = rule;
        self.dirty = true;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether `connection` should currently observe `entity`
    pub fn should_observe(&self, connection: &Connection, entity: &Entity) -> bool {
        if !connection.is_ready() || entity.is_destroyed() {
            return false;
        }
        entity.is_owned_by(&connection.id) || self.rule.is_visible(&connection.id, entity)
    }

    /// Diffs the desired subscriptions against the current ones, connection
    /// by connection in ascending id order. Running it again without any
    /// change in between yields nothing.
    pub fn compute(
        &mut self,
        connections: &HashMap<ConnectionId, Connection>,
        registry: &EntityRegistry,
    ) -> Vec<InterestDiff> {
        self.dirty = false;

        let mut connection_ids: Vec<ConnectionId> = connections.keys().copied().collect();
        connection_ids.sort();
        let object_ids = registry.object_ids();

        let mut diffs = Vec::new();
        for connection_id in connection_ids {
            let Some(connection) = connections.get(&connection_id) else {
                continue;
            };

            let mut entering = Vec::new();
            for object_id in &object_ids {
                let Some(entity) = registry.lookup(object_id) else {
                    continue;
                };
                if self.should_observe(connection, entity) && !connection.is_subscribed(object_id) {
                    entering.push(*object_id);
                }
            }

            let mut leaving: Vec<ObjectId> = connection
                .sorted_subscriptions()
                .into_iter()
                .filter(|object_id| match registry.lookup(object_id) {
                    Some(entity) => !self.should_observe(connection, entity),
                    None => true,
                })
                .collect();
            leaving.sort();

            if !entering.is_empty() || !leaving.is_empty() {
                diffs.push(InterestDiff {
                    connection: connection_id,
                    entering,
                    leaving,
                });
            }
        }
        diffs
    }
}
