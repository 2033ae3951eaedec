use std::collections::HashMap;

use log::{debug, info};

use crate::{
    protocol::Protocol,
    types::{ConnectionId, DestroyReason, HostType, ObjectId, PrototypeId},
    world::{
        component::EntityBuilder, entity::Entity, error::RegistryError,
        object_id_allocator::ObjectIdAllocator, transform::Transform,
    },
};

/// What `EntityRegistry::destroy` did with the entity
pub enum DestroyOutcome {
    /// The entity left the registry
    Removed(Entity),
    /// A static entity left interest and stays in place, hidden
    Hidden,
}

/// Maps object ids to live entities on one host. On the server it also owns
/// the id allocator.
pub struct EntityRegistry {
    host: HostType,
    entities: HashMap<ObjectId, Entity>,
    allocator: ObjectIdAllocator,
}

impl EntityRegistry {
    pub fn new(host: HostType) -> Self {
        Self {
            host,
            entities: HashMap::new(),
            allocator: ObjectIdAllocator::new(),
        }
    }

    pub fn host_type(&self) -> HostType {
        self.host
    }

    /// Spawns a dynamic entity under a freshly allocated id
    pub fn spawn(
        &mut self,
        protocol: &Protocol,
        prototype: PrototypeId,
        transform: Transform,
        owner: Option<ConnectionId>,
    ) -> Result<ObjectId, RegistryError> {
        self.spawn_with_id(protocol, ObjectId::UNASSIGNED, prototype, transform, owner)
    }

    /// Spawns a dynamic entity, keeping `requested` if it is assigned and
    /// free, otherwise allocating a new id
    pub fn spawn_with_id(
        &mut self,
        protocol: &Protocol,
        requested: ObjectId,
        prototype: PrototypeId,
        transform: Transform,
        owner: Option<ConnectionId>,
    ) -> Result<ObjectId, RegistryError> {
        if self.host != HostType::Server {
            return Err(RegistryError::ServerOnly { operation: "spawn" });
        }
        let components = protocol.instantiate(prototype, HostType::Server)?;

        let object_id = if requested.is_assigned() && !self.entities.contains_key(&requested) {
            self.allocator.observe(requested);
            requested
        } else {
            let entities = &self.entities;
            self.allocator.allocate(|id| entities.contains_key(&id))?
        };

        debug!("Spawned {} from {:?}", object_id, prototype);
        self.entities.insert(
            object_id,
            Entity::new(object_id, Some(prototype), owner, false, transform, components),
        );
        Ok(object_id)
    }

    /// Registers an application-placed static entity. Clients keep it hidden
    /// until the server reveals it.
    pub fn insert_static<F>(
        &mut self,
        object_id: ObjectId,
        transform: Transform,
        build: F,
    ) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut EntityBuilder),
    {
        if !object_id.is_assigned() {
            return Err(RegistryError::UnassignedStaticId);
        }
        if self.entities.contains_key(&object_id) {
            return Err(RegistryError::ObjectIdInUse { object_id });
        }
        let mut builder = EntityBuilder::new(self.host);
        build(&mut builder);
        let components = builder.finish()?;
        self.allocator.observe(object_id);

        let mut entity = Entity::new(object_id, None, None, true, transform, components);
        entity.set_hidden(self.host == HostType::Client);
        self.entities.insert(object_id, entity);
        Ok(())
    }

    /// Creates the local replica of a dynamic entity the server spawned
    pub fn insert_replica(
        &mut self,
        protocol: &Protocol,
        object_id: ObjectId,
        prototype: PrototypeId,
        owner: Option<ConnectionId>,
        transform: Transform,
    ) -> Result<&mut Entity, RegistryError> {
        if !object_id.is_assigned() {
            return Err(RegistryError::EntityNotFound { object_id });
        }
        if self.entities.contains_key(&object_id) {
            return Err(RegistryError::ObjectIdInUse { object_id });
        }
        let components = protocol.instantiate(prototype, self.host)?;
        self.allocator.observe(object_id);
        let entity = Entity::new(object_id, Some(prototype), owner, false, transform, components);
        Ok(self.entities.entry(object_id).or_insert(entity))
    }

    /// Finds a pre-placed static entity by its pre-assigned id
    pub fn resolve_static(&mut self, object_id: ObjectId) -> Result<&mut Entity, RegistryError> {
        let entity = self
            .entities
            .get_mut(&object_id)
            .ok_or(RegistryError::EntityNotFound { object_id })?;
        if !entity.is_static() {
            return Err(RegistryError::NotStatic { object_id });
        }
        Ok(entity)
    }

    /// Destroys an entity. A static entity that merely left interest is
    /// hidden rather than removed.
    pub fn destroy(
        &mut self,
        object_id: ObjectId,
        reason: DestroyReason,
    ) -> Result<DestroyOutcome, RegistryError> {
        let entity = self
            .entities
            .get_mut(&object_id)
            .ok_or(RegistryError::EntityNotFound { object_id })?;

        if reason == DestroyReason::RemovedFromSubscribing && entity.is_static() {
            entity.set_hidden(true);
            return Ok(DestroyOutcome::Hidden);
        }

        let mut entity = self
            .entities
            .remove(&object_id)
            .ok_or(RegistryError::EntityNotFound { object_id })?;
        entity.mark_destroyed();
        info!("Destroyed {} ({:?})", object_id, reason);
        Ok(DestroyOutcome::Removed(entity))
    }

    pub fn lookup(&self, object_id: &ObjectId) -> Option<&Entity> {
        self.entities.get(object_id)
    }

    pub fn lookup_mut(&mut self, object_id: &ObjectId) -> Option<&mut Entity> {
        self.entities.get_mut(object_id)
    }

    pub fn contains(&self, object_id: &ObjectId) -> bool {
        self.entities.contains_key(object_id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Live object ids in ascending order
    pub fn object_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.entities.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Ids of the entities owned by `connection`, ascending
    pub fn owned_by(&self, connection: &ConnectionId) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self
            .entities
            .values()
            .filter(|entity| entity.is_owned_by(connection))
            .map(|entity| entity.object_id())
            .collect();
        ids.sort();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    /// Removes every dynamic entity, returning their ids ascending
    pub fn clear_dynamic(&mut self) -> Vec<ObjectId> {
        let mut removed: Vec<ObjectId> = self
            .entities
            .values()
            .filter(|entity| !entity.is_static())
            .map(|entity| entity.object_id())
            .collect();
        removed.sort();
        for object_id in &removed {
            self.entities.remove(object_id);
        }
        removed
    }

    /// Removes everything, statics included
    pub fn clear(&mut self) {
        self.entities.clear();
    }

    pub fn highest_observed_id(&self) -> u32 {
        self.allocator.highest()
    }
}
