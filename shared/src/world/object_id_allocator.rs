use crate::{types::ObjectId, world::error::RegistryError};

/// Hands out object ids on the server. Ids grow monotonically from the highest
/// id observed so far, static placements included, and are never recycled
/// within a session.
#[derive(Debug, Default)]
pub struct ObjectIdAllocator {
    highest: u32,
}

impl ObjectIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn highest(&self) -> u32 {
        self.highest
    }

    /// Records an id assigned elsewhere, such as a static placement
    pub fn observe(&mut self, object_id: ObjectId) {
        self.highest = self.highest.max(object_id.value());
    }

    /// Returns the next id above the highest observed one that `in_use`
    /// rejects
    pub fn allocate<F>(&mut self, in_use: F) -> Result<ObjectId, RegistryError>
    where
        F: Fn(ObjectId) -> bool,
    {
        loop {
            let next = self
                .highest
                .checked_add(1)
                .ok_or(RegistryError::ObjectIdExhausted {
                    highest: self.highest,
                })?;
            self.highest = next;
            let object_id = ObjectId::new(next);
            if !in_use(object_id) {
                return Ok(object_id);
            }
        }
    }
}
