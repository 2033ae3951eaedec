use std::{collections::HashMap, rc::Rc};

use crate::{
    types::{HostType, PrototypeId},
    world::{
        component::{Component, EntityBuilder},
        error::RegistryError,
    },
};

pub mod error;
pub use error::ProtocolError;

/// Declares the components and sync members of one prototype. Must declare
/// the same members in the same order every time it runs.
pub type PrototypeBuilder = Rc<dyn Fn(&mut EntityBuilder)>;

// Protocol Plugin
pub trait ProtocolPlugin {
    fn build(&self, protocol: &mut Protocol);
}

// Protocol
/// Everything both roles must agree on before connecting: the prototypes that
/// can be spawned dynamically. Built once, then handed to the server and the
/// client, which lock it.
#[derive(Clone, Default)]
pub struct Protocol {
    prototypes: HashMap<PrototypeId, PrototypeBuilder>,
    locked: bool,
}

impl Protocol {
    pub fn builder() -> Self {
        Self::default()
    }

    pub fn add_plugin<P: ProtocolPlugin>(&mut self, plugin: P) -> &mut Self {
        self.check_lock();
        plugin.build(self);
        self
    }

    /// Registers a prototype. Panics if the protocol is locked, the id is
    /// taken or the layout overflows an index; see `try_add_prototype`.
    pub fn add_prototype<F>(&mut self, prototype: PrototypeId, builder: F) -> &mut Self
    where
        F: Fn(&mut EntityBuilder) + 'static,
    {
        if let Err(error) = self.try_add_prototype(prototype, builder) {
            panic!("{}", error);
        }
        self
    }

    // Non-panicking builder methods

    pub fn try_add_plugin<P: ProtocolPlugin>(
        &mut self,
        plugin: P,
    ) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        plugin.build(self);
        Ok(self)
    }

    pub fn try_add_prototype<F>(
        &mut self,
        prototype: PrototypeId,
        builder: F,
    ) -> Result<&mut Self, ProtocolError>
    where
        F: Fn(&mut EntityBuilder) + 'static,
    {
        self.try_check_lock()?;
        if self.prototypes.contains_key(&prototype) {
            return Err(ProtocolError::DuplicatePrototype { prototype });
        }
        let mut layout = EntityBuilder::new(HostType::Server);
        builder(&mut layout);
        layout
            .finish()
            .map_err(|source| ProtocolError::InvalidPrototype { prototype, source })?;
        self.prototypes.insert(prototype, Rc::new(builder));
        Ok(self)
    }

    pub fn has_prototype(&self, prototype: &PrototypeId) -> bool {
        self.prototypes.contains_key(prototype)
    }

    pub fn prototype_count(&self) -> usize {
        self.prototypes.len()
    }

    /// Runs a prototype's builder for the given host
    pub fn instantiate(
        &self,
        prototype: PrototypeId,
        host: HostType,
    ) -> Result<Vec<Component>, RegistryError> {
        let builder = self
            .prototypes
            .get(&prototype)
            .ok_or(RegistryError::UnknownPrototype { prototype })?;
        let mut entity_builder = EntityBuilder::new(host);
        builder(&mut entity_builder);
        Ok(entity_builder.finish()?)
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn try_lock(&mut self) -> Result<(), ProtocolError> {
        self.try_check_lock()?;
        self.locked = true;
        Ok(())
    }

    pub fn lock(&mut self) {
        self.check_lock();
        self.locked = true;
    }

    /// Returns Err if protocol is locked
    pub fn try_check_lock(&self) -> Result<(), ProtocolError> {
        if self.locked {
            Err(ProtocolError::AlreadyLocked)
        } else {
            Ok(())
        }
    }

    /// Checks if protocol is locked, panics if it is
    pub fn check_lock(&self) {
        if self.locked {
            panic!("Protocol already locked!");
        }
    }

    pub fn build(&mut self) -> Self {
        std::mem::take(self)
    }
}
