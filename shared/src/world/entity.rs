use netsync_serde::Serde;

use crate::{
    types::{ComponentIndex, ConnectionId, ObjectId, PrototypeId},
    world::{
        component::Component,
        error::ComponentError,
        handles::{FieldHandle, ListHandle, RpcHandle},
        rpc::RpcSlot,
        sync_field::SyncField,
        sync_list::SyncList,
        transform::Transform,
    },
};

/// A replicated object. Static entities are placed by the application on
/// every host and keep a pre-assigned id; dynamic ones are instantiated from a
/// prototype.
pub struct Entity {
    object_id: ObjectId,
    prototype: Option<PrototypeId>,
    owner: Option<ConnectionId>,
    is_static: bool,
    hidden: bool,
    destroyed: bool,
    pub transform: Transform,
    components: Vec<Component>,
}

impl Entity {
    pub(crate) fn new(
        object_id: ObjectId,
        prototype: Option<PrototypeId>,
        owner: Option<ConnectionId>,
        is_static: bool,
        transform: Transform,
        components: Vec<Component>,
    ) -> Self {
        Self {
            object_id,
            prototype,
            owner,
            is_static,
            hidden: false,
            destroyed: false,
            transform,
            components,
        }
    }

    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    pub(crate) fn set_object_id(&mut self, object_id: ObjectId) {
        self.object_id = object_id;
    }

    /// None for static entities
    pub fn prototype(&self) -> Option<PrototypeId> {
        self.prototype
    }

    pub fn owner(&self) -> Option<ConnectionId> {
        self.owner
    }

    pub fn set_owner(&mut self, owner: Option<ConnectionId>) {
        self.owner = owner;
    }

    pub fn is_owned_by(&self, connection: &ConnectionId) -> bool {
        self.owner.as_ref() == Some(connection)
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Hidden entities exist locally but are not currently replicated to this
    /// host: combined hosts outside their own interest, or statics the server
    /// has not revealed yet
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub(crate) fn mark_destroyed(&mut self) {
        self.destroyed = true;
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn component(&self, index: ComponentIndex) -> Result<&Component, ComponentError> {
        let count = self.components.len();
        self.components
            .get(index as usize)
            .ok_or(ComponentError::ComponentOutOfRange {
                component: index,
                count,
            })
    }

    pub fn component_mut(
        &mut self,
        index: ComponentIndex,
    ) -> Result<&mut Component, ComponentError> {
        let count = self.components.len();
        self.components
            .get_mut(index as usize)
            .ok_or(ComponentError::ComponentOutOfRange {
                component: index,
                count,
            })
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn components_mut(&mut self) -> &mut [Component] {
        &mut self.components
    }

    // Handles

    pub fn field<T: Serde + 'static>(
        &self,
        handle: FieldHandle<T>,
    ) -> Result<&SyncField<T>, ComponentError> {
        self.component(handle.component())?
            .typed_field(handle.slot())
    }

    pub fn field_mut<T: Serde + 'static>(
        &mut self,
        handle: FieldHandle<T>,
    ) -> Result<&mut SyncField<T>, ComponentError> {
        self.component_mut(handle.component())?
            .typed_field_mut(handle.slot())
    }

    pub fn list<T: Serde + 'static>(
        &self,
        handle: ListHandle<T>,
    ) -> Result<&SyncList<T>, ComponentError> {
        self.component(handle.component())?
            .typed_list(handle.slot())
    }

    pub fn list_mut<T: Serde + 'static>(
        &mut self,
        handle: ListHandle<T>,
    ) -> Result<&mut SyncList<T>, ComponentError> {
        self.component_mut(handle.component())?
            .typed_list_mut(handle.slot())
    }

    pub fn rpc_mut<P: 'static>(
        &mut self,
        handle: RpcHandle<P>,
    ) -> Result<&mut RpcSlot, ComponentError> {
        self.component_mut(handle.component())?
            .typed_rpc_mut::<P>(handle.slot())
    }
}
