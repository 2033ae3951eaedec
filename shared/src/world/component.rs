use netsync_serde::Serde;

use crate::{
    types::{ComponentIndex, HostType, SlotIndex},
    world::{
        error::ComponentError,
        handles::{FieldHandle, ListHandle, RpcHandle},
        rpc::{RpcConfig, RpcContext, RpcSlot},
        sync_field::{FieldSlot, SyncField},
        sync_list::{ListSlot, SyncList},
    },
};

/// A replicated component: ordered SyncFields, SyncLists and RPC slots, each
/// kind numbered from zero in declaration order
pub struct Component {
    index: ComponentIndex,
    fields: Vec<Box<dyn FieldSlot>>,
    lists: Vec<Box<dyn ListSlot>>,
    rpcs: Vec<RpcSlot>,
}

impl Component {
    fn new(index: ComponentIndex) -> Self {
        Self {
            index,
            fields: Vec::new(),
            lists: Vec::new(),
            rpcs: Vec::new(),
        }
    }

    pub fn index(&self) -> ComponentIndex {
        self.index
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn list_count(&self) -> usize {
        self.lists.len()
    }

    pub fn rpc_count(&self) -> usize {
        self.rpcs.len()
    }

    pub fn field(&self, slot: SlotIndex) -> Result<&dyn FieldSlot, ComponentError> {
        let count = self.fields.len();
        self.fields
            .get(slot as usize)
            .map(|field| field.as_ref())
            .ok_or(self.out_of_range("SyncField", slot, count))
    }

    pub fn field_mut(&mut self, slot: SlotIndex) -> Result<&mut dyn FieldSlot, ComponentError> {
        let error = self.out_of_range("SyncField", slot, self.fields.len());
        match self.fields.get_mut(slot as usize) {
            Some(field) => Ok(field.as_mut()),
            None => Err(error),
        }
    }

    pub fn list(&self, slot: SlotIndex) -> Result<&dyn ListSlot, ComponentError> {
        let count = self.lists.len();
        self.lists
            .get(slot as usize)
            .map(|list| list.as_ref())
            .ok_or(self.out_of_range("SyncList", slot, count))
    }

    pub fn list_mut(&mut self, slot: SlotIndex) -> Result<&mut dyn ListSlot, ComponentError> {
        let error = self.out_of_range("SyncList", slot, self.lists.len());
        match self.lists.get_mut(slot as usize) {
            Some(list) => Ok(list.as_mut()),
            None => Err(error),
        }
    }

    pub fn rpc(&self, slot: SlotIndex) -> Result<&RpcSlot, ComponentError> {
        let count = self.rpcs.len();
        self.rpcs
            .get(slot as usize)
            .ok_or(self.out_of_range("RPC", slot, count))
    }

    pub fn rpc_mut(&mut self, slot: SlotIndex) -> Result<&mut RpcSlot, ComponentError> {
        let error = self.out_of_range("RPC", slot, self.rpcs.len());
        self.rpcs.get_mut(slot as usize).ok_or(error)
    }

    pub fn fields_mut(&mut self) -> impl Iterator<Item = (SlotIndex, &mut dyn FieldSlot)> {
        self.fields
            .iter_mut()
            .enumerate()
            .map(|(slot, field)| (slot as SlotIndex, field.as_mut()))
    }

    pub fn lists_mut(&mut self) -> impl Iterator<Item = (SlotIndex, &mut dyn ListSlot)> {
        self.lists
            .iter_mut()
            .enumerate()
            .map(|(slot, list)| (slot as SlotIndex, list.as_mut()))
    }

    pub fn fields(&self) -> impl Iterator<Item = (SlotIndex, &dyn FieldSlot)> {
        self.fields
            .iter()
            .enumerate()
            .map(|(slot, field)| (slot as SlotIndex, field.as_ref()))
    }

    pub fn lists(&self) -> impl Iterator<Item = (SlotIndex, &dyn ListSlot)> {
        self.lists
            .iter()
            .enumerate()
            .map(|(slot, list)| (slot as SlotIndex, list.as_ref()))
    }

    // Typed access

    pub fn typed_field<T: Serde + 'static>(
        &self,
        slot: SlotIndex,
    ) -> Result<&SyncField<T>, ComponentError> {
        let index = self.index;
        self.field(slot)?
            .as_any()
            .downcast_ref::<SyncField<T>>()
            .ok_or_else(|| mismatch::<T>("SyncField", index, slot))
    }

    pub fn typed_field_mut<T: Serde + 'static>(
        &mut self,
        slot: SlotIndex,
    ) -> Result<&mut SyncField<T>, ComponentError> {
        let index = self.index;
        self.field_mut(slot)?
            .as_any_mut()
            .downcast_mut::<SyncField<T>>()
            .ok_or_else(|| mismatch::<T>("SyncField", index, slot))
    }

    pub fn typed_list<T: Serde + 'static>(
        &self,
        slot: SlotIndex,
    ) -> Result<&SyncList<T>, ComponentError> {
        let index = self.index;
        self.list(slot)?
            .as_any()
            .downcast_ref::<SyncList<T>>()
            .ok_or_else(|| mismatch::<T>("SyncList", index, slot))
    }

    pub fn typed_list_mut<T: Serde + 'static>(
        &mut self,
        slot: SlotIndex,
    ) -> Result<&mut SyncList<T>, ComponentError> {
        let index = self.index;
        self.list_mut(slot)?
            .as_any_mut()
            .downcast_mut::<SyncList<T>>()
            .ok_or_else(|| mismatch::<T>("SyncList", index, slot))
    }

    /// Resolves an RPC slot and checks that it takes parameters `P`
    pub fn typed_rpc_mut<P: 'static>(
        &mut self,
        slot: SlotIndex,
    ) -> Result<&mut RpcSlot, ComponentError> {
        let index = self.index;
        let rpc = self.rpc_mut(slot)?;
        if rpc.accepts::<P>() {
            Ok(rpc)
        } else {
            Err(mismatch::<P>("RPC", index, slot))
        }
    }

    fn out_of_range(&self, kind: &'static str, slot: SlotIndex, count: usize) -> ComponentError {
        ComponentError::SlotOutOfRange {
            kind,
            component: self.index,
            slot,
            count,
        }
    }
}

fn mismatch<T>(kind: &'static str, component: ComponentIndex, slot: SlotIndex) -> ComponentError {
    ComponentError::TypeMismatch {
        kind,
        component,
        slot,
        expected: std::any::type_name::<T>(),
    }
}

/// Collects the components a prototype declares. Prototype builders run the
/// same way on every host, which keeps component and slot indices identical
/// on both ends.
pub struct EntityBuilder {
    host: HostType,
    components: Vec<Component>,
    overflow: Option<ComponentError>,
}

impl EntityBuilder {
    pub(crate) fn new(host: HostType) -> Self {
        Self {
            host,
            components: Vec::new(),
            overflow: None,
        }
    }

    pub fn host_type(&self) -> HostType {
        self.host
    }

    /// Starts the next component. Declaring more components than an index
    /// can number fails `finish`.
    pub fn component(&mut self) -> ComponentBuilder<'_> {
        let index = ComponentIndex::try_from(self.components.len()).unwrap_or_else(|_| {
            self.overflow.get_or_insert(ComponentError::TooManyComponents {
                limit: usize::from(ComponentIndex::MAX) + 1,
            });
            ComponentIndex::MAX
        });
        self.components.push(Component::new(index));
        let last = self.components.len() - 1;
        ComponentBuilder {
            host: self.host,
            component: &mut self.components[last],
            overflow: &mut self.overflow,
        }
    }

    pub(crate) fn finish(self) -> Result<Vec<Component>, ComponentError> {
        match self.overflow {
            Some(error) => Err(error),
            None => Ok(self.components),
        }
    }
}

pub struct ComponentBuilder<'a> {
    host: HostType,
    component: &'a mut Component,
    overflow: &'a mut Option<ComponentError>,
}

impl<'a> ComponentBuilder<'a> {
    pub fn index(&self) -> ComponentIndex {
        self.component.index
    }

    pub fn add_field<T: Serde + 'static>(&mut self, mut field: SyncField<T>) -> FieldHandle<T> {
        field.attach(self.host);
        let slot = self.next_slot("SyncField", self.component.fields.len());
        self.component.fields.push(Box::new(field));
        FieldHandle::new(self.component.index, slot)
    }

    pub fn add_list<T: Serde + 'static>(&mut self, mut list: SyncList<T>) -> ListHandle<T> {
        list.attach(self.host);
        let slot = self.next_slot("SyncList", self.component.lists.len());
        self.component.lists.push(Box::new(list));
        ListHandle::new(self.component.index, slot)
    }

    pub fn add_rpc<P, F>(&mut self, config: RpcConfig, body: F) -> RpcHandle<P>
    where
        P: Serde + 'static,
        F: FnMut(&RpcContext, P) + 'static,
    {
        let slot = self.next_slot("RPC", self.component.rpcs.len());
        self.component.rpcs.push(RpcSlot::new(config, body));
        RpcHandle::new(self.component.index, slot)
    }

    fn next_slot(&mut self, kind: &'static str, count: usize) -> SlotIndex {
        SlotIndex::try_from(count).unwrap_or_else(|_| {
            self.overflow.get_or_insert(ComponentError::TooManySlots {
                kind,
                component: self.component.index,
                limit: usize::from(SlotIndex::MAX) + 1,
            });
            SlotIndex::MAX
        })
    }
}
