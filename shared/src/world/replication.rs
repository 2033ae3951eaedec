use netsync_serde::{impl_serde_struct, ConstByteLength};

use crate::types::{ComponentIndex, ObjectId, SlotIndex};

/// Prefix of every message that targets one member of one component:
/// `[u32 object id][u8 component index][u16 slot index]`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReplicationAddress {
    pub object_id: ObjectId,
    pub component: ComponentIndex,
    pub slot: SlotIndex,
}

impl ReplicationAddress {
    pub fn new(object_id: ObjectId, component: ComponentIndex, slot: SlotIndex) -> Self {
        Self {
            object_id,
            component,
            slot,
        }
    }
}

impl_serde_struct!(ReplicationAddress {
    object_id,
    component,
    slot
});

impl ConstByteLength for ReplicationAddress {
    fn const_byte_length() -> usize {
        4 + 1 + 2
    }
}
